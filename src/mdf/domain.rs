//! Interpretation of MDF `Type`/`Enum` descriptors
//!
//! A descriptor is a string (a scalar type name), a mapping (pattern, units
//! or list) or a list (enumerated values, or a single URL/path reference).
//! Cases are tried in a fixed order and the first match wins. Shapes that
//! match nothing fall back to the default domain with a warning; resolution
//! itself never fails.

use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::sync::OnceLock;

use super::convert::scalar_string;
use crate::model::DEFAULT_VALUE_DOMAIN;

/// Normalized value domain of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainDescriptor {
    /// A named scalar type, optionally with units and a unit pattern
    Scalar {
        value_domain: String,
        units: Option<String>,
        pattern: Option<String>,
    },
    /// Strings matching a pattern
    Regexp { pattern: String },
    /// A list whose items have their own domain
    List { item: Box<DomainDescriptor> },
    /// Values drawn from a value set
    ValueSet(ValueSetSource),
}

impl DomainDescriptor {
    fn scalar(value_domain: impl Into<String>) -> Self {
        Self::Scalar {
            value_domain: value_domain.into(),
            units: None,
            pattern: None,
        }
    }

    fn default_domain() -> Self {
        Self::scalar(DEFAULT_VALUE_DOMAIN)
    }
}

/// Where a value set's terms come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSetSource {
    /// Values listed inline
    Terms(Vec<TermInit>),
    /// Values defined in a document at a URL
    Url(String),
    /// Values defined in a file
    Path(String),
}

/// An inline enumerated value; its handle is the value itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermInit {
    pub handle: String,
    pub value: String,
}

/// Outcome of resolving a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub domain: DomainDescriptor,
    pub warnings: Vec<String>,
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("static regex"))
}

/// Resolve a `Type`/`Enum` descriptor
pub fn resolve(spec: &Value) -> Resolved {
    let mut warnings = Vec::new();
    let domain = resolve_inner(spec, &mut warnings);
    Resolved { domain, warnings }
}

fn resolve_inner(spec: &Value, warnings: &mut Vec<String>) -> DomainDescriptor {
    match spec {
        Value::String(s) => DomainDescriptor::scalar(s.clone()),
        Value::Mapping(map) => resolve_mapping(map, warnings),
        Value::Sequence(items) => resolve_list(items, warnings),
        Value::Tagged(tagged) => resolve_inner(&tagged.value, warnings),
        Value::Null => {
            warnings.push(format!("no type given; using '{}'", DEFAULT_VALUE_DOMAIN));
            DomainDescriptor::default_domain()
        }
        other => {
            warnings.push(format!(
                "unrecognized type spec {:?}; using '{}'",
                other, DEFAULT_VALUE_DOMAIN
            ));
            DomainDescriptor::default_domain()
        }
    }
}

fn resolve_mapping(map: &Mapping, warnings: &mut Vec<String>) -> DomainDescriptor {
    let get = |key: &str| map.get(key).filter(|v| !v.is_null());
    let value_type = get("value_type").and_then(scalar_string);

    if value_type.as_deref() == Some("list") {
        let item = match get("item_type").or_else(|| get("Enum")) {
            Some(item) => resolve_inner(item, warnings),
            None => {
                warnings.push(format!(
                    "list type without item_type or Enum; items use '{}'",
                    DEFAULT_VALUE_DOMAIN
                ));
                DomainDescriptor::default_domain()
            }
        };
        let item = match (item, get("units")) {
            (
                DomainDescriptor::Scalar {
                    value_domain,
                    units: None,
                    pattern,
                },
                Some(units),
            ) => {
                let (units, unit_pattern) = units_of(units);
                DomainDescriptor::Scalar {
                    value_domain,
                    units,
                    pattern: pattern.or(unit_pattern),
                }
            }
            (item, _) => item,
        };
        return DomainDescriptor::List { item: Box::new(item) };
    }

    if let Some(pattern) = get("pattern").and_then(scalar_string) {
        return DomainDescriptor::Regexp { pattern };
    }

    if let Some(units) = get("units") {
        let value_domain = value_type.unwrap_or_else(|| {
            warnings.push(format!(
                "units given without value_type; using '{}'",
                DEFAULT_VALUE_DOMAIN
            ));
            DEFAULT_VALUE_DOMAIN.to_string()
        });
        let (units, pattern) = units_of(units);
        return DomainDescriptor::Scalar {
            value_domain,
            units,
            pattern,
        };
    }

    if let Some(item_type) = get("item_type") {
        warnings.push(format!(
            "item_type given with value_type {:?}; treating as a list",
            value_type.as_deref().unwrap_or("(none)")
        ));
        let item = resolve_inner(item_type, warnings);
        return DomainDescriptor::List { item: Box::new(item) };
    }

    if let Some(value_type) = value_type {
        return DomainDescriptor::scalar(value_type);
    }

    warnings.push(format!("unrecognized type mapping; using '{}'", DEFAULT_VALUE_DOMAIN));
    DomainDescriptor::default_domain()
}

/// Units joined by `;`, and the unit pattern when the first entry is `{pattern: ...}`
fn units_of(units: &Value) -> (Option<String>, Option<String>) {
    match units {
        Value::Sequence(items) => {
            let mut rest = items.as_slice();
            let mut pattern = None;
            if let Some(first) = items.first().and_then(Value::as_mapping) {
                pattern = first.get("pattern").and_then(scalar_string);
                if pattern.is_some() {
                    rest = &items[1..];
                }
            }
            let joined = rest
                .iter()
                .filter_map(scalar_string)
                .collect::<Vec<_>>()
                .join(";");
            (Some(joined), pattern)
        }
        other => (scalar_string(other), None),
    }
}

fn resolve_list(items: &[Value], warnings: &mut Vec<String>) -> DomainDescriptor {
    if items.is_empty() {
        warnings.push(format!("empty enumeration; using '{}'", DEFAULT_VALUE_DOMAIN));
        return DomainDescriptor::default_domain();
    }

    if let [Value::String(only)] = items {
        if url_pattern().is_match(only) {
            return DomainDescriptor::ValueSet(ValueSetSource::Url(only.clone()));
        }
        if only.starts_with('/') {
            return DomainDescriptor::ValueSet(ValueSetSource::Path(only.clone()));
        }
    }

    let mut terms = Vec::with_capacity(items.len());
    for item in items {
        match scalar_string(item) {
            Some(value) => terms.push(TermInit {
                handle: value.clone(),
                value,
            }),
            None => warnings.push(format!("skipping non-scalar enumeration value {:?}", item)),
        }
    }
    DomainDescriptor::ValueSet(ValueSetSource::Terms(terms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_str(s: &str) -> Resolved {
        resolve(&serde_yaml::from_str(s).unwrap())
    }

    fn values(domain: &DomainDescriptor) -> Vec<&str> {
        match domain {
            DomainDescriptor::ValueSet(ValueSetSource::Terms(terms)) => {
                terms.iter().map(|t| t.value.as_str()).collect()
            }
            other => panic!("expected enumerated values, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_string() {
        let r = resolve_str("integer");
        assert_eq!(r.domain, DomainDescriptor::scalar("integer"));
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_pattern() {
        let r = resolve_str("pattern: '^[0-9]{4}$'");
        assert_eq!(
            r.domain,
            DomainDescriptor::Regexp {
                pattern: "^[0-9]{4}$".into()
            }
        );
    }

    #[test]
    fn test_units_joined() {
        let r = resolve_str("value_type: number\nunits: [mg, kg]");
        assert_eq!(
            r.domain,
            DomainDescriptor::Scalar {
                value_domain: "number".into(),
                units: Some("mg;kg".into()),
                pattern: None
            }
        );
    }

    #[test]
    fn test_units_with_leading_pattern() {
        let r = resolve_str("value_type: number\nunits:\n  - pattern: '^m?g$'\n  - g");
        assert_eq!(
            r.domain,
            DomainDescriptor::Scalar {
                value_domain: "number".into(),
                units: Some("g".into()),
                pattern: Some("^m?g$".into())
            }
        );
    }

    #[test]
    fn test_list_of_scalars_and_enums() {
        let r = resolve_str("value_type: list\nitem_type: string");
        assert_eq!(
            r.domain,
            DomainDescriptor::List {
                item: Box::new(DomainDescriptor::scalar("string"))
            }
        );

        let r = resolve_str("value_type: list\nEnum: [a, b]");
        match r.domain {
            DomainDescriptor::List { item } => assert_eq!(values(&item), vec!["a", "b"]),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_item_type_without_list_warns() {
        let r = resolve_str("value_type: string\nitem_type: integer");
        assert!(matches!(r.domain, DomainDescriptor::List { .. }));
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn test_references() {
        let url = resolve_str("['https://example.org/enums/site.yml']");
        assert_eq!(
            url.domain,
            DomainDescriptor::ValueSet(ValueSetSource::Url("https://example.org/enums/site.yml".into()))
        );
        let path = resolve_str("['/enums/site.yml']");
        assert_eq!(
            path.domain,
            DomainDescriptor::ValueSet(ValueSetSource::Path("/enums/site.yml".into()))
        );
    }

    #[test]
    fn test_enumeration_stringifies_booleans() {
        let r = resolve_str("[normal, tumor, true, 3]");
        assert_eq!(values(&r.domain), vec!["normal", "tumor", "True", "3"]);
    }

    #[test]
    fn test_two_paths_are_an_enumeration() {
        let r = resolve_str("['/a', '/b']");
        assert_eq!(values(&r.domain), vec!["/a", "/b"]);
    }

    #[test]
    fn test_unrecognized_falls_back_with_warning() {
        for spec in ["~", "[]", "{foo: bar}", "12"] {
            let r = resolve_str(spec);
            assert_eq!(r.domain, DomainDescriptor::default_domain(), "{}", spec);
            assert_eq!(r.warnings.len(), 1, "{}", spec);
        }
    }
}
