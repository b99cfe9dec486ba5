//! Translation of single MDF objects into model entities
//!
//! An MDF object (a node, relationship, property or term spec) is first
//! reduced to an initializer map keyed by model attribute names; each entity
//! kind then builds itself from that map. Keys with no attribute mapping are
//! ignored so newer MDF keys do not break older readers.

use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use super::domain::{self, DomainDescriptor, ValueSetSource};
use crate::error::{MdfError, Result};
use crate::model::{Node, Property, Tag, Tags, Term};

/// Attribute name -> raw MDF value
pub type Init = BTreeMap<String, Value>;

/// MDF key -> model attribute name
pub fn mdf_to_attr(key: &str) -> Option<&'static str> {
    let attr = match key {
        "Handle" => "handle",
        "Desc" => "desc",
        "NanoID" => "nanoid",
        "Src" => "src",
        "Dst" => "dst",
        "Mul" => "multiplicity",
        "Value" => "value",
        // type specs are interpreted by the property conversion
        "Type" => "Type",
        "Enum" => "Enum",
        "Key" => "is_key",
        "Nul" => "is_nullable",
        "Req" => "is_required",
        "Deprecated" => "is_deprecated",
        "Strict" => "is_strict",
        "Origin" => "origin_name",
        "Definition" => "origin_definition",
        "Code" => "origin_id",
        "Version" => "origin_version",
        "CompKey" => "composite_key",
        _ => return None,
    };
    Some(attr)
}

/// An entity kind that can be built from an MDF initializer
pub trait FromSpec {
    type Output;

    fn from_init(init: &Init) -> Result<Self::Output>;

    fn tags_mut(output: &mut Self::Output) -> &mut Tags;
}

/// Build an entity of kind `E` from an MDF spec
///
/// Keys of `spec` overwrite keys of `extra`; `handle` is used only when
/// neither supplied one. Nested `Tags` become [`Tag`]s on the result.
pub fn translate<E: FromSpec>(handle: Option<&str>, spec: &Mapping, extra: Init) -> Result<E::Output> {
    let mut init = extra;
    for (key, value) in spec {
        if let Some(attr) = key.as_str().and_then(mdf_to_attr) {
            init.insert(attr.to_string(), value.clone());
        }
    }
    if let Some(handle) = handle {
        init.entry("handle".to_string())
            .or_insert_with(|| Value::String(handle.to_string()));
    }

    let mut entity = E::from_init(&init)?;
    if let Some(Value::Mapping(tags)) = spec.get("Tags") {
        let target = E::tags_mut(&mut entity);
        for (key, value) in tags {
            if let (Some(key), Some(value)) = (scalar_string(key), scalar_string(value)) {
                target.insert(key.clone(), Tag::new(key, value));
            }
        }
    }
    Ok(entity)
}

/// Initializer holding just the owning model's handle
pub fn model_init(model: &str) -> Init {
    let mut init = Init::new();
    init.insert("model".to_string(), Value::String(model.to_string()));
    init
}

// =============================================================================
// Scalar helpers
// =============================================================================

/// Render a YAML scalar as text; booleans read `True`/`False`
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Tagged(tagged) => scalar_string(&tagged.value),
        _ => None,
    }
}

/// Interpret a YAML scalar as a flag
pub fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Strings of a YAML sequence; anything else yields nothing
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_sequence)
        .map(|items| items.iter().filter_map(scalar_string).collect())
        .unwrap_or_default()
}

fn text(init: &Init, attr: &str) -> Option<String> {
    init.get(attr).and_then(scalar_string)
}

fn flag(init: &Init, attr: &str) -> Option<bool> {
    init.get(attr).and_then(as_flag)
}

/// Convert a term value to a handle: spaces and case changes become `_`
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.replace(' ', "_").chars().collect();
    let follows_lower = |i: usize| i > 0 && (chars[i - 1].is_ascii_lowercase() || chars[i - 1].is_ascii_digit());

    let mut out = String::with_capacity(chars.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '_' && follows_lower(i) && chars.get(i + 1).map_or(false, |n| n.is_ascii_uppercase()) {
            out.push('_');
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c.is_ascii_uppercase() && follows_lower(i) {
            out.push('_');
        }
        out.push(c);
        i += 1;
    }
    out.to_lowercase()
}

/// Decode `%XX` escapes; malformed escapes are kept as written
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// =============================================================================
// Entity kinds
// =============================================================================

impl FromSpec for Node {
    type Output = Node;

    fn from_init(init: &Init) -> Result<Node> {
        Ok(Node {
            handle: text(init, "handle").unwrap_or_default(),
            model: text(init, "model").unwrap_or_default(),
            desc: text(init, "desc"),
            nanoid: text(init, "nanoid"),
            composite_key: string_list(init.get("composite_key")),
            ..Default::default()
        })
    }

    fn tags_mut(output: &mut Node) -> &mut Tags {
        &mut output.tags
    }
}

/// An edge before its endpoints are bound
#[derive(Debug, Clone, Default)]
pub struct EdgeDraft {
    pub handle: String,
    pub model: String,
    pub multiplicity: Option<String>,
    pub desc: Option<String>,
    pub nanoid: Option<String>,
    pub is_required: Option<bool>,
    pub tags: Tags,
}

/// Marker for edge translation; edges are built as [`EdgeDraft`]s
pub struct EdgeSpec;

impl FromSpec for EdgeSpec {
    type Output = EdgeDraft;

    fn from_init(init: &Init) -> Result<EdgeDraft> {
        Ok(EdgeDraft {
            handle: text(init, "handle").unwrap_or_default(),
            model: text(init, "model").unwrap_or_default(),
            multiplicity: text(init, "multiplicity").filter(|m| !m.is_empty()),
            desc: text(init, "desc"),
            nanoid: text(init, "nanoid"),
            is_required: flag(init, "is_required"),
            tags: Tags::new(),
        })
    }

    fn tags_mut(output: &mut EdgeDraft) -> &mut Tags {
        &mut output.tags
    }
}

impl FromSpec for Term {
    type Output = Term;

    fn from_init(init: &Init) -> Result<Term> {
        let value = text(init, "value").unwrap_or_default();
        let handle = text(init, "handle")
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| to_snake_case(&value));
        Ok(Term {
            handle,
            value,
            origin_name: text(init, "origin_name"),
            origin_id: text(init, "origin_id"),
            origin_version: text(init, "origin_version"),
            origin_definition: text(init, "origin_definition").map(|d| percent_decode(&d)),
            nanoid: text(init, "nanoid"),
            desc: text(init, "desc"),
            ..Default::default()
        })
    }

    fn tags_mut(output: &mut Term) -> &mut Tags {
        &mut output.tags
    }
}

/// A property plus the value set its type spec asks for
#[derive(Debug, Clone)]
pub struct PropertyDraft {
    pub prop: Property,
    pub pending: Option<ValueSetSource>,
    /// Problems met while interpreting the type spec
    pub warnings: Vec<String>,
}

impl FromSpec for Property {
    type Output = PropertyDraft;

    fn from_init(init: &Init) -> Result<PropertyDraft> {
        let mut prop = Property::new(
            text(init, "handle").unwrap_or_default(),
            text(init, "model").unwrap_or_default(),
        );
        prop.desc = text(init, "desc");
        prop.nanoid = text(init, "nanoid");
        prop.is_key = flag(init, "is_key").unwrap_or(false);
        prop.is_required = flag(init, "is_required").unwrap_or(false);
        prop.is_nullable = flag(init, "is_nullable").unwrap_or(false);
        prop.is_strict = flag(init, "is_strict").unwrap_or(true);
        prop.is_deprecated = flag(init, "is_deprecated");

        let mut type_spec = init
            .get("Enum")
            .filter(|v| !v.is_null())
            .or_else(|| init.get("Type"))
            .cloned()
            .unwrap_or(Value::Null);
        // deprecated {"Type": {"Enum": [...]}} form; a list mapping keeps its Enum as items
        let bare_enum = type_spec.as_mapping().and_then(|m| {
            let is_list = m.get("value_type").and_then(scalar_string).as_deref() == Some("list");
            m.get("Enum").filter(|_| !is_list).cloned()
        });
        if let Some(inner) = bare_enum {
            type_spec = inner;
        }

        let resolved = domain::resolve(&type_spec);
        let pending = apply_domain(&mut prop, resolved.domain)?;
        Ok(PropertyDraft {
            prop,
            pending,
            warnings: resolved.warnings,
        })
    }

    fn tags_mut(output: &mut PropertyDraft) -> &mut Tags {
        &mut output.prop.tags
    }
}

/// Set a property's domain fields; returns the value set still to be built
fn apply_domain(prop: &mut Property, domain: DomainDescriptor) -> Result<Option<ValueSetSource>> {
    match domain {
        DomainDescriptor::Scalar {
            value_domain,
            units,
            pattern,
        } => {
            prop.value_domain = value_domain;
            prop.units = units;
            prop.pattern = pattern;
            Ok(None)
        }
        DomainDescriptor::Regexp { pattern } => {
            prop.value_domain = "regexp".to_string();
            prop.pattern = Some(pattern);
            Ok(None)
        }
        DomainDescriptor::ValueSet(source) => {
            check_value_set(prop, &source)?;
            prop.value_domain = "value_set".to_string();
            Ok(Some(source))
        }
        DomainDescriptor::List { item } => {
            prop.value_domain = "list".to_string();
            match *item {
                DomainDescriptor::Scalar {
                    value_domain,
                    units,
                    pattern,
                } => {
                    prop.item_domain = Some(value_domain);
                    prop.units = units;
                    prop.pattern = pattern;
                    Ok(None)
                }
                DomainDescriptor::Regexp { pattern } => {
                    prop.item_domain = Some("regexp".to_string());
                    prop.pattern = Some(pattern);
                    Ok(None)
                }
                DomainDescriptor::ValueSet(source) => {
                    check_value_set(prop, &source)?;
                    prop.item_domain = Some("value_set".to_string());
                    Ok(Some(source))
                }
                DomainDescriptor::List { .. } => {
                    prop.item_domain = Some("list".to_string());
                    Ok(None)
                }
            }
        }
    }
}

fn check_value_set(prop: &Property, source: &ValueSetSource) -> Result<()> {
    if let ValueSetSource::Terms(terms) = source {
        if terms.is_empty() {
            return Err(MdfError::invariant(format!(
                "value set for property '{}' has neither terms nor a reference",
                prop.handle
            )));
        }
    }
    Ok(())
}
