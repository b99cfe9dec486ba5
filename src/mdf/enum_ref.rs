//! Enumerations defined outside the model
//!
//! A property whose `Enum` is a single URL or `/path` takes its values from
//! another MDF document: `PropDefinitions.<prop>` there is either a list of
//! values or a mapping with an `Enum` list, and that document's `Terms`
//! section may describe the values further.

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use super::convert::{string_list, translate, Init};
use super::domain::ValueSetSource;
use crate::error::{MdfError, Result};
use crate::loader::MdfLoader;
use crate::model::Term;

/// Where a `/path` reference points: below `base_dir` if that file exists,
/// else the path as written
pub fn resolve_path(reference: &str, base_dir: Option<&Path>) -> PathBuf {
    let base = base_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok());
    if let Some(base) = base {
        let candidate = base.join(reference.trim_start_matches('/'));
        if candidate.is_file() {
            return candidate;
        }
    }
    PathBuf::from(reference)
}

/// Load the terms a reference defines for property `prop`
///
/// Terms without an `Origin` get `default_origin`. An empty result means the
/// document has no values for the property.
pub fn load_enum_terms(
    loader: &MdfLoader,
    source: &ValueSetSource,
    prop: &str,
    default_origin: &str,
    base_dir: Option<&Path>,
) -> Result<Vec<Term>> {
    let doc = match source {
        ValueSetSource::Path(path) => loader.load_file(&resolve_path(path, base_dir))?,
        ValueSetSource::Url(url) => loader.load_url(url)?,
        ValueSetSource::Terms(_) => {
            return Err(MdfError::invariant(format!(
                "property '{}' has inline values, not a reference",
                prop
            )))
        }
    };
    tracing::debug!(source = %doc.digest, prop, "loaded enum reference");

    let root = doc.value.as_mapping().ok_or_else(|| {
        MdfError::parse(doc.digest.source.clone(), "enum reference is not a mapping")
    })?;
    let values = match root.get("PropDefinitions").and_then(|defs| defs.get(prop)) {
        Some(Value::Mapping(def)) => string_list(def.get("Enum")),
        Some(list @ Value::Sequence(_)) => string_list(Some(list)),
        _ => Vec::new(),
    };
    let term_specs = root.get("Terms").and_then(Value::as_mapping);

    let mut terms = Vec::with_capacity(values.len());
    for value in values {
        terms.push(reference_term(&value, term_specs, default_origin)?);
    }
    Ok(terms)
}

fn reference_term(value: &str, specs: Option<&Mapping>, default_origin: &str) -> Result<Term> {
    let mut init = Init::new();
    init.insert("value".to_string(), Value::String(value.to_string()));

    let spec = specs
        .and_then(|s| s.get(value))
        .and_then(Value::as_mapping)
        .cloned()
        .unwrap_or_default();
    let mut term = translate::<Term>(None, &spec, init)?;
    if term.origin_name.is_none() {
        term.origin_name = Some(default_origin.to_string());
    }
    Ok(term)
}
