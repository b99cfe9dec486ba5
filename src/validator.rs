//! Structural validation of MDF against the MDF JSON schema
//!
//! The schema is written in YAML and validated with Draft 6 semantics. A copy
//! ships inside the crate; callers may validate against their own instead.

use include_dir::{include_dir, Dir};
use jsonschema::{Draft, JSONSchema};
use std::fs;
use std::path::Path;

use crate::error::{MdfError, Result};

static SCHEMA_DIR: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schema");

const EMBEDDED_SCHEMA: &str = "mdf-schema.yaml";

/// Validates MDF instances against a compiled schema
pub struct MdfValidator {
    schema: serde_json::Value,
    compiled: JSONSchema,
}

impl MdfValidator {
    /// Validator for the schema shipped with the crate
    pub fn embedded() -> Result<Self> {
        let text = SCHEMA_DIR
            .get_file(EMBEDDED_SCHEMA)
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| MdfError::Schema(format!("embedded {} missing", EMBEDDED_SCHEMA)))?;
        Self::from_yaml_str(text)
    }

    /// Validator for a schema file (YAML or JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)
            .map_err(|e| MdfError::Schema(format!("schema is not valid YAML: {}", e)))?;
        let schema = serde_json::to_value(&yaml)?;
        Self::from_schema(schema)
    }

    pub fn from_schema(schema: serde_json::Value) -> Result<Self> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft6)
            .compile(&schema)
            .map_err(|e| MdfError::Schema(e.to_string()))?;
        Ok(Self { schema, compiled })
    }

    /// The schema as JSON
    pub fn schema(&self) -> &serde_json::Value {
        &self.schema
    }

    /// Validate a loaded MDF document, reporting every violation at once
    pub fn validate_yaml(&self, instance: &serde_yaml::Value) -> Result<()> {
        let json = serde_json::to_value(instance)?;
        self.validate(&json)
    }

    pub fn validate(&self, instance: &serde_json::Value) -> Result<()> {
        tracing::debug!("checking instance against MDF schema");
        let result = self.compiled.validate(instance);
        if let Err(errors) = result {
            let messages: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        format!("- {}", e)
                    } else {
                        format!("- {}: {}", path, e)
                    }
                })
                .collect();
            for msg in &messages {
                tracing::error!("{}", msg);
            }
            return Err(MdfError::Validation(messages.join("\n")));
        }
        Ok(())
    }
}

/// Validate `instance` against `schema` in one call
pub fn validate(schema: &serde_json::Value, instance: &serde_json::Value) -> Result<()> {
    MdfValidator::from_schema(schema.clone())?.validate(instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_embedded_schema_compiles() {
        let validator = MdfValidator::embedded().unwrap();
        assert_eq!(validator.schema()["type"], "object");
    }

    #[test]
    fn test_minimal_model_is_valid() {
        let validator = MdfValidator::embedded().unwrap();
        let mdf = yaml(
            "Handle: test\n\
             Nodes:\n  case:\n    Props: [case_id]\n  sample: {}\n\
             Relationships:\n  of_case:\n    Mul: many_to_one\n    Ends:\n      - Src: sample\n        Dst: case\n\
             PropDefinitions:\n  case_id:\n    Type: string\n    Key: true\n",
        );
        validator.validate_yaml(&mdf).unwrap();
    }

    #[test]
    fn test_violations_are_collected() {
        let validator = MdfValidator::embedded().unwrap();
        let mdf = yaml(
            "Nodes:\n  case:\n    Props: case_id\n\
             Relationships:\n  of_case:\n    Ends:\n      - Src: sample\n",
        );
        match validator.validate_yaml(&mdf) {
            Err(MdfError::Validation(msg)) => {
                assert!(msg.contains("/Nodes/case/Props"));
                assert!(msg.contains("Dst"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_schema_rejected() {
        let err = MdfValidator::from_schema(serde_json::json!({"type": 12})).err();
        assert!(matches!(err, Some(MdfError::Schema(_))));
    }
}
