//! Wrapper around the JSON Schema engine.
//!
//! The schema is compiled once at startup and never reloaded for the life of
//! the process.  Validation failures collect every violation into a single
//! human-readable reason so a client sees the full picture in one response.

use jsonschema::Validator;
use log::trace;
use serde_json::Value;
use snafu::ResultExt;

use crate::{error, Result};

#[derive(Debug)]
pub struct SchemaValidator {
    validator: Validator,
}

impl SchemaValidator {
    /// Compiles the given schema document.
    pub fn new(schema: &[u8]) -> Result<Self> {
        let schema: Value = serde_json::from_slice(schema).context(error::ParseSchemaSnafu)?;
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            error::Error::CompileSchema {
                reason: e.to_string(),
            }
        })?;
        Ok(Self { validator })
    }

    /// Validates a serialized document against the compiled schema.
    pub fn validate(&self, document: &[u8]) -> Result<()> {
        let doc: Value = serde_json::from_slice(document).context(error::ParseDocumentSnafu)?;

        let violations: Vec<String> = self
            .validator
            .iter_errors(&doc)
            .map(|e| format!("'{}': {}", e.instance_path, e))
            .collect();
        if !violations.is_empty() {
            return error::SchemaViolationSnafu {
                reason: violations.join("; "),
            }
            .fail();
        }

        trace!("Document validated against schema");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaValidator {
        let schema = json!({
            "type": "object",
            "properties": {
                "router-id": { "type": "string" },
                "bgp": { "type": "object" }
            },
            "required": ["router-id"]
        });
        SchemaValidator::new(&serde_json::to_vec(&schema).unwrap()).unwrap()
    }

    #[test]
    fn valid_document_passes() {
        let doc = json!({"router-id": "1.1.1.1", "bgp": {}});
        schema().validate(&serde_json::to_vec(&doc).unwrap()).unwrap();
    }

    #[test]
    fn missing_required_property_fails_with_reason() {
        let doc = json!({"bgp": {}});
        let err = schema()
            .validate(&serde_json::to_vec(&doc).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("router-id"));
    }

    #[test]
    fn wrong_type_fails() {
        let doc = json!({"router-id": 42});
        schema()
            .validate(&serde_json::to_vec(&doc).unwrap())
            .unwrap_err();
    }

    #[test]
    fn unparseable_document_fails() {
        schema().validate(b"not json").unwrap_err();
    }

    #[test]
    fn unparseable_schema_is_rejected() {
        SchemaValidator::new(b"{ nope").unwrap_err();
    }
}
