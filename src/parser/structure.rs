//! Optional structural validation of the raw export before it is parsed.

use std::path::Path;

use serde_json::Value;

/// Validates the shape of a raw realm export document.
///
/// Implementations return every violation they find; an empty list is never
/// returned as an error.
pub trait StructuralValidator: Send + Sync {
    /// Check `document`, returning one message per violation.
    fn validate(&self, document: &Value) -> Result<(), Vec<String>>;
}

/// [`StructuralValidator`] backed by a JSON Schema document.
pub struct JsonSchemaValidator {
    validator: jsonschema::Validator,
}

impl JsonSchemaValidator {
    /// Compile a validator from a JSON Schema value.
    pub fn new(schema: &Value) -> Result<Self, String> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| format!("Invalid JSON schema: {e}"))?;
        Ok(Self { validator })
    }

    /// Load and compile a JSON Schema from a file.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let schema: Value = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
        Self::new(&schema)
    }
}

impl StructuralValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(document)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator").finish_non_exhaustive()
    }
}
