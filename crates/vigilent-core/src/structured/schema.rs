//! JSON Schema validation for model responses.
//!
//! Responses are validated against schema/structured-analysis.schema.json
//! before they are deserialized.

use std::sync::OnceLock;

/// Embedded response schema (loaded at compile time).
const STRUCTURED_ANALYSIS_SCHEMA_JSON: &str =
    include_str!("../../../../schema/structured-analysis.schema.json");

/// Compiled validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value =
            serde_json::from_str(STRUCTURED_ANALYSIS_SCHEMA_JSON)
                .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a response value against the schema.
///
/// Returns every violation, each with its instance path.
pub fn validate_structured_analysis(value: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
