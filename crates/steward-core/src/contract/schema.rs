//! JSON Schema validation for contracts.
//!
//! The schema is embedded at compile time and compiled once. It checks
//! structure only (required sections, field types, rule shape); content
//! rules such as a non-blank `answerable_human` are enforced by the parser.
//! Unknown keys are allowed so newer documents still load.

use std::sync::OnceLock;

/// Embedded contract schema (loaded at compile time).
const CONTRACT_SCHEMA_JSON: &str = include_str!("../../schema/contract.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    COMPILED_SCHEMA
        .get_or_init(|| {
            let schema_value: serde_json::Value = serde_json::from_str(CONTRACT_SCHEMA_JSON)
                .map_err(|e| format!("Invalid schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema_value)
                .map_err(|e| format!("Failed to compile schema: {}", e))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Validate a contract JSON value against the schema.
///
/// Returns every violation, each formatted as `"<message> at <pointer>"`.
pub fn validate_contract_schema(contract_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(contract_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> serde_json::Value {
        serde_json::json!({
            "contract_version": "1.0",
            "schema_version": "2025-12-20",
            "name": "Test",
            "intent": { "purpose": "Test" },
            "accountability": { "answerable_human": "test@example.com" }
        })
    }

    #[test]
    fn test_minimal_contract_passes_schema() {
        assert!(validate_contract_schema(&minimal()).is_ok());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let value = serde_json::json!({
            "contract_version": "1.0",
            "schema_version": "2025-12-20",
            "name": "Test"
        });
        let errors = validate_contract_schema(&value).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_invalid_version_format_fails() {
        let mut value = minimal();
        value["contract_version"] = serde_json::json!("invalid");
        assert!(validate_contract_schema(&value).is_err());

        let mut value = minimal();
        value["schema_version"] = serde_json::json!("20251220");
        assert!(validate_contract_schema(&value).is_err());
    }

    #[test]
    fn test_rule_needs_id_and_text() {
        let mut value = minimal();
        value["boundaries"] = serde_json::json!({
            "invalidated_by": [ { "id": "", "rule": "PII exposed" } ]
        });
        assert!(validate_contract_schema(&value).is_err());

        let mut value = minimal();
        value["boundaries"] = serde_json::json!({
            "invalidated_by": [ { "id": "B1" } ]
        });
        let errors = validate_contract_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/boundaries/invalidated_by/0")));
    }

    #[test]
    fn test_free_form_rule_ids_pass() {
        let mut value = minimal();
        value["boundaries"] = serde_json::json!({
            "invalidated_by": [
                { "id": "B1", "rule": "PII exposed" },
                { "id": "no-secrets", "rule": "Credentials leaked" }
            ]
        });
        assert!(validate_contract_schema(&value).is_ok());
    }

    #[test]
    fn test_additional_properties_allowed() {
        let mut value = minimal();
        value["unknown_field"] = serde_json::json!("ignored");
        value["intent"]["future"] = serde_json::json!({ "nested": true });
        assert!(validate_contract_schema(&value).is_ok());
    }

    #[test]
    fn test_full_contract_with_all_sections() {
        let value = serde_json::json!({
            "contract_version": "1.0.0",
            "schema_version": "2025-12-20",
            "policy_pack": ["general", "healthcare"],
            "name": "Customer Support Bot",
            "description": "Handles tier-1 customer inquiries",
            "intent": {
                "purpose": "Provide helpful customer support",
                "optimizing_for": ["customer satisfaction", "response time"],
                "never_optimize_away": [
                    { "id": "N1", "rule": "Human escalation path must always be available" }
                ]
            },
            "boundaries": {
                "may_do_autonomously": [
                    { "id": "A1", "rule": "Answer factual questions about products" }
                ],
                "must_pause_when": [
                    { "id": "P1", "rule": "Customer expresses frustration" }
                ],
                "must_escalate_when": [
                    { "id": "E1", "rule": "Customer requests human agent" }
                ],
                "invalidated_by": [
                    { "id": "B1", "rule": "Customer PII exposed in response" }
                ]
            },
            "accountability": {
                "approved_by": "Product Manager",
                "answerable_human": "support-lead@company.com",
                "escalation_path": ["Tier 1", "Tier 2", "Manager"],
                "review_cadence": "monthly"
            },
            "acceptance": {
                "fit_criteria": [
                    { "id": "F1", "rule": "Addresses customer's actual question" }
                ],
                "dignity_check": [
                    { "id": "D1", "rule": "Does not dismiss customer concerns" }
                ]
            }
        });
        assert!(validate_contract_schema(&value).is_ok());
    }
}
