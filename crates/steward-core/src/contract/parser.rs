//! Contract parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_contract_schema;
use crate::types::RuleSection;

/// Errors that can occur when constructing a contract.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Failed to read contract file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Contract does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Contract validation failed: {0}")]
    Validation(String),
}

/// A single rule with ID and text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Identifier, unique within its own list (e.g., "B1", "D2")
    pub id: String,

    /// The rule text
    pub rule: String,
}

/// Intent section of a contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Intent {
    /// Primary purpose of the automation
    pub purpose: String,

    /// What to optimize for (in priority order)
    #[serde(default)]
    pub optimizing_for: Vec<String>,

    /// Constraints that must never be traded off
    #[serde(default)]
    pub never_optimize_away: Vec<Rule>,
}

/// Boundaries section of a contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Boundaries {
    /// Actions allowed without human intervention
    #[serde(default)]
    pub may_do_autonomously: Vec<Rule>,

    /// Conditions that trigger a pause
    #[serde(default)]
    pub must_pause_when: Vec<Rule>,

    /// Conditions that require escalation
    #[serde(default)]
    pub must_escalate_when: Vec<Rule>,

    /// Conditions that invalidate automation entirely
    #[serde(default)]
    pub invalidated_by: Vec<Rule>,
}

/// Accountability section of a contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Accountability {
    /// Who approved this contract
    #[serde(default)]
    pub approved_by: Option<String>,

    /// Contact for the accountable human
    #[serde(default)]
    pub answerable_human: String,

    /// Ordered escalation path
    #[serde(default)]
    pub escalation_path: Vec<String>,

    /// How often to review
    #[serde(default)]
    pub review_cadence: Option<String>,
}

/// Acceptance section of a contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Acceptance {
    /// Criteria for fit-for-purpose output
    #[serde(default)]
    pub fit_criteria: Vec<Rule>,

    /// Dignity preservation criteria
    #[serde(default)]
    pub dignity_check: Vec<Rule>,
}

/// A stewardship contract.
///
/// Constructed once through one of the `from_*` functions, which validate
/// the document; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    /// Version of this contract (semver)
    pub contract_version: String,

    /// Version of the contract schema (date-based)
    pub schema_version: String,

    /// Policy packs this contract extends
    #[serde(default)]
    pub policy_pack: Vec<String>,

    /// Human-readable name
    pub name: String,

    /// Detailed description
    #[serde(default)]
    pub description: Option<String>,

    /// Intent section
    pub intent: Intent,

    /// Boundaries section
    #[serde(default)]
    pub boundaries: Boundaries,

    /// Accountability section
    pub accountability: Accountability,

    /// Acceptance section
    #[serde(default)]
    pub acceptance: Acceptance,
}

impl Contract {
    /// Parse a contract document in YAML or JSON.
    ///
    /// YAML is a superset of JSON, so either form is accepted. Unknown keys
    /// are ignored.
    pub fn from_text(document: &str) -> Result<Self, ContractError> {
        let value: serde_json::Value = serde_yaml::from_str(document)?;
        Self::from_value(value)
    }

    /// Parse a contract from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ContractError> {
        Self::from_text(yaml)
    }

    /// Parse a contract from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a contract from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a contract from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a contract file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ContractError> {
        validate_contract_schema(&value).map_err(ContractError::Schema)?;
        let contract: Contract = serde_json::from_value(value)?;
        contract.validate()?;
        tracing::debug!(
            contract = %contract.name,
            version = %contract.contract_version,
            rules = contract.rule_lists().iter().map(|(_, rules)| rules.len()).sum::<usize>(),
            "contract loaded"
        );
        Ok(contract)
    }

    /// The contract's own version string.
    pub fn version(&self) -> &str {
        &self.contract_version
    }

    /// Validate the contract structure.
    fn validate(&self) -> Result<(), ContractError> {
        if self.name.trim().is_empty() {
            return Err(ContractError::MissingField("name".to_string()));
        }

        if self.intent.purpose.trim().is_empty() {
            return Err(ContractError::MissingField("intent.purpose".to_string()));
        }

        if self.accountability.answerable_human.trim().is_empty() {
            return Err(ContractError::MissingField(
                "accountability.answerable_human".to_string(),
            ));
        }

        self.validate_rule_lists()
    }

    /// Every rule needs an id and text; ids are unique within their own list.
    fn validate_rule_lists(&self) -> Result<(), ContractError> {
        for (section, rules) in self.rule_lists() {
            let mut seen = HashSet::new();
            for rule in rules {
                if rule.id.trim().is_empty() {
                    return Err(ContractError::Validation(format!(
                        "Empty rule ID in {}",
                        section.path()
                    )));
                }
                if rule.rule.trim().is_empty() {
                    return Err(ContractError::Validation(format!(
                        "Rule {} in {} has no text",
                        rule.id,
                        section.path()
                    )));
                }
                if !seen.insert(rule.id.as_str()) {
                    return Err(ContractError::Validation(format!(
                        "Duplicate rule ID {} in {}",
                        rule.id,
                        section.path()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every rule list, tagged with the section it was declared in.
    pub fn rule_lists(&self) -> [(RuleSection, &[Rule]); 7] {
        [
            (RuleSection::NeverOptimizeAway, self.intent.never_optimize_away.as_slice()),
            (RuleSection::MayDoAutonomously, self.boundaries.may_do_autonomously.as_slice()),
            (RuleSection::MustPauseWhen, self.boundaries.must_pause_when.as_slice()),
            (RuleSection::MustEscalateWhen, self.boundaries.must_escalate_when.as_slice()),
            (RuleSection::InvalidatedBy, self.boundaries.invalidated_by.as_slice()),
            (RuleSection::FitCriteria, self.acceptance.fit_criteria.as_slice()),
            (RuleSection::DignityCheck, self.acceptance.dignity_check.as_slice()),
        ]
    }

    /// Rules that require a human before the agent continues, escalate first.
    pub fn handoff_rules(&self) -> Vec<(RuleSection, &Rule)> {
        self.boundaries
            .must_escalate_when
            .iter()
            .map(|r| (RuleSection::MustEscalateWhen, r))
            .chain(
                self.boundaries
                    .must_pause_when
                    .iter()
                    .map(|r| (RuleSection::MustPauseWhen, r)),
            )
            .collect()
    }

    /// Get all rules that should be evaluated by the Dignity lens.
    pub fn dignity_rules(&self) -> Vec<(RuleSection, &Rule)> {
        let mut rules: Vec<(RuleSection, &Rule)> = self
            .acceptance
            .dignity_check
            .iter()
            .map(|r| (RuleSection::DignityCheck, r))
            .collect();

        // Also include dignity-related rules from never_optimize_away
        rules.extend(
            self.intent
                .never_optimize_away
                .iter()
                .filter(|r| {
                    let text = r.rule.to_lowercase();
                    text.contains("dignity")
                        || text.contains("respect")
                        || text.contains("dismiss")
                        || text.contains("human")
                        || text.contains("escalation")
                })
                .map(|r| (RuleSection::NeverOptimizeAway, r)),
        );

        rules
    }

    /// Get all rules that should be evaluated by the Transparency lens.
    pub fn transparency_rules(&self) -> Vec<(RuleSection, &Rule)> {
        let mut rules: Vec<(RuleSection, &Rule)> = self
            .acceptance
            .fit_criteria
            .iter()
            .map(|r| (RuleSection::FitCriteria, r))
            .collect();

        rules.extend(
            self.intent
                .never_optimize_away
                .iter()
                .filter(|r| {
                    let text = r.rule.to_lowercase();
                    text.contains("transparen")
                        || text.contains("contest")
                        || text.contains("explain")
                        || text.contains("cite")
                        || text.contains("source")
                })
                .map(|r| (RuleSection::NeverOptimizeAway, r)),
        );

        rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONTRACT: &str = r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test Contract"
intent:
  purpose: "Test purpose"
  never_optimize_away:
    - id: "N1"
      rule: "Human escalation path must always be available"
boundaries:
  invalidated_by:
    - id: "B1"
      rule: "PII exposed"
  must_pause_when:
    - id: "P1"
      rule: "Customer expresses frustration"
  must_escalate_when:
    - id: "E1"
      rule: "Customer requests human agent"
accountability:
  answerable_human: "test@example.com"
acceptance:
  dignity_check:
    - id: "D1"
      rule: "Does not dismiss customer concerns"
"#;

    #[test]
    fn test_parse_valid_contract() {
        let contract = Contract::from_text(VALID_CONTRACT).unwrap();
        assert_eq!(contract.name, "Test Contract");
        assert_eq!(contract.version(), "1.0");
        assert_eq!(contract.intent.purpose, "Test purpose");
        assert_eq!(contract.boundaries.invalidated_by.len(), 1);
    }

    #[test]
    fn test_json_and_yaml_agree() {
        let yaml = Contract::from_yaml(VALID_CONTRACT).unwrap();
        let json = serde_json::to_string(&yaml).unwrap();
        assert_eq!(Contract::from_json(&json).unwrap(), yaml);
        assert_eq!(Contract::from_text(&json).unwrap(), yaml);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let yaml = format!("{}\nfuture_section:\n  anything: true\n", VALID_CONTRACT);
        assert!(Contract::from_text(&yaml).is_ok());
    }

    #[test]
    fn test_missing_answerable_human() {
        let yaml = r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test"
intent:
  purpose: "Test"
accountability: {}
"#;
        let result = Contract::from_text(yaml);
        assert!(matches!(
            result,
            Err(ContractError::MissingField(field)) if field == "accountability.answerable_human"
        ));
    }

    #[test]
    fn test_blank_answerable_human() {
        let yaml = VALID_CONTRACT.replace("\"test@example.com\"", "\"   \"");
        assert!(matches!(
            Contract::from_text(&yaml),
            Err(ContractError::MissingField(_))
        ));
    }

    #[test]
    fn test_unparseable_document() {
        assert!(matches!(
            Contract::from_text("name: [unclosed"),
            Err(ContractError::Yaml(_))
        ));
        assert!(matches!(
            Contract::from_json("{ not json"),
            Err(ContractError::Json(_))
        ));
    }

    #[test]
    fn test_missing_section_is_schema_error() {
        let yaml = r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test"
"#;
        match Contract::from_text(yaml) {
            Err(ContractError::Schema(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_rule_ids() {
        let yaml = r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test"
intent:
  purpose: "Test"
boundaries:
  invalidated_by:
    - id: "B1"
      rule: "Rule 1"
    - id: "B1"
      rule: "Rule 2"
accountability:
  answerable_human: "test@example.com"
"#;
        let result = Contract::from_text(yaml);
        assert!(matches!(result, Err(ContractError::Validation(_))));
    }

    #[test]
    fn test_same_id_in_different_lists_is_allowed() {
        let yaml = r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test"
intent:
  purpose: "Test"
boundaries:
  may_do_autonomously:
    - id: "R1"
      rule: "Answer product questions"
  invalidated_by:
    - id: "R1"
      rule: "PII exposed"
accountability:
  answerable_human: "test@example.com"
"#;
        assert!(Contract::from_text(yaml).is_ok());
    }

    #[test]
    fn test_rule_groupings() {
        let contract = Contract::from_text(VALID_CONTRACT).unwrap();

        let handoff: Vec<&str> = contract
            .handoff_rules()
            .iter()
            .map(|(_, r)| r.id.as_str())
            .collect();
        assert_eq!(handoff, vec!["E1", "P1"]);

        let dignity = contract.dignity_rules();
        assert_eq!(dignity.len(), 2);
        assert_eq!(dignity[0].0, RuleSection::DignityCheck);
        assert_eq!(dignity[1].0, RuleSection::NeverOptimizeAway);

        assert!(contract.transparency_rules().is_empty());
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            Contract::from_file("/nonexistent/contract.yaml"),
            Err(ContractError::Io(_))
        ));
    }
}
