//! # steward-core
//!
//! Deterministic stewardship contract evaluation engine.
//!
//! This crate provides the core evaluation logic for Steward, answering:
//! - Should this automation proceed?
//! - Where must it stop?
//! - Who answers for it?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No LLM calls**: All evaluation is rule-based
//! 3. **Traceable**: Every BLOCKED cites rule_id and evidence
//! 4. **Parallel-safe**: Lenses evaluate independently
//!
//! ## Pipeline
//!
//! Evidence is extracted once from the output, the five lenses run in
//! parallel over the shared evidence, and the [`Synthesizer`] folds their
//! findings into one [`EvaluationResult`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use steward_core::{evaluate, Contract, Output, State};
//!
//! let contract = Contract::from_yaml_file("contract.yaml")?;
//! let output = Output::text("Your order shipped yesterday.");
//! let result = evaluate(&contract, &output)?;
//!
//! match result.state {
//!     State::Proceed { summary } => println!("OK: {}", summary),
//!     State::Escalate { decision_point, .. } => println!("ESCALATE: {}", decision_point),
//!     State::Blocked { violation } => println!("BLOCKED: {}", violation.rule_id),
//! }
//! ```

pub mod contract;
pub mod evidence;
pub mod extractors;
pub mod lenses;
pub mod matcher;
pub mod synthesizer;
pub mod types;

// Re-export main types at crate root
pub use contract::{Contract, ContractError, Rule};
pub use evidence::{Certainty, DetectedPattern, Evidence, EvidenceSet, EvidenceSource};
pub use lenses::{
    evaluate_lens, AccountabilityLens, BoundariesLens, DignityLens, Lens, LensFinding, LensState,
    RestraintLens, TransparencyLens,
};
pub use synthesizer::Synthesizer;
pub use types::{
    BoundaryViolation, ContentType, EvaluationRequest, EvaluationResult, LensFindings, LensType,
    Output, RuleEvaluation, RuleReference, RuleResult, RuleSection, State,
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Internal invariant violations detected while assembling a result.
///
/// A correctly built [`Contract`] and [`Output`] never produce one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Incomplete lens findings: {0}")]
    IncompleteFindings(String),

    #[error("Confidence {value} from {lens} is outside [0, 1]")]
    ConfidenceOutOfRange { lens: LensType, value: f64 },
}

/// Evaluate an output against a stewardship contract.
///
/// This is the main entry point for Steward evaluation.
///
/// # Returns
///
/// An `EvaluationResult` containing:
/// - `state`: PROCEED, ESCALATE, or BLOCKED
/// - `lens_findings`: What each lens observed
/// - `confidence`: How well-supported the findings are
/// - `evaluated_at`: Timestamp of evaluation
pub fn evaluate(contract: &Contract, output: &Output) -> Result<EvaluationResult, EvaluationError> {
    evaluate_output(contract, output, Utc::now())
}

/// Evaluate with optional context and metadata.
///
/// Context turns are appended to the output's own and metadata entries
/// overlay its own. Both are advisory: only the Transparency and
/// Accountability lenses read them.
pub fn evaluate_with_context(
    contract: &Contract,
    output: &Output,
    context: Option<&[String]>,
    metadata: Option<&HashMap<String, String>>,
) -> Result<EvaluationResult, EvaluationError> {
    let output = output.with_advisory(context, metadata);
    evaluate_output(contract, &output, Utc::now())
}

/// Evaluate and stamp the result with `evaluated_at` instead of the clock.
///
/// Two calls with the same arguments return byte-identical JSON.
pub fn evaluate_at(
    contract: &Contract,
    output: &Output,
    evaluated_at: DateTime<Utc>,
) -> Result<EvaluationResult, EvaluationError> {
    evaluate_output(contract, output, evaluated_at)
}

#[tracing::instrument(name = "evaluate", skip_all, fields(contract = %contract.name))]
fn evaluate_output(
    contract: &Contract,
    output: &Output,
    evaluated_at: DateTime<Utc>,
) -> Result<EvaluationResult, EvaluationError> {
    let evidence = extractors::extract(output);
    let request = EvaluationRequest {
        contract,
        output,
        evidence: &evidence,
    };

    // Fan-out: each lens sees the same read-only request.
    let findings = run_lenses(&request);
    for finding in findings.all() {
        tracing::debug!(lens = %finding.lens, state = ?finding.state, confidence = finding.confidence, "lens finding");
    }

    // Fan-in
    Synthesizer::new().synthesize_at(findings, contract, evaluated_at)
}

fn run_lenses(request: &EvaluationRequest) -> LensFindings {
    let lens = |lens: LensType| evaluate_lens(lens, request);

    let ((restraint_privacy, boundaries_safety), ((accountability_ownership, dignity_inclusion), transparency_contestability)) =
        rayon::join(
            || {
                rayon::join(
                    || lens(LensType::RestraintPrivacy),
                    || lens(LensType::BoundariesSafety),
                )
            },
            || {
                rayon::join(
                    || {
                        rayon::join(
                            || lens(LensType::AccountabilityOwnership),
                            || lens(LensType::DignityInclusion),
                        )
                    },
                    || lens(LensType::TransparencyContestability),
                )
            },
        );

    LensFindings {
        dignity_inclusion,
        boundaries_safety,
        restraint_privacy,
        transparency_contestability,
        accountability_ownership,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPPORT_CONTRACT: &str = r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test Contract"
intent:
  purpose: "Test evaluation"
boundaries:
  may_do_autonomously:
    - id: "A1"
      rule: "Answer questions about order status"
  must_escalate_when:
    - id: "E1"
      rule: "Customer mentions a security breach"
  invalidated_by:
    - id: "B1"
      rule: "Customer PII exposed in response"
accountability:
  approved_by: "Manager"
  answerable_human: "support@example.com"
  escalation_path:
    - "Tier 1 Support"
    - "Manager"
acceptance: {}
"#;

    fn contract() -> Contract {
        Contract::from_yaml(SUPPORT_CONTRACT).unwrap()
    }

    #[test]
    fn test_basic_evaluation() {
        let output = Output::text("Your order status: shipped yesterday.");
        let result = evaluate(&contract(), &output).unwrap();

        assert!(result.is_proceed(), "{:?}", result.state);
        assert!(result.summary().unwrap().contains("A1"));
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_pii_blocked() {
        let output = Output::text("Your order status: shipped. Contact john.doe@email.com for help.");
        let result = evaluate(&contract(), &output).unwrap();

        let violation = result.violation().unwrap();
        assert_eq!(violation.rule_id, "B1");
        assert_eq!(violation.lens, LensType::RestraintPrivacy);
        assert_eq!(violation.accountable_human, "support@example.com");
    }

    #[test]
    fn test_all_lenses_reported() {
        let result = evaluate(&contract(), &Output::text("Hello.")).unwrap();
        let lenses: Vec<LensType> = result.lens_findings.all().iter().map(|f| f.lens).collect();
        assert_eq!(lenses, LensType::ALL.to_vec());
    }

    #[test]
    fn test_context_only_changes_advisory_lenses() {
        let output = Output::text("Your order status: shipped yesterday.");
        let plain = evaluate(&contract(), &output).unwrap();

        let context = vec!["I think my account was hacked".to_string()];
        let with_context = evaluate_with_context(&contract(), &output, Some(&context), None).unwrap();

        assert_eq!(
            plain.lens_findings.restraint_privacy,
            with_context.lens_findings.restraint_privacy
        );
        assert_eq!(
            plain.lens_findings.boundaries_safety,
            with_context.lens_findings.boundaries_safety
        );
        assert!(with_context.lens_findings.accountability_ownership.state.is_escalate());
        assert!(with_context.is_escalate());
    }

    #[test]
    fn test_metadata_handoff_is_advisory() {
        let output = Output::text("Your order status: shipped yesterday.");
        let context = vec!["Can I talk to a real person?".to_string()];
        let mut metadata = HashMap::new();
        metadata.insert("handoff".to_string(), "live chat queue".to_string());

        let result = evaluate_with_context(&contract(), &output, Some(&context), Some(&metadata)).unwrap();
        assert!(result.is_proceed(), "{:?}", result.state);
    }

    #[test]
    fn test_evaluate_at_is_reproducible() {
        let at = Utc::now();
        let output = Output::text("Studies show 80% of orders arrive early.");
        let first = evaluate_at(&contract(), &output, at).unwrap();
        let second = evaluate_at(&contract(), &output, at).unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}
