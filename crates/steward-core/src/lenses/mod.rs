//! The five lenses for stewardship evaluation.
//!
//! Each lens asks one stewardship question and evaluates independently.
//! Lenses cannot access other lenses' findings; synthesis is policy, not
//! intelligence.
//!
//! ## Lens Independence
//!
//! - Lenses run in parallel over shared read-only references
//! - No lens may access another lens's findings
//! - No shared mutable state between lenses
//! - Evidence is extracted once, before any lens runs

mod accountability;
mod boundaries;
mod dignity;
mod restraint;
mod transparency;

pub use accountability::AccountabilityLens;
pub use boundaries::BoundariesLens;
pub use dignity::DignityLens;
pub use restraint::RestraintLens;
pub use transparency::TransparencyLens;

use crate::types::{EvaluationRequest, LensType};
pub use crate::types::{LensFinding, LensState};

/// Trait implemented by all lenses.
pub trait Lens {
    /// The type of this lens.
    fn lens_type(&self) -> LensType;

    /// The stewardship question this lens answers.
    fn question(&self) -> &'static str {
        self.lens_type().question()
    }

    /// Evaluate the request against this lens's rules.
    ///
    /// Must be a pure function of `request`: same input, same finding.
    fn evaluate(&self, request: &EvaluationRequest) -> LensFinding;
}

/// Run the lens identified by `lens`.
///
/// The match is exhaustive over [`LensType`], so adding a lens without
/// wiring it here fails to compile.
pub fn evaluate_lens(lens: LensType, request: &EvaluationRequest) -> LensFinding {
    match lens {
        LensType::DignityInclusion => DignityLens.evaluate(request),
        LensType::BoundariesSafety => BoundariesLens.evaluate(request),
        LensType::RestraintPrivacy => RestraintLens.evaluate(request),
        LensType::TransparencyContestability => TransparencyLens.evaluate(request),
        LensType::AccountabilityOwnership => AccountabilityLens.evaluate(request),
    }
}

/// PASS with full confidence, for a lens with nothing to check.
pub(crate) fn default_pass_finding(lens_type: LensType) -> LensFinding {
    LensFinding::pass(lens_type, 1.0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::contract::Contract;
    use crate::evidence::EvidenceSet;
    use crate::extractors::extract;
    use crate::types::{EvaluationRequest, LensFinding, LensType, Output};

    /// Contract with only the required sections, plus `extra` YAML appended.
    pub fn contract_with(extra: &str) -> Contract {
        contract_with_intent("", extra)
    }

    /// Like [`contract_with`], with `intent_extra` nested under `intent:`.
    pub fn contract_with_intent(intent_extra: &str, extra: &str) -> Contract {
        let yaml = format!(
            r#"
contract_version: "1.0"
schema_version: "2025-12-20"
name: "Test"
intent:
  purpose: "Test"
{}
accountability:
  answerable_human: "owner@example.com"
{}"#,
            intent_extra, extra
        );
        Contract::from_text(&yaml).unwrap()
    }

    /// Extract evidence and run one lens.
    pub fn run(lens: LensType, contract: &Contract, output: &Output) -> LensFinding {
        let evidence: EvidenceSet = extract(output);
        let request = EvaluationRequest {
            contract,
            output,
            evidence: &evidence,
        };
        super::evaluate_lens(lens, &request)
    }
}
