//! Restraint & Privacy Lens
//!
//! **Question**: Does this expose what should be protected?
//!
//! This lens evaluates:
//! - `boundaries.invalidated_by[]` (privacy and secret-exposure rules only)
//!
//! ## State Conditions
//!
//! | State | Condition |
//! |-------|-----------|
//! | **PASS** | No protected data in content |
//! | **ESCALATE** | Only ambiguous evidence (e.g. an internal hostname) matches a rule, or protected data no rule names |
//! | **BLOCKED** | Definite PII or secret evidence matches a rule |
//!
//! Only the output content is read. Context and metadata are advisory
//! inputs and never change this lens's verdict.

use crate::contract::{Contract, Rule};
use crate::evidence::Evidence;
use crate::matcher::{is_privacy_rule, select_privacy_rule};
use crate::types::{
    EvaluationRequest, LensFinding, LensType, RuleEvaluation, RuleReference, RuleResult,
    RuleSection,
};

use super::{default_pass_finding, Lens};

/// The Restraint & Privacy lens.
pub struct RestraintLens;

/// Contacts the contract itself publishes; repeating them is not a leak.
fn sanctioned_contacts(contract: &Contract) -> Vec<String> {
    let accountability = &contract.accountability;
    std::iter::once(&accountability.answerable_human)
        .chain(accountability.escalation_path.iter())
        .chain(accountability.approved_by.iter())
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn is_sanctioned(evidence: &Evidence, content: &str, sanctioned: &[String]) -> bool {
    evidence
        .span
        .and_then(|span| content.get(span.start..span.end))
        .is_some_and(|text| {
            let text = text.trim().to_ascii_lowercase();
            sanctioned.iter().any(|c| *c == text)
        })
}

impl Lens for RestraintLens {
    fn lens_type(&self) -> LensType {
        LensType::RestraintPrivacy
    }

    fn evaluate(&self, request: &EvaluationRequest) -> LensFinding {
        let contract = request.contract;
        let content = &request.output.content;

        let rules: Vec<&Rule> = contract
            .boundaries
            .invalidated_by
            .iter()
            .filter(|r| is_privacy_rule(r))
            .collect();
        if rules.is_empty() {
            return default_pass_finding(self.lens_type());
        }

        let sanctioned = sanctioned_contacts(contract);
        let exposed: Vec<&Evidence> = request
            .evidence
            .sensitive_in_content()
            .filter(|e| !is_sanctioned(e, content, &sanctioned))
            .collect();

        // Pair each piece of evidence with the rule that governs it.
        let mut matched: Vec<(usize, &Evidence)> = Vec::new();
        for evidence in &exposed {
            if let Some(m) = select_privacy_rule(&rules, evidence.pattern) {
                // Rule ids are unique within invalidated_by.
                if let Some(index) = rules.iter().position(|r| r.id == m.rule.id) {
                    matched.push((index, *evidence));
                }
            }
        }

        let rules_evaluated: Vec<RuleEvaluation> = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let hits: Vec<&Evidence> = matched
                    .iter()
                    .filter(|(i, _)| *i == index)
                    .map(|(_, e)| *e)
                    .collect();
                let evaluation = RuleEvaluation::new(RuleSection::InvalidatedBy, rule, RuleResult::Satisfied);
                if hits.iter().any(|e| e.is_definite()) {
                    RuleEvaluation {
                        result: RuleResult::Violated,
                        ..evaluation
                    }
                    .because(format!("{} protected item(s) in content", hits.len()))
                } else if !hits.is_empty() {
                    RuleEvaluation {
                        result: RuleResult::Uncertain,
                        ..evaluation
                    }
                    .because("Only ambiguous matches in content")
                } else {
                    evaluation.because("No matching protected data in content")
                }
            })
            .collect();

        if exposed.is_empty() {
            return LensFinding::pass(self.lens_type(), 1.0).with_rules_evaluated(rules_evaluated);
        }

        if matched.is_empty() {
            let kinds: Vec<&str> = exposed.iter().map(|e| e.pattern.label()).collect();
            tracing::debug!(items = exposed.len(), "restraint: protected data outside every rule");
            return LensFinding::escalate(
                self.lens_type(),
                format!(
                    "{} in output, and no privacy rule names it; a human should confirm",
                    kinds.join(", ")
                ),
                0.6,
            )
            .with_evidence(exposed.into_iter().cloned().collect())
            .with_rules_evaluated(rules_evaluated);
        }

        let ambiguous = matched.iter().filter(|(_, e)| !e.is_definite()).count();
        let definite_rule = matched
            .iter()
            .filter(|(_, e)| e.is_definite())
            .map(|(i, _)| *i)
            .min();

        let (index, finding) = match definite_rule {
            Some(index) => {
                let confidence = 1.0 - 0.5 * (ambiguous as f64 / matched.len() as f64);
                (
                    index,
                    LensFinding::blocked(self.lens_type(), String::new(), confidence),
                )
            }
            None => {
                // Matched rules exist but every match is ambiguous.
                let index = matched.iter().map(|(i, _)| *i).min().unwrap_or_default();
                (
                    index,
                    LensFinding::escalate(self.lens_type(), String::new(), 0.5),
                )
            }
        };

        let rule = rules[index];
        let evidence: Vec<Evidence> = matched
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, e)| (*e).clone())
            .collect();
        let kinds: Vec<&str> = evidence.iter().map(|e| e.pattern.label()).collect();
        let reason = if finding.state.is_blocked() {
            format!("{} in output violates rule {}", kinds.join(", "), rule.id)
        } else {
            format!(
                "{} in output may fall under rule {}; a human should confirm",
                kinds.join(", "),
                rule.id
            )
        };

        tracing::debug!(rule = %rule.id, state = ?finding.state, items = evidence.len(), "restraint match");

        finding
            .with_reason(reason)
            .with_rule(Some(RuleReference::new(RuleSection::InvalidatedBy, rule)))
            .with_evidence(evidence)
            .with_rules_evaluated(rules_evaluated)
    }
}
