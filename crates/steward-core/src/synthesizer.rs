//! Synthesizer: Aggregates lens findings into final state.
//!
//! The synthesizer applies strict, non-configurable policy rules:
//! 1. If ANY lens returns BLOCKED → final state is BLOCKED
//! 2. Else if ANY lens returns ESCALATE → final state is ESCALATE
//! 3. Else → final state is PROCEED
//!
//! When several lenses share the winning state, [`LensType::PRIORITY`]
//! picks the one reported. Overall confidence is the minimum across all
//! five findings.
//!
//! These rules are governance machinery, not a tuning toy.

use chrono::{DateTime, Utc};

use crate::contract::Contract;
use crate::types::{
    BoundaryViolation, EvaluationResult, LensFinding, LensFindings, LensState, LensType,
    RuleSection, State,
};
use crate::EvaluationError;

/// The Synthesizer aggregates lens findings into a final result.
pub struct Synthesizer;

impl Synthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Synthesize lens findings into a final evaluation result, stamped now.
    pub fn synthesize(
        &self,
        findings: LensFindings,
        contract: &Contract,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.synthesize_at(findings, contract, Utc::now())
    }

    /// Synthesize with a caller-supplied timestamp.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::IncompleteFindings`] when a finding sits in the
    /// wrong slot or a BLOCKED finding names no rule, and
    /// [`EvaluationError::ConfidenceOutOfRange`] for a NaN or out-of-range
    /// confidence.
    pub fn synthesize_at(
        &self,
        findings: LensFindings,
        contract: &Contract,
        evaluated_at: DateTime<Utc>,
    ) -> Result<EvaluationResult, EvaluationError> {
        check_findings(&findings)?;
        let confidence = overall_confidence(&findings);

        let state = if let Some(finding) = first_in_state(&findings, LensState::Blocked) {
            // check_findings guarantees a matched rule here.
            let rule = finding.matched_rule.as_ref().ok_or_else(|| {
                EvaluationError::IncompleteFindings(format!("{} is BLOCKED without a rule", finding.lens))
            })?;
            State::Blocked {
                violation: BoundaryViolation {
                    lens: finding.lens,
                    rule_id: rule.rule_id.clone(),
                    rule_text: rule.rule_text.clone(),
                    accountable_human: contract.accountability.answerable_human.clone(),
                    evidence: finding.evidence.clone(),
                },
            }
        } else if let Some(finding) = first_in_state(&findings, LensState::Escalate) {
            State::Escalate {
                decision_point: build_decision_point(finding),
                escalation_lens: finding.lens,
                escalation_rule: finding.matched_rule.clone(),
                options: build_options(finding.lens),
            }
        } else {
            State::Proceed {
                summary: build_summary(&findings),
            }
        };

        tracing::debug!(state = state.label(), confidence, "synthesized");

        Ok(EvaluationResult {
            state,
            confidence,
            lens_findings: findings,
            evaluated_at,
        })
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn check_findings(findings: &LensFindings) -> Result<(), EvaluationError> {
    for lens in LensType::ALL {
        let finding = findings.get(lens);
        if finding.lens != lens {
            return Err(EvaluationError::IncompleteFindings(format!(
                "finding for {} filed under {}",
                finding.lens, lens
            )));
        }
        if !(0.0..=1.0).contains(&finding.confidence) {
            return Err(EvaluationError::ConfidenceOutOfRange {
                lens,
                value: finding.confidence,
            });
        }
        if finding.state.is_blocked() && finding.matched_rule.is_none() {
            return Err(EvaluationError::IncompleteFindings(format!(
                "{} is BLOCKED without a rule",
                lens
            )));
        }
    }
    Ok(())
}

/// Minimum confidence across all five findings.
fn overall_confidence(findings: &LensFindings) -> f64 {
    findings
        .all()
        .iter()
        .map(|f| f.confidence)
        .fold(1.0, f64::min)
}

fn first_in_state(findings: &LensFindings, state: LensState) -> Option<&LensFinding> {
    findings.by_priority().into_iter().find(|f| f.state == state)
}

/// Human-readable decision point naming the lens, its concern and the rule.
fn build_decision_point(finding: &LensFinding) -> String {
    let concern = match finding.lens {
        LensType::BoundariesSafety => "Should automation continue or should a human take over?",
        LensType::DignityInclusion => "Does this output preserve human dignity?",
        LensType::RestraintPrivacy => "Is this data exposure appropriate?",
        LensType::TransparencyContestability => "Can the recipient understand and challenge this?",
        LensType::AccountabilityOwnership => "Can the recipient reach the human who answers for this?",
    };

    let mut point = format!("{}: {}", finding.lens.display_name(), concern);
    if let Some(reason) = &finding.reason {
        point.push_str(&format!(" {}.", reason));
    }
    if let Some(rule) = &finding.matched_rule {
        point.push_str(&format!(" Rule {}.", rule));
    }
    point
}

/// Options for ESCALATE state (no ranking; options presented equally).
fn build_options(lens: LensType) -> Vec<String> {
    let options: [&str; 3] = match lens {
        LensType::BoundariesSafety => [
            "Continue with the automated response; the condition is minor",
            "Transfer to a human agent and honor the trigger condition",
            "Acknowledge the trigger, then offer a human transfer",
        ],
        LensType::DignityInclusion => [
            "Proceed; the output preserves dignity adequately",
            "Revise the output to address the dignity concern",
            "Hand the conversation to a human",
        ],
        LensType::RestraintPrivacy => [
            "Proceed; the exposure is acceptable in this context",
            "Redact the sensitive information before sending",
            "Hold the output and notify the privacy owner",
        ],
        LensType::TransparencyContestability => [
            "Proceed; transparency is sufficient",
            "Add sources or a way to contest before sending",
            "Send to a human for review",
        ],
        LensType::AccountabilityOwnership => [
            "Proceed; the recipient can already reach a human",
            "Add the escalation contact to the output",
            "Update the contract's escalation path",
        ],
    };
    options.iter().map(|o| o.to_string()).collect()
}

/// One-line reason the output may proceed.
fn build_summary(findings: &LensFindings) -> String {
    let rules_evaluated: usize = findings.all().iter().map(|f| f.rules_evaluated.len()).sum();

    let covering = findings
        .boundaries_safety
        .matched_rule
        .as_ref()
        .filter(|r| r.section == RuleSection::MayDoAutonomously);

    match covering {
        Some(rule) => format!(
            "Output fits may_do_autonomously rule {}; all five lenses passed ({} rules evaluated).",
            rule, rules_evaluated
        ),
        None => format!(
            "All five lenses passed ({} rules evaluated); no may_do_autonomously rule was matched.",
            rules_evaluated
        ),
    }
}
