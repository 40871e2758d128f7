//! Dignity & Inclusion Lens
//!
//! **Question**: Does this disempower people or exclude them from relevance?
//!
//! This lens evaluates:
//! - `acceptance.dignity_check[]`
//! - `intent.never_optimize_away[]` (dignity and human-escalation rules)
//!
//! ## State Conditions
//!
//! | State | Condition |
//! |-------|-----------|
//! | **PASS** | No dismissive, pressuring or blaming language, and every `dignity_check` rule is confirmed |
//! | **ESCALATE** | Such language is present, or a `dignity_check` rule cannot be confirmed from content |
//! | **BLOCKED** | Never. Tone is a judgment call for a human |
//!
//! The tone check is intrinsic: it runs even when the contract declares no
//! dignity rules. A `never_optimize_away` rule this lens cannot check from
//! text lowers confidence instead of escalating.

use crate::contract::Rule;
use crate::evidence::{DetectedPattern, EvidenceSource};
use crate::matcher::{cue_score, cues_for, BLAME_CUES, DISMISSIVE_CUES, HANDOFF_CUES, PRESSURE_CUES};
use crate::types::{
    EvaluationRequest, LensFinding, LensType, RuleEvaluation, RuleReference, RuleResult,
    RuleSection,
};

use super::{default_pass_finding, Lens};

const UNCHECKED_RULE_PENALTY: f64 = 0.05;
const MIN_PASS_CONFIDENCE: f64 = 0.7;

/// The Dignity & Inclusion lens.
pub struct DignityLens;

/// Rules about keeping a route to a human open.
fn is_path_rule(rule: &Rule) -> bool {
    cue_score(&rule.rule, HANDOFF_CUES) > 0
}

fn is_tone_rule(rule: &Rule) -> bool {
    [DISMISSIVE_CUES, PRESSURE_CUES, BLAME_CUES]
        .iter()
        .any(|cues| cue_score(&rule.rule, cues) > 0)
}

impl Lens for DignityLens {
    fn lens_type(&self) -> LensType {
        LensType::DignityInclusion
    }

    fn evaluate(&self, request: &EvaluationRequest) -> LensFinding {
        let rules = request.contract.dignity_rules();
        let tone = &request.evidence.dismissive;
        if rules.is_empty() && tone.is_empty() {
            return default_pass_finding(self.lens_type());
        }

        let handoff_offered = request
            .evidence
            .has_handoff(DetectedPattern::HandoffOffered, &[EvidenceSource::ContentScan]);

        let rules_evaluated: Vec<RuleEvaluation> = rules
            .iter()
            .map(|(section, rule)| {
                let relevant = tone
                    .iter()
                    .filter(|e| cue_score(&rule.rule, cues_for(e.pattern)) > 0)
                    .count();
                let evaluation = |result: RuleResult| RuleEvaluation::new(*section, rule, result);

                if relevant > 0 {
                    evaluation(RuleResult::Violated)
                        .because(format!("{} matching phrase(s) in content", relevant))
                } else if is_path_rule(rule) {
                    if !tone.is_empty() && !handoff_offered {
                        evaluation(RuleResult::Violated)
                            .because("Output pushes back without offering a human")
                    } else if handoff_offered {
                        evaluation(RuleResult::Satisfied).because("Human handoff offered")
                    } else {
                        evaluation(RuleResult::Satisfied).because("Nothing in content closes off a human")
                    }
                } else if is_tone_rule(rule) {
                    evaluation(RuleResult::Satisfied).because("No matching language in content")
                } else if *section == RuleSection::DignityCheck {
                    evaluation(RuleResult::Uncertain).because("Cannot be confirmed from the output text")
                } else {
                    evaluation(RuleResult::NotApplicable).because("No text check exists for this rule")
                }
            })
            .collect();

        let unchecked = rules_evaluated
            .iter()
            .filter(|r| r.result == RuleResult::NotApplicable)
            .count();

        let first_with = |result: RuleResult| {
            rules
                .iter()
                .zip(&rules_evaluated)
                .find(|(_, evaluation)| evaluation.result == result)
                .map(|((section, rule), _)| RuleReference::new(*section, rule))
        };

        if tone.is_empty() {
            if let Some(rule) = first_with(RuleResult::Uncertain) {
                tracing::debug!(rule = %rule.rule_id, "dignity escalation: unconfirmed check");
                return LensFinding::escalate(
                    self.lens_type(),
                    format!(
                        "Dignity check {} cannot be confirmed from the output; a human should review it",
                        rule.rule_id
                    ),
                    0.6,
                )
                .with_rule(Some(rule))
                .with_rules_evaluated(rules_evaluated);
            }

            let confidence =
                (1.0 - UNCHECKED_RULE_PENALTY * unchecked as f64).max(MIN_PASS_CONFIDENCE);
            tracing::debug!(rules = rules.len(), unchecked, "dignity pass");
            return LensFinding::pass(self.lens_type(), confidence).with_rules_evaluated(rules_evaluated);
        }

        let matched_rule = first_with(RuleResult::Violated);

        let claims: Vec<&str> = tone.iter().map(|e| e.claim.as_str()).collect();
        let mut reason = format!("{} in output", claims.join("; "));
        if !handoff_offered {
            reason.push_str(", and no human is offered");
        }

        let confidence = 0.7 + 0.1 * tone.len().min(3) as f64;
        tracing::debug!(
            phrases = tone.len(),
            rule = matched_rule.as_ref().map(|r| r.rule_id.as_str()),
            "dignity escalation"
        );

        LensFinding::escalate(self.lens_type(), reason, confidence)
            .with_rule(matched_rule)
            .with_evidence(tone.clone())
            .with_rules_evaluated(rules_evaluated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lenses::test_support::{contract_with_intent, run};
    use crate::types::{LensState, Output, RuleSection};

    const PATH_RULE: &str = r#"
  never_optimize_away:
    - id: "N1"
      rule: "Human escalation path must always be available"
"#;

    const DIGNITY_CHECKS: &str = r#"
acceptance:
  dignity_check:
    - id: "D1"
      rule: "Does not dismiss or minimize customer concerns"
    - id: "D2"
      rule: "Never pressures or coerces the customer"
"#;

    fn dignity(intent: &str, extra: &str, text: &str) -> LensFinding {
        let contract = contract_with_intent(intent, extra);
        run(LensType::DignityInclusion, &contract, &Output::text(text))
    }

    #[test]
    fn test_respectful_output_passes() {
        let finding = dignity(
            PATH_RULE,
            DIGNITY_CHECKS,
            "I understand the delay is frustrating. Your order ships tomorrow.",
        );
        assert!(finding.state.is_pass());
        assert_eq!(finding.confidence, 1.0);
        assert_eq!(finding.rules_evaluated.len(), 3);
        assert!(finding.matched_rule.is_none());
    }

    #[test]
    fn test_unconfirmable_dignity_check_escalates() {
        let checks = r#"
acceptance:
  dignity_check:
    - id: "D4"
      rule: "Acknowledges the customer's feelings before answering"
"#;
        let finding = dignity("", checks, "Your order status: shipped yesterday.");
        assert_eq!(finding.state, LensState::Escalate);
        let rule = finding.matched_rule.unwrap();
        assert_eq!(rule.rule_id, "D4");
        assert_eq!(rule.section, RuleSection::DignityCheck);
        assert_eq!(finding.rules_evaluated[0].result, RuleResult::Uncertain);
        assert!(finding.evidence.is_empty());
    }

    #[test]
    fn test_unconfirmable_borrowed_rule_lowers_confidence() {
        let intent = r#"
  never_optimize_away:
    - id: "N2"
      rule: "No disrespectful replies"
"#;
        let finding = dignity(intent, "", "Your order status: shipped yesterday.");
        assert!(finding.state.is_pass());
        assert_eq!(finding.rules_evaluated[0].result, RuleResult::NotApplicable);
        assert!((finding.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_dismissive_language_escalates_on_matching_rule() {
        let finding = dignity(PATH_RULE, DIGNITY_CHECKS, "You're overreacting, the parcel is only a day late.");
        assert_eq!(finding.state, LensState::Escalate);
        let rule = finding.matched_rule.unwrap();
        assert_eq!(rule.rule_id, "D1");
        assert_eq!(rule.section, RuleSection::DignityCheck);
        assert_eq!(finding.evidence.len(), 1);
        assert!((finding.confidence - 0.8).abs() < 1e-9);
        assert!(finding.reason.unwrap().contains("no human is offered"));
    }

    #[test]
    fn test_pressure_matches_pressure_rule() {
        let finding = dignity("", DIGNITY_CHECKS, "This is the final offer, take it or leave it.");
        assert_eq!(finding.state, LensState::Escalate);
        assert_eq!(finding.matched_rule.unwrap().rule_id, "D2");
        assert!((finding.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_refusal_without_handoff_violates_path_rule() {
        let finding = dignity(PATH_RULE, "", "Sorry, there is nothing we can do.");
        assert_eq!(finding.state, LensState::Escalate);
        assert_eq!(finding.matched_rule.unwrap().rule_id, "N1");
        assert_eq!(finding.rules_evaluated[0].result, RuleResult::Violated);
    }

    #[test]
    fn test_handoff_keeps_path_rule_satisfied() {
        let finding = dignity(
            PATH_RULE,
            "",
            "Sorry, there is nothing we can do here, but I can connect you with our support team.",
        );
        // Still escalates on tone, but the path rule holds.
        assert_eq!(finding.state, LensState::Escalate);
        assert!(finding.matched_rule.is_none());
        assert_eq!(finding.rules_evaluated[0].result, RuleResult::Satisfied);
    }

    #[test]
    fn test_tone_check_runs_without_rules() {
        let finding = dignity("", "", "That was user error on your side.");
        assert_eq!(finding.state, LensState::Escalate);
        assert!(finding.matched_rule.is_none());
        assert!(finding.rules_evaluated.is_empty());
    }

    #[test]
    fn test_context_tone_is_ignored() {
        let contract = contract_with_intent(PATH_RULE, DIGNITY_CHECKS);
        let output = Output::text("Thanks for your patience.").with_context(["calm down, it's your fault"]);
        let finding = run(LensType::DignityInclusion, &contract, &output);
        assert!(finding.state.is_pass());
    }

    #[test]
    fn test_never_blocks() {
        let finding = dignity(
            PATH_RULE,
            DIGNITY_CHECKS,
            "Calm down. It's your own fault. Act now, last chance, no exceptions.",
        );
        assert_eq!(finding.state, LensState::Escalate);
        assert!(finding.confidence <= 1.0);
    }
}
