//! Accountability & Ownership Lens
//!
//! **Question**: Who approved this, who can stop it, and who answers for it?
//!
//! This lens evaluates:
//! - `accountability` (answerable human, escalation path, approver)
//! - `boundaries.must_escalate_when[]` and `boundaries.must_pause_when[]`,
//!   only to decide whether a human handoff is needed
//!
//! ## State Conditions
//!
//! | State | Condition |
//! |-------|-----------|
//! | **PASS** | No handoff is needed, or the output makes one reachable |
//! | **ESCALATE** | A handoff is needed and the output offers no human and names no escalation contact, or the contract has no escalation path |
//! | **BLOCKED** | The contract names no answerable human |
//!
//! A handoff is needed when an escalate or pause rule's topic shows up in
//! the content or any context turn, or when the user asked for a human in
//! context. Context and metadata are read here; they never block.

use crate::contract::Rule;
use crate::evidence::{Certainty, DetectedPattern, Evidence, EvidenceSource};
use crate::matcher::{contains_cue, rule_topics, topic_spans};
use crate::types::{
    EvaluationRequest, LensFinding, LensType, RuleEvaluation, RuleReference, RuleResult,
    RuleSection,
};

use super::Lens;

/// The Accountability & Ownership lens.
pub struct AccountabilityLens;

fn structural_rule(id: &str, text: &str) -> Rule {
    Rule {
        id: id.to_string(),
        rule: text.to_string(),
    }
}

/// Where the topics of `rule` show up in the content and context.
fn topic_evidence(rule: &Rule, content: &str, context: &[String]) -> Vec<Evidence> {
    let mut evidence = Vec::new();
    for topic in rule_topics(rule) {
        let claim = format!("Mentions {}", topic.name());
        evidence.extend(topic_spans(content, topic).into_iter().map(|span| {
            Evidence::from_output(DetectedPattern::TopicCue, Certainty::Definite, span.start, span.end)
                .with_claim(claim.clone())
        }));
        for (index, turn) in context.iter().enumerate() {
            evidence.extend(topic_spans(turn, topic).into_iter().map(|span| {
                Evidence::from_context(DetectedPattern::TopicCue, Certainty::Definite, index, span.start, span.end)
                    .with_claim(claim.clone())
            }));
        }
    }
    evidence
}

/// Whether the content names one of the contract's escalation contacts.
fn names_escalation_contact(content: &str, path: &[String]) -> bool {
    let lower = content.to_ascii_lowercase();
    path.iter()
        .map(|entry| entry.trim().trim_end_matches('*').to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .any(|entry| contains_cue(&lower, &entry))
}

impl Lens for AccountabilityLens {
    fn lens_type(&self) -> LensType {
        LensType::AccountabilityOwnership
    }

    fn evaluate(&self, request: &EvaluationRequest) -> LensFinding {
        let contract = request.contract;
        let accountability = &contract.accountability;
        let output = request.output;

        let owner_rule = structural_rule("ACC1", "Contract must name an answerable human");
        let path_rule = structural_rule("ACC2", "Contract declares an escalation path");
        let approver_rule = structural_rule("ACC3", "Contract records who approved it");

        // Parsing rejects this; a hand-built contract can still get here.
        if accountability.answerable_human.trim().is_empty() {
            tracing::warn!(contract = %contract.name, "contract names no answerable human");
            return LensFinding::blocked(self.lens_type(), "No answerable human is named in the contract", 1.0)
                .with_rule(Some(RuleReference::new(RuleSection::Accountability, &owner_rule)))
                .with_evidence(vec![Evidence::from_contract(
                    DetectedPattern::MissingAccountableHuman,
                    "accountability.answerable_human",
                )])
                .with_rules_evaluated(vec![RuleEvaluation::new(
                    RuleSection::Accountability,
                    &owner_rule,
                    RuleResult::Violated,
                )
                .because("answerable_human is empty")]);
        }

        let has_path = !accountability.escalation_path.is_empty();
        let has_approver = accountability
            .approved_by
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        let completeness = (1.0 + has_path as u8 as f64 + has_approver as u8 as f64) / 3.0;

        let mut rules_evaluated = vec![
            RuleEvaluation::new(RuleSection::Accountability, &owner_rule, RuleResult::Satisfied)
                .because(format!("Answerable human: {}", accountability.answerable_human)),
            if has_path {
                RuleEvaluation::new(RuleSection::Accountability, &path_rule, RuleResult::Satisfied)
                    .because(format!("{} step(s) in escalation path", accountability.escalation_path.len()))
            } else {
                RuleEvaluation::new(RuleSection::Accountability, &path_rule, RuleResult::Uncertain)
                    .because("No escalation path declared")
            },
            if has_approver {
                RuleEvaluation::new(RuleSection::Accountability, &approver_rule, RuleResult::Satisfied)
            } else {
                RuleEvaluation::new(RuleSection::Accountability, &approver_rule, RuleResult::Uncertain)
                    .because("No approver recorded")
            },
        ];

        let reachable = request.evidence.has_handoff(
            DetectedPattern::HandoffOffered,
            &[EvidenceSource::ContentScan, EvidenceSource::MetadataScan],
        ) || names_escalation_contact(&output.content, &accountability.escalation_path);
        let gap = !has_path || !reachable;

        // The first handoff rule whose topic appears is the trigger.
        let mut trigger: Option<(RuleReference, Vec<Evidence>)> = None;
        for (section, rule) in contract.handoff_rules() {
            let found = topic_evidence(rule, &output.content, &output.context);
            let evaluation = |result: RuleResult| RuleEvaluation::new(section, rule, result);
            rules_evaluated.push(if rule_topics(rule).is_empty() {
                evaluation(RuleResult::NotApplicable).because("No recognizable topic in rule text")
            } else if found.is_empty() {
                evaluation(RuleResult::Satisfied).because("Topic not present")
            } else if trigger.is_some() {
                evaluation(RuleResult::Uncertain).because("Topic present; an earlier rule already applies")
            } else if gap {
                evaluation(RuleResult::Violated).because("Topic present and no human is reachable")
            } else {
                evaluation(RuleResult::Satisfied).because("Topic present and a human is reachable")
            });
            if trigger.is_none() && !found.is_empty() {
                trigger = Some((RuleReference::new(section, rule), found));
            }
        }

        let (matched_rule, mut evidence, cause) = match trigger {
            Some((rule, found)) => {
                let cause = format!("rule {} applies", rule.rule_id);
                (Some(rule), found, cause)
            }
            None => {
                let requests: Vec<Evidence> = request
                    .evidence
                    .escalation
                    .iter()
                    .filter(|e| e.pattern == DetectedPattern::HandoffRequested)
                    .cloned()
                    .collect();
                if requests.is_empty() {
                    tracing::debug!(completeness, "accountability pass: no handoff needed");
                    return LensFinding::pass(self.lens_type(), 0.7 + 0.3 * completeness)
                        .with_rules_evaluated(rules_evaluated);
                }
                (None, requests, "the user asked for a human".to_string())
            }
        };

        if !gap {
            tracing::debug!(completeness, "accountability pass: handoff reachable");
            return LensFinding::pass(self.lens_type(), 0.7 + 0.3 * completeness)
                .with_rule(matched_rule)
                .with_rules_evaluated(rules_evaluated);
        }

        let reason = if has_path {
            format!(
                "A handoff is needed ({}), but the output offers no human and names no escalation contact",
                cause
            )
        } else {
            format!("A handoff is needed ({}), but the contract declares no escalation path", cause)
        };
        if has_path {
            evidence.extend(
                request
                    .evidence
                    .escalation
                    .iter()
                    .filter(|e| e.pattern == DetectedPattern::HandoffMissing)
                    .cloned(),
            );
        } else {
            evidence.push(Evidence::from_contract(
                DetectedPattern::HandoffMissing,
                "accountability.escalation_path",
            ));
        }

        tracing::debug!(
            rule = matched_rule.as_ref().map(|r| r.rule_id.as_str()),
            has_path,
            "accountability escalation"
        );

        LensFinding::escalate(self.lens_type(), reason, 0.6 + 0.3 * completeness)
            .with_rule(matched_rule)
            .with_evidence(evidence)
            .with_rules_evaluated(rules_evaluated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lenses::test_support::{contract_with, run};
    use crate::types::{LensState, Output};

    const HANDOFF_RULES: &str = r#"
boundaries:
  must_escalate_when:
    - id: "E1"
      rule: "Customer mentions a security breach"
  must_pause_when:
    - id: "P1"
      rule: "Customer expresses frustration"
"#;

    fn full_contract() -> crate::contract::Contract {
        let mut contract = contract_with(HANDOFF_RULES);
        contract.accountability.escalation_path = vec!["Tier 2 Support".to_string(), "Duty Manager".to_string()];
        contract.accountability.approved_by = Some("Head of Support".to_string());
        contract
    }

    fn accountability(contract: &crate::contract::Contract, output: &Output) -> LensFinding {
        run(LensType::AccountabilityOwnership, contract, output)
    }

    #[test]
    fn test_missing_answerable_human_blocks() {
        let mut contract = contract_with("");
        contract.accountability.answerable_human = "  ".to_string();
        let finding = accountability(&contract, &Output::text("Hello."));
        assert_eq!(finding.state, LensState::Blocked);
        assert_eq!(finding.confidence, 1.0);
        assert_eq!(finding.matched_rule.unwrap().rule_id, "ACC1");
        assert_eq!(finding.evidence[0].locator, "contract.accountability.answerable_human");
    }

    #[test]
    fn test_no_trigger_passes_with_completeness() {
        let finding = accountability(&full_contract(), &Output::text("Your order shipped yesterday."));
        assert!(finding.state.is_pass());
        assert!((finding.confidence - 1.0).abs() < 1e-9);

        let sparse = contract_with("");
        let finding = accountability(&sparse, &Output::text("Your order shipped yesterday."));
        assert!(finding.state.is_pass());
        assert!((finding.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_trigger_in_context_without_handoff_escalates() {
        let output = Output::text("I have reset your password.")
            .with_context(["I think my account was hacked"]);
        let finding = accountability(&full_contract(), &output);
        assert_eq!(finding.state, LensState::Escalate);
        assert_eq!(finding.matched_rule.unwrap().rule_id, "E1");
        assert!((finding.confidence - 0.9).abs() < 1e-9);
        assert_eq!(finding.evidence[0].locator, "context[0][23:29]");
        assert!(finding
            .evidence
            .iter()
            .any(|e| e.pattern == DetectedPattern::HandoffMissing));
    }

    #[test]
    fn test_offered_handoff_passes() {
        let output = Output::text("I'm sorry this is frustrating. Let me connect you with our support team.");
        let finding = accountability(&full_contract(), &output);
        assert!(finding.state.is_pass());
        assert_eq!(finding.matched_rule.unwrap().rule_id, "P1");
    }

    #[test]
    fn test_naming_escalation_contact_passes() {
        let output = Output::text("I understand you're upset; the duty manager will review this today.");
        let finding = accountability(&full_contract(), &output);
        assert!(finding.state.is_pass());
    }

    #[test]
    fn test_empty_path_is_a_gap() {
        let contract = contract_with(HANDOFF_RULES);
        let output = Output::text("I'm sorry this is frustrating. Let me connect you with our support team.");
        let finding = accountability(&contract, &output);
        assert_eq!(finding.state, LensState::Escalate);
        assert!(finding.reason.unwrap().contains("no escalation path"));
        assert!((finding.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_handoff_request_in_context_triggers() {
        let output = Output::text("Here is our returns policy.")
            .with_context(["Can I talk to a real person please?"]);
        let finding = accountability(&full_contract(), &output);
        assert_eq!(finding.state, LensState::Escalate);
        assert!(finding.matched_rule.is_none());
        assert_eq!(finding.evidence[0].pattern, DetectedPattern::HandoffRequested);
    }

    #[test]
    fn test_handoff_metadata_counts_as_reachable() {
        let output = Output::text("Here is our returns policy.")
            .with_context(["Can I talk to a real person please?"])
            .with_metadata("handoff_channel", "live-chat");
        let finding = accountability(&full_contract(), &output);
        assert!(finding.state.is_pass());
    }
}
