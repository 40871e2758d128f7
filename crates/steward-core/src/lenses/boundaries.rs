//! Boundaries & Safety Lens
//!
//! **Question**: Does this respect defined scope and stop conditions?
//!
//! This lens evaluates:
//! - `boundaries.invalidated_by[]` (rules not about privacy; Restraint owns those)
//! - `boundaries.must_escalate_when[]` and `boundaries.must_pause_when[]`
//! - `boundaries.may_do_autonomously[]`
//!
//! ## State Conditions
//!
//! | State | Condition |
//! |-------|-----------|
//! | **PASS** | Content stays inside a `may_do_autonomously` rule and touches no stop condition |
//! | **ESCALATE** | Content touches a must-escalate/pause topic, mentions a topic an advice rule forbids, or no autonomy rule covers it |
//! | **BLOCKED** | Content gives directive advice an `invalidated_by` rule forbids, or touches a forbidden topic |
//!
//! Rule text is connected to content through the topic lexicon in
//! [`crate::matcher`]. Rules the lexicon cannot read are recorded as
//! not applicable and lower the PASS confidence slightly. Only the content
//! is read; context and metadata never change this lens's verdict.

use crate::contract::Rule;
use crate::evidence::{Certainty, DetectedPattern, Evidence};
use crate::matcher::{
    advice_spans, best_coverage, is_advice_rule, is_privacy_rule, rule_topics, same_sentence,
    sentence_bounds, topic_spans, Topic,
};
use crate::types::{
    EvaluationRequest, LensFinding, LensType, RuleEvaluation, RuleReference, RuleResult,
    RuleSection,
};

use super::{default_pass_finding, Lens};

/// PASS confidence lost for each rule no deterministic check exists for.
const UNCHECKED_RULE_PENALTY: f64 = 0.05;

/// The Boundaries & Safety lens.
pub struct BoundariesLens;

fn topic_names(topics: &[Topic]) -> String {
    topics.iter().map(|t| t.name()).collect::<Vec<_>>().join("/")
}

/// Every place the content touches one of `topics`, in position order.
fn topic_evidence(content: &str, topics: &[Topic], certainty: Certainty) -> Vec<Evidence> {
    let mut evidence: Vec<Evidence> = topics
        .iter()
        .flat_map(|topic| {
            topic_spans(content, *topic).into_iter().map(move |span| {
                Evidence::from_output(DetectedPattern::TopicCue, certainty, span.start, span.end)
                    .with_claim(format!("Topic mention: {}", topic.name()))
            })
        })
        .collect();
    evidence.sort_by_key(|e| e.span.map(|s| (s.start, s.end)));
    evidence.dedup_by_key(|e| e.span);
    evidence
}

/// Directive advice phrases that share a sentence with a topic mention.
fn directive_evidence(content: &str, mentions: &[Evidence]) -> Vec<Evidence> {
    let bounds = sentence_bounds(content);
    advice_spans(content)
        .into_iter()
        .filter(|advice| {
            mentions
                .iter()
                .filter_map(|m| m.span)
                .any(|topic| same_sentence(&bounds, *advice, topic))
        })
        .map(|advice| {
            Evidence::from_output(
                DetectedPattern::AdviceDirective,
                Certainty::Definite,
                advice.start,
                advice.end,
            )
        })
        .collect()
}

fn merge_by_position(mut a: Vec<Evidence>, b: Vec<Evidence>) -> Vec<Evidence> {
    a.extend(b);
    a.sort_by_key(|e| e.span.map(|s| (s.start, s.end)));
    a
}

impl Lens for BoundariesLens {
    fn lens_type(&self) -> LensType {
        LensType::BoundariesSafety
    }

    fn evaluate(&self, request: &EvaluationRequest) -> LensFinding {
        let contract = request.contract;
        let content = &request.output.content;
        let lens = self.lens_type();

        let forbidding: Vec<&Rule> = contract
            .boundaries
            .invalidated_by
            .iter()
            .filter(|r| !is_privacy_rule(r))
            .collect();
        let handoff = contract.handoff_rules();
        let may_do = &contract.boundaries.may_do_autonomously;

        if forbidding.is_empty() && handoff.is_empty() && may_do.is_empty() {
            return default_pass_finding(lens);
        }

        let mut rules_evaluated = Vec::new();
        let mut blocked: Option<LensFinding> = None;
        let mut escalations: Vec<LensFinding> = Vec::new();
        let mut unchecked = 0usize;

        // Forbidden outcomes
        for rule in forbidding {
            let evaluation = |result| RuleEvaluation::new(RuleSection::InvalidatedBy, rule, result);
            let topics = rule_topics(rule);
            if topics.is_empty() {
                unchecked += 1;
                rules_evaluated.push(
                    evaluation(RuleResult::NotApplicable).because("No deterministic check for this rule"),
                );
                continue;
            }

            let names = topic_names(&topics);
            let advice_rule = is_advice_rule(rule);
            let certainty = if advice_rule {
                Certainty::Ambiguous
            } else {
                Certainty::Definite
            };
            let mentions = topic_evidence(content, &topics, certainty);
            if mentions.is_empty() {
                rules_evaluated.push(
                    evaluation(RuleResult::Satisfied).because(format!("Content does not touch {}", names)),
                );
                continue;
            }

            let reference = RuleReference::new(RuleSection::InvalidatedBy, rule);
            let directives = if advice_rule {
                directive_evidence(content, &mentions)
            } else {
                Vec::new()
            };

            if advice_rule && directives.is_empty() {
                // A mention is not advice; a human decides.
                rules_evaluated.push(
                    evaluation(RuleResult::Uncertain)
                        .because(format!("Mentions {} without directive advice", names)),
                );
                escalations.push(
                    LensFinding::escalate(
                        lens,
                        format!(
                            "Output touches {} but gives no directive advice; rule {} may apply",
                            names, rule.id
                        ),
                        0.6,
                    )
                    .with_rule(Some(reference))
                    .with_evidence(mentions),
                );
                continue;
            }

            rules_evaluated.push(
                evaluation(RuleResult::Violated).because(format!("Content crosses into {}", names)),
            );
            if blocked.is_none() {
                let reason = if advice_rule {
                    format!("Output gives {} advice, which rule {} forbids", names, rule.id)
                } else {
                    format!("Output touches {}, which rule {} forbids", names, rule.id)
                };
                let evidence = merge_by_position(mentions, directives);
                let confidence = 0.9 + 0.025 * evidence.len().min(4) as f64;
                blocked = Some(
                    LensFinding::blocked(lens, reason, confidence)
                        .with_rule(Some(reference))
                        .with_evidence(evidence),
                );
            }
        }

        // Stop conditions: must_escalate_when first, then must_pause_when
        for (section, rule) in handoff {
            let evaluation = |result| RuleEvaluation::new(section, rule, result);
            let topics = rule_topics(rule);
            if topics.is_empty() {
                unchecked += 1;
                rules_evaluated.push(
                    evaluation(RuleResult::NotApplicable).because("No deterministic check for this rule"),
                );
                continue;
            }

            let names = topic_names(&topics);
            let mentions = topic_evidence(content, &topics, Certainty::Definite);
            if mentions.is_empty() {
                rules_evaluated.push(
                    evaluation(RuleResult::Satisfied).because(format!("Content does not touch {}", names)),
                );
                continue;
            }

            rules_evaluated.push(
                evaluation(RuleResult::Violated).because(format!("Content touches {}", names)),
            );
            let confidence = 0.6 + 0.1 * mentions.len().min(3) as f64;
            escalations.push(
                LensFinding::escalate(
                    lens,
                    format!("Output touches {}, which rule {} sends to a human", names, rule.id),
                    confidence,
                )
                .with_rule(Some(RuleReference::new(section, rule)))
                .with_evidence(mentions),
            );
        }

        // Autonomy: does any may_do_autonomously rule cover this output?
        let mut covering: Option<RuleReference> = None;
        let mut pass_confidence = 1.0;
        if !may_do.is_empty() {
            match best_coverage(may_do, content) {
                Some((rule, strength)) => {
                    rules_evaluated.push(
                        RuleEvaluation::new(RuleSection::MayDoAutonomously, rule, RuleResult::Satisfied)
                            .because(format!("{:.0}% of rule keywords present", strength * 100.0)),
                    );
                    covering = Some(RuleReference::new(RuleSection::MayDoAutonomously, rule));
                    pass_confidence = 0.8 + 0.2 * strength;
                }
                None => {
                    rules_evaluated.extend(may_do.iter().map(|rule| {
                        RuleEvaluation::new(RuleSection::MayDoAutonomously, rule, RuleResult::Uncertain)
                            .because("No rule keywords in content")
                    }));
                    escalations.push(LensFinding::escalate(
                        lens,
                        "No may_do_autonomously rule covers this output",
                        0.6,
                    ));
                }
            }
        }

        let finding = if let Some(finding) = blocked {
            finding
        } else if let Some(finding) = escalations.into_iter().next() {
            finding
        } else {
            let confidence = (pass_confidence - UNCHECKED_RULE_PENALTY * unchecked as f64).max(0.5);
            LensFinding::pass(lens, confidence).with_rule(covering)
        };

        tracing::debug!(
            state = ?finding.state,
            rule = finding.matched_rule.as_ref().map(|r| r.rule_id.as_str()),
            unchecked,
            "boundaries verdict"
        );

        finding.with_rules_evaluated(rules_evaluated)
    }
}
