//! Transparency & Contestability Lens
//!
//! **Question**: Can the human understand why this happened and contest it?
//!
//! This lens evaluates:
//! - `acceptance.fit_criteria[]`
//! - `intent.never_optimize_away[]` (transparency and contestability rules)
//!
//! ## State Conditions
//!
//! | State | Condition |
//! |-------|-----------|
//! | **PASS** | Every factual claim is cited, and a way to contest is discoverable when a rule asks for one |
//! | **ESCALATE** | Uncited claims in content, or a required contest path is missing |
//! | **BLOCKED** | Never |
//!
//! The uncited-claim check runs even without rules. Citations in metadata
//! count for every claim in the content; a handoff offered in an earlier
//! context turn counts as a discoverable contest path.

use crate::evidence::{DetectedPattern, Evidence, EvidenceSource};
use crate::matcher::{cue_score, CITATION_CUES, CONTEST_CUES};
use crate::types::{
    EvaluationRequest, LensFinding, LensType, RuleEvaluation, RuleReference, RuleResult,
};

use super::{default_pass_finding, Lens};

/// The Transparency & Contestability lens.
pub struct TransparencyLens;

fn is_claim(evidence: &Evidence) -> bool {
    matches!(
        evidence.pattern,
        DetectedPattern::UnsupportedClaim | DetectedPattern::StatisticalClaim | DetectedPattern::SupportedClaim
    )
}

impl Lens for TransparencyLens {
    fn lens_type(&self) -> LensType {
        LensType::TransparencyContestability
    }

    fn evaluate(&self, request: &EvaluationRequest) -> LensFinding {
        let rules = request.contract.transparency_rules();
        let evidence = request.evidence;

        let claims: Vec<&Evidence> = evidence
            .assertions
            .iter()
            .filter(|e| e.is_content() && is_claim(e))
            .collect();
        let cited_in_metadata = evidence
            .assertions
            .iter()
            .any(|e| e.source == EvidenceSource::MetadataScan && e.pattern == DetectedPattern::CitationMarker);

        let uncited: Vec<&Evidence> = if cited_in_metadata {
            Vec::new()
        } else {
            claims
                .iter()
                .copied()
                .filter(|e| e.pattern != DetectedPattern::SupportedClaim)
                .collect()
        };

        if rules.is_empty() && uncited.is_empty() {
            return default_pass_finding(self.lens_type());
        }

        let coverage = if claims.is_empty() {
            1.0
        } else {
            1.0 - uncited.len() as f64 / claims.len() as f64
        };
        let contest_discoverable = evidence.has_handoff(
            DetectedPattern::HandoffOffered,
            &[
                EvidenceSource::ContentScan,
                EvidenceSource::ContextScan,
                EvidenceSource::MetadataScan,
            ],
        );

        let rules_evaluated: Vec<RuleEvaluation> = rules
            .iter()
            .map(|(section, rule)| {
                let evaluation = |result: RuleResult| RuleEvaluation::new(*section, rule, result);
                if cue_score(&rule.rule, CITATION_CUES) > 0 {
                    if claims.is_empty() {
                        evaluation(RuleResult::Satisfied).because("No factual claims in content")
                    } else if uncited.is_empty() {
                        evaluation(RuleResult::Satisfied).because("Every claim is cited")
                    } else {
                        evaluation(RuleResult::Violated)
                            .because(format!("{} of {} claim(s) uncited", uncited.len(), claims.len()))
                    }
                } else if cue_score(&rule.rule, CONTEST_CUES) > 0 {
                    if contest_discoverable {
                        evaluation(RuleResult::Satisfied).because("A human handoff is discoverable")
                    } else {
                        evaluation(RuleResult::Violated).because("No way to contest or reach a human")
                    }
                } else {
                    evaluation(RuleResult::NotApplicable).because("No text check exists for this rule")
                }
            })
            .collect();

        let first_violated = |cues: &'static [&'static str]| {
            rules
                .iter()
                .zip(&rules_evaluated)
                .find(|((_, rule), evaluation)| {
                    evaluation.result == RuleResult::Violated && cue_score(&rule.rule, cues) > 0
                })
                .map(|((section, rule), _)| RuleReference::new(*section, rule))
        };

        if !uncited.is_empty() {
            let confidence = 0.5 + 0.4 * (1.0 - coverage);
            tracing::debug!(uncited = uncited.len(), claims = claims.len(), "transparency escalation");
            return LensFinding::escalate(
                self.lens_type(),
                format!("{} factual claim(s) in output carry no citation", uncited.len()),
                confidence,
            )
            .with_rule(first_violated(CITATION_CUES))
            .with_evidence(uncited.into_iter().cloned().collect())
            .with_rules_evaluated(rules_evaluated);
        }

        if let Some(rule) = first_violated(CONTEST_CUES) {
            let missing: Vec<Evidence> = evidence
                .escalation
                .iter()
                .filter(|e| e.pattern == DetectedPattern::HandoffMissing)
                .cloned()
                .collect();
            tracing::debug!(rule = %rule.rule_id, "transparency escalation: no contest path");
            return LensFinding::escalate(
                self.lens_type(),
                format!("Rule {} asks for a way to contest, and none is discoverable", rule.rule_id),
                0.75,
            )
            .with_rule(Some(rule))
            .with_evidence(missing)
            .with_rules_evaluated(rules_evaluated);
        }

        let confidence = if claims.is_empty() { 1.0 } else { 0.8 + 0.2 * coverage };
        LensFinding::pass(self.lens_type(), confidence).with_rules_evaluated(rules_evaluated)
    }
}
