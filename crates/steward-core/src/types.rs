//! Core types for Steward evaluation.
//!
//! These are the values that flow between the extractors, the lenses and the
//! synthesizer. Nothing here is mutated once an evaluation has produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::contract::{Contract, Rule};
use crate::evidence::{Evidence, EvidenceSet};

/// The type of content being evaluated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
}

/// Output from an AI system to be evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Output {
    /// Type of content
    #[serde(default)]
    pub content_type: ContentType,

    /// The actual content
    pub content: String,

    /// Prior conversation turns, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,

    /// Free-form metadata supplied by the host
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Output {
    /// Create a text output.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Text,
            content: content.into(),
            context: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach prior conversation turns.
    pub fn with_context<I, S>(mut self, turns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context.extend(turns.into_iter().map(Into::into));
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge caller-supplied advisory inputs into a fresh output.
    ///
    /// Context turns are appended after the output's own; metadata entries
    /// overlay the output's own entries with the same key.
    pub(crate) fn with_advisory(
        &self,
        context: Option<&[String]>,
        metadata: Option<&HashMap<String, String>>,
    ) -> Output {
        let mut merged = self.clone();
        if let Some(turns) = context {
            merged.context.extend(turns.iter().cloned());
        }
        if let Some(entries) = metadata {
            merged
                .metadata
                .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }
}

/// Everything a lens may look at during one evaluation.
///
/// Borrowed, read-only, and shared across all five lenses.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub contract: &'a Contract,
    pub output: &'a Output,
    pub evidence: &'a EvidenceSet,
}

/// The five lens types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LensType {
    DignityInclusion,
    BoundariesSafety,
    RestraintPrivacy,
    TransparencyContestability,
    AccountabilityOwnership,
}

impl LensType {
    /// All lenses in declaration order.
    pub const ALL: [LensType; 5] = [
        LensType::DignityInclusion,
        LensType::BoundariesSafety,
        LensType::RestraintPrivacy,
        LensType::TransparencyContestability,
        LensType::AccountabilityOwnership,
    ];

    /// All lenses in tie-break priority order, most severe class first.
    pub const PRIORITY: [LensType; 5] = [
        LensType::RestraintPrivacy,
        LensType::BoundariesSafety,
        LensType::AccountabilityOwnership,
        LensType::DignityInclusion,
        LensType::TransparencyContestability,
    ];

    /// Rank in [`LensType::PRIORITY`]; lower wins.
    pub fn priority(&self) -> usize {
        match self {
            LensType::RestraintPrivacy => 0,
            LensType::BoundariesSafety => 1,
            LensType::AccountabilityOwnership => 2,
            LensType::DignityInclusion => 3,
            LensType::TransparencyContestability => 4,
        }
    }

    /// Get the stewardship question this lens answers.
    pub fn question(&self) -> &'static str {
        match self {
            LensType::DignityInclusion => "Does this disempower people or exclude them from relevance?",
            LensType::BoundariesSafety => "Does this respect defined scope and stop conditions?",
            LensType::RestraintPrivacy => "Does this expose what should be protected?",
            LensType::TransparencyContestability => "Can the human understand why this happened and contest it?",
            LensType::AccountabilityOwnership => "Who approved this, who can stop it, and who answers for it?",
        }
    }

    /// Human-readable lens name.
    pub fn display_name(&self) -> &'static str {
        match self {
            LensType::DignityInclusion => "Dignity & Inclusion",
            LensType::BoundariesSafety => "Boundaries & Safety",
            LensType::RestraintPrivacy => "Restraint & Privacy",
            LensType::TransparencyContestability => "Transparency & Contestability",
            LensType::AccountabilityOwnership => "Accountability & Ownership",
        }
    }
}

impl fmt::Display for LensType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Verdict of a single lens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LensState {
    Pass,
    Escalate,
    Blocked,
}

impl LensState {
    /// Check if this is a Pass state.
    pub fn is_pass(&self) -> bool {
        matches!(self, LensState::Pass)
    }

    /// Check if this is an Escalate state.
    pub fn is_escalate(&self) -> bool {
        matches!(self, LensState::Escalate)
    }

    /// Check if this is a Blocked state.
    pub fn is_blocked(&self) -> bool {
        matches!(self, LensState::Blocked)
    }
}

/// The contract list a rule was declared in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleSection {
    NeverOptimizeAway,
    MayDoAutonomously,
    MustPauseWhen,
    MustEscalateWhen,
    InvalidatedBy,
    FitCriteria,
    DignityCheck,
    /// Structural requirements on the accountability section itself
    Accountability,
}

impl RuleSection {
    /// Dotted path of the section inside a contract document.
    pub fn path(&self) -> &'static str {
        match self {
            RuleSection::NeverOptimizeAway => "intent.never_optimize_away",
            RuleSection::MayDoAutonomously => "boundaries.may_do_autonomously",
            RuleSection::MustPauseWhen => "boundaries.must_pause_when",
            RuleSection::MustEscalateWhen => "boundaries.must_escalate_when",
            RuleSection::InvalidatedBy => "boundaries.invalidated_by",
            RuleSection::FitCriteria => "acceptance.fit_criteria",
            RuleSection::DignityCheck => "acceptance.dignity_check",
            RuleSection::Accountability => "accountability",
        }
    }
}

/// Pointer to the contract rule that justifies a finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleReference {
    pub section: RuleSection,
    pub rule_id: String,
    pub rule_text: String,
}

impl RuleReference {
    pub fn new(section: RuleSection, rule: &Rule) -> Self {
        Self {
            section,
            rule_id: rule.id.clone(),
            rule_text: rule.rule.clone(),
        }
    }
}

impl fmt::Display for RuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.rule_id, self.rule_text)
    }
}

/// Result of evaluating a single rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleResult {
    /// Rule condition is satisfied
    Satisfied,

    /// Rule condition is violated
    Violated,

    /// Cannot determine with certainty
    Uncertain,

    /// No deterministic check exists for this rule's text
    NotApplicable,
}

/// Audit record of one rule a lens looked at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub section: RuleSection,
    pub result: RuleResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl RuleEvaluation {
    pub fn new(section: RuleSection, rule: &Rule, result: RuleResult) -> Self {
        Self {
            rule_id: rule.id.clone(),
            section,
            result,
            rationale: None,
        }
    }

    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// Finding from a single lens evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LensFinding {
    /// Which lens produced this finding
    pub lens: LensType,

    /// The stewardship question asked
    #[serde(default)]
    pub question: String,

    /// The verdict of this lens
    pub state: LensState,

    /// How well-supported the verdict is, in [0, 1]
    pub confidence: f64,

    /// Rule that triggered an Escalate or Blocked verdict, or the rule a Pass best fits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<RuleReference>,

    /// Why the lens did not pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Evidence justifying the verdict, in extraction order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,

    /// Every rule the lens looked at
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules_evaluated: Vec<RuleEvaluation>,
}

impl LensFinding {
    fn with_state(lens: LensType, state: LensState, confidence: f64) -> Self {
        Self {
            lens,
            question: lens.question().to_string(),
            state,
            confidence: confidence.clamp(0.0, 1.0),
            matched_rule: None,
            reason: None,
            evidence: Vec::new(),
            rules_evaluated: Vec::new(),
        }
    }

    pub fn pass(lens: LensType, confidence: f64) -> Self {
        Self::with_state(lens, LensState::Pass, confidence)
    }

    pub fn escalate(lens: LensType, reason: impl Into<String>, confidence: f64) -> Self {
        Self::with_state(lens, LensState::Escalate, confidence).with_reason(reason)
    }

    pub fn blocked(lens: LensType, reason: impl Into<String>, confidence: f64) -> Self {
        Self::with_state(lens, LensState::Blocked, confidence).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_rule(mut self, rule: Option<RuleReference>) -> Self {
        self.matched_rule = rule;
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<Evidence>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_rules_evaluated(mut self, rules: Vec<RuleEvaluation>) -> Self {
        self.rules_evaluated = rules;
        self
    }
}

/// Findings from all five lenses, one slot per lens.
///
/// Serialized as an array of exactly five findings; deserializing anything
/// else is an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(into = "Vec<LensFinding>", try_from = "Vec<LensFinding>")]
pub struct LensFindings {
    pub dignity_inclusion: LensFinding,
    pub boundaries_safety: LensFinding,
    pub restraint_privacy: LensFinding,
    pub transparency_contestability: LensFinding,
    pub accountability_ownership: LensFinding,
}

impl LensFindings {
    /// The finding filed under `lens`.
    pub fn get(&self, lens: LensType) -> &LensFinding {
        match lens {
            LensType::DignityInclusion => &self.dignity_inclusion,
            LensType::BoundariesSafety => &self.boundaries_safety,
            LensType::RestraintPrivacy => &self.restraint_privacy,
            LensType::TransparencyContestability => &self.transparency_contestability,
            LensType::AccountabilityOwnership => &self.accountability_ownership,
        }
    }

    /// All five findings in declaration order.
    pub fn all(&self) -> [&LensFinding; 5] {
        LensType::ALL.map(|lens| self.get(lens))
    }

    /// All five findings in priority order.
    pub fn by_priority(&self) -> [&LensFinding; 5] {
        LensType::PRIORITY.map(|lens| self.get(lens))
    }
}

impl From<LensFindings> for Vec<LensFinding> {
    fn from(findings: LensFindings) -> Self {
        vec![
            findings.dignity_inclusion,
            findings.boundaries_safety,
            findings.restraint_privacy,
            findings.transparency_contestability,
            findings.accountability_ownership,
        ]
    }
}

impl TryFrom<Vec<LensFinding>> for LensFindings {
    type Error = String;

    fn try_from(findings: Vec<LensFinding>) -> Result<Self, Self::Error> {
        if findings.len() != LensType::ALL.len() {
            return Err(format!(
                "expected {} lens findings, got {}",
                LensType::ALL.len(),
                findings.len()
            ));
        }

        let mut slots: [Option<LensFinding>; 5] = Default::default();
        for finding in findings {
            // Declaration order of LensType matches LensType::ALL.
            let index = finding.lens as usize;
            if slots[index].is_some() {
                return Err(format!("duplicate finding for lens {}", finding.lens));
            }
            slots[index] = Some(finding);
        }

        let [dignity, boundaries, restraint, transparency, accountability] = slots;
        let missing = |lens: LensType| format!("missing finding for lens {}", lens);
        Ok(Self {
            dignity_inclusion: dignity.ok_or_else(|| missing(LensType::DignityInclusion))?,
            boundaries_safety: boundaries.ok_or_else(|| missing(LensType::BoundariesSafety))?,
            restraint_privacy: restraint.ok_or_else(|| missing(LensType::RestraintPrivacy))?,
            transparency_contestability: transparency
                .ok_or_else(|| missing(LensType::TransparencyContestability))?,
            accountability_ownership: accountability
                .ok_or_else(|| missing(LensType::AccountabilityOwnership))?,
        })
    }
}

/// Details of a boundary violation that triggered BLOCKED.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundaryViolation {
    /// Which lens detected the violation
    pub lens: LensType,

    /// ID of the violated rule (e.g., "B1")
    pub rule_id: String,

    /// Full text of the violated rule
    pub rule_text: String,

    /// Contact for the accountable human
    pub accountable_human: String,

    /// Evidence supporting the violation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
}

/// The three terminal states of an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// All conditions met. Automation may continue.
    Proceed {
        /// Why the output passed
        summary: String,
    },

    /// Human judgment required.
    Escalate {
        /// The decision that needs human judgment
        decision_point: String,

        /// Lens whose finding triggered the escalation
        escalation_lens: LensType,

        /// Rule behind the escalation, when one was matched
        #[serde(default, skip_serializing_if = "Option::is_none")]
        escalation_rule: Option<RuleReference>,

        /// Options for the human (no ranking)
        #[serde(default)]
        options: Vec<String>,
    },

    /// Boundary violated. Automation must halt.
    Blocked {
        /// Details of the violation
        violation: BoundaryViolation,
    },
}

impl State {
    /// Upper-case label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            State::Proceed { .. } => "PROCEED",
            State::Escalate { .. } => "ESCALATE",
            State::Blocked { .. } => "BLOCKED",
        }
    }
}

/// Result of evaluating an output against a contract.
///
/// Equality ignores `evaluated_at`: two evaluations of the same inputs
/// compare equal regardless of when they ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The final state and its state-specific fields
    #[serde(flatten)]
    pub state: State,

    /// Overall confidence (minimum of lens confidences)
    pub confidence: f64,

    /// Findings from each lens
    pub lens_findings: LensFindings,

    /// When the evaluation occurred
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn is_proceed(&self) -> bool {
        matches!(self.state, State::Proceed { .. })
    }

    pub fn is_escalate(&self) -> bool {
        matches!(self.state, State::Escalate { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.state, State::Blocked { .. })
    }

    /// Summary, present only on PROCEED.
    pub fn summary(&self) -> Option<&str> {
        match &self.state {
            State::Proceed { summary } => Some(summary),
            _ => None,
        }
    }

    /// Decision point, present only on ESCALATE.
    pub fn decision_point(&self) -> Option<&str> {
        match &self.state {
            State::Escalate { decision_point, .. } => Some(decision_point),
            _ => None,
        }
    }

    /// Violation, present only on BLOCKED.
    pub fn violation(&self) -> Option<&BoundaryViolation> {
        match &self.state {
            State::Blocked { violation } => Some(violation),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl PartialEq for EvaluationResult {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.confidence == other.confidence
            && self.lens_findings == other.lens_findings
    }
}
