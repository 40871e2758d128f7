//! Rule matching: connects detector findings to contract rule ids.
//!
//! Every lens selects rules through this module so the keyword heuristics
//! live in one place. Matching is ASCII case-insensitive keyword overlap on
//! word boundaries. There is no scoring beyond counting cues, and every
//! scan is a single pass over the text per cue.
//!
//! ## Cue syntax
//!
//! A cue is a lowercase word or phrase. A trailing `*` makes it a prefix
//! cue: `"identif*"` matches "identify", "identifier" and "identifiable".
//! Both kinds must start on a word boundary; whole cues must also end on one.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

use crate::contract::Rule;
use crate::evidence::{DetectedPattern, PatternCategory, Span};

// ============================================================================
// CUE MATCHING
// ============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Every occurrence of `cue` in an already-lowercased haystack.
pub fn cue_spans(haystack: &str, cue: &str) -> Vec<Span> {
    let (needle, prefix) = match cue.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (cue, false),
    };
    if needle.is_empty() {
        return Vec::new();
    }

    haystack
        .match_indices(needle)
        .filter(|(start, _)| {
            let end = start + needle.len();
            let starts_word = !haystack[..*start].chars().next_back().is_some_and(is_word_char);
            let ends_word = prefix || !haystack[end..].chars().next().is_some_and(is_word_char);
            starts_word && ends_word
        })
        .map(|(start, _)| Span {
            start,
            end: start + needle.len(),
        })
        .collect()
}

/// Whether an already-lowercased haystack contains `cue`.
pub fn contains_cue(haystack: &str, cue: &str) -> bool {
    !cue_spans(haystack, cue).is_empty()
}

/// Number of distinct cues from `cues` found in `text`.
pub fn cue_score(text: &str, cues: &[&str]) -> usize {
    let lower = text.to_ascii_lowercase();
    cues.iter().filter(|cue| contains_cue(&lower, cue)).count()
}

// ============================================================================
// RULE SELECTION
// ============================================================================

/// A rule picked by [`select_rule`] together with its specificity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch<'r> {
    pub rule: &'r Rule,
    pub score: usize,
}

/// Select the most specific rule for a set of cues.
///
/// The rule whose text contains the most distinct cues wins; ties go to the
/// rule declared first. Rules containing none of the cues never match.
pub fn select_rule<'r, I>(rules: I, cues: &[&str]) -> Option<RuleMatch<'r>>
where
    I: IntoIterator<Item = &'r Rule>,
{
    let mut best: Option<RuleMatch<'r>> = None;
    for rule in rules {
        let score = cue_score(&rule.rule, cues);
        if score == 0 {
            continue;
        }
        if best.map_or(true, |b| score > b.score) {
            best = Some(RuleMatch { rule, score });
        }
    }
    best
}

pub const PII_CUES: &[&str] = &[
    "pii",
    "personal",
    "personally",
    "identif*",
    "privacy",
    "email*",
    "phone*",
    "home address*",
    "mailing address*",
    "ssn",
    "social security",
    "credit card*",
    "card number*",
    "contact detail*",
    "customer data",
    "user data",
];

pub const SECRET_CUES: &[&str] = &[
    "secret*",
    "credential*",
    "password*",
    "api key*",
    "access key*",
    "private key*",
    "token*",
    "internal",
    "infrastructure",
    "hostname*",
    "system identifier*",
    "connection string*",
];

/// Wording that signals a rule is about disclosure at all. Only counts
/// towards a score once a category cue has matched.
pub const EXPOSURE_CUES: &[&str] = &["expos*", "leak*", "disclos*", "reveal*", "shar*", "includ*"];

pub const DISMISSIVE_CUES: &[&str] = &[
    "dismiss*",
    "minimi*",
    "belittl*",
    "condescend*",
    "patroniz*",
    "concern*",
    "respect*",
    "dignity",
    "tone",
];

pub const PRESSURE_CUES: &[&str] = &["pressure*", "coerc*", "manipulat*", "urgen*", "force*"];

pub const BLAME_CUES: &[&str] = &["blam*", "fault", "shame*", "accus*"];

pub const HANDOFF_CUES: &[&str] = &[
    "escalat*",
    "human*",
    "person",
    "agent",
    "representative",
    "handoff",
    "hand off",
    "path",
    "recourse",
];

pub const CITATION_CUES: &[&str] = &[
    "cite*",
    "citation*",
    "source*",
    "evidence",
    "claim*",
    "accura*",
    "factual",
    "verif*",
    "reference*",
    "statistic*",
];

pub const CONTEST_CUES: &[&str] = &[
    "contest*",
    "appeal*",
    "challeng*",
    "dispute*",
    "recourse",
    "escalat*",
    "human*",
    "override*",
];

/// Cues that connect an evidence pattern to rule text.
pub fn cues_for(pattern: DetectedPattern) -> &'static [&'static str] {
    match pattern.category() {
        PatternCategory::Pii => PII_CUES,
        PatternCategory::Secret => SECRET_CUES,
        PatternCategory::Assertion | PatternCategory::Citation => CITATION_CUES,
        PatternCategory::Tone => match pattern {
            DetectedPattern::PressurePhrase => PRESSURE_CUES,
            DetectedPattern::BlamingPhrase => BLAME_CUES,
            _ => DISMISSIVE_CUES,
        },
        PatternCategory::Handoff => HANDOFF_CUES,
        PatternCategory::Topic | PatternCategory::Contract => &[],
    }
}

/// Select the rule governing a piece of sensitive evidence.
///
/// Disclosure wording adds to the score only for rules that already name
/// the evidence's category.
pub fn select_privacy_rule<'r>(rules: &[&'r Rule], pattern: DetectedPattern) -> Option<RuleMatch<'r>> {
    let cues = cues_for(pattern);
    let mut best: Option<RuleMatch<'r>> = None;
    for rule in rules.iter().copied() {
        let category = cue_score(&rule.rule, cues);
        if category == 0 {
            continue;
        }
        let score = category + cue_score(&rule.rule, EXPOSURE_CUES);
        if best.map_or(true, |b| score > b.score) {
            best = Some(RuleMatch { rule, score });
        }
    }
    best
}

/// Cues that name protected data outright, with or without disclosure wording.
pub const PROTECTED_DATA_CUES: &[&str] = &[
    "pii",
    "personally identifiable",
    "personal data",
    "personal information",
    "credential*",
    "secret*",
    "password*",
    "api key*",
    "access key*",
    "private key*",
    "ssn",
    "social security",
    "credit card*",
    "card number*",
    "contact detail*",
];

/// Whether an `invalidated_by` rule is about privacy or secret exposure.
///
/// Broad words such as "personal" or "internal" only count when the rule
/// also speaks of disclosure: "Provides personal financial advice" is not
/// a privacy rule, "Personal details shared" is.
pub fn is_privacy_rule(rule: &Rule) -> bool {
    if cue_score(&rule.rule, PROTECTED_DATA_CUES) > 0 {
        return true;
    }
    let names_data = cue_score(&rule.rule, PII_CUES) > 0 || cue_score(&rule.rule, SECRET_CUES) > 0;
    names_data && cue_score(&rule.rule, EXPOSURE_CUES) > 0
}

/// Whether a rule forbids *advice* on a topic rather than the topic itself.
pub fn is_advice_rule(rule: &Rule) -> bool {
    cue_score(
        &rule.rule,
        &["advice", "advis*", "recommend*", "diagnos*", "prescri*", "guidance", "counsel*"],
    ) > 0
}

// ============================================================================
// TOPICS
// ============================================================================

/// Subject areas a non-privacy rule can be about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Medical,
    Legal,
    Financial,
    SelfHarm,
    HumanRequest,
    Frustration,
    Security,
    Billing,
    AccountChange,
}

struct TopicCues {
    topic: Topic,
    /// Wording that marks a rule as being about the topic
    rule: &'static [&'static str],
    /// Wording that marks content as touching the topic
    content: &'static [&'static str],
}

const TOPICS: &[TopicCues] = &[
    TopicCues {
        topic: Topic::Medical,
        rule: &["medical", "health*", "clinical", "diagnos*", "prescri*", "medication*", "symptom*", "treatment*"],
        content: &[
            "diagnos*", "symptom*", "medication*", "medicine*", "prescri*", "dosage", "dose*", "mg",
            "doctor*", "disease*", "illness*", "infection*", "surgery", "antibiotic*", "ibuprofen",
            "therapy", "treatment*",
        ],
    },
    TopicCues {
        topic: Topic::Legal,
        rule: &["legal*", "lawyer*", "attorney*", "litigation", "lawsuit*", "compliance", "regulat*"],
        content: &[
            "lawyer*", "attorney*", "lawsuit*", "sue", "suing", "litigation", "court*", "legal action",
            "legally", "liability", "plead*", "subpoena*", "regulator*",
        ],
    },
    TopicCues {
        topic: Topic::Financial,
        rule: &["financ*", "invest*", "trading", "securities", "tax*", "retirement"],
        content: &[
            "invest*", "stock*", "shares", "portfolio*", "crypto*", "bitcoin", "401k", "ira",
            "bonds", "tax return*", "capital gains", "retirement account*",
        ],
    },
    TopicCues {
        topic: Topic::SelfHarm,
        rule: &["self-harm", "self harm", "suicid*", "crisis", "wellbeing"],
        content: &["suicid*", "kill myself", "self-harm", "self harm", "end my life", "hurt myself"],
    },
    TopicCues {
        topic: Topic::HumanRequest,
        rule: &["human agent", "human", "real person", "representative", "speak to", "talk to"],
        content: &[
            "talk to a human", "speak to a human", "speak to a person", "talk to a person",
            "real person", "human agent", "speak to someone", "talk to someone", "representative",
        ],
    },
    TopicCues {
        topic: Topic::Frustration,
        rule: &["frustrat*", "anger", "angry", "upset", "distress*", "complain*"],
        content: &[
            "frustrat*", "angry", "furious", "upset", "unacceptable", "ridiculous", "fed up",
            "terrible", "worst",
        ],
    },
    TopicCues {
        topic: Topic::Security,
        rule: &["security", "breach*", "incident*", "fraud*", "hack*", "compromis*"],
        content: &["breach*", "hacked", "fraud*", "unauthori*", "compromised", "phishing", "stolen"],
    },
    TopicCues {
        topic: Topic::Billing,
        rule: &["refund*", "billing", "charge*", "chargeback*", "payment dispute*"],
        content: &["refund*", "chargeback*", "overcharg*", "billing", "charged", "invoice*"],
    },
    TopicCues {
        topic: Topic::AccountChange,
        rule: &["account deletion", "delete account", "close account", "cancel*", "account change*"],
        content: &[
            "delete your account", "close your account", "cancel your", "cancellation*",
            "account deletion", "deactivat*",
        ],
    },
];

fn topic_cues(topic: Topic) -> &'static TopicCues {
    // TOPICS is declared in Topic order.
    &TOPICS[topic as usize]
}

impl Topic {
    pub fn name(&self) -> &'static str {
        match self {
            Topic::Medical => "medical",
            Topic::Legal => "legal",
            Topic::Financial => "financial",
            Topic::SelfHarm => "self-harm",
            Topic::HumanRequest => "human handoff request",
            Topic::Frustration => "frustration",
            Topic::Security => "security incident",
            Topic::Billing => "billing",
            Topic::AccountChange => "account change",
        }
    }
}

/// Topics a rule's text is about, in lexicon order.
pub fn rule_topics(rule: &Rule) -> Vec<Topic> {
    let lower = rule.rule.to_ascii_lowercase();
    TOPICS
        .iter()
        .filter(|t| t.rule.iter().any(|cue| contains_cue(&lower, cue)))
        .map(|t| t.topic)
        .collect()
}

/// Spans where `text` touches `topic`, sorted by position.
pub fn topic_spans(text: &str, topic: Topic) -> Vec<Span> {
    let lower = text.to_ascii_lowercase();
    let mut spans: Vec<Span> = topic_cues(topic)
        .content
        .iter()
        .flat_map(|cue| cue_spans(&lower, cue))
        .collect();
    spans.sort_by_key(|s| (s.start, s.end));
    spans.dedup();
    spans
}

lazy_static! {
    /// Directive phrasing that turns a topic mention into advice.
    static ref ADVICE_DIRECTIVE: Regex = Regex::new(
        r"(?i)\b(?:you\s+should|you\s+must|you\s+need\s+to|i(?:\s+would|'d)?\s+recommend|i\s+suggest|my\s+advice|take\s+\d+\s*(?:mg|milligrams?|ml|pills?|tablets?|capsules?)|(?:stop|start)\s+taking|double\s+your\s+dose|invest\s+(?:in|your)|buy\s+(?:shares|stock|crypto)|sell\s+(?:your|all)|file\s+(?:a\s+)?(?:lawsuit|suit|claim)|plead\s+(?:guilty|not\s+guilty))\b"
    ).unwrap();
}

/// Spans of directive advice phrasing in `text`.
pub fn advice_spans(text: &str) -> Vec<Span> {
    ADVICE_DIRECTIVE
        .find_iter(text)
        .map(|m| Span {
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Byte ranges of sentences, split on terminal punctuation and newlines.
pub fn sentence_bounds(text: &str) -> Vec<Span> {
    let mut bounds = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            bounds.push(Span { start, end });
            start = end;
        }
    }
    if start < text.len() {
        bounds.push(Span {
            start,
            end: text.len(),
        });
    }
    bounds
}

/// Whether two spans fall inside the same sentence.
pub fn same_sentence(bounds: &[Span], a: Span, b: Span) -> bool {
    bounds
        .iter()
        .any(|s| a.start >= s.start && a.start < s.end && b.start >= s.start && b.start < s.end)
}

// ============================================================================
// KEYWORD COVERAGE
// ============================================================================

lazy_static! {
    /// Words that carry no scope information in rule text.
    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "an", "the", "about", "after", "against", "along", "among", "around", "before",
        "between", "by", "during", "for", "from", "in", "into", "of", "off", "on", "onto", "out",
        "over", "through", "to", "toward", "under", "until", "up", "upon", "with", "within",
        "without", "and", "but", "or", "nor", "so", "yet", "both", "either", "neither", "i",
        "me", "my", "we", "our", "ours", "you", "your", "yours", "he", "him", "his", "she",
        "her", "it", "its", "they", "them", "their", "what", "which", "who", "whom", "this",
        "that", "these", "those", "is", "are", "was", "were", "be", "been", "being", "have",
        "has", "had", "having", "do", "does", "did", "doing", "can", "could", "shall",
        "should", "will", "would", "may", "might", "must", "all", "any", "each", "every",
        "few", "more", "most", "other", "some", "such", "no", "not", "only", "own", "same",
        "than", "too", "very", "just", "also", "now", "here", "there", "when", "where", "why",
        "how", "customer", "customers", "user", "users",
    ]
    .into_iter()
    .collect();
}

fn stem(word: &str) -> String {
    let mut stemmed = word.to_string();
    for (suffix, replacement) in [
        ("ies", "y"),
        ("ments", ""),
        ("ment", ""),
        ("ing", ""),
        ("ed", ""),
        ("s", ""),
    ] {
        if let Some(base) = word.strip_suffix(suffix) {
            if base.len() >= 3 {
                stemmed = format!("{}{}", base, replacement);
                break;
            }
        }
    }
    // "update", "updates" and "updated" all reduce to "updat".
    if stemmed.len() > 3 && stemmed.ends_with('e') {
        stemmed.pop();
    }
    stemmed
}

/// Stemmed, stop-word-free keywords of `text`.
pub fn keywords(text: &str) -> BTreeSet<String> {
    text.to_ascii_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(w))
        .map(stem)
        .collect()
}

/// Fraction of a rule's keywords present in the content keywords.
pub fn coverage(rule: &Rule, content_keywords: &BTreeSet<String>) -> f64 {
    let rule_keywords = keywords(&rule.rule);
    if rule_keywords.is_empty() {
        return 0.0;
    }
    let covered = rule_keywords
        .iter()
        .filter(|k| content_keywords.contains(*k))
        .count();
    covered as f64 / rule_keywords.len() as f64
}

/// The rule that best covers `content`, if any covers it at all.
///
/// Highest coverage wins; ties go to the rule declared first.
pub fn best_coverage<'r>(rules: &'r [Rule], content: &str) -> Option<(&'r Rule, f64)> {
    let content_keywords = keywords(content);
    let mut best: Option<(&'r Rule, f64)> = None;
    for rule in rules {
        let strength = coverage(rule, &content_keywords);
        if strength > 0.0 && best.map_or(true, |(_, s)| strength > s) {
            best = Some((rule, strength));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, text: &str) -> Rule {
        Rule {
            id: id.to_string(),
            rule: text.to_string(),
        }
    }

    #[test]
    fn test_cue_respects_word_boundaries() {
        assert!(contains_cue("please sue them", "sue"));
        assert!(!contains_cue("there is an issue", "sue"));
        assert!(contains_cue("personally identifiable", "identif*"));
        assert!(!contains_cue("unidentified", "identif*"));
    }

    #[test]
    fn test_select_rule_prefers_most_specific() {
        let rules = vec![
            rule("B1", "Internal data shared"),
            rule("B2", "Customer PII or personal email exposed"),
        ];
        let selected = select_rule(&rules, PII_CUES).unwrap();
        assert_eq!(selected.rule.id, "B2");
    }

    #[test]
    fn test_select_rule_ties_go_to_declared_order() {
        let rules = vec![rule("B7", "PII exposed"), rule("B2", "PII leaked")];
        let selected = select_rule(&rules, PII_CUES).unwrap();
        assert_eq!(selected.rule.id, "B7");
    }

    #[test]
    fn test_select_rule_none_without_cues() {
        let rules = vec![rule("B1", "Gives medical advice")];
        assert!(select_rule(&rules, SECRET_CUES).is_none());
    }

    #[test]
    fn test_privacy_rule_classification() {
        assert!(is_privacy_rule(&rule("B1", "Customer PII exposed in response")));
        assert!(is_privacy_rule(&rule("B2", "Credentials or secrets leaked")));
        assert!(!is_privacy_rule(&rule("B3", "Gives medical advice")));
        assert!(is_privacy_rule(&rule("B4", "Personal details shared with third parties")));
    }

    #[test]
    fn test_broad_data_words_need_disclosure_wording() {
        assert!(!is_privacy_rule(&rule("B1", "Provides personal financial advice")));
        assert!(!is_privacy_rule(&rule("B2", "Discusses internal reorganisation plans")));
        assert!(!is_privacy_rule(&rule("B3", "Helps identify a medication")));
        assert!(is_privacy_rule(&rule("B4", "Internal hostnames leaked")));
    }

    #[test]
    fn test_rule_topics() {
        assert_eq!(rule_topics(&rule("B3", "Provides medical advice")), vec![Topic::Medical]);
        assert_eq!(
            rule_topics(&rule("E1", "Customer mentions a lawsuit or refund")),
            vec![Topic::Legal, Topic::Billing]
        );
        assert!(rule_topics(&rule("A1", "Answer questions")).is_empty());
    }

    #[test]
    fn test_topic_spans_sorted() {
        let spans = topic_spans("See a doctor about the infection", Topic::Medical);
        assert_eq!(spans.len(), 2);
        assert!(spans[0].start < spans[1].start);
    }

    #[test]
    fn test_advice_in_same_sentence() {
        let text = "Your doctor is great. You should take 400mg of ibuprofen.";
        let bounds = sentence_bounds(text);
        let advice = advice_spans(text);
        let topics = topic_spans(text, Topic::Medical);
        assert!(!advice.is_empty());
        let doctor = topics[0];
        let ibuprofen = *topics.last().unwrap();
        assert!(!same_sentence(&bounds, advice[0], doctor));
        assert!(same_sentence(&bounds, advice[0], ibuprofen));
    }

    #[test]
    fn test_advice_phrasings() {
        assert_eq!(advice_spans("I'd recommend a lower dose.").len(), 1);
        assert_eq!(advice_spans("I would recommend a lower dose.").len(), 1);
        assert_eq!(advice_spans("I recommend a lower dose.").len(), 1);
        assert!(advice_spans("The dose is on the label.").is_empty());
    }

    #[test]
    fn test_keywords_stem_and_drop_stopwords() {
        let kw = keywords("Answer questions about the orders");
        assert!(kw.contains("answer"));
        assert!(kw.contains("question"));
        assert!(kw.contains("order"));
        assert!(!kw.contains("the"));
        assert!(!kw.contains("about"));
    }

    #[test]
    fn test_noun_forms_stem_to_verb() {
        assert_eq!(keywords("investments"), keywords("invest"));
        assert_eq!(keywords("payments"), keywords("payment"));
        let rules = vec![rule("A1", "Explain retirement investments")];
        assert!(best_coverage(&rules, "We never invest on your behalf.").is_some());
    }

    #[test]
    fn test_cues_follow_pattern_category() {
        assert_eq!(cues_for(DetectedPattern::Ssn), PII_CUES);
        assert_eq!(cues_for(DetectedPattern::InternalHost), SECRET_CUES);
        assert_eq!(cues_for(DetectedPattern::CitationMarker), CITATION_CUES);
        assert_eq!(cues_for(DetectedPattern::PressurePhrase), PRESSURE_CUES);
        assert_eq!(cues_for(DetectedPattern::DismissivePhrase), DISMISSIVE_CUES);
        assert!(cues_for(DetectedPattern::TopicCue).is_empty());
    }

    #[test]
    fn test_best_coverage() {
        let rules = vec![
            rule("A1", "Answer questions about products"),
            rule("A2", "Provide order status updates"),
        ];
        let (best, strength) = best_coverage(&rules, "Your order status: shipped.").unwrap();
        assert_eq!(best.id, "A2");
        assert!(strength >= 0.5);
        assert!(best_coverage(&rules, "Hello there.").is_none());
    }
}
