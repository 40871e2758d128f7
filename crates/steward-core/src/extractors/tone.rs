//! Dismissive, pressure and blaming language in the output content.

use lazy_static::lazy_static;
use regex::Regex;

use super::Hit;
use crate::evidence::{Certainty, DetectedPattern, Evidence};
use crate::types::Output;

lazy_static! {
    // Each entry: (pattern, label, regex). Earlier entries claim overlapping spans.
    static ref TONE_PATTERNS: Vec<(DetectedPattern, &'static str, Regex)> = vec![
        (
            DetectedPattern::DismissivePhrase,
            "dismisses concern",
            Regex::new(r"(?i)\b(you're overreacting|you are overreacting|calm down|that's not how it works|you're wrong|you don't understand|that's not true|stop complaining)\b").unwrap(),
        ),
        (
            DetectedPattern::DismissivePhrase,
            "minimizes issue",
            Regex::new(r"(?i)\b((?:that's|it's|this is) not (?:a|that) big (?:deal|problem)|not a real problem|(?:just|simply|merely|obviously)\s+(?:do|click|follow|wait))\b").unwrap(),
        ),
        (
            DetectedPattern::DismissivePhrase,
            "refuses help",
            Regex::new(r"(?i)\b(nothing (I|we) can do|not (my|our) (problem|responsibility))\b").unwrap(),
        ),
        (
            DetectedPattern::DismissivePhrase,
            "assumes capability",
            Regex::new(r"(?i)\b(everyone knows|obviously you|of course you know|surely you|just (google|search|look) (it|that|up))\b").unwrap(),
        ),
        (
            DetectedPattern::BlamingPhrase,
            "blames user",
            Regex::new(r"(?i)\b(your (own )?fault|user error|you failed to|you should have (known|read|checked|listened)|you must have (done|broken|deleted))\b").unwrap(),
        ),
        (
            DetectedPattern::PressurePhrase,
            "urgency pressure",
            Regex::new(r"(?i)\b(act now|last chance|final (offer|decision)|before it's too late|or else)\b").unwrap(),
        ),
        (
            DetectedPattern::PressurePhrase,
            "no alternatives",
            Regex::new(r"(?i)\b(only option|no (other|alternative) (way|option|choice)|take it or leave it)\b").unwrap(),
        ),
        (
            DetectedPattern::PressurePhrase,
            "no exceptions",
            Regex::new(r"(?i)\b(no exceptions|non-negotiable|policy is final)\b").unwrap(),
        ),
    ];
}

/// Flag tone problems in the content. Context turns belong to the user and
/// are never judged here.
pub fn detect(output: &Output) -> Vec<Evidence> {
    let content = &output.content;
    let mut kept: Vec<(Hit, &'static str)> = Vec::new();

    for (pattern, label, regex) in TONE_PATTERNS.iter() {
        for m in regex.find_iter(content) {
            let hit = Hit::new(*pattern, Certainty::Definite, m.start(), m.end());
            if !kept
                .iter()
                .any(|(k, _)| k.start < hit.end && hit.start < k.end)
            {
                kept.push((hit, *label));
            }
        }
    }

    kept.sort_by_key(|(h, _)| (h.start, h.end));
    kept.into_iter()
        .map(|(h, label)| {
            Evidence::from_output(h.pattern, h.certainty, h.start, h.end)
                .with_claim(format!("{}: {}", h.pattern.label(), label))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(text: &str) -> Vec<DetectedPattern> {
        detect(&Output::text(text))
            .into_iter()
            .map(|e| e.pattern)
            .collect()
    }

    #[test]
    fn test_dismissive_phrases() {
        assert_eq!(
            patterns("Honestly, you're overreacting about the delay."),
            vec![DetectedPattern::DismissivePhrase]
        );
        assert_eq!(
            patterns("That's not a big deal, just wait a day."),
            vec![DetectedPattern::DismissivePhrase, DetectedPattern::DismissivePhrase]
        );
    }

    #[test]
    fn test_pressure_and_blame_are_distinct() {
        assert_eq!(
            patterns("This was user error. Act now, it's your last chance."),
            vec![
                DetectedPattern::BlamingPhrase,
                DetectedPattern::PressurePhrase,
                DetectedPattern::PressurePhrase,
            ]
        );
    }

    #[test]
    fn test_claim_names_the_phrase_class() {
        let evidence = detect(&Output::text("Sorry, nothing we can do."));
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].claim, "Dismissive language: refuses help");
        assert_eq!(evidence[0].locator, "output.content[7:24]");
    }

    #[test]
    fn test_context_is_not_judged() {
        let output = Output::text("I'm sorry about that. Let me help.")
            .with_context(["calm down, this is your fault"]);
        assert!(detect(&output).is_empty());
    }

    #[test]
    fn test_respectful_text() {
        assert!(patterns("I understand, and I'm happy to help you with the refund.").is_empty());
    }
}
