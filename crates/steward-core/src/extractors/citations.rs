//! Assertion and citation detector.
//!
//! Finds factual claims and statistics in the output content, plus any
//! citation markers that support them. When the content carries at least
//! one marker, its claims are recorded as supported. Citation entries in
//! metadata are recorded separately so the Transparency lens can weigh them.

use lazy_static::lazy_static;
use regex::Regex;

use super::{resolve_overlaps, Hit};
use crate::evidence::{Certainty, DetectedPattern, Evidence};
use crate::types::Output;

/// Metadata keys a host may use to attach sources to an output.
pub const CITATION_METADATA_KEYS: &[&str] =
    &["source", "sources", "citation", "citations", "references"];

lazy_static! {
    static ref CLAIM_PATTERN: Regex = Regex::new(
        r"(?i)\b(?:(?:studies|research|experts|scientists|doctors|surveys?|data)\s+(?:shows?|have\s+shown|has\s+shown|proves?|suggests?|found|confirms?|indicates?)|(?:it\s+is|it's)\s+(?:well[-\s]known|(?:scientifically\s+)?proven|a\s+(?:known\s+)?fact)|clinically\s+proven|guaranteed\s+to)\b"
    ).unwrap();

    static ref PERCENT_PATTERN: Regex = Regex::new(r"\b\d+(?:\.\d+)?\s?%").unwrap();

    static ref RATIO_PATTERN: Regex = Regex::new(
        r"(?i)\b\d+\s+(?:out\s+of|in)\s+\d+\s+(?:people|patients|users|customers|adults|children|doctors|americans|cases)\b"
    ).unwrap();

    static ref CITATION_MARKERS: Vec<Regex> = vec![
        // [1], [12]
        Regex::new(r"\[\d{1,3}\]").unwrap(),
        Regex::new(r"https?://[^\s)>\]]+").unwrap(),
        Regex::new(r"(?i)\b(?:source|sources|reference|references|citation|doi)\s*:").unwrap(),
        // "according to the CDC" but not "according to experts"
        Regex::new(r"\b[Aa]ccording to (?:the )?[A-Z][A-Za-z]+").unwrap(),
        // (Smith et al., 2021)
        Regex::new(r"\(\s*[A-Z][A-Za-z-]+(?: et al\.)?,?\s+\d{4}\s*\)").unwrap(),
    ];
}

/// Whether the word after a percentage marks a price rather than a claim.
fn is_price_figure(rest: &str) -> bool {
    let rest = rest.trim_start().to_ascii_lowercase();
    ["off", "discount"].iter().any(|word| {
        rest.strip_prefix(*word)
            .is_some_and(|tail| !tail.starts_with(|c: char| c.is_ascii_alphanumeric()))
    })
}

fn scan_claims(text: &str) -> Vec<Hit> {
    let mut hits: Vec<Hit> = CLAIM_PATTERN
        .find_iter(text)
        .map(|m| Hit::new(DetectedPattern::UnsupportedClaim, Certainty::Definite, m.start(), m.end()))
        .collect();

    hits.extend(
        PERCENT_PATTERN
            .find_iter(text)
            .filter(|m| !is_price_figure(&text[m.end()..]))
            .chain(RATIO_PATTERN.find_iter(text))
            .map(|m| Hit::new(DetectedPattern::StatisticalClaim, Certainty::Definite, m.start(), m.end())),
    );

    hits
}

fn scan_markers(text: &str) -> Vec<Hit> {
    CITATION_MARKERS
        .iter()
        .flat_map(|regex| regex.find_iter(text))
        .map(|m| Hit::new(DetectedPattern::CitationMarker, Certainty::Definite, m.start(), m.end()))
        .collect()
}

/// Flag claims, statistics and citation markers in content, plus metadata citations.
pub fn detect(output: &Output) -> Vec<Evidence> {
    let content = &output.content;

    // Markers claim their spans first so a URL's digits are never a statistic.
    let mut hits = scan_markers(content);
    hits.extend(scan_claims(content));
    let hits = resolve_overlaps(hits);

    let cited = hits
        .iter()
        .any(|h| h.pattern == DetectedPattern::CitationMarker);

    let mut evidence: Vec<Evidence> = hits
        .into_iter()
        .map(|h| match h.pattern {
            DetectedPattern::UnsupportedClaim | DetectedPattern::StatisticalClaim if cited => {
                let kind = h.pattern.label().to_ascii_lowercase();
                Evidence::from_output(DetectedPattern::SupportedClaim, h.certainty, h.start, h.end)
                    .with_claim(format!("Cited assertion ({})", kind))
            }
            _ => Evidence::from_output(h.pattern, h.certainty, h.start, h.end),
        })
        .collect();

    evidence.extend(
        CITATION_METADATA_KEYS
            .iter()
            .filter(|key| {
                output
                    .metadata
                    .get(**key)
                    .is_some_and(|value| !value.trim().is_empty())
            })
            .map(|key| Evidence::from_metadata(DetectedPattern::CitationMarker, key)),
    );

    evidence
}
