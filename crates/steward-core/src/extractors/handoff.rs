//! Human-handoff detector.
//!
//! In the content it records every offer of a path to a human, or a single
//! `HandoffMissing` marker when there is none. In context turns it records
//! requests for a human (which take precedence over offers on the same span)
//! and earlier offers. Metadata may declare a handoff channel directly.

use lazy_static::lazy_static;
use regex::Regex;

use super::{resolve_overlaps, Hit};
use crate::evidence::{Certainty, DetectedPattern, Evidence};
use crate::types::Output;

/// Metadata keys that declare a handoff channel.
pub const HANDOFF_METADATA_KEYS: &[&str] = &["handoff", "handoff_channel", "escalation_channel"];

lazy_static! {
    // Human escalation indicators - phrases indicating path to human help
    static ref HANDOFF_OFFER: Regex = Regex::new(
        r"(?i)\b(speak (to|with) (a|an|our) (human|person|agent|representative|specialist)|talk (to|with) (a|an|our) (human|person|agent|representative|specialist)|connect you (to|with)|contact (us|support|our)|call (us|our)|reach out|human (agent|assistance|support|review)|live (agent|chat|support)|escalat(e|ed|ing)|transfer (you )?to|hand (this|you) (off|over)|our (support|customer care|care) team)\b"
    ).unwrap();

    static ref HANDOFF_REQUEST: Regex = Regex::new(
        r"(?i)\b((speak|talk|chat) (to|with) (a |an )?(real |live |actual )?(human|person|agent|representative|manager|supervisor|someone|somebody)|(real|actual|live) (person|human)|escalate (this|my))\b"
    ).unwrap();
}

fn scan_offers(text: &str) -> Vec<Hit> {
    HANDOFF_OFFER
        .find_iter(text)
        .map(|m| Hit::new(DetectedPattern::HandoffOffered, Certainty::Definite, m.start(), m.end()))
        .collect()
}

fn scan_context_turn(text: &str) -> Vec<Hit> {
    let mut hits: Vec<Hit> = HANDOFF_REQUEST
        .find_iter(text)
        .map(|m| Hit::new(DetectedPattern::HandoffRequested, Certainty::Definite, m.start(), m.end()))
        .collect();
    hits.extend(scan_offers(text));
    resolve_overlaps(hits)
}

/// Flag the presence or absence of a human handoff.
pub fn detect(output: &Output) -> Vec<Evidence> {
    let offers = scan_offers(&output.content);

    let mut evidence: Vec<Evidence> = if offers.is_empty() {
        vec![Evidence::whole_output(DetectedPattern::HandoffMissing)]
    } else {
        offers
            .into_iter()
            .map(|h| Evidence::from_output(h.pattern, h.certainty, h.start, h.end))
            .collect()
    };

    for (index, turn) in output.context.iter().enumerate() {
        evidence.extend(
            scan_context_turn(turn)
                .into_iter()
                .map(|h| Evidence::from_context(h.pattern, h.certainty, index, h.start, h.end)),
        );
    }

    evidence.extend(
        HANDOFF_METADATA_KEYS
            .iter()
            .filter(|key| {
                output
                    .metadata
                    .get(**key)
                    .is_some_and(|value| !value.trim().is_empty())
            })
            .map(|key| Evidence::from_metadata(DetectedPattern::HandoffOffered, key)),
    );

    evidence
}
