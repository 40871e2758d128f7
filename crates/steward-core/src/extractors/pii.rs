//! PII detector: direct identifiers in content and context.

use lazy_static::lazy_static;
use regex::Regex;

use super::{is_standalone, resolve_overlaps, scan_content_and_context, Hit};
use crate::evidence::{Certainty, DetectedPattern, Evidence};
use crate::types::Output;

lazy_static! {
    /// Email address pattern (RFC 5322 simplified)
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();

    /// US phone number pattern (with optional country code)
    static ref US_PHONE_PATTERN: Regex = Regex::new(
        r"(?:\+?1[-.\s]?)?(?:\([0-9]{3}\)|[0-9]{3})[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}"
    ).unwrap();

    /// International number with an explicit country code
    static ref INTL_PHONE_PATTERN: Regex = Regex::new(
        r"\+[1-9][0-9]{0,2}(?:[-.\s]?[0-9]{2,4}){3,4}"
    ).unwrap();

    /// Social Security Number with separators (XXX-XX-XXXX or XXX XX XXXX)
    static ref SSN_PATTERN: Regex = Regex::new(
        r"\b[0-9]{3}[-\s][0-9]{2}[-\s][0-9]{4}\b"
    ).unwrap();

    /// 13-19 digit card-like run with optional single separators
    static ref CARD_PATTERN: Regex = Regex::new(
        r"\b(?:[0-9][\s-]?){12,18}[0-9]\b"
    ).unwrap();

    static ref IPV4_PATTERN: Regex = Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|1?[0-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1?[0-9]?[0-9])\b"
    ).unwrap();
}

/// Luhn checksum over the digits of `candidate`.
fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Four groups of four digits, the layout printed on most cards.
fn is_grouped_card(candidate: &str) -> bool {
    let groups: Vec<&str> = candidate.split([' ', '-']).collect();
    groups.len() == 4 && groups.iter().all(|g| g.len() == 4)
}

fn scan(text: &str) -> Vec<Hit> {
    let mut hits = Vec::new();

    // Cards first: their digit runs would otherwise be claimed as phones.
    for m in CARD_PATTERN.find_iter(text) {
        let candidate = m.as_str();
        if luhn_valid(candidate) {
            hits.push(Hit::new(DetectedPattern::PaymentCard, Certainty::Definite, m.start(), m.end()));
        } else if is_grouped_card(candidate) {
            hits.push(Hit::new(DetectedPattern::PaymentCard, Certainty::Ambiguous, m.start(), m.end()));
        }
    }

    for m in SSN_PATTERN.find_iter(text) {
        hits.push(Hit::new(DetectedPattern::Ssn, Certainty::Definite, m.start(), m.end()));
    }

    for m in EMAIL_PATTERN.find_iter(text) {
        hits.push(Hit::new(DetectedPattern::Email, Certainty::Definite, m.start(), m.end()));
    }

    for m in INTL_PHONE_PATTERN
        .find_iter(text)
        .chain(US_PHONE_PATTERN.find_iter(text))
    {
        if !is_standalone(text, m.start(), m.end()) {
            continue;
        }
        let formatted = m.as_str().chars().any(|c| !c.is_ascii_digit());
        let certainty = if formatted {
            Certainty::Definite
        } else {
            Certainty::Ambiguous
        };
        hits.push(Hit::new(DetectedPattern::Phone, certainty, m.start(), m.end()));
    }

    for m in IPV4_PATTERN.find_iter(text) {
        let address = m.as_str();
        if address.starts_with("127.") || address == "0.0.0.0" {
            continue;
        }
        hits.push(Hit::new(DetectedPattern::IpAddress, Certainty::Ambiguous, m.start(), m.end()));
    }

    resolve_overlaps(hits)
}

/// Flag direct identifiers in the output content and every context turn.
pub fn detect(output: &Output) -> Vec<Evidence> {
    scan_content_and_context(output, scan)
}
