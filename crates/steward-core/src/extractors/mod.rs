//! Evidence extractors.
//!
//! Pure detectors that scan an [`Output`] for policy-relevant patterns. Each
//! detector returns evidence in a fixed order (source, then position), so
//! the same output always yields the same evidence. Extraction runs once per
//! evaluation and the resulting [`EvidenceSet`] is shared by every lens.

mod citations;
mod handoff;
mod pii;
mod secrets;
mod tone;

pub use citations::detect as detect_citations;
pub use handoff::detect as detect_escalation_path;
pub use pii::detect as detect_pii;
pub use secrets::detect as detect_secrets;
pub use tone::detect as detect_dismissive;

use crate::evidence::{Certainty, DetectedPattern, Evidence, EvidenceSet};
use crate::types::Output;

/// Run every detector over `output`.
pub fn extract(output: &Output) -> EvidenceSet {
    let evidence = EvidenceSet {
        pii: detect_pii(output),
        secrets: detect_secrets(output),
        assertions: detect_citations(output),
        dismissive: detect_dismissive(output),
        escalation: detect_escalation_path(output),
    };
    tracing::trace!(
        pii = evidence.pii.len(),
        secrets = evidence.secrets.len(),
        assertions = evidence.assertions.len(),
        dismissive = evidence.dismissive.len(),
        escalation = evidence.escalation.len(),
        "evidence extracted"
    );
    evidence
}

/// One pattern match inside a single scanned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    pub pattern: DetectedPattern,
    pub certainty: Certainty,
    pub start: usize,
    pub end: usize,
}

impl Hit {
    pub fn new(pattern: DetectedPattern, certainty: Certainty, start: usize, end: usize) -> Self {
        Self {
            pattern,
            certainty,
            start,
            end,
        }
    }

    fn overlaps(&self, other: &Hit) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Keep hits that do not overlap an earlier kept hit, then sort by position.
///
/// Callers push hits in precedence order, so the more specific detector
/// claims a span first.
pub(crate) fn resolve_overlaps(hits: Vec<Hit>) -> Vec<Hit> {
    let mut kept: Vec<Hit> = Vec::with_capacity(hits.len());
    for hit in hits {
        if !kept.iter().any(|k| k.overlaps(&hit)) {
            kept.push(hit);
        }
    }
    kept.sort_by_key(|h| (h.start, h.end));
    kept
}

/// Scan the content and every context turn with `scan`.
pub(crate) fn scan_content_and_context<F>(output: &Output, scan: F) -> Vec<Evidence>
where
    F: Fn(&str) -> Vec<Hit>,
{
    let mut evidence: Vec<Evidence> = scan(&output.content)
        .into_iter()
        .map(|h| Evidence::from_output(h.pattern, h.certainty, h.start, h.end))
        .collect();

    for (index, turn) in output.context.iter().enumerate() {
        evidence.extend(
            scan(turn)
                .into_iter()
                .map(|h| Evidence::from_context(h.pattern, h.certainty, index, h.start, h.end)),
        );
    }

    evidence
}

/// Whether the bytes around `start..end` are not alphanumeric.
pub(crate) fn is_standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlaps_resolved_by_precedence() {
        let hits = vec![
            Hit::new(DetectedPattern::PaymentCard, Certainty::Definite, 10, 29),
            Hit::new(DetectedPattern::Phone, Certainty::Definite, 14, 26),
            Hit::new(DetectedPattern::Email, Certainty::Definite, 0, 8),
        ];
        let kept = resolve_overlaps(hits);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].pattern, DetectedPattern::Email);
        assert_eq!(kept[1].pattern, DetectedPattern::PaymentCard);
    }

    #[test]
    fn test_extract_is_repeatable() {
        let output = Output::text("Studies show 80% agree. Email me at a@b.co, you're overreacting.")
            .with_context(["Can I talk to a human?"]);
        assert_eq!(extract(&output), extract(&output));
    }

    #[test]
    fn test_extract_clean_output() {
        let evidence = extract(&Output::text("Your order shipped yesterday."));
        assert!(evidence.pii.is_empty());
        assert!(evidence.secrets.is_empty());
        assert!(evidence.assertions.is_empty());
        assert!(evidence.dismissive.is_empty());
        // Only the "no handoff offered" marker.
        assert_eq!(evidence.escalation.len(), 1);
        assert_eq!(evidence.escalation[0].pattern, DetectedPattern::HandoffMissing);
    }

    #[test]
    fn test_standalone() {
        assert!(is_standalone("call 555 now", 5, 8));
        assert!(!is_standalone("x5551", 1, 4));
    }
}
