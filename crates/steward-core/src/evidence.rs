//! Evidence linking for Steward evaluations.
//!
//! Every finding must be supported by evidence that points to a specific
//! location in the output, its context, its metadata, or the contract.
//! Evidence records *where* and *what kind* of pattern was seen; it never
//! copies the matched text, so a result can be logged without re-leaking
//! the secret or identifier that caused it.

use serde::{Deserialize, Serialize};

/// Where a piece of evidence was found.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// The output content under evaluation
    ContentScan,

    /// A prior conversation turn
    ContextScan,

    /// A metadata entry supplied by the host
    MetadataScan,

    /// The contract document itself
    ContractScan,
}

/// How sure the detector is that the span is what it looks like.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Certainty {
    Definite,
    Ambiguous,
}

/// Kind of pattern a detector recognized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectedPattern {
    // Direct identifiers
    Email,
    Phone,
    Ssn,
    PaymentCard,
    IpAddress,

    // Credentials and internal system identifiers
    KeyedSecret,
    CloudAccessKey,
    VendorToken,
    PrivateKey,
    JwtToken,
    ConnectionString,
    InternalHost,

    // Assertions and their support
    UnsupportedClaim,
    StatisticalClaim,
    SupportedClaim,
    CitationMarker,

    // Tone
    DismissivePhrase,
    PressurePhrase,
    BlamingPhrase,

    // Human handoff
    HandoffOffered,
    HandoffMissing,
    HandoffRequested,

    // Rule-driven topic matches
    TopicCue,
    AdviceDirective,

    // Contract structure
    MissingAccountableHuman,
}

/// Coarse grouping used by the rule matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternCategory {
    Pii,
    Secret,
    Assertion,
    Citation,
    Tone,
    Handoff,
    Topic,
    Contract,
}

impl DetectedPattern {
    pub fn category(&self) -> PatternCategory {
        use DetectedPattern::*;
        match self {
            Email | Phone | Ssn | PaymentCard | IpAddress => PatternCategory::Pii,
            KeyedSecret | CloudAccessKey | VendorToken | PrivateKey | JwtToken
            | ConnectionString | InternalHost => PatternCategory::Secret,
            UnsupportedClaim | StatisticalClaim | SupportedClaim => PatternCategory::Assertion,
            CitationMarker => PatternCategory::Citation,
            DismissivePhrase | PressurePhrase | BlamingPhrase => PatternCategory::Tone,
            HandoffOffered | HandoffMissing | HandoffRequested => PatternCategory::Handoff,
            TopicCue | AdviceDirective => PatternCategory::Topic,
            MissingAccountableHuman => PatternCategory::Contract,
        }
    }

    /// Short description used in evidence claims.
    pub fn label(&self) -> &'static str {
        use DetectedPattern::*;
        match self {
            Email => "Email address",
            Phone => "Phone number",
            Ssn => "Social Security Number",
            PaymentCard => "Payment card number",
            IpAddress => "IP address",
            KeyedSecret => "API key or secret",
            CloudAccessKey => "Cloud access key",
            VendorToken => "Vendor API token",
            PrivateKey => "Private key block",
            JwtToken => "Bearer token",
            ConnectionString => "Connection string with credentials",
            InternalHost => "Internal hostname",
            UnsupportedClaim => "Unsupported assertion",
            StatisticalClaim => "Uncited statistic",
            SupportedClaim => "Cited assertion",
            CitationMarker => "Citation marker",
            DismissivePhrase => "Dismissive language",
            PressurePhrase => "Pressure language",
            BlamingPhrase => "Blaming language",
            HandoffOffered => "Human handoff offered",
            HandoffMissing => "No human handoff offered",
            HandoffRequested => "Human handoff requested",
            TopicCue => "Topic mention",
            AdviceDirective => "Directive advice",
            MissingAccountableHuman => "No accountable human",
        }
    }
}

/// Byte range inside a scanned string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A piece of evidence supporting an evaluation finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Evidence {
    /// Where the evidence comes from
    pub source: EvidenceSource,

    /// Pointer to the location (e.g., "output.content[47:72]")
    pub locator: String,

    /// What the detector recognized
    pub pattern: DetectedPattern,

    pub certainty: Certainty,

    /// What this evidence supports
    pub claim: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Evidence {
    /// Create evidence from output content.
    pub fn from_output(pattern: DetectedPattern, certainty: Certainty, start: usize, end: usize) -> Self {
        Self {
            source: EvidenceSource::ContentScan,
            locator: format!("output.content[{}:{}]", start, end),
            pattern,
            certainty,
            claim: pattern.label().to_string(),
            span: Some(Span { start, end }),
        }
    }

    /// Create evidence from a context turn.
    pub fn from_context(
        pattern: DetectedPattern,
        certainty: Certainty,
        index: usize,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            source: EvidenceSource::ContextScan,
            locator: format!("context[{}][{}:{}]", index, start, end),
            pattern,
            certainty,
            claim: pattern.label().to_string(),
            span: Some(Span { start, end }),
        }
    }

    /// Create evidence from metadata.
    pub fn from_metadata(pattern: DetectedPattern, key: &str) -> Self {
        Self {
            source: EvidenceSource::MetadataScan,
            locator: format!("metadata.{}", key),
            pattern,
            certainty: Certainty::Definite,
            claim: pattern.label().to_string(),
            span: None,
        }
    }

    /// Create evidence from the contract.
    pub fn from_contract(pattern: DetectedPattern, path: impl Into<String>) -> Self {
        Self {
            source: EvidenceSource::ContractScan,
            locator: format!("contract.{}", path.into()),
            pattern,
            certainty: Certainty::Definite,
            claim: pattern.label().to_string(),
            span: None,
        }
    }

    /// Evidence about the output as a whole rather than a span of it.
    pub fn whole_output(pattern: DetectedPattern) -> Self {
        Self {
            source: EvidenceSource::ContentScan,
            locator: "output.content".to_string(),
            pattern,
            certainty: Certainty::Definite,
            claim: pattern.label().to_string(),
            span: None,
        }
    }

    /// Replace the default claim text.
    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claim = claim.into();
        self
    }

    pub fn is_content(&self) -> bool {
        self.source == EvidenceSource::ContentScan
    }

    pub fn is_definite(&self) -> bool {
        self.certainty == Certainty::Definite
    }
}

/// Everything the extractors found in one output, grouped by detector.
///
/// Built once per evaluation and shared read-only by every lens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceSet {
    pub pii: Vec<Evidence>,
    pub secrets: Vec<Evidence>,
    pub assertions: Vec<Evidence>,
    pub dismissive: Vec<Evidence>,
    pub escalation: Vec<Evidence>,
}

impl EvidenceSet {
    /// PII and secret evidence found in the output content itself.
    pub fn sensitive_in_content(&self) -> impl Iterator<Item = &Evidence> {
        self.pii
            .iter()
            .chain(self.secrets.iter())
            .filter(|e| e.is_content())
    }

    /// Whether any evidence of `pattern` came from one of `sources`.
    pub fn has_handoff(&self, pattern: DetectedPattern, sources: &[EvidenceSource]) -> bool {
        self.escalation
            .iter()
            .any(|e| e.pattern == pattern && sources.contains(&e.source))
    }

    pub fn len(&self) -> usize {
        self.pii.len()
            + self.secrets.len()
            + self.assertions.len()
            + self.dismissive.len()
            + self.escalation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_from_output() {
        let evidence = Evidence::from_output(DetectedPattern::Email, Certainty::Definite, 42, 68);
        assert_eq!(evidence.source, EvidenceSource::ContentScan);
        assert_eq!(evidence.locator, "output.content[42:68]");
        assert_eq!(evidence.claim, "Email address");
    }

    #[test]
    fn test_evidence_from_context() {
        let evidence =
            Evidence::from_context(DetectedPattern::HandoffRequested, Certainty::Definite, 0, 0, 24);
        assert_eq!(evidence.source, EvidenceSource::ContextScan);
        assert_eq!(evidence.locator, "context[0][0:24]");
    }

    #[test]
    fn test_evidence_from_metadata_and_contract() {
        let meta = Evidence::from_metadata(DetectedPattern::CitationMarker, "sources");
        assert_eq!(meta.locator, "metadata.sources");
        assert!(meta.span.is_none());

        let contract = Evidence::from_contract(
            DetectedPattern::MissingAccountableHuman,
            "accountability.answerable_human",
        );
        assert_eq!(contract.locator, "contract.accountability.answerable_human");
    }

    #[test]
    fn test_sensitive_in_content_skips_context() {
        let set = EvidenceSet {
            pii: vec![
                Evidence::from_output(DetectedPattern::Email, Certainty::Definite, 0, 10),
                Evidence::from_context(DetectedPattern::Phone, Certainty::Definite, 0, 0, 12),
            ],
            ..Default::default()
        };
        assert_eq!(set.sensitive_in_content().count(), 1);
    }

    #[test]
    fn test_pattern_categories() {
        assert_eq!(DetectedPattern::Ssn.category(), PatternCategory::Pii);
        assert_eq!(DetectedPattern::JwtToken.category(), PatternCategory::Secret);
        assert_eq!(DetectedPattern::BlamingPhrase.category(), PatternCategory::Tone);
    }
}
