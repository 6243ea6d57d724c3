use std::fmt;
use std::hash::{Hash, Hasher};

/// Lowercase folding applied to every source name and tender number.
pub(crate) fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A `(source, tenderNumber)` pair compared case-insensitively.
///
/// The original spelling is kept for display; equality and hashing use the
/// folded form, so `("SARS", "rfq-1")` and `("sars", "RFQ-1")` are the same key.
///
/// ```rust
/// use cache::TenderKey;
///
/// let a = TenderKey::new("SARS", "rfq-1").unwrap();
/// let b = TenderKey::new("sars", "RFQ-1").unwrap();
/// assert_eq!(a, b);
/// assert!(TenderKey::new("SARS", "  ").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TenderKey {
    source: String,
    tender_number: String,
    folded_source: String,
    folded_number: String,
}

impl TenderKey {
    /// Builds a key, or `None` when either part is blank.
    pub fn new(source: &str, tender_number: &str) -> Option<Self> {
        let folded_source = fold(source);
        let folded_number = fold(tender_number);
        if folded_source.is_empty() || folded_number.is_empty() {
            return None;
        }
        Some(Self {
            source: source.trim().to_string(),
            tender_number: tender_number.trim().to_string(),
            folded_source,
            folded_number,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tender_number(&self) -> &str {
        &self.tender_number
    }

    pub(crate) fn folded_source(&self) -> &str {
        &self.folded_source
    }

    pub(crate) fn folded_number(&self) -> &str {
        &self.folded_number
    }
}

impl PartialEq for TenderKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded_source == other.folded_source && self.folded_number == other.folded_number
    }
}

impl Eq for TenderKey {}

impl Hash for TenderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded_source.hash(state);
        self.folded_number.hash(state);
    }
}

impl fmt::Display for TenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.tender_number)
    }
}
