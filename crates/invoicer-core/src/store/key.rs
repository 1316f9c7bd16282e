/// Storage key for a translation entry.
///
/// Keys are MD5 hashes of the canonical text, so lookups are exact and case-sensitive and
/// keys are fixed-length (32 hex chars) regardless of description length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    hash: String,
}

impl EntryKey {
    pub fn for_text(canonical_text: &str) -> Self {
        Self {
            hash: format!("{:x}", md5::compute(canonical_text.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}
