pub(crate) const KEY_DELIMITER: char = '/';

/// One entry of the hierarchical key/value store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyValueNode {
    pub full_key: String,
    /// `None` when the key was observed as absent or holds no value
    pub value: Option<String>,
}

impl KeyValueNode {
    pub fn new(
        full_key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            full_key: full_key.into(),
            value: Some(value.into()),
        }
    }

    pub fn absent(full_key: impl Into<String>) -> Self {
        Self {
            full_key: full_key.into(),
            value: None,
        }
    }

    /// Segment after the last delimiter
    pub fn leaf_key(&self) -> &str {
        match self.full_key.rfind(KEY_DELIMITER) {
            Some(pos) => &self.full_key[pos + 1..],
            None => &self.full_key,
        }
    }

    /// Every segment but the last; empty for root-level keys
    pub fn parent_key(&self) -> &str {
        match self.full_key.rfind(KEY_DELIMITER) {
            Some(pos) => &self.full_key[..pos],
            None => "",
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Lower-cased lookup key shared by every case-insensitive map in the crate
pub(crate) fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

/// Normalized prefix with any trailing delimiters removed
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    normalize_key(prefix.trim_end_matches(KEY_DELIMITER))
}

/// Delimiter-aware subtree test on already-normalized inputs.
///
/// `apps/my` does not contain `apps/myapp/x`; an empty prefix contains every key.
pub(crate) fn is_under_prefix(
    normalized_key: &str,
    normalized_prefix: &str,
) -> bool {
    if normalized_prefix.is_empty() {
        return true;
    }
    match normalized_key.strip_prefix(normalized_prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(KEY_DELIMITER),
        None => false,
    }
}
