use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter backing [`Key::generate`]
static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// Unique, immutable identity of a node
///
/// Keys are assigned when a node is created and follow the node through
/// every snapshot it survives in. Generated keys are sequential and never
/// handed out twice within one process. Numeric keys that enter a tree from
/// elsewhere are [observed](Key::observe), so generation skips past them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Wrap a caller supplied key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Allocate the next sequential key
    pub fn generate() -> Self {
        let count = NEXT_KEY.fetch_add(1, Ordering::Relaxed) + 1;
        Self(count.to_string())
    }

    /// Move the generator past this key when it is numeric
    ///
    /// Keys read with `preserve_keys` or supplied by callers share the
    /// decimal namespace of generated keys.
    pub fn observe(&self) {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return;
        }
        // Keys too large for u64 can never be generated
        if let Ok(count) = self.0.parse::<u64>() {
            NEXT_KEY.fetch_max(count, Ordering::Relaxed);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_keys_are_unique() {
        let keys: HashSet<Key> = (0..1000).map(|_| Key::generate()).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn test_generated_keys_are_sequential() {
        let first: u64 = Key::generate().as_str().parse().unwrap();
        let second: u64 = Key::generate().as_str().parse().unwrap();

        // Other tests allocate concurrently, so only ordering is guaranteed
        assert!(second > first);
    }

    #[test]
    fn test_generated_keys_skip_observed_numeric_keys() {
        let seen = Key::from("9000000000");
        seen.observe();
        let next: u64 = Key::generate().as_str().parse().unwrap();
        assert!(next > 9_000_000_000);

        Key::from("abc").observe();
        Key::from("12a").observe();
        assert_ne!(Key::generate(), seen);
    }

    #[test]
    fn test_key_serializes_as_plain_string() {
        let key = Key::from("abc");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"abc\"");
        assert_eq!(key.to_string(), "abc");
    }
}
