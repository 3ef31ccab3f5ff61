use folio_document::Key;
use serde::{Deserialize, Serialize};

/// A rule failure found by [`Schema::check`](super::Schema::check)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The rule that reported this violation
    pub rule: String,

    /// Node the rule matched
    pub key: Key,

    /// Human-readable message
    pub message: String,
}

impl Violation {
    pub fn new(rule: impl Into<String>, key: Key, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            key,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.rule, self.key, self.message)
    }
}
