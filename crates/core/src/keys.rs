//! Store key layout for pending records and confirmation markers.

use crate::error::{DomainError, DomainResult};

const CALLBACK_SEGMENT: &str = "callback-api:";
const MARKER_SEGMENT: &str = "log-worker:";

/// Default prefix shared by every key this worker reads or writes.
pub const DEFAULT_KEY_PREFIX: &str = "tmvh-transaction-";

/// Key namespace of one deployment.
///
/// With prefix `tmvh-transaction-` pending records live under
/// `tmvh-transaction-callback-api:<ref>` and markers under
/// `tmvh-transaction-log-worker:<ref>`. The prefix carries its own separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    pub fn new(prefix: impl Into<String>) -> DomainResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(DomainError::validation("key prefix must not be empty"));
        }
        if prefix.contains(['*', '?', '[', ']']) {
            return Err(DomainError::validation(format!(
                "key prefix contains glob metacharacters: {prefix}"
            )));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scan pattern matching every pending record.
    pub fn pending_pattern(&self) -> String {
        format!("{}{}*", self.prefix, CALLBACK_SEGMENT)
    }

    pub fn pending_key(&self, reference: &str) -> String {
        format!("{}{}{}", self.prefix, CALLBACK_SEGMENT, reference)
    }

    pub fn marker_key(&self, tran_ref: &str) -> String {
        format!("{}{}{}", self.prefix, MARKER_SEGMENT, tran_ref)
    }
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}
