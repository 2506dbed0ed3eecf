//! Per-key validation of incoming setting values.
//!
//! # Design Decisions
//! - Known keys are coerced to the canonical text the store keeps
//! - Unknown keys pass through unchanged, the key space is open
//! - Callers collect every failure instead of stopping at the first

use std::collections::BTreeMap;

use serde_json::Value;

use super::registry;

/// A value that cannot be coerced to its field's declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}: {reason}")]
pub struct ValidationError {
    pub key: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Text form of a value for a key with no declared field.
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Validate one value against its field, if `key` names one.
pub fn validate_one(key: &str, value: &Value) -> Result<String, ValidationError> {
    match registry::lookup(key) {
        Some(spec) => spec
            .kind
            .coerce(value)
            .map_err(|reason| ValidationError::new(key, reason)),
        None => Ok(raw_text(value)),
    }
}

/// Validate a batch, returning either every canonical value or every failure.
pub fn validate_all(
    updates: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, String>, BTreeMap<String, String>> {
    validate_all_with(updates, |_, _| Ok(()))
}

/// Like `validate_all`, with an extra check on each canonical pair.
///
/// Failures of `storable` land in the same error map as type failures.
pub fn validate_all_with(
    updates: &BTreeMap<String, Value>,
    storable: impl Fn(&str, &str) -> Result<(), String>,
) -> Result<BTreeMap<String, String>, BTreeMap<String, String>> {
    let mut validated = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for (key, value) in updates {
        match validate_one(key, value).and_then(|canonical| {
            storable(key, &canonical)
                .map(|()| canonical)
                .map_err(|reason| ValidationError::new(key.as_str(), reason))
        }) {
            Ok(canonical) => {
                validated.insert(key.clone(), canonical);
            }
            Err(e) => {
                errors.insert(e.key, e.reason);
            }
        }
    }
    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(errors)
    }
}
