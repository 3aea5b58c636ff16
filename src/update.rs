//! Field updates: targeted key/value changes applied to a loaded map.

use tracing::debug;

use crate::value::{ConfigMap, ConfigValue};

/// The flag value that unsets a key when its rule allows it.
pub const NULL_SENTINEL: &str = "null";

/// One requested change.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub key: String,
    pub value: ConfigValue,
}

impl FieldUpdate {
    pub fn new(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        FieldUpdate {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build an update from a raw command-line string.
    ///
    /// With `null_sentinel`, the exact string `null` becomes
    /// [`ConfigValue::Null`]; everything else is stored as a string.
    pub fn from_raw(key: impl Into<String>, raw: &str, null_sentinel: bool) -> Self {
        let value = if null_sentinel && raw == NULL_SENTINEL {
            ConfigValue::Null
        } else {
            ConfigValue::from(raw)
        };
        FieldUpdate::new(key, value)
    }
}

/// Apply `updates` in order and return the keys they touched.
///
/// Existing keys keep their position; new keys are appended. Each key is
/// reported once, in the order it was first updated.
pub fn apply_updates(map: &mut ConfigMap, updates: &[FieldUpdate]) -> Vec<String> {
    let mut changed: Vec<String> = Vec::new();
    for update in updates {
        let previous = map.insert(update.key.clone(), update.value.clone());
        debug!(
            key = %update.key,
            appended = previous.is_none(),
            "applied field update"
        );
        if !changed.contains(&update.key) {
            changed.push(update.key.clone());
        }
    }
    changed
}
