//! State value type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored state value with its acknowledgement flag
///
/// `ack = true` marks a value reported by the device; `ack = false` marks a
/// value requested by a user and not yet confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub val: Value,
    pub ack: bool,
    /// Timestamp of the write (milliseconds since epoch)
    pub ts: u64,
}

impl StateEntry {
    pub fn new(val: Value, ack: bool) -> Self {
        Self {
            val,
            ack,
            ts: now_ms(),
        }
    }

    /// Loose truthiness of the value (`false`, `0`, `""` and `null` are falsy)
    pub fn is_truthy(&self) -> bool {
        match &self.val {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// Notification emitted for every write to the store
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Full state id (e.g. "sony-bravia.0.info.powerstatus")
    pub id: String,
    pub entry: StateEntry,
}

/// Current timestamp in milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
