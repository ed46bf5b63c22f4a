//! Connection and power status bookkeeping
//!
//! Status cycles may overlap: a timer tick can start a new cycle before the
//! previous one's device calls resolve. Each cycle takes a sequence number
//! when it starts, and an observation is only applied if no later cycle has
//! applied one already (last-writer-wins on cycle start order).

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Power status string reported by a television that is on
pub const POWER_ACTIVE: &str = "active";

/// Last known power status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PowerStatus {
    /// Nothing observed yet (published as "")
    #[default]
    Unknown,
    /// Status string reported by the device ("active", "standby", ...)
    Reported(String),
    /// Device answered without a status field
    ErrorStatus,
    /// Device answered without any payload
    ErrorNoResponse,
    /// Power status call failed
    ErrorCon,
    /// Device not reachable
    ErrorPing,
}

impl PowerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PowerStatus::Unknown => "",
            PowerStatus::Reported(status) => status,
            PowerStatus::ErrorStatus => "errorstatus",
            PowerStatus::ErrorNoResponse => "errornoresponse",
            PowerStatus::ErrorCon => "errorcon",
            PowerStatus::ErrorPing => "errorping",
        }
    }

    /// Whether the device reported exactly the active status
    pub fn is_active(&self) -> bool {
        matches!(self, PowerStatus::Reported(status) if status == POWER_ACTIVE)
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying a power observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTransition {
    /// The status differs from the previously applied one
    pub changed: bool,
}

#[derive(Debug, Default)]
struct Book {
    connected: Option<bool>,
    power: PowerStatus,
    applied_seq: u64,
}

/// Shared connection/power state of the bridge
#[derive(Debug, Default)]
pub struct ConnectionBook {
    next_seq: AtomicU64,
    inner: Mutex<Book>,
}

impl ConnectionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cycle and return its sequence number (starting at 1)
    pub fn begin_cycle(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply a reachability observation
    ///
    /// Returns the value to publish when the connection state changed,
    /// `None` when it is unchanged or the observation is stale.
    pub fn observe_connection(&self, seq: u64, alive: bool) -> Option<bool> {
        let mut book = self.inner.lock();
        if seq < book.applied_seq {
            debug!(seq, applied = book.applied_seq, "Discarding stale connection observation");
            return None;
        }
        book.applied_seq = seq;

        if book.connected == Some(alive) {
            return None;
        }
        book.connected = Some(alive);
        Some(alive)
    }

    /// Apply a power observation
    ///
    /// Returns `None` when a later cycle has already applied its observation.
    pub fn observe_power(&self, seq: u64, status: PowerStatus) -> Option<PowerTransition> {
        let mut book = self.inner.lock();
        if seq < book.applied_seq {
            debug!(seq, applied = book.applied_seq, %status, "Discarding stale power observation");
            return None;
        }
        book.applied_seq = seq;

        let changed = book.power != status;
        book.power = status;
        Some(PowerTransition { changed })
    }

    pub fn power(&self) -> PowerStatus {
        self.inner.lock().power.clone()
    }

    pub fn connected(&self) -> Option<bool> {
        self.inner.lock().connected
    }

    /// Whether a volume/input refresh may run right now
    pub fn can_refresh(&self) -> bool {
        self.inner.lock().power.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(s: &str) -> PowerStatus {
        PowerStatus::Reported(s.to_string())
    }

    #[test]
    fn test_power_status_strings() {
        assert_eq!(PowerStatus::Unknown.as_str(), "");
        assert_eq!(reported("standby").as_str(), "standby");
        assert_eq!(PowerStatus::ErrorStatus.as_str(), "errorstatus");
        assert_eq!(PowerStatus::ErrorNoResponse.as_str(), "errornoresponse");
        assert_eq!(PowerStatus::ErrorCon.as_str(), "errorcon");
        assert_eq!(PowerStatus::ErrorPing.to_string(), "errorping");
    }

    #[test]
    fn test_only_exact_active_is_active() {
        assert!(reported("active").is_active());
        assert!(!reported("Active").is_active());
        assert!(!reported("standby").is_active());
        assert!(!PowerStatus::ErrorCon.is_active());
    }

    #[test]
    fn test_connection_is_edge_triggered() {
        let book = ConnectionBook::new();

        let seq = book.begin_cycle();
        assert_eq!(book.observe_connection(seq, true), Some(true));

        let seq = book.begin_cycle();
        assert_eq!(book.observe_connection(seq, true), None);

        let seq = book.begin_cycle();
        assert_eq!(book.observe_connection(seq, false), Some(false));
        assert_eq!(book.connected(), Some(false));
    }

    #[test]
    fn test_power_transition() {
        let book = ConnectionBook::new();
        assert_eq!(book.power(), PowerStatus::Unknown);

        let seq = book.begin_cycle();
        let t = book.observe_power(seq, reported("standby")).unwrap();
        assert!(t.changed);
        assert!(!book.can_refresh());

        let seq = book.begin_cycle();
        let t = book.observe_power(seq, reported("active")).unwrap();
        assert!(t.changed);
        assert!(book.can_refresh());

        let seq = book.begin_cycle();
        let t = book.observe_power(seq, reported("active")).unwrap();
        assert!(!t.changed);
        assert!(book.can_refresh());
    }

    #[test]
    fn test_stale_cycle_is_discarded() {
        let book = ConnectionBook::new();

        let slow = book.begin_cycle();
        let fast = book.begin_cycle();
        assert!(fast > slow);

        // The later cycle lands first
        assert!(book.observe_connection(fast, true).is_some());
        assert!(book.observe_power(fast, reported("active")).is_some());

        // The earlier cycle resolves afterwards and must not overwrite
        assert_eq!(book.observe_connection(slow, false), None);
        assert_eq!(book.observe_power(slow, PowerStatus::ErrorCon), None);

        assert_eq!(book.connected(), Some(true));
        assert_eq!(book.power(), reported("active"));
    }

    #[test]
    fn test_same_cycle_applies_connection_then_power() {
        let book = ConnectionBook::new();
        let seq = book.begin_cycle();

        assert!(book.observe_connection(seq, true).is_some());
        assert!(book.observe_power(seq, reported("standby")).is_some());
    }
}
