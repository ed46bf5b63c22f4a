//! User writes under the namespace: manual triggers and remote commands

use super::names::last_segment;
use super::Trigger;
use crate::state::{StateChange, StateEntry};
use tracing::{debug, trace, warn};

const TRIGGER_STATUS: &str = "triggerUpdateStatus";
const TRIGGER_VOLUME: &str = "triggerUpdateSpeakerAndVolumeStatus";
const POWER_STATUS: &str = "powerstatus";

/// What a user write asks the bridge to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    RefreshStatus,
    RefreshVolume,
    /// Read-only state or a falsy trigger write
    Ignore,
    /// Remote command named by the last id segment
    Send(String),
}

/// Classify a non-acknowledged write by the last segment of its id
pub fn classify(id: &str, entry: &StateEntry) -> Dispatch {
    match last_segment(id) {
        TRIGGER_STATUS if entry.is_truthy() => Dispatch::RefreshStatus,
        TRIGGER_VOLUME if entry.is_truthy() => Dispatch::RefreshVolume,
        TRIGGER_STATUS | TRIGGER_VOLUME | POWER_STATUS => Dispatch::Ignore,
        command => Dispatch::Send(command.to_string()),
    }
}

impl super::Bridge {
    /// Handle one change from the store's feed
    ///
    /// Acknowledged writes (including the bridge's own publishes) and ids
    /// outside the namespace are dropped.
    pub fn on_state_change(&self, change: StateChange) {
        if change.entry.ack || !self.names.owns(&change.id) {
            return;
        }

        debug!(id = %change.id, val = %change.entry.val, "User write");

        match classify(&change.id, &change.entry) {
            Dispatch::RefreshStatus => self.trigger(Trigger::Status),
            Dispatch::RefreshVolume => self.trigger(Trigger::Volume),
            Dispatch::Ignore => trace!(id = %change.id, "Write ignored"),
            Dispatch::Send(command) => self.spawn_send(command),
        }
    }

    fn spawn_send(&self, command: String) {
        let Some(device) = self.device.clone() else {
            warn!(command = %command, "No device configured, command dropped");
            return;
        };

        tokio::spawn(async move {
            match device.send(&command).await {
                Ok(()) => debug!(command = %command, "Command sent"),
                Err(e) => warn!(command = %command, "Command failed: {}", e),
            }
        });
    }
}
