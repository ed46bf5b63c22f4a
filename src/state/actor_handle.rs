//! StateActorHandle - Public API for the StateActor
//!
//! Provides an ergonomic async interface for interacting with the StateActor
//! through message passing. Fire-and-forget methods for plain writes, and
//! async methods with oneshot channels for queries and confirmed writes.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::StateCommand;
use super::types::{StateChange, StateEntry};

/// Handle for interacting with the StateActor
///
/// # Fire-and-forget
/// - `set_state` - Write a value
/// - `shutdown` - Stop the actor
///
/// # Async with response
/// - `set_state_confirmed` - Write and wait until stored and broadcast
/// - `get_state` - Read a value
/// - `list_states` - Snapshot of all values
/// - `ensure_defaults` - Seed missing values
///
/// # Change feed
/// - `subscribe` - Receive every write as a [`StateChange`]
#[derive(Clone)]
pub struct StateActorHandle {
    /// Command channel to the StateActor
    cmd_tx: mpsc::UnboundedSender<StateCommand>,
    /// Kept to create new change feed receivers
    change_tx: broadcast::Sender<StateChange>,
}

impl StateActorHandle {
    /// Create a new StateActorHandle from the actor's channels
    pub fn new(
        cmd_tx: mpsc::UnboundedSender<StateCommand>,
        change_tx: broadcast::Sender<StateChange>,
    ) -> Self {
        Self { cmd_tx, change_tx }
    }

    /// Spawn a new StateActor and return a handle
    ///
    /// This is a convenience wrapper around `StateActor::spawn`.
    pub fn spawn() -> Self {
        super::actor::StateActor::spawn()
    }

    /// Write a value without waiting for it to be applied
    pub fn set_state(&self, id: impl Into<String>, val: Value, ack: bool) {
        let _ = self.cmd_tx.send(StateCommand::SetState {
            id: id.into(),
            val,
            ack,
            confirm: None,
        });
    }

    /// Write a value and wait until the actor has stored and broadcast it
    pub async fn set_state_confirmed(
        &self,
        id: impl Into<String>,
        val: Value,
        ack: bool,
    ) -> Result<()> {
        let id = id.into();
        let (confirm_tx, confirm_rx) = oneshot::channel();
        let cmd = StateCommand::SetState {
            id: id.clone(),
            val,
            ack,
            confirm: Some(confirm_tx),
        };

        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow!("state store is closed (writing {})", id))?;

        confirm_rx
            .await
            .map_err(|_| anyhow!("state store dropped write of {}", id))
    }

    /// Read a value
    ///
    /// Returns None if the state does not exist or the actor is gone.
    pub async fn get_state(&self, id: &str) -> Option<StateEntry> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = StateCommand::GetState {
            id: id.to_string(),
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return None;
        }

        response_rx.await.ok().flatten()
    }

    /// Snapshot of every stored value
    pub async fn list_states(&self) -> HashMap<String, StateEntry> {
        let (response_tx, response_rx) = oneshot::channel();

        if self
            .cmd_tx
            .send(StateCommand::ListStates {
                response: response_tx,
            })
            .is_err()
        {
            return HashMap::new();
        }

        response_rx.await.unwrap_or_default()
    }

    /// Create the given states if they do not exist yet
    ///
    /// Returns the number of states created.
    pub async fn ensure_defaults(&self, defaults: Vec<(String, Value)>) -> Result<usize> {
        let (response_tx, response_rx) = oneshot::channel();

        self.cmd_tx
            .send(StateCommand::EnsureDefaults {
                defaults,
                response: response_tx,
            })
            .map_err(|_| anyhow!("state store is closed"))?;

        response_rx
            .await
            .map_err(|_| anyhow!("state store dropped default seeding"))
    }

    /// Subscribe to every subsequent write
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.change_tx.subscribe()
    }

    /// Ask the actor to stop
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(StateCommand::Shutdown);
    }

    /// Whether the actor is still receiving commands
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<StateActorHandle>();
    }

    #[tokio::test]
    async fn test_is_alive_when_channel_open() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (change_tx, _) = broadcast::channel(4);
        let handle = StateActorHandle::new(tx, change_tx);
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn test_is_alive_when_channel_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (change_tx, _) = broadcast::channel(4);
        drop(rx); // Close the receiver
        let handle = StateActorHandle::new(tx, change_tx);
        assert!(!handle.is_alive());
        assert!(handle.get_state("any").await.is_none());
        assert!(handle.list_states().await.is_empty());
    }
}
