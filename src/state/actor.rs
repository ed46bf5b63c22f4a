//! StateActor - Actor-based state store
//!
//! All state lives in a single task that processes commands sequentially:
//! - No locks around the state map
//! - Every write is broadcast to subscribers in the order it was applied
//! - Writers that need the "publish completion" await a oneshot confirmation

use super::actor_handle::StateActorHandle;
use super::commands::StateCommand;
use super::types::{StateChange, StateEntry};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};

/// Capacity of the change feed; slow subscribers see `Lagged` past this
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Actor responsible for all state values
///
/// ```text
/// ┌────────────────────────────────────────────┐
/// │                 StateActor                 │
/// │  states: HashMap<String, StateEntry>       │
/// │                    ▲                       │
/// │                    │ commands              │
/// │        command_rx (UnboundedReceiver)      │
/// │                    │                       │
/// │                    ▼ every write           │
/// │        change_tx (broadcast::Sender)       │
/// └────────────────────────────────────────────┘
/// ```
pub struct StateActor {
    /// Key: full state id
    states: HashMap<String, StateEntry>,

    /// Receiver for incoming commands
    command_rx: mpsc::UnboundedReceiver<StateCommand>,

    /// Change feed for subscribers
    change_tx: broadcast::Sender<StateChange>,

    /// Counter for tracking total writes processed
    update_count: u64,
}

impl StateActor {
    /// Spawn a new StateActor and return a handle for interacting with it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> StateActorHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (change_tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        let actor = StateActor {
            states: HashMap::new(),
            command_rx: cmd_rx,
            change_tx: change_tx.clone(),
            update_count: 0,
        };

        tokio::spawn(actor.run());

        debug!("StateActor spawned");

        StateActorHandle::new(cmd_tx, change_tx)
    }

    /// Main run loop, exits on `Shutdown` or when every handle is dropped
    async fn run(mut self) {
        debug!("StateActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                StateCommand::SetState {
                    id,
                    val,
                    ack,
                    confirm,
                } => {
                    self.handle_set_state(id, val, ack);
                    if let Some(confirm) = confirm {
                        let _ = confirm.send(());
                    }
                }
                StateCommand::GetState { id, response } => {
                    let _ = response.send(self.states.get(&id).cloned());
                }
                StateCommand::ListStates { response } => {
                    let _ = response.send(self.states.clone());
                }
                StateCommand::EnsureDefaults { defaults, response } => {
                    let created = self.handle_ensure_defaults(defaults);
                    let _ = response.send(created);
                }
                StateCommand::Shutdown => {
                    debug!("StateActor received shutdown command");
                    break;
                }
            }
        }

        info!(
            update_count = self.update_count,
            "StateActor run loop terminated"
        );
    }

    /// Store a value and broadcast the change
    fn handle_set_state(&mut self, id: String, val: Value, ack: bool) {
        let entry = StateEntry::new(val, ack);
        self.states.insert(id.clone(), entry.clone());
        self.update_count += 1;

        trace!(id = %id, val = %entry.val, ack, "State updated");

        // No subscribers is not an error
        let _ = self.change_tx.send(StateChange { id, entry });
    }

    fn handle_ensure_defaults(&mut self, defaults: Vec<(String, Value)>) -> usize {
        let mut created = 0;
        for (id, val) in defaults {
            if self.states.contains_key(&id) {
                continue;
            }
            self.handle_set_state(id, val, true);
            created += 1;
        }
        debug!(created, "Default states ensured");
        created
    }
}
