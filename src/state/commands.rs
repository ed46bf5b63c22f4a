//! Command enum for the state store actor
//!
//! Writes are fire-and-forget unless the caller asks for a confirmation
//! channel; queries always answer through a oneshot channel.

use super::types::StateEntry;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Commands for the StateActor
#[derive(Debug)]
pub enum StateCommand {
    /// Write a value
    ///
    /// `confirm` is answered once the value is stored and broadcast.
    SetState {
        id: String,
        val: Value,
        ack: bool,
        confirm: Option<oneshot::Sender<()>>,
    },

    /// Read a single value
    GetState {
        id: String,
        response: oneshot::Sender<Option<StateEntry>>,
    },

    /// Snapshot of every stored value
    ListStates {
        response: oneshot::Sender<HashMap<String, StateEntry>>,
    },

    /// Seed values that do not exist yet (acknowledged, no overwrite)
    ///
    /// Answers with the number of states created.
    EnsureDefaults {
        defaults: Vec<(String, Value)>,
        response: oneshot::Sender<usize>,
    },

    /// Stop the actor
    Shutdown,
}
