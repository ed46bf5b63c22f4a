//! State store module
//!
//! Holds named state values with acknowledgement flags and broadcasts every
//! write. The bridge publishes device-reported values into it (ack = true)
//! and listens for user-requested writes (ack = false).

mod actor;
mod actor_handle;
mod commands;
mod types;

pub use actor::CHANGE_FEED_CAPACITY;
pub use actor_handle::StateActorHandle;
pub use types::{now_ms, StateChange, StateEntry};
