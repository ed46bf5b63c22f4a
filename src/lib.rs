//! Bravia Bridge - Sony Bravia television status mirror
//!
//! Polls a Bravia TV over its local REST/JSON-RPC API, mirrors power, volume,
//! mute and audio target into a state store, and forwards user writes as
//! remote control commands.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod device;
pub mod probe;
pub mod state;

pub use bridge::Bridge;
pub use config::AppConfig;
