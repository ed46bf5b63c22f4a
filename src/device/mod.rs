//! Sony Bravia device access
//!
//! The bridge talks to the television only through the [`BraviaDevice`] trait.
//! [`BraviaClient`] is the HTTP implementation of Sony's REST/JSON-RPC API; tests
//! plug in scripted implementations instead.

use async_trait::async_trait;

mod client;
mod error;
mod types;

pub use client::BraviaClient;
pub use error::DeviceError;
pub use types::{PowerStatusResponse, VolumeInfo, VolumeRecord};

/// Operations the bridge needs from the television
///
/// Note: All methods take &self to support `Arc<dyn BraviaDevice>`.
/// Implementations use interior mutability for any cached state.
#[async_trait]
pub trait BraviaDevice: Send + Sync {
    /// Query the power status (`system/getPowerStatus`)
    ///
    /// `Ok(None)` means the device answered without any payload.
    async fn power_status(&self) -> Result<Option<PowerStatusResponse>, DeviceError>;

    /// Query the configured default audio output, if the device reports one
    async fn sound_target(&self) -> Result<Option<String>, DeviceError>;

    /// Query volume and mute for every audio target
    async fn volume_information(&self) -> Result<VolumeInfo, DeviceError>;

    /// Send a named remote control command (e.g. "VolumeUp", "PowerOff")
    async fn send(&self, command: &str) -> Result<(), DeviceError>;
}
