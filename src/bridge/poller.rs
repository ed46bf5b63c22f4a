//! Status cycle: probe, power status, connection flag

use super::names::{INFO_CONNECTION, INFO_POWER_STATUS, INFO_TRIGGER_STATUS};
use super::status::PowerStatus;
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info, warn};

impl super::Bridge {
    /// Run one status cycle, logging any failure
    pub async fn check_status(&self) {
        if let Err(e) = self.run_status_cycle().await {
            error!("Status cycle failed: {:#}", e);
        }
    }

    async fn run_status_cycle(&self) -> Result<()> {
        let seq = self.book.begin_cycle();

        let probe = match self.prober.probe(&self.host).await {
            Ok(result) => result,
            Err(e) => {
                error!(host = %self.host, "Reachability probe failed: {}", e);
                None
            }
        };

        if let Some(result) = probe {
            if let Some(connected) = self.book.observe_connection(seq, result.alive) {
                info!(connected, "Connection state changed");
                self.publish(INFO_CONNECTION, Value::Bool(connected)).await?;
            }
        }

        let device = match (&self.device, probe) {
            (Some(device), Some(result)) if result.alive => device.clone(),
            _ => {
                debug!(seq, "Device not reachable");
                self.publish_power(seq, PowerStatus::ErrorPing).await?;
                return Ok(());
            }
        };

        let status = match device.power_status().await {
            Ok(Some(response)) => match response.status {
                Some(status) => PowerStatus::Reported(status),
                None => PowerStatus::ErrorStatus,
            },
            Ok(None) => PowerStatus::ErrorNoResponse,
            Err(e) => {
                debug!("Power status query failed: {}", e);
                PowerStatus::ErrorCon
            }
        };

        let reported = matches!(status, PowerStatus::Reported(_));
        let resets_trigger = reported || status == PowerStatus::ErrorStatus;

        let Some(transition) = self.publish_power(seq, status).await? else {
            return Ok(());
        };

        if resets_trigger {
            self.reset_trigger_flag(INFO_TRIGGER_STATUS).await;
        }

        if reported && (transition.changed || self.book.can_refresh()) {
            self.refresh_volume().await;
        }

        Ok(())
    }

    /// Apply a power observation and publish it
    ///
    /// Returns `None` without publishing when a later cycle already applied its result.
    async fn publish_power(
        &self,
        seq: u64,
        status: PowerStatus,
    ) -> Result<Option<super::PowerTransition>> {
        let value = Value::String(status.as_str().to_string());
        let Some(transition) = self.book.observe_power(seq, status) else {
            return Ok(None);
        };

        if transition.changed {
            info!(status = %value, "Power status changed");
        }
        self.publish(INFO_POWER_STATUS, value).await?;
        Ok(Some(transition))
    }

    /// Clear a self-resetting trigger flag if it is unset or set
    pub(crate) async fn reset_trigger_flag(&self, name: &str) {
        let id = self.names.id(name);
        let Some(entry) = self.store.get_state(&id).await else {
            return;
        };

        if entry.val.is_null() || entry.is_truthy() {
            if let Err(e) = self.publish(name, Value::Bool(false)).await {
                warn!(id = %id, "Cannot reset trigger flag: {:#}", e);
            }
        }
    }
}
