//! Volume/input refresh: sound target hint plus per-target volume and mute

use super::names::{
    AUDIO_MUTE, AUDIO_MUTE_HEADPHONE, AUDIO_MUTE_SPEAKER, AUDIO_TARGET, AUDIO_VOLUME,
    AUDIO_VOLUME_HEADPHONE, AUDIO_VOLUME_SPEAKER,
};
use crate::device::VolumeRecord;
use anyhow::{Context, Result};
use serde_json::{Number, Value};
use tracing::{debug, error, trace, warn};

/// Volume as a 0-100 percentage
///
/// Rescales `(raw - min) * 100 / (max - min)` only when both bounds are
/// reported, `max != 100`, `min != 0` and `max > min`. Otherwise the raw
/// value is returned as-is. No clamping.
pub fn normalize_volume(record: &VolumeRecord) -> f64 {
    match (record.min_volume, record.max_volume) {
        (Some(min), Some(max)) if max != 100.0 && min != 0.0 && max > min => {
            (record.volume - min) * 100.0 / (max - min)
        }
        _ => record.volume,
    }
}

fn is_speaker(target: &str) -> bool {
    target.contains("speaker")
}

fn is_headphone(target: &str) -> bool {
    target.contains("headphone")
}

/// JSON number for a volume, integral values stay integers
fn volume_value(volume: f64) -> Value {
    if volume.fract() == 0.0 && volume.abs() < i64::MAX as f64 {
        Value::from(volume as i64)
    } else {
        Number::from_f64(volume).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// State writes derived from one volume record
///
/// `hint` is the television's default audio output ("speaker", "headphone", ...).
/// Returns relative state names in publish order.
pub fn plan_volume_updates(record: &VolumeRecord, hint: Option<&str>) -> Vec<(&'static str, Value)> {
    let target = record.target.as_deref().filter(|t| !t.is_empty());
    let hint = hint.filter(|h| !h.is_empty());

    let volume = volume_value(normalize_volume(record));
    let mute = Value::Bool(record.mute);
    let mut updates = Vec::with_capacity(7);

    if target.map_or(true, is_speaker) {
        updates.push((AUDIO_VOLUME_SPEAKER, volume.clone()));
        updates.push((AUDIO_MUTE_SPEAKER, mute.clone()));
    }

    // Headphone volume can be read but not set through the API
    if target.map_or(true, is_headphone) {
        updates.push((AUDIO_VOLUME_HEADPHONE, volume.clone()));
        updates.push((AUDIO_MUTE_HEADPHONE, mute.clone()));
    }

    let generic = match (target, hint) {
        (Some(target), Some(hint)) => is_headphone(target) == is_headphone(hint),
        _ => true,
    };
    if generic {
        updates.push((AUDIO_VOLUME, volume));
        updates.push((AUDIO_MUTE, mute));
    }

    let shown_target = hint
        .or(record.target.as_deref())
        .map_or(Value::Null, |t| Value::String(t.to_string()));
    updates.push((AUDIO_TARGET, shown_target));

    updates
}

impl super::Bridge {
    /// Refresh volume, mute and audio target, logging any failure
    ///
    /// No-op unless a device is configured and the last power status is "active".
    pub async fn refresh_volume(&self) {
        if let Err(e) = self.run_volume_cycle().await {
            error!("Volume refresh failed: {:#}", e);
        }
    }

    async fn run_volume_cycle(&self) -> Result<()> {
        let device = match &self.device {
            Some(device) if self.book.can_refresh() => device.clone(),
            _ => {
                debug!(power = %self.book.power(), "Skipping volume refresh, device not active");
                return Ok(());
            }
        };

        let hint = match device.sound_target().await {
            Ok(hint) => hint.filter(|h| !h.is_empty()),
            Err(e) => {
                warn!("Sound target query failed: {}", e);
                None
            }
        };
        trace!(?hint, "Sound target hint");

        let records = device
            .volume_information()
            .await
            .context("volume information query failed")?
            .into_records();

        for record in &records {
            trace!(?record, "Volume record");
            for (name, val) in plan_volume_updates(record, hint.as_deref()) {
                self.publish(name, val)
                    .await
                    .with_context(|| format!("cannot publish {}", name))?;
            }
        }

        debug!(records = records.len(), "Volume refresh done");
        Ok(())
    }
}
