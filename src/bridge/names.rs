//! State names published and consumed by the bridge

pub const INFO_CONNECTION: &str = "info.connection";
pub const INFO_POWER_STATUS: &str = "info.powerstatus";
pub const INFO_TRIGGER_STATUS: &str = "info.triggerUpdateStatus";
pub const INFO_TRIGGER_VOLUME: &str = "info.triggerUpdateSpeakerAndVolumeStatus";

pub const AUDIO_VOLUME_SPEAKER: &str = "audio.volumeSpeaker";
pub const AUDIO_MUTE_SPEAKER: &str = "audio.muteSpeaker";
pub const AUDIO_VOLUME_HEADPHONE: &str = "audio.volumeHeadphone";
pub const AUDIO_MUTE_HEADPHONE: &str = "audio.muteHeadphone";
pub const AUDIO_VOLUME: &str = "audio.volume";
pub const AUDIO_MUTE: &str = "audio.mute";
pub const AUDIO_TARGET: &str = "audio.target";

/// Prefix that turns relative state names into full ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim().trim_end_matches('.').to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Full id for a relative name ("info.connection" -> "sony-bravia.0.info.connection")
    pub fn id(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }

    /// Whether a full id belongs to this namespace
    pub fn owns(&self, id: &str) -> bool {
        id.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('.'))
    }
}

/// Last dot-separated segment of an id
pub fn last_segment(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}
