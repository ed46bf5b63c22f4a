//! Bravia API payload types

use serde::{Deserialize, Deserializer, Serialize};

/// Result entry of `system/getPowerStatus`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PowerStatusResponse {
    /// "active" or "standby" on every known firmware
    ///
    /// A non-string status decodes as `None`.
    #[serde(default, deserialize_with = "string_or_none")]
    pub status: Option<String>,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_string)))
}

impl PowerStatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
        }
    }
}

/// One audio target entry of `audio/getVolumeInformation`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRecord {
    /// "speaker", "headphone", ... or empty on single-target firmware
    #[serde(default)]
    pub target: Option<String>,
    /// Raw volume in device units
    pub volume: f64,
    #[serde(default)]
    pub mute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<f64>,
}

impl VolumeRecord {
    pub fn new(target: Option<&str>, volume: f64, mute: bool) -> Self {
        Self {
            target: target.map(str::to_string),
            volume,
            mute,
            min_volume: None,
            max_volume: None,
        }
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_volume = Some(min);
        self.max_volume = Some(max);
        self
    }
}

/// Volume information: most firmware returns a list, some a single record
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VolumeInfo {
    Many(Vec<VolumeRecord>),
    One(VolumeRecord),
}

impl VolumeInfo {
    pub fn into_records(self) -> Vec<VolumeRecord> {
        match self {
            VolumeInfo::Many(records) => records,
            VolumeInfo::One(record) => vec![record],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_volume_info_accepts_list_and_single() {
        let many: VolumeInfo = serde_json::from_value(json!([
            {"target": "speaker", "volume": 12, "mute": false, "minVolume": 0, "maxVolume": 100},
            {"target": "headphone", "volume": 30, "mute": true, "minVolume": 0, "maxVolume": 100}
        ]))
        .unwrap();
        let records = many.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].target.as_deref(), Some("headphone"));
        assert!(records[1].mute);

        let one: VolumeInfo =
            serde_json::from_value(json!({"target": "", "volume": 7, "mute": false})).unwrap();
        let records = one.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].volume, 7.0);
        assert_eq!(records[0].min_volume, None);
    }

    #[test]
    fn test_volume_record_requires_volume() {
        let result = serde_json::from_value::<VolumeInfo>(json!({"target": "speaker"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_power_status_without_field() {
        let response: PowerStatusResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.status, None);
    }

    #[test]
    fn test_power_status_with_non_string_field() {
        for status in [json!(1), json!(true), json!(null), json!({"on": true})] {
            let response: PowerStatusResponse =
                serde_json::from_value(json!({ "status": status })).unwrap();
            assert_eq!(response.status, None);
        }

        let response: PowerStatusResponse =
            serde_json::from_value(json!({"status": "standby"})).unwrap();
        assert_eq!(response.status.as_deref(), Some("standby"));
    }
}
