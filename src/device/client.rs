//! HTTP client for the Bravia REST/JSON-RPC API
//!
//! Every call is a `POST /sony/{service}` with a JSON-RPC body and the
//! `X-Auth-PSK` header. Remote control commands go through the IRCC SOAP
//! endpoint using codes read from the TV's own code table.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, trace};

use super::{BraviaDevice, DeviceError, PowerStatusResponse, VolumeInfo};
use crate::config::DeviceConfig;

const PSK_HEADER: &str = "X-Auth-PSK";
const IRCC_SOAP_ACTION: &str = "\"urn:schemas-sony-com:service:IRCC:1#X_SendIRCC\"";

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Bravia JSON-RPC client
pub struct BraviaClient {
    base_url: String,
    psk: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    // Command name -> IRCC code, fetched on first send
    ircc_codes: RwLock<Option<HashMap<String, String>>>,
}

impl BraviaClient {
    /// Create a client for `http://{host}:{port}`
    pub fn new(host: &str, port: u16, psk: &str, timeout: Duration) -> Result<Self, DeviceError> {
        Self::with_base_url(format!("http://{}:{}", host, port), psk, timeout)
    }

    /// Create from config
    pub fn from_config(config: &DeviceConfig) -> Result<Self, DeviceError> {
        Self::new(config.ip.trim(), config.port, &config.psk, config.timeout())
    }

    /// Create a client for an explicit base URL (scheme, host and port)
    pub fn with_base_url(
        base_url: impl Into<String>,
        psk: &str,
        timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            psk: psk.to_string(),
            http,
            next_id: AtomicU64::new(1),
            ircc_codes: RwLock::new(None),
        })
    }

    /// Issue one JSON-RPC call and return its `result` member
    async fn call(&self, service: &str, method: &str, params: Value) -> Result<Value, DeviceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "method": method,
            "id": id,
            "params": params,
            "version": "1.0",
        });

        trace!(service, method, id, "Bravia request");

        let response = self
            .http
            .post(format!("{}/sony/{}", self.base_url, service))
            .header(PSK_HEADER, &self.psk)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        let envelope: RpcEnvelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(DeviceError::Http {
                    service: service.to_string(),
                    status: status.as_u16(),
                })
            }
            Err(e) => return Err(DeviceError::decode(method, e.to_string())),
        };

        if let Some(error) = envelope.error {
            return Err(rpc_error(method, &error));
        }
        if !status.is_success() {
            return Err(DeviceError::Http {
                service: service.to_string(),
                status: status.as_u16(),
            });
        }

        trace!(service, method, id, result = ?envelope.result, "Bravia response");
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    /// Resolve a command name to its IRCC code, loading the code table once
    async fn ircc_code(&self, command: &str) -> Result<String, DeviceError> {
        if let Some(codes) = self.ircc_codes.read().await.as_ref() {
            return codes
                .get(command)
                .cloned()
                .ok_or_else(|| DeviceError::UnknownCommand(command.to_string()));
        }

        let codes = self.fetch_remote_codes().await?;
        let code = codes.get(command).cloned();
        *self.ircc_codes.write().await = Some(codes);

        code.ok_or_else(|| DeviceError::UnknownCommand(command.to_string()))
    }

    /// Read the remote controller code table (`system/getRemoteControllerInfo`)
    ///
    /// The result is `[{bundled info}, [{"name": .., "value": ..}, ..]]`.
    async fn fetch_remote_codes(&self) -> Result<HashMap<String, String>, DeviceError> {
        const METHOD: &str = "getRemoteControllerInfo";

        let result = self.call("system", METHOD, json!([])).await?;
        let entries = result
            .as_array()
            .and_then(|items| items.iter().find_map(Value::as_array))
            .ok_or_else(|| DeviceError::decode(METHOD, "no code table in result"))?;

        let codes: HashMap<String, String> = entries
            .iter()
            .filter_map(|entry| {
                let name = entry.get("name")?.as_str()?;
                let value = entry.get("value")?.as_str()?;
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        debug!(count = codes.len(), "Loaded IRCC code table");
        Ok(codes)
    }
}

#[async_trait]
impl BraviaDevice for BraviaClient {
    async fn power_status(&self) -> Result<Option<PowerStatusResponse>, DeviceError> {
        const METHOD: &str = "getPowerStatus";

        let result = self.call("system", METHOD, json!([])).await?;
        match first_entry(result) {
            Some(entry) => serde_json::from_value(entry)
                .map(Some)
                .map_err(|e| DeviceError::decode(METHOD, e.to_string())),
            None => Ok(None),
        }
    }

    async fn sound_target(&self) -> Result<Option<String>, DeviceError> {
        let result = self
            .call(
                "audio",
                "getSoundSettings",
                json!([{ "target": "outputTerminal" }]),
            )
            .await?;

        let current = match first_entry(result) {
            Some(Value::Array(settings)) => settings
                .iter()
                .find_map(|s| s.get("currentValue").and_then(Value::as_str))
                .map(str::to_string),
            Some(setting) => setting
                .get("currentValue")
                .and_then(Value::as_str)
                .map(str::to_string),
            None => None,
        };

        Ok(current)
    }

    async fn volume_information(&self) -> Result<VolumeInfo, DeviceError> {
        const METHOD: &str = "getVolumeInformation";

        let result = self.call("audio", METHOD, json!([])).await?;
        let payload = volume_payload(result)
            .ok_or_else(|| DeviceError::decode(METHOD, "empty result"))?;

        serde_json::from_value(payload).map_err(|e| DeviceError::decode(METHOD, e.to_string()))
    }

    async fn send(&self, command: &str) -> Result<(), DeviceError> {
        let code = self.ircc_code(command).await?;

        let response = self
            .http
            .post(format!("{}/sony/IRCC", self.base_url))
            .header(PSK_HEADER, &self.psk)
            .header("SOAPACTION", IRCC_SOAP_ACTION)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=UTF-8")
            .body(ircc_envelope(&code))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Http {
                service: "IRCC".to_string(),
                status: status.as_u16(),
            });
        }

        info!(command, "IRCC command sent");
        Ok(())
    }
}

/// First element of a JSON-RPC `result` array, skipping null payloads
fn first_entry(result: Value) -> Option<Value> {
    match result {
        Value::Array(items) => items.into_iter().next().filter(|v| !v.is_null()),
        Value::Null => None,
        other => Some(other),
    }
}

/// Unwrap `[[records..]]`, `[record]` or `[record, record..]` into a decodable payload
fn volume_payload(result: Value) -> Option<Value> {
    match result {
        Value::Array(mut items) => {
            if items.len() == 1 || items.first().is_some_and(Value::is_array) {
                Some(items.swap_remove(0))
            } else if items.is_empty() {
                None
            } else {
                Some(Value::Array(items))
            }
        }
        Value::Null => None,
        other => Some(other),
    }
}

fn rpc_error(method: &str, error: &Value) -> DeviceError {
    let code = error.get(0).and_then(Value::as_i64).unwrap_or(-1);
    let message = error
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    DeviceError::Rpc {
        method: method.to_string(),
        code,
        message,
    }
}

fn ircc_envelope(code: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:X_SendIRCC xmlns:u="urn:schemas-sony-com:service:IRCC:1"><IRCCCode>{}</IRCCCode></u:X_SendIRCC></s:Body></s:Envelope>"#,
        code
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const PSK: &str = "0000";

    fn client_for(server: &Server) -> BraviaClient {
        BraviaClient::with_base_url(server.url(), PSK, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_power_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/sony/system")
            .match_header(PSK_HEADER, PSK)
            .match_body(Matcher::PartialJson(json!({
                "method": "getPowerStatus",
                "version": "1.0"
            })))
            .with_body(r#"{"result":[{"status":"active"}],"id":1}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.power_status().await.unwrap();

        assert_eq!(response, Some(PowerStatusResponse::new("active")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_power_status_empty_result_is_no_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_body(r#"{"result":[],"id":1}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.power_status().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_power_status_missing_field() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_body(r#"{"result":[{}],"id":1}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.power_status().await.unwrap().unwrap();
        assert_eq!(response.status, None);
    }

    #[tokio::test]
    async fn test_power_status_non_string_field() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_body(r#"{"result":[{"status":1}],"id":1}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.power_status().await.unwrap().unwrap();
        assert_eq!(response.status, None);
    }

    #[tokio::test]
    async fn test_rpc_error_envelope() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/system")
            .with_status(403)
            .with_body(r#"{"error":[403,"Forbidden"],"id":1}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.power_status().await.unwrap_err();

        match &err {
            DeviceError::Rpc { method, code, message } => {
                assert_eq!(method, "getPowerStatus");
                assert_eq!(*code, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_http_error_without_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/audio")
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.volume_information().await.unwrap_err();
        assert!(matches!(err, DeviceError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_volume_information_nested_list() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/audio")
            .match_body(Matcher::PartialJson(json!({"method": "getVolumeInformation"})))
            .with_body(
                r#"{"result":[[
                    {"target":"speaker","volume":18,"mute":false,"maxVolume":100,"minVolume":0},
                    {"target":"headphone","volume":5,"mute":false,"maxVolume":100,"minVolume":0}
                ]],"id":3}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let records = client.volume_information().await.unwrap().into_records();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target.as_deref(), Some("speaker"));
        assert_eq!(records[0].volume, 18.0);
        assert_eq!(records[1].target.as_deref(), Some("headphone"));
    }

    #[tokio::test]
    async fn test_volume_information_single_record() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/audio")
            .with_body(r#"{"result":[{"target":"","volume":40,"mute":true}],"id":3}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let info = client.volume_information().await.unwrap();
        assert!(matches!(info, VolumeInfo::One(_)));

        let records = info.into_records();
        assert_eq!(records[0].volume, 40.0);
        assert!(records[0].mute);
    }

    #[tokio::test]
    async fn test_sound_target() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/sony/audio")
            .match_body(Matcher::PartialJson(json!({
                "method": "getSoundSettings",
                "params": [{"target": "outputTerminal"}]
            })))
            .with_body(
                r#"{"result":[[{"target":"outputTerminal","currentValue":"headphone"}]],"id":2}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.sound_target().await.unwrap().as_deref(),
            Some("headphone")
        );
    }

    #[tokio::test]
    async fn test_send_resolves_ircc_code_once() {
        let mut server = Server::new_async().await;
        let codes = server
            .mock("POST", "/sony/system")
            .match_body(Matcher::PartialJson(json!({"method": "getRemoteControllerInfo"})))
            .with_body(
                r#"{"result":[{"bundled":true,"type":"RM-J1100"},[
                    {"name":"VolumeUp","value":"AAAAAQAAAAEAAAASAw=="},
                    {"name":"PowerOff","value":"AAAAAQAAAAEAAAAvAw=="}
                ]],"id":1}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let ircc = server
            .mock("POST", "/sony/IRCC")
            .match_header(PSK_HEADER, PSK)
            .match_header("SOAPACTION", IRCC_SOAP_ACTION)
            .match_body(Matcher::Regex("AAAAAQAAAAEAAAASAw==".to_string()))
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        client.send("VolumeUp").await.unwrap();
        client.send("VolumeUp").await.unwrap();

        let err = client.send("SelfDestruct").await.unwrap_err();
        assert!(matches!(err, DeviceError::UnknownCommand(ref name) if name == "SelfDestruct"));

        codes.assert_async().await;
        ircc.assert_async().await;
    }

    #[test]
    fn test_volume_payload_shapes() {
        assert_eq!(volume_payload(json!([[1, 2]])), Some(json!([1, 2])));
        assert_eq!(volume_payload(json!([{"a": 1}])), Some(json!({"a": 1})));
        assert_eq!(
            volume_payload(json!([{"a": 1}, {"a": 2}])),
            Some(json!([{"a": 1}, {"a": 2}]))
        );
        assert_eq!(volume_payload(json!([])), None);
        assert_eq!(volume_payload(Value::Null), None);
    }

    #[test]
    fn test_first_entry_skips_null() {
        assert_eq!(first_entry(json!([null])), None);
        assert_eq!(first_entry(json!([{"status": "standby"}])), Some(json!({"status": "standby"})));
    }
}
