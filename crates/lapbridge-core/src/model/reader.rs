// ── Reader connection types ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Capability metadata reported by the reader after connect.
///
/// The well-known fields are typed; anything else the module reports is
/// kept in `extra` so nothing is silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderInfo {
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hw_version: String,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub num_antennas: u32,
    #[serde(default)]
    pub max_antennas: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Status document: `{connected, lastError?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_omits_missing_error() {
        let status = ReaderStatus {
            connected: true,
            last_error: None,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({ "connected": true })
        );
    }

    #[test]
    fn status_carries_error() {
        let status = ReaderStatus {
            connected: false,
            last_error: Some("connection refused".into()),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({ "connected": false, "lastError": "connection refused" })
        );
    }

    #[test]
    fn reader_info_keeps_unknown_fields() {
        let info: ReaderInfo = serde_json::from_str(
            r#"{"serial":"NUR-001","name":"Sampo S2","numAntennas":4,"fccId":"XYZ"}"#,
        )
        .unwrap();
        assert_eq!(info.serial, "NUR-001");
        assert_eq!(info.num_antennas, 4);
        assert_eq!(info.extra["fccId"], "XYZ");
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
