// ── Runtime bridge configuration ──
//
// These types describe *where* the reader and the lap API live and how
// sightings are debounced. They carry the bearer token but never touch
// disk. The binary builds a `BridgeConfig` (via `lapbridge-config`) and
// hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

/// Default minimum gap between two forwarded sightings of one tag.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(30);

/// Default keepalive interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Network location of the reader module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderEndpoint {
    pub host: String,
    pub port: u16,
    /// How long a single request to the reader may take.
    pub request_timeout: Duration,
}

impl Default for ReaderEndpoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4333,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Display for ReaderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Which earlier moment the debounce window is measured from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DebounceMode {
    /// Elapsed time since the previous sighting, forwarded or not.
    #[default]
    LastSighting,
    /// Elapsed time since the previous forwarded sighting (or first sighting
    /// if nothing has been forwarded for the tag yet).
    LastForwarded,
}

/// Debounce policy applied to every repeat sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    pub threshold: Duration,
    pub mode: DebounceMode,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DEBOUNCE,
            mode: DebounceMode::default(),
        }
    }
}

/// TLS verification strategy for the lap API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed timing servers).
    DangerAcceptInvalid,
}

/// Where lap events and pings are sent.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API base URL (e.g., `http://192.168.1.17`).
    pub url: Url,
    /// Static bearer token.
    pub token: SecretString,
    /// Lap-event endpoint path, relative to `url`.
    pub lap_path: String,
    /// Ping endpoint path, relative to `url`.
    pub ping_path: String,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Everything the bridge needs at runtime.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub reader: ReaderEndpoint,
    pub api: ApiConfig,
    pub debounce: DebounceConfig,
    /// Keepalive interval. Zero disables the ping task.
    pub ping_interval: Duration,
    /// Start streaming as soon as the reader reports connected.
    pub auto_start_stream: bool,
}
