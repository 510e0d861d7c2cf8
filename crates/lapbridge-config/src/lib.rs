//! Configuration for lapbridge.
//!
//! A TOML file (platform config dir, or an explicit path) layered over
//! built-in defaults and under `LAPBRIDGE_*` environment variables,
//! bearer-token resolution (env + keyring + plaintext), and translation to
//! `lapbridge_core::BridgeConfig`. The CLI adds flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use lapbridge_core::{
    ApiConfig, BridgeConfig, DebounceConfig, DebounceMode, ReaderEndpoint, TlsVerification,
};

/// Prefix of every environment override (`LAPBRIDGE_STREAM__DEBOUNCE_SECS`).
pub const ENV_PREFIX: &str = "LAPBRIDGE_";

/// Environment variable checked first for the bearer token.
pub const TOKEN_ENV: &str = "LAPBRIDGE_TOKEN";

/// Keyring service and account holding the bearer token.
pub const KEYRING_SERVICE: &str = "lapbridge";
pub const KEYRING_ACCOUNT: &str = "api-token";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured")]
    NoToken,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub reader: ReaderSection,

    #[serde(default)]
    pub api: ApiSection,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub ping: PingSection,
}

/// `[reader]`: where the reader module listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReaderSection {
    #[serde(default = "default_reader_host")]
    pub host: String,

    #[serde(default = "default_reader_port")]
    pub port: u16,

    /// Per-request timeout towards the reader.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            host: default_reader_host(),
            port: default_reader_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ReaderSection {
    /// Apply a `host` or `host:port` override.
    pub fn set_address(&mut self, address: &str) -> Result<(), ConfigError> {
        let address = address.trim();
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port
                    .parse()
                    .map_err(|_| invalid("reader", format!("bad port in '{address}'")))?;
                (host, Some(port))
            }
            // Bare IPv6 literals contain colons but no port.
            _ => (address, None),
        };
        if host.is_empty() {
            return Err(invalid("reader", "empty host"));
        }
        self.host = host.to_owned();
        if let Some(port) = port {
            self.port = port;
        }
        Ok(())
    }
}

fn default_reader_host() -> String {
    "127.0.0.1".into()
}
fn default_reader_port() -> u16 {
    4333
}
fn default_request_timeout() -> u64 {
    5
}

/// `[api]`: the lap-timing API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiSection {
    /// API base URL (e.g., "http://192.168.1.17").
    pub url: Option<String>,

    #[serde(default = "default_lap_path")]
    pub lap_path: String,

    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Bearer token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            url: None,
            lap_path: default_lap_path(),
            ping_path: default_ping_path(),
            token: None,
            token_env: None,
            insecure: false,
            ca_cert: None,
            timeout_secs: default_api_timeout(),
        }
    }
}

impl ApiSection {
    pub fn parsed_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| invalid("api.url", "not set"))?;
        let url: Url = raw
            .parse()
            .map_err(|e| invalid("api.url", format!("'{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("api.url", format!("unsupported scheme '{}'", url.scheme())));
        }
        Ok(url)
    }

    fn tls(&self) -> TlsVerification {
        if self.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        }
    }
}

fn default_lap_path() -> String {
    "/api/v1/tag".into()
}
fn default_ping_path() -> String {
    "/api/v1/ping".into()
}
fn default_api_timeout() -> u64 {
    10
}

/// `[stream]`: inventory stream and debounce policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StreamSection {
    /// Minimum seconds between two forwarded sightings of one tag.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    #[serde(default)]
    pub debounce_mode: DebounceMode,

    /// Start streaming as soon as the reader connects.
    #[serde(default)]
    pub auto_start: bool,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            debounce_mode: DebounceMode::default(),
            auto_start: false,
        }
    }
}

fn default_debounce_secs() -> u64 {
    30
}

/// `[ping]`: keepalive towards the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PingSection {
    /// Seconds between pings; 0 disables.
    #[serde(default = "default_ping_interval")]
    pub interval_secs: u64,
}

impl Default for PingSection {
    fn default() -> Self {
        Self {
            interval_secs: default_ping_interval(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

impl Config {
    /// Copy safe to print: the plaintext token is masked.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        if cfg.api.token.is_some() {
            cfg.api.token = Some("********".into());
        }
        cfg
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "lapbridge", "lapbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lapbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config: defaults ← TOML file ← environment.
///
/// `path` overrides the platform location. A missing file is not an
/// error; the defaults and environment still apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        // Only nested keys; flat names like LAPBRIDGE_TOKEN belong to the CLI.
        .merge(
            Env::prefixed(ENV_PREFIX)
                .filter(|key| key.as_str().contains("__"))
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the bearer token from the credential chain (no CLI flag step).
pub fn resolve_token(api: &ApiSection) -> Result<SecretString, ConfigError> {
    // 1. Well-known env var
    if let Some(val) = non_empty_env(TOKEN_ENV) {
        return Ok(SecretString::from(val));
    }

    // 2. Configured env var
    if let Some(val) = api.token_env.as_deref().and_then(non_empty_env) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(token) = api.token.as_ref().filter(|t| !t.is_empty()) {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoToken)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ── Runtime translation ─────────────────────────────────────────────

/// Build the runtime `BridgeConfig`.
pub fn to_bridge_config(cfg: &Config, token: SecretString) -> Result<BridgeConfig, ConfigError> {
    let url = cfg.api.parsed_url()?;

    if cfg.reader.request_timeout_secs == 0 {
        return Err(invalid("reader.request_timeout_secs", "must be positive"));
    }
    if cfg.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs", "must be positive"));
    }

    Ok(BridgeConfig {
        reader: reader_endpoint(&cfg.reader),
        api: ApiConfig {
            url,
            token,
            lap_path: cfg.api.lap_path.clone(),
            ping_path: cfg.api.ping_path.clone(),
            tls: cfg.api.tls(),
            timeout: Duration::from_secs(cfg.api.timeout_secs),
        },
        debounce: debounce_config(&cfg.stream),
        ping_interval: Duration::from_secs(cfg.ping.interval_secs),
        auto_start_stream: cfg.stream.auto_start,
    })
}

/// Reader location only; needs no API settings.
pub fn reader_endpoint(reader: &ReaderSection) -> ReaderEndpoint {
    ReaderEndpoint {
        host: reader.host.clone(),
        port: reader.port,
        request_timeout: Duration::from_secs(reader.request_timeout_secs),
    }
}

pub fn debounce_config(stream: &StreamSection) -> DebounceConfig {
    DebounceConfig {
        threshold: Duration::from_secs(stream.debounce_secs),
        mode: stream.debounce_mode,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_without_file() {
        Jail::expect_with(|_jail| {
            let cfg = load_config(Some(Path::new("missing.toml"))).unwrap();
            assert_eq!(cfg, Config::default());
            assert_eq!(cfg.reader.port, 4333);
            assert_eq!(cfg.stream.debounce_secs, 30);
            assert_eq!(cfg.ping.interval_secs, 30);
            assert_eq!(cfg.api.lap_path, "/api/v1/tag");
            Ok(())
        });
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lapbridge.toml",
                r#"
                [reader]
                host = "10.0.0.5"

                [api]
                url = "http://192.168.1.17"
                token = "from-file"

                [stream]
                debounce_secs = 20
                debounce_mode = "last-forwarded"
                "#,
            )?;
            jail.set_env("LAPBRIDGE_READER__PORT", "5000");
            jail.set_env("LAPBRIDGE_STREAM__DEBOUNCE_SECS", "45");

            let cfg = load_config(Some(Path::new("lapbridge.toml"))).unwrap();
            assert_eq!(cfg.reader.host, "10.0.0.5");
            assert_eq!(cfg.reader.port, 5000);
            assert_eq!(cfg.stream.debounce_secs, 45);
            assert_eq!(cfg.stream.debounce_mode, DebounceMode::LastForwarded);
            assert_eq!(cfg.api.url.as_deref(), Some("http://192.168.1.17"));
            Ok(())
        });
    }

    #[test]
    fn bad_value_is_a_figment_error() {
        Jail::expect_with(|jail| {
            jail.create_file("lapbridge.toml", "[stream]\ndebounce_mode = \"sometimes\"\n")?;
            let err = load_config(Some(Path::new("lapbridge.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::Figment(_)));
            Ok(())
        });
    }

    #[test]
    fn flat_env_names_are_not_config_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("LAPBRIDGE_READER", "10.0.0.9:4000");
            jail.set_env("LAPBRIDGE_OUTPUT", "yaml");
            jail.set_env(TOKEN_ENV, "t");
            let cfg = load_config(Some(Path::new("missing.toml"))).unwrap();
            assert_eq!(cfg.reader, ReaderSection::default());
            Ok(())
        });
    }

    #[test]
    fn token_env_wins_over_configured_sources() {
        Jail::expect_with(|jail| {
            jail.set_env(TOKEN_ENV, "from-env");
            jail.set_env("TIMING_TOKEN", "from-token-env");
            let api = ApiSection {
                token_env: Some("TIMING_TOKEN".into()),
                token: Some("plain".into()),
                ..ApiSection::default()
            };
            assert_eq!(resolve_token(&api).unwrap().expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn token_env_name_is_followed() {
        Jail::expect_with(|jail| {
            jail.set_env(TOKEN_ENV, "");
            jail.set_env("TIMING_TOKEN", "from-token-env");
            let api = ApiSection {
                token_env: Some("TIMING_TOKEN".into()),
                token: Some("plain".into()),
                ..ApiSection::default()
            };
            assert_eq!(resolve_token(&api).unwrap().expose_secret(), "from-token-env");
            Ok(())
        });
    }

    #[test]
    fn bridge_config_translation() {
        let mut cfg = Config::default();
        cfg.api.url = Some("https://timing.local/base/".into());
        cfg.api.insecure = true;
        cfg.stream.debounce_secs = 12;
        cfg.ping.interval_secs = 0;

        let bridge = to_bridge_config(&cfg, SecretString::from("t".to_string())).unwrap();
        assert_eq!(bridge.reader.to_string(), "127.0.0.1:4333");
        assert_eq!(bridge.api.url.as_str(), "https://timing.local/base/");
        assert_eq!(bridge.api.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(bridge.debounce.threshold, Duration::from_secs(12));
        assert_eq!(bridge.ping_interval, Duration::ZERO);
        assert!(!bridge.auto_start_stream);
    }

    #[test]
    fn missing_or_bad_url_is_validation_error() {
        let cfg = Config::default();
        let err = to_bridge_config(&cfg, SecretString::from("t".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "invalid api.url: not set");

        let mut cfg = Config::default();
        cfg.api.url = Some("ftp://x".into());
        assert!(matches!(
            to_bridge_config(&cfg, SecretString::from("t".to_string())),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn reader_address_override() {
        let mut reader = ReaderSection::default();
        reader.set_address("192.168.0.40:6000").unwrap();
        assert_eq!((reader.host.as_str(), reader.port), ("192.168.0.40", 6000));

        reader.set_address("reader.local").unwrap();
        assert_eq!((reader.host.as_str(), reader.port), ("reader.local", 6000));

        assert!(reader.set_address("host:notaport").is_err());
        assert!(reader.set_address(":4333").is_err());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.api.url = Some("http://10.1.1.1:8080".into());
        cfg.stream.auto_start = true;

        save_config(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[stream]"));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn redacted_masks_token_only() {
        let mut cfg = Config::default();
        cfg.api.token = Some("secret".into());
        let shown = cfg.redacted();
        assert_eq!(shown.api.token.as_deref(), Some("********"));
        assert_eq!(shown.reader, cfg.reader);
    }
}
