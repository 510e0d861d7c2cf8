//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use lapbridge_config::ConfigError;
use lapbridge_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the lap API at {url}")]
    #[diagnostic(
        code(lapbridge::api_unreachable),
        help(
            "Check that the timing server is running and reachable.\n\
             URL: {url}\n\
             Try: lapbridge ping -v"
        )
    )]
    ApiUnreachable {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Reader error: {message}")]
    #[diagnostic(
        code(lapbridge::reader),
        help("Check the reader address (--reader or [reader] in the config file).")
    )]
    Reader { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Lap API rejected the token (HTTP {status})")]
    #[diagnostic(
        code(lapbridge::auth_failed),
        help(
            "Verify the bearer token.\n\
             Run: lapbridge config set-token"
        )
    )]
    AuthFailed { status: u16 },

    #[error("No API token configured")]
    #[diagnostic(
        code(lapbridge::no_token),
        help(
            "Pass --token, set LAPBRIDGE_TOKEN, run `lapbridge config set-token`,\n\
             or use `lapbridge run --dry-run` to run without the API."
        )
    )]
    NoToken,

    // ── API ──────────────────────────────────────────────────────────
    #[error("Lap API error: {message}")]
    #[diagnostic(code(lapbridge::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lapbridge::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration: {field}: {reason}")]
    #[diagnostic(
        code(lapbridge::invalid_config),
        help("Inspect the effective configuration with: lapbridge config show")
    )]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(
        code(lapbridge::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(lapbridge::config))]
    Config(Box<ConfigError>),

    #[error("Keyring error: {reason}")]
    #[diagnostic(code(lapbridge::keyring))]
    Keyring { reason: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ApiUnreachable { .. } | Self::Reader { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoToken => exit_code::AUTH,
            Self::Validation { .. } => exit_code::USAGE,
            Self::InvalidConfig { .. } | Self::ConfigExists { .. } | Self::Config(_) => {
                exit_code::CONFIG
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ──────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::InvalidConfig { field, reason },
            ConfigError::NoToken => Self::NoToken,
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ApiUnreachable { url, reason } => Self::ApiUnreachable {
                url,
                source: reason.into(),
            },
            CoreError::ApiUnauthorized { status } => Self::AuthFailed { status },
            CoreError::Api { message, .. } => Self::ApiError { message },
            CoreError::Config { message } => Self::InvalidConfig {
                field: "api".into(),
                reason: message,
            },
            CoreError::Reader(e) => Self::Reader {
                message: e.to_string(),
            },
            CoreError::Serialization(e) => Self::Json(e),
        }
    }
}

impl From<lapbridge_api::Error> for CliError {
    fn from(err: lapbridge_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::NoToken.exit_code(), exit_code::AUTH);
        assert_eq!(
            CliError::from(CoreError::ApiUnreachable {
                url: "http://x".into(),
                reason: "refused".into(),
            })
            .exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(
            CliError::from(ConfigError::Validation {
                field: "api.url".into(),
                reason: "not set".into(),
            })
            .exit_code(),
            exit_code::CONFIG
        );
        assert_eq!(
            CliError::Validation {
                field: "reader".into(),
                reason: "bad".into(),
            }
            .exit_code(),
            exit_code::USAGE
        );
        assert_eq!(
            CliError::ApiError {
                message: "boom".into()
            }
            .exit_code(),
            exit_code::GENERAL
        );
    }

    #[test]
    fn unauthorized_api_error_is_auth() {
        let err: CliError = lapbridge_api::Error::Unauthorized { status: 401 }.into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
