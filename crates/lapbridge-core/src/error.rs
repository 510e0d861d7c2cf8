// ── Core error types ──
//
// Errors surfaced by lapbridge-core. Reader failures are recorded as a
// status string by the bridge rather than raised to callers; dispatch
// failures are logged and dropped. The `From<lapbridge_api::Error>` impl
// translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Failure talking to the reader module.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Cannot connect to reader at {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Reader not connected")]
    NotConnected,

    #[error("Reader request '{command}' timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Reader rejected '{command}': {message}")]
    Rejected { command: String, message: String },

    #[error("Reader protocol error: {0}")]
    Protocol(String),

    #[error("Reader connection closed")]
    Closed,

    #[error("Reader I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Reader ───────────────────────────────────────────────────────
    #[error(transparent)]
    Reader(#[from] ReaderError),

    // ── Lap API ──────────────────────────────────────────────────────
    #[error("Cannot reach lap API at {url}: {reason}")]
    ApiUnreachable { url: String, reason: String },

    #[error("Lap API rejected the bearer token (HTTP {status})")]
    ApiUnauthorized { status: u16 },

    #[error("Lap API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if a response arrived).
        status: Option<u16>,
    },

    // ── Documents ────────────────────────────────────────────────────
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lapbridge_api::Error> for CoreError {
    fn from(err: lapbridge_api::Error) -> Self {
        match err {
            lapbridge_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ApiUnreachable {
                    url: e
                        .url()
                        .map_or_else(|| "<unknown>".into(), ToString::to_string),
                    reason: e.to_string(),
                }
            }
            lapbridge_api::Error::Transport(e) => CoreError::Api {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            lapbridge_api::Error::Unauthorized { status } => CoreError::ApiUnauthorized { status },
            lapbridge_api::Error::Status { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                status: Some(status),
            },
            lapbridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            lapbridge_api::Error::Tls(msg) | lapbridge_api::Error::ClientBuild(msg) => {
                CoreError::Config { message: msg }
            }
        }
    }
}
