use thiserror::Error;

/// Top-level error type for the `lapbridge-api` crate.
///
/// Covers every failure mode of a single request against the lap-timing
/// API. `lapbridge-core` maps these into its own taxonomy; the dispatcher
/// only ever logs them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Response ────────────────────────────────────────────────────
    /// The bearer token was rejected (HTTP 401 / 403).
    #[error("Authorization rejected by lap API (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Any other non-success status code.
    #[error("Lap API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl Error {
    /// Returns `true` if the failure happened before a response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if the request timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status code, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status } | Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
