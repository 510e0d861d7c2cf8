// Lap-timing API HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction and status-code
// interpretation. The API never returns a body we care about; only the
// status code decides success.

use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::auth::BearerToken;
use crate::error::Error;
use crate::models::TagEventBody;
use crate::transport::TransportConfig;

/// Paths of the two endpoints, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub lap_path: String,
    pub ping_path: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            lap_path: "/api/v1/tag".into(),
            ping_path: "/api/v1/ping".into(),
        }
    }
}

/// HTTP client for the lap-timing API.
///
/// Cheap to clone: `reqwest::Client` is internally reference counted and
/// the two endpoint URLs are resolved once at construction time.
#[derive(Debug, Clone)]
pub struct LapClient {
    http: reqwest::Client,
    lap_url: Url,
    ping_url: Url,
}

impl LapClient {
    /// Create a client that sends `Authorization: Bearer <token>` on every
    /// request.
    pub fn new(
        base_url: &Url,
        token: &BearerToken,
        endpoints: &Endpoints,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client_with_headers(token.header_map()?)?;
        Self::with_client(http, base_url, endpoints)
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for any default headers (auth).
    pub fn with_client(
        http: reqwest::Client,
        base_url: &Url,
        endpoints: &Endpoints,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            lap_url: endpoint_url(base_url, &endpoints.lap_path)?,
            ping_url: endpoint_url(base_url, &endpoints.ping_path)?,
        })
    }

    /// The resolved lap-event URL.
    pub fn lap_url(&self) -> &Url {
        &self.lap_url
    }

    /// The resolved ping URL.
    pub fn ping_url(&self) -> &Url {
        &self.ping_url
    }

    /// POST one lap event. Returns the success status code.
    pub async fn send_tag_event(&self, body: &TagEventBody) -> Result<StatusCode, Error> {
        debug!(url = %self.lap_url, identifier = %body.identifier, "POST lap event");

        let resp = self
            .http
            .post(self.lap_url.clone())
            .json(body)
            .send()
            .await?;

        check_status(resp).await
    }

    /// POST an empty keepalive. Returns the success status code.
    pub async fn ping(&self) -> Result<StatusCode, Error> {
        debug!(url = %self.ping_url, "POST ping");

        let resp = self
            .http
            .post(self.ping_url.clone())
            .send()
            .await?;

        check_status(resp).await
    }
}

/// Join an endpoint path onto the base URL, tolerating missing or doubled
/// slashes on either side.
fn endpoint_url(base_url: &Url, path: &str) -> Result<Url, Error> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Map a response onto `Ok(status)` or the matching [`Error`].
async fn check_status(resp: reqwest::Response) -> Result<StatusCode, Error> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Unauthorized {
            status: status.as_u16(),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    Ok(status)
}
