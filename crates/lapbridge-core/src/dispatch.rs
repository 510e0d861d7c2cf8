// ── Pass dispatch ──
//
// Forwarding of passes and the keepalive ping. Everything here is
// best-effort: each pass is sent once on its own task, failures are
// logged and dropped, nothing is retried or queued.

use std::sync::Arc;
use std::time::Duration;

use lapbridge_api::transport::{TlsMode, TransportConfig};
use lapbridge_api::{BearerToken, Endpoints, LapClient, TagEventBody};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::TagPass;

/// Receiver of passes produced by the bridge.
///
/// Called with the bridge state locked, so implementations must return
/// promptly and must not call back into the bridge.
pub trait PassNotifier: Send + Sync + 'static {
    fn notify(&self, pass: TagPass);
}

// ── HTTP ─────────────────────────────────────────────────────────────

/// Posts each pass to the lap API on a detached task.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Arc<LapClient>,
}

impl HttpDispatcher {
    pub fn new(client: LapClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Build the API client from runtime configuration.
    pub fn from_config(api: &ApiConfig) -> Result<Self, CoreError> {
        build_lap_client(api).map(Self::new)
    }

    pub fn client(&self) -> &LapClient {
        &self.client
    }

    /// Start the keepalive ping. First ping is immediate.
    pub fn spawn_ping_task(&self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(ping_task(Arc::clone(&self.client), period))
    }
}

impl PassNotifier for HttpDispatcher {
    fn notify(&self, pass: TagPass) {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            let body = TagEventBody::new(pass.identifier.to_hex(), pass.elapsed_ms);
            match client.send_tag_event(&body).await {
                Ok(status) => info!(
                    epc = %pass.identifier,
                    elapsed_ms = pass.elapsed_ms,
                    status = status.as_u16(),
                    "lap event sent"
                ),
                Err(e) => warn!(
                    epc = %pass.identifier,
                    elapsed_ms = pass.elapsed_ms,
                    error = %e,
                    "lap event failed"
                ),
            }
        });
    }
}

/// Ping the API every `period` for as long as the task lives.
pub async fn ping_task(client: Arc<LapClient>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match client.ping().await {
            Ok(status) => debug!(status = status.as_u16(), "ping"),
            Err(e) => warn!(error = %e, "ping failed"),
        }
    }
}

/// Construct a [`LapClient`] from runtime configuration.
pub fn build_lap_client(api: &ApiConfig) -> Result<LapClient, CoreError> {
    let token = BearerToken::new(api.token.clone());
    let endpoints = Endpoints {
        lap_path: api.lap_path.clone(),
        ping_path: api.ping_path.clone(),
    };
    let transport = TransportConfig {
        tls: tls_to_transport(&api.tls),
        timeout: api.timeout,
    };
    Ok(LapClient::new(&api.url, &token, &endpoints, &transport)?)
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

// ── In-process ───────────────────────────────────────────────────────

/// Forwards passes into a channel. For embedders and tests.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<TagPass>,
}

impl ChannelNotifier {
    /// Notifier plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TagPass>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PassNotifier for ChannelNotifier {
    fn notify(&self, pass: TagPass) {
        if self.tx.send(pass).is_err() {
            debug!("pass receiver dropped");
        }
    }
}

/// Logs passes without sending them anywhere (dry run).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl PassNotifier for LogNotifier {
    fn notify(&self, pass: TagPass) {
        info!(epc = %pass.identifier, elapsed_ms = pass.elapsed_ms, "pass (dry run)");
    }
}
