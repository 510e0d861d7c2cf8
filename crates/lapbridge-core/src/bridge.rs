// ── Bridge ──
//
// Lifecycle management for one reader: connection workers, the stream
// session, flush processing and pass forwarding. All shared state sits
// in a single `BridgeState` behind one async mutex. Reader I/O happens
// on detached workers outside that lock, except the restart after a
// device auto-stop, which is done while the flush still holds it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::DebounceConfig;
use crate::dispatch::PassNotifier;
use crate::error::ReaderError;
use crate::model::{ConnectionState, InventorySnapshot, ReaderInfo, ReaderStatus};
use crate::reader::capability::negotiate_phase_diff;
use crate::reader::{ReaderEvent, ReaderTransport};
use crate::store::BridgeState;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Every façade operation
/// returns without waiting on the reader; the ones that start reader
/// I/O hand back the worker's `JoinHandle`, which callers may ignore.
pub struct Bridge<R: ReaderTransport> {
    inner: Arc<BridgeInner<R>>,
}

impl<R: ReaderTransport> Clone for Bridge<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct BridgeInner<R> {
    debounce: DebounceConfig,
    reader: Arc<R>,
    notifier: Arc<dyn PassNotifier>,
    state: Mutex<BridgeState>,
    /// Mirrors `state.connection.state`; only written with `state` locked.
    connection_state: watch::Sender<ConnectionState>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: ReaderTransport> Bridge<R> {
    pub fn new(reader: Arc<R>, notifier: Arc<dyn PassNotifier>, debounce: DebounceConfig) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(BridgeInner {
                debounce,
                reader,
                notifier,
                state: Mutex::new(BridgeState::new()),
                connection_state,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.inner.reader
    }

    pub fn debounce(&self) -> &DebounceConfig {
        &self.inner.debounce
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Background tasks ─────────────────────────────────────────

    /// Consume device events until the reader drops its sender.
    pub async fn spawn_event_loop(&self, events: mpsc::Receiver<ReaderEvent>) {
        let handle = tokio::spawn(reader_event_task(self.clone(), events));
        self.track(handle).await;
    }

    /// Keep `handle` alive until [`shutdown`](Self::shutdown).
    pub async fn track(&self, handle: JoinHandle<()>) {
        self.inner.task_handles.lock().await.push(handle);
    }

    /// Abort every tracked background task.
    pub async fn shutdown(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }
        debug!("bridge shut down");
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the reader link on a detached worker. Never retried.
    pub fn connect(&self) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            {
                let mut state = bridge.inner.state.lock().await;
                if !state.connection.is_connected() {
                    bridge.set_connection(&mut state, ConnectionState::Connecting);
                }
            }

            let result = bridge.inner.reader.connect().await;

            let mut state = bridge.inner.state.lock().await;
            match result {
                Ok(()) => {
                    state.connection.last_error = None;
                }
                Err(e) => {
                    warn!(error = %e, "reader connect failed");
                    state.connection.last_error = Some(e.to_string());
                    if state.connection.state == ConnectionState::Connecting {
                        bridge.set_connection(&mut state, ConnectionState::Disconnected);
                    }
                }
            }
        })
    }

    /// Close the reader link on a detached worker. State is cleared when
    /// the reader reports the disconnect.
    pub fn disconnect(&self) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.inner.reader.disconnect().await {
                warn!(error = %e, "reader disconnect failed");
                bridge.inner.state.lock().await.connection.last_error = Some(e.to_string());
            }
        })
    }

    pub async fn status(&self) -> ReaderStatus {
        self.inner.state.lock().await.status()
    }

    /// Capability metadata fetched after the last connect, if any.
    pub async fn reader_info(&self) -> Option<ReaderInfo> {
        self.inner.state.lock().await.connection.info.clone()
    }

    // ── Stream session ───────────────────────────────────────────

    /// (Re)start the inventory stream with an empty table.
    pub async fn start_stream(&self) -> JoinHandle<()> {
        self.inner.state.lock().await.begin_stream();
        info!("inventory stream starting");

        let reader = Arc::clone(&self.inner.reader);
        tokio::spawn(async move {
            if let Err(e) = start_device_stream(reader.as_ref()).await {
                warn!(error = %e, "reader stream start failed");
            }
        })
    }

    /// Stop accepting flushes. The table stays readable.
    pub async fn stop_stream(&self) -> JoinHandle<()> {
        self.inner.state.lock().await.end_stream();
        info!("inventory stream stopping");

        let reader = Arc::clone(&self.inner.reader);
        tokio::spawn(async move {
            if let Err(e) = reader.stop_streaming().await {
                warn!(error = %e, "reader stream stop failed");
            }
        })
    }

    pub async fn inventory(&self) -> InventorySnapshot {
        self.inner.state.lock().await.snapshot()
    }

    // ── Device events ────────────────────────────────────────────

    /// Apply one device event.
    pub async fn handle_event(&self, event: ReaderEvent) {
        match event {
            ReaderEvent::Connected => self.on_connected().await,
            ReaderEvent::Disconnected => self.on_disconnected().await,
            ReaderEvent::InventoryFlush { stopped } => self.on_inventory_flush(stopped).await,
        }
    }

    async fn on_connected(&self) {
        {
            let mut state = self.inner.state.lock().await;
            self.set_connection(&mut state, ConnectionState::Connected);
        }
        info!("reader connected");

        let bridge = self.clone();
        tokio::spawn(async move {
            match bridge.inner.reader.reader_info().await {
                Ok(info) => {
                    let mut state = bridge.inner.state.lock().await;
                    // The link may have dropped while we were asking.
                    if state.connection.is_connected() {
                        debug!(serial = %info.serial, name = %info.name, "reader info");
                        state.connection.info = Some(info);
                    }
                }
                Err(e) => warn!(error = %e, "reader info unavailable"),
            }
        });
    }

    async fn on_disconnected(&self) {
        let mut state = self.inner.state.lock().await;
        state.reader_lost();
        self.set_connection(&mut state, ConnectionState::Disconnected);
        info!("reader disconnected");
    }

    async fn on_inventory_flush(&self, stopped: bool) {
        let mut state = self.inner.state.lock().await;
        if !state.session.enabled {
            self.inner.reader.tag_buffer().clear();
            trace!("flush while stream disabled, discarded");
            return;
        }

        let batch = self.inner.reader.tag_buffer().drain();
        let reads = batch.len();
        let passes = state.apply_batch(batch, Utc::now(), &self.inner.debounce);
        debug!(
            reads,
            passes = passes.len(),
            flush = state.session.flush_count,
            "inventory flush"
        );
        for pass in passes {
            self.inner.notifier.notify(pass);
        }

        if stopped {
            debug!("reader auto-stopped, restarting stream");
            if let Err(e) = restart_device_stream(self.inner.reader.as_ref()).await {
                warn!(error = %e, "stream restart failed");
            }
        }
    }

    fn set_connection(&self, state: &mut BridgeState, new: ConnectionState) {
        state.connection.state = new;
        self.inner.connection_state.send_replace(new);
    }
}

/// Clear the device buffer, apply the phase-diff shim, begin streaming.
async fn start_device_stream<R: ReaderTransport>(reader: &R) -> Result<(), ReaderError> {
    reader.clear_tags().await?;
    restart_device_stream(reader).await
}

/// Resume after a device-side auto-stop. The buffer is left alone.
async fn restart_device_stream<R: ReaderTransport>(reader: &R) -> Result<(), ReaderError> {
    negotiate_phase_diff(reader).await?;
    reader.start_streaming().await
}

async fn reader_event_task<R: ReaderTransport>(
    bridge: Bridge<R>,
    mut events: mpsc::Receiver<ReaderEvent>,
) {
    while let Some(event) = events.recv().await {
        trace!(?event, "reader event");
        bridge.handle_event(event).await;
    }
    debug!("reader event queue closed");
}
