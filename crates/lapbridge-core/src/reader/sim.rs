// ── In-process reader ──
//
// Behaves like a reader module without any hardware: it keeps an op-flag
// register, a streaming flag and a tag buffer, and raises the same events
// a networked reader would. Tests script it directly; `lapbridge run
// --simulate` drives it with a demo feed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{ReaderEvent, ReaderTransport, TagBuffer};
use crate::error::ReaderError;
use crate::model::{Epc, ReaderInfo, TagRead};

#[derive(Debug, Default)]
struct SimState {
    connected: bool,
    streaming: bool,
    op_flags: u32,
    info: ReaderInfo,
    fail_next_connect: Option<String>,
    fail_reader_info: bool,
    calls: Vec<String>,
}

/// Simulated reader module.
#[derive(Debug)]
pub struct SimReader {
    events: mpsc::Sender<ReaderEvent>,
    buffer: TagBuffer,
    state: Mutex<SimState>,
}

impl SimReader {
    pub fn new(events: mpsc::Sender<ReaderEvent>) -> Self {
        let info = ReaderInfo {
            serial: "SIM-0001".into(),
            name: "Simulated reader".into(),
            hw_version: "sim".into(),
            sw_version: env!("CARGO_PKG_VERSION").into(),
            num_antennas: 1,
            max_antennas: 4,
            extra: serde_json::Map::new(),
        };
        Self {
            events,
            buffer: TagBuffer::new(),
            state: Mutex::new(SimState {
                info,
                ..SimState::default()
            }),
        }
    }

    /// Replace the reported capability metadata.
    pub fn set_info(&self, info: ReaderInfo) {
        self.lock().info = info;
    }

    /// Make the next `connect` fail with `reason`.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.lock().fail_next_connect = Some(reason.into());
    }

    /// Make `reader_info` fail until cleared.
    pub fn fail_reader_info(&self, fail: bool) {
        self.lock().fail_reader_info = fail;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    /// Names of the transport operations invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Buffer `reads` and raise an inventory flush, as the device does at
    /// the end of each inventory round. `stopped` marks a device-side
    /// auto-stop and clears the streaming flag.
    pub async fn deliver(&self, reads: Vec<TagRead>, stopped: bool) {
        self.buffer.extend(reads);
        if stopped {
            self.lock().streaming = false;
        }
        self.emit(ReaderEvent::InventoryFlush { stopped }).await;
    }

    /// Simulate the link dropping from the device side.
    pub async fn drop_link(&self) {
        {
            let mut state = self.lock();
            state.connected = false;
            state.streaming = false;
        }
        self.emit(ReaderEvent::Disconnected).await;
    }

    /// Feed `epcs` into the reader every `period` while it is streaming.
    pub fn spawn_demo_feed(self: Arc<Self>, epcs: Vec<Epc>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut round: u32 = 0;
            loop {
                interval.tick().await;
                if !self.is_streaming() || epcs.is_empty() {
                    continue;
                }
                round = round.wrapping_add(1);
                let reads = epcs
                    .iter()
                    .enumerate()
                    .map(|(i, epc)| demo_read(epc, i, round))
                    .collect();
                trace!(round, "demo feed round");
                self.deliver(reads, false).await;
            }
        })
    }

    fn record(&self, call: impl Into<String>) -> MutexGuard<'_, SimState> {
        let mut state = self.lock();
        state.calls.push(call.into());
        state
    }

    fn require_connected(state: &SimState) -> Result<(), ReaderError> {
        if state.connected {
            Ok(())
        } else {
            Err(ReaderError::NotConnected)
        }
    }

    async fn emit(&self, event: ReaderEvent) {
        if self.events.send(event).await.is_err() {
            debug!(?event, "no event consumer");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn demo_read(epc: &Epc, index: usize, round: u32) -> TagRead {
    let antenna = u8::try_from(index % 4).unwrap_or(0);
    let wobble = i8::try_from(round % 12).unwrap_or(0);
    let phase = i16::try_from(round % 360).unwrap_or(0);
    TagRead::new(epc.clone(), antenna, -70 + wobble, phase)
}

impl ReaderTransport for SimReader {
    async fn connect(&self) -> Result<(), ReaderError> {
        {
            let mut state = self.record("connect");
            if let Some(reason) = state.fail_next_connect.take() {
                return Err(ReaderError::Connect {
                    endpoint: "sim".into(),
                    reason,
                });
            }
            state.connected = true;
        }
        self.emit(ReaderEvent::Connected).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ReaderError> {
        {
            let mut state = self.record("disconnect");
            Self::require_connected(&state)?;
            state.connected = false;
            state.streaming = false;
        }
        self.emit(ReaderEvent::Disconnected).await;
        Ok(())
    }

    async fn reader_info(&self) -> Result<ReaderInfo, ReaderError> {
        let state = self.record("reader_info");
        Self::require_connected(&state)?;
        if state.fail_reader_info {
            return Err(ReaderError::Rejected {
                command: "reader_info".into(),
                message: "not supported".into(),
            });
        }
        Ok(state.info.clone())
    }

    async fn clear_tags(&self) -> Result<(), ReaderError> {
        let state = self.record("clear_tags");
        Self::require_connected(&state)?;
        self.buffer.clear();
        Ok(())
    }

    async fn op_flags(&self) -> Result<u32, ReaderError> {
        let state = self.record("op_flags");
        Self::require_connected(&state)?;
        Ok(state.op_flags)
    }

    async fn set_op_flags(&self, flags: u32) -> Result<(), ReaderError> {
        let mut state = self.record(format!("set_op_flags({flags:#x})"));
        Self::require_connected(&state)?;
        state.op_flags = flags;
        Ok(())
    }

    async fn start_streaming(&self) -> Result<(), ReaderError> {
        let mut state = self.record("start_streaming");
        Self::require_connected(&state)?;
        state.streaming = true;
        Ok(())
    }

    async fn stop_streaming(&self) -> Result<(), ReaderError> {
        let mut state = self.record("stop_streaming");
        Self::require_connected(&state)?;
        state.streaming = false;
        Ok(())
    }

    fn tag_buffer(&self) -> &TagBuffer {
        &self.buffer
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reader::event_channel;

    #[tokio::test]
    async fn connect_raises_event() {
        let (tx, mut rx) = event_channel();
        let reader = SimReader::new(tx);
        reader.connect().await.unwrap();
        assert_eq!(rx.recv().await, Some(ReaderEvent::Connected));
        assert!(reader.is_connected());
    }

    #[tokio::test]
    async fn scripted_connect_failure_is_one_shot() {
        let (tx, _rx) = event_channel();
        let reader = SimReader::new(tx);
        reader.fail_next_connect("refused");

        let err = reader.connect().await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot connect to reader at sim: refused");
        assert!(reader.connect().await.is_ok());
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let (tx, _rx) = event_channel();
        let reader = SimReader::new(tx);
        assert!(matches!(
            reader.start_streaming().await,
            Err(ReaderError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn auto_stop_flush_clears_streaming() {
        let (tx, mut rx) = event_channel();
        let reader = SimReader::new(tx);
        reader.connect().await.unwrap();
        reader.start_streaming().await.unwrap();
        let _ = rx.recv().await;

        reader
            .deliver(vec![TagRead::new("AA".parse().unwrap(), 0, -40, 0)], true)
            .await;

        assert_eq!(
            rx.recv().await,
            Some(ReaderEvent::InventoryFlush { stopped: true })
        );
        assert!(!reader.is_streaming());
        assert_eq!(reader.tag_buffer().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn demo_feed_only_runs_while_streaming() {
        let (tx, mut rx) = event_channel();
        let reader = Arc::new(SimReader::new(tx));
        reader.connect().await.unwrap();
        let _ = rx.recv().await;

        let feed = Arc::clone(&reader)
            .spawn_demo_feed(vec!["E1".parse().unwrap()], Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(reader.tag_buffer().is_empty());

        reader.start_streaming().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            rx.recv().await,
            Some(ReaderEvent::InventoryFlush { stopped: false })
        );
        feed.abort();
    }
}
