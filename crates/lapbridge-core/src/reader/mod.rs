// ── Reader device abstraction ──
//
// A reader is anything that can be connected, put into inventory-stream
// mode, and that buffers tag observations until the application drains
// them. Device callbacks are delivered as `ReaderEvent`s on a bounded
// channel so the bridge can process them on one task.

pub mod capability;
pub mod net;
pub mod sim;

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::error::ReaderError;
use crate::model::{ReaderInfo, TagRead};

pub use net::NetReader;
pub use sim::SimReader;

/// Capacity of the device event queue.
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Callback raised by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    /// Transport link is up.
    Connected,
    /// Transport link is gone (requested or not).
    Disconnected,
    /// The device has buffered a batch of observations. `stopped` is set
    /// when the device ended the inventory stream on its own.
    InventoryFlush { stopped: bool },
}

/// Create the bounded queue readers publish their events on.
pub fn event_channel() -> (mpsc::Sender<ReaderEvent>, mpsc::Receiver<ReaderEvent>) {
    mpsc::channel(EVENT_CHANNEL_SIZE)
}

/// Operations the bridge needs from a reader device.
///
/// Implementations must be callable concurrently; the bridge shares one
/// instance between its event loop and detached workers.
pub trait ReaderTransport: Send + Sync + 'static {
    /// Open the transport link. Success is followed by a
    /// [`ReaderEvent::Connected`].
    fn connect(&self) -> impl Future<Output = Result<(), ReaderError>> + Send;

    /// Close the transport link. Followed by a [`ReaderEvent::Disconnected`].
    fn disconnect(&self) -> impl Future<Output = Result<(), ReaderError>> + Send;

    /// Capability metadata.
    fn reader_info(&self) -> impl Future<Output = Result<ReaderInfo, ReaderError>> + Send;

    /// Discard everything buffered on the device side.
    fn clear_tags(&self) -> impl Future<Output = Result<(), ReaderError>> + Send;

    /// Current operation flags bitmask.
    fn op_flags(&self) -> impl Future<Output = Result<u32, ReaderError>> + Send;

    fn set_op_flags(&self, flags: u32) -> impl Future<Output = Result<(), ReaderError>> + Send;

    /// Begin continuous inventory.
    fn start_streaming(&self) -> impl Future<Output = Result<(), ReaderError>> + Send;

    fn stop_streaming(&self) -> impl Future<Output = Result<(), ReaderError>> + Send;

    /// Observations received since the last drain.
    fn tag_buffer(&self) -> &TagBuffer;
}

// ── TagBuffer ────────────────────────────────────────────────────────

/// Device-side observation buffer.
///
/// Guarded by its own short-lived lock, only ever held for a push or a
/// drain. When the bridge drains it, the bridge already holds the store
/// lock (store → buffer ordering).
#[derive(Debug, Default)]
pub struct TagBuffer {
    reads: Mutex<Vec<TagRead>>,
}

impl TagBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, read: TagRead) {
        self.lock().push(read);
    }

    pub fn extend(&self, reads: impl IntoIterator<Item = TagRead>) {
        self.lock().extend(reads);
    }

    /// Take every buffered read in arrival order, leaving the buffer empty.
    pub fn drain(&self) -> Vec<TagRead> {
        std::mem::take(&mut *self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic mid-push cannot leave a half-written Vec, so poison is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<TagRead>> {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
