// ── Bridge state ──
//
// Everything the bridge mutates lives in one `BridgeState` behind one
// lock: the reader connection record, the stream session and the tag
// table. Methods here are synchronous and take explicit timestamps; the
// bridge supplies the lock and the clock.

pub mod inventory;

use chrono::{DateTime, Utc};

pub use inventory::{Inventory, Sighting};

use crate::config::DebounceConfig;
use crate::model::{
    ConnectionState, InventorySnapshot, ReaderInfo, ReaderStatus, TagPass, TagRead,
    format_timestamp,
};

/// Reader connection record.
#[derive(Debug, Default)]
pub struct Connection {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub info: Option<ReaderInfo>,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Inventory stream bookkeeping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamSession {
    pub enabled: bool,
    /// Flushes processed since the last (re)start.
    pub flush_count: u32,
    pub last_flush: Option<DateTime<Utc>>,
}

/// All shared bridge state. Guarded as a unit.
#[derive(Debug, Default)]
pub struct BridgeState {
    pub connection: Connection,
    pub session: StreamSession,
    pub inventory: Inventory,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ReaderStatus {
        ReaderStatus {
            connected: self.connection.is_connected(),
            last_error: self.connection.last_error.clone(),
        }
    }

    /// Start (or restart) a stream session with an empty table.
    pub fn begin_stream(&mut self) {
        self.session = StreamSession {
            enabled: true,
            flush_count: 0,
            last_flush: None,
        };
        self.inventory.clear();
    }

    /// Stop accepting flushes. Table and counters are kept.
    pub fn end_stream(&mut self) {
        self.session.enabled = false;
    }

    /// The reader link is gone: forget everything about it.
    pub fn reader_lost(&mut self) {
        self.connection.state = ConnectionState::Disconnected;
        self.connection.info = None;
        self.session = StreamSession::default();
        self.inventory.clear();
    }

    /// Fold one flushed batch into the table. Returns the passes to
    /// forward, in delivery order. A batch arriving while the session is
    /// disabled is discarded without touching anything.
    pub fn apply_batch(
        &mut self,
        batch: Vec<TagRead>,
        now: DateTime<Utc>,
        debounce: &DebounceConfig,
    ) -> Vec<TagPass> {
        if !self.session.enabled {
            return Vec::new();
        }

        let passes = batch
            .into_iter()
            .filter_map(|read| match self.inventory.observe(read, now, debounce) {
                Sighting::Pass(pass) => Some(pass),
                Sighting::First | Sighting::Suppressed { .. } => None,
            })
            .collect();

        self.session.last_flush = Some(now);
        self.session.flush_count = self.session.flush_count.saturating_add(1);
        passes
    }

    /// Owned copy of the table and session counters.
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            count: self.inventory.len(),
            n_inventories: self.session.flush_count,
            update_enabled: self.session.enabled,
            tags: self.inventory.to_vec(),
            timestamp: self.session.last_flush.map(format_timestamp),
        }
    }
}
