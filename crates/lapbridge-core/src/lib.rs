//! Reader lifecycle, tag inventory and lap dispatch for lapbridge.
//!
//! This crate owns the business logic between an RFID reader and the
//! lap-timing API:
//!
//! - **[`Bridge`]**: Central facade. Connects the reader on detached
//!   workers, runs the inventory stream session, consumes device events
//!   from one queue and turns flushed batches into passes. All shared
//!   state lives in one [`BridgeState`] behind one lock.
//!
//! - **[`ReaderTransport`]**: What the bridge needs from a device:
//!   connect/disconnect, capability info, op flags, streaming control and
//!   a drainable [`TagBuffer`]. [`NetReader`] speaks JSON lines over TCP,
//!   [`SimReader`] runs in-process.
//!
//! - **Debounce** ([`store::Inventory`]): A repeat sighting of a tag is a
//!   pass once at least [`DebounceConfig::threshold`] has elapsed, measured
//!   per [`DebounceMode`].
//!
//! - **[`PassNotifier`]**: Best-effort sink for passes.
//!   [`HttpDispatcher`] posts them to the lap API and owns the keepalive
//!   ping.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod reader;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use config::{
    ApiConfig, BridgeConfig, DebounceConfig, DebounceMode, ReaderEndpoint, TlsVerification,
};
pub use dispatch::{ChannelNotifier, HttpDispatcher, LogNotifier, PassNotifier};
pub use error::{CoreError, ReaderError};
pub use reader::{NetReader, ReaderEvent, ReaderTransport, SimReader, TagBuffer, event_channel};
pub use store::{BridgeState, StreamSession};

pub use model::{
    ConnectionState, Epc, InventorySnapshot, ReaderInfo, ReaderStatus, TagEntry, TagPass, TagRead,
};
