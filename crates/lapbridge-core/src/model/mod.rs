// ── Domain model ──

pub mod reader;
pub mod snapshot;
pub mod tag;

pub use reader::{ConnectionState, ReaderInfo, ReaderStatus};
pub use snapshot::{InventorySnapshot, format_timestamp};
pub use tag::{Epc, ParseEpcError, TagEntry, TagPass, TagRead};
