// ── Inventory snapshot document ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tag::TagEntry;

/// Format used for the `timestamp` field of the inventory document.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Owned copy of the inventory, taken under the store lock.
///
/// Nothing in here aliases store state; callers may mutate it freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    /// Number of distinct tags in the table.
    pub count: usize,
    /// Flushes processed since the stream was (re)started.
    pub n_inventories: u32,
    /// Whether streaming is enabled.
    pub update_enabled: bool,
    pub tags: Vec<TagEntry>,
    /// Time of the last processed flush, `YYYY-MM-DD HH:MM:SS` UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Render a flush time for the `timestamp` field.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_omits_timestamp() {
        let snap = InventorySnapshot {
            count: 0,
            n_inventories: 0,
            update_enabled: false,
            tags: Vec::new(),
            timestamp: None,
        };
        assert_eq!(
            serde_json::to_value(&snap).unwrap(),
            serde_json::json!({
                "count": 0,
                "nInventories": 0,
                "updateEnabled": false,
                "tags": []
            })
        );
    }

    #[test]
    fn timestamp_format() {
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(format_timestamp(at), "2023-11-14 22:13:20");
    }
}
