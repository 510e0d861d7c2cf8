// Wire types for the lap-timing API.

use serde::{Deserialize, Serialize};

/// Body of a lap-event POST: `{"identifier": "...", "elapsedMs": n}`.
///
/// `elapsed_ms` is the time since the previous sighting of the same tag as
/// measured by the bridge, not a reader-reported value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEventBody {
    pub identifier: String,
    pub elapsed_ms: u64,
}

impl TagEventBody {
    pub fn new(identifier: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            identifier: identifier.into(),
            elapsed_ms,
        }
    }
}
