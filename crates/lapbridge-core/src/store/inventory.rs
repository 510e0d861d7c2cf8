// ── Tag inventory table ──
//
// One row per identifier, in first-sighting order. Applying the debounce
// policy happens here, row by row, so the decision always sees the row
// state from before the sighting is folded in.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::config::{DebounceConfig, DebounceMode};
use crate::model::{Epc, TagEntry, TagPass, TagRead};

/// Outcome of folding one read into the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sighting {
    /// First time this identifier is seen since the last reset.
    First,
    /// Repeat sighting inside the debounce window.
    Suppressed { elapsed_ms: u64 },
    /// Repeat sighting that cleared the window.
    Pass(TagPass),
}

#[derive(Debug, Default)]
pub struct Inventory {
    entries: IndexMap<Epc, TagEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `read` into the table at time `now` and decide whether it is
    /// a pass.
    pub fn observe(
        &mut self,
        read: TagRead,
        now: DateTime<Utc>,
        debounce: &DebounceConfig,
    ) -> Sighting {
        let Some(entry) = self.entries.get_mut(&read.epc) else {
            debug!(epc = %read.epc, "new tag");
            self.entries
                .insert(read.epc.clone(), TagEntry::first_sighting(read, now));
            return Sighting::First;
        };

        let reference = match debounce.mode {
            DebounceMode::LastSighting => entry.last_seen_time,
            DebounceMode::LastForwarded => entry.last_forwarded.unwrap_or(entry.first_seen_time),
        };
        // A clock step backwards reads as zero elapsed, never negative.
        let elapsed = (now - reference).to_std().unwrap_or_default();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        entry.record_sighting(&read, now);

        if entry.times_seen > 1 && elapsed >= debounce.threshold {
            entry.last_forwarded = Some(now);
            Sighting::Pass(TagPass {
                identifier: entry.identifier.clone(),
                elapsed_ms,
            })
        } else {
            debug!(epc = %entry.identifier, elapsed_ms, "sighting suppressed");
            Sighting::Suppressed { elapsed_ms }
        }
    }

    pub fn get(&self, epc: &Epc) -> Option<&TagEntry> {
        self.entries.get(epc)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Owned copies of every row, first-seen order.
    pub fn to_vec(&self) -> Vec<TagEntry> {
        self.entries.values().cloned().collect()
    }
}
