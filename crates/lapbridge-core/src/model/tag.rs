// ── Tag domain types ──
//
// `Epc` is the identity of every inventory row. Reads come off the reader
// as `TagRead`s; the store folds them into `TagEntry`s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Epc ─────────────────────────────────────────────────────────────

/// Tag identifier as raw bytes.
///
/// Rendered as upper-case hex without separators (`E2003412B802011A`),
/// which is also its serde form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epc(Vec<u8>);

impl Epc {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Why a string could not be read as an [`Epc`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseEpcError {
    #[error("EPC is empty")]
    Empty,
    #[error("EPC has an odd number of hex digits")]
    OddLength,
    #[error("invalid hex digit '{0}' in EPC")]
    InvalidDigit(char),
}

impl FromStr for Epc {
    type Err = ParseEpcError;

    /// Accepts hex in either case, optionally separated by `-`, `:` or
    /// spaces (`e2-00-34-12` parses the same as `E2003412`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<char> = s
            .chars()
            .filter(|c| !matches!(c, '-' | ':' | ' '))
            .collect();
        if digits.is_empty() {
            return Err(ParseEpcError::Empty);
        }
        if digits.len() % 2 != 0 {
            return Err(ParseEpcError::OddLength);
        }

        digits
            .chunks_exact(2)
            .map(|pair| {
                let hi = hex_value(pair[0])?;
                let lo = hex_value(pair[1])?;
                Ok((hi << 4) | lo)
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Self)
    }
}

fn hex_value(c: char) -> Result<u8, ParseEpcError> {
    c.to_digit(16)
        .and_then(|d| u8::try_from(d).ok())
        .ok_or(ParseEpcError::InvalidDigit(c))
}

impl Serialize for Epc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Epc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── TagRead ─────────────────────────────────────────────────────────

/// One raw observation as buffered by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRead {
    pub epc: Epc,
    /// Antenna that saw the tag.
    #[serde(alias = "antenna")]
    pub antenna_id: u8,
    /// Received signal strength in dBm.
    pub rssi: i8,
    /// Reader-reported phase difference / timestamp field, passed through
    /// untouched. Not related to the debounce clock.
    #[serde(default)]
    pub phase: i16,
}

impl TagRead {
    pub fn new(epc: Epc, antenna_id: u8, rssi: i8, phase: i16) -> Self {
        Self {
            epc,
            antenna_id,
            rssi,
            phase,
        }
    }
}

// ── TagEntry ────────────────────────────────────────────────────────

/// Inventory row for one identifier.
///
/// Serialized in the inventory document shape:
/// `{identifier, antennaId, signalStrength, phase, timesSeen,
/// firstSeenTime, lastSeenTime}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEntry {
    pub identifier: Epc,
    pub antenna_id: u8,
    pub signal_strength: i8,
    pub phase: i16,
    pub times_seen: u32,
    pub first_seen_time: DateTime<Utc>,
    pub last_seen_time: DateTime<Utc>,
    /// Last time a sighting of this tag was forwarded upstream.
    #[serde(skip)]
    pub(crate) last_forwarded: Option<DateTime<Utc>>,
}

impl TagEntry {
    /// Baseline entry for a first sighting.
    pub(crate) fn first_sighting(read: TagRead, now: DateTime<Utc>) -> Self {
        Self {
            identifier: read.epc,
            antenna_id: read.antenna_id,
            signal_strength: read.rssi,
            phase: read.phase,
            times_seen: 1,
            first_seen_time: now,
            last_seen_time: now,
            last_forwarded: None,
        }
    }

    /// Fold a repeat sighting into the entry. `first_seen_time` is never
    /// touched; `last_seen_time` only moves forward.
    pub(crate) fn record_sighting(&mut self, read: &TagRead, now: DateTime<Utc>) {
        self.antenna_id = read.antenna_id;
        self.signal_strength = read.rssi;
        self.phase = read.phase;
        self.times_seen = self.times_seen.saturating_add(1);
        self.last_seen_time = self.last_seen_time.max(now);
    }
}

// ── TagPass ─────────────────────────────────────────────────────────

/// A sighting that cleared the debounce window and is forwarded upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPass {
    pub identifier: Epc,
    pub elapsed_ms: u64,
}
