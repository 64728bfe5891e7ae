//! Core data types for the DTSE

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DocumentError;

/// Millisecond timestamp as carried by documents and transitions
pub type TimestampMillis = u64;

/// Length of every identifier in bytes
pub const IDENTIFIER_LENGTH: usize = 32;

/// Fixed-length content identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(pub [u8; IDENTIFIER_LENGTH]);

impl Identifier {
    /// Create an identifier from raw bytes
    pub fn new(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse an identifier from a byte slice of exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DocumentError> {
        let array: [u8; IDENTIFIER_LENGTH] =
            bytes.try_into().map_err(|_| DocumentError::InvalidIdentifier {
                reason: format!("expected {} bytes, got {}", IDENTIFIER_LENGTH, bytes.len()),
            })?;
        Ok(Self(array))
    }

    /// Parse an identifier from its hex text form
    pub fn from_hex(text: &str) -> Result<Self, DocumentError> {
        let bytes = hex::decode(text).map_err(|e| DocumentError::InvalidIdentifier {
            reason: format!("invalid hex '{}': {}", text, e),
        })?;
        Self::from_slice(&bytes)
    }

    /// Hex text form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LENGTH] {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; IDENTIFIER_LENGTH]> for Identifier {
    fn from(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
        Self(bytes)
    }
}

/// Cryptographic hash of repository state or index content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateHash(pub [u8; 32]);

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Time component of a platform block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTime {
    pub seconds: u64,
}

/// The parts of the latest committed block header the core relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub time: BlockTime,
}

impl BlockHeader {
    /// Create a header for the given block time in seconds
    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            time: BlockTime { seconds },
        }
    }

    /// Block time in milliseconds
    pub fn time_millis(&self) -> TimestampMillis {
        self.time.seconds.saturating_mul(1000)
    }

    /// Block time as a UTC date, if representable
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(self.time.seconds).ok()?;
        Utc.timestamp_opt(seconds, 0).single()
    }
}

/// Inclusive window of acceptable document timestamps around a block time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimestampMillis,
    pub end: TimestampMillis,
}

impl TimeWindow {
    /// Window of `half_width_ms` on each side of `center`
    pub fn around(center: TimestampMillis, half_width_ms: u64) -> Self {
        Self {
            start: center.saturating_sub(half_width_ms),
            end: center.saturating_add(half_width_ms),
        }
    }

    pub fn contains(&self, timestamp: TimestampMillis) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
