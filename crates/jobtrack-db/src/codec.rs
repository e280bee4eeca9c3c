//! Conversions between domain values and the representations the drivers store.
//!
//! Both drivers bind `NaiveDateTime` natively, so timestamps cross the
//! boundary as naive values that are always read as UTC. Documents are kept as
//! canonical JSON text.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde_json::Value;

/// Stored timestamps keep millisecond precision.
const STORED_SUBSEC_DIGITS: u16 = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCodec;

impl TimestampCodec {
    pub fn encode(&self, value: &DateTime<Utc>) -> NaiveDateTime {
        value.trunc_subsecs(STORED_SUBSEC_DIGITS).naive_utc()
    }

    pub fn decode(&self, stored: NaiveDateTime) -> DateTime<Utc> {
        Utc.from_utc_datetime(&stored)
            .trunc_subsecs(STORED_SUBSEC_DIGITS)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCodec;

impl DocumentCodec {
    pub fn encode(&self, value: &Value) -> String {
        value.to_string()
    }

    /// Malformed text is returned as an error, never replaced by a default.
    pub fn decode(&self, stored: &str) -> Result<Value, serde_json::Error> {
        serde_json::from_str(stored)
    }
}
