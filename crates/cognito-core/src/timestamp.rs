//! Timestamp helpers shared by the store, the API and sync.
//!
//! Timestamps are persisted as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so string order in SQL equals time order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

use crate::{Error, Result};

/// Current UTC time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format for storage: `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an ISO 8601 timestamp into UTC.
///
/// Accepts a `Z` suffix, explicit offsets, naive date-times (taken as UTC)
/// and bare dates (midnight UTC).
pub fn parse_iso_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(Error::InvalidInput(format!("Invalid timestamp: {}", value)))
}

/// Parse a timestamp column read back from the store.
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    parse_iso_timestamp(value)
        .map_err(|_| Error::Internal(format!("Corrupt timestamp in store: {}", value)))
}

/// Last-write-wins decision for a client change against the server copy.
///
/// The client wins when it sent no timestamp, when its timestamp cannot be
/// parsed, or when it is not older than the server's. Ties go to the client.
pub fn should_apply_client_change(client: Option<&str>, server: DateTime<Utc>) -> bool {
    let client = match client.map(str::trim) {
        None | Some("") => return true,
        Some(c) => c,
    };

    match parse_iso_timestamp(client) {
        Ok(client_ts) => client_ts >= server,
        Err(_) => {
            tracing::debug!(
                subsystem = "sync",
                op = "compare_timestamps",
                "Unparseable client timestamp, applying change"
            );
            true
        }
    }
}

/// Validate a `YYYY-MM-DD` journal date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("Invalid date (expected YYYY-MM-DD): {}", value)))
}

/// Today's journal date in UTC.
pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Serde helpers for timestamps sent by clients in loose formats.
pub mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    /// Deserialize any format `parse_iso_timestamp` accepts; `null` becomes now.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_iso_timestamp(&raw).map_err(serde::de::Error::custom),
            None => Ok(super::now()),
        }
    }
}
