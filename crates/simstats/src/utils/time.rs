use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow, bail};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const NANOS_PER_MILLI: i128 = 1_000_000;

pub fn unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

pub fn format_unix_ms(timestamp_unix_ms: u64) -> String {
    let nanos = i128::from(timestamp_unix_ms)
        .checked_mul(NANOS_PER_MILLI)
        .unwrap_or(i128::MAX);
    let Ok(dt) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
        return "9999-12-31T23:59:59.999Z".to_string();
    };
    let dt = dt.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.millisecond()
    )
}

/// Normalizes a session timestamp to the `YYYY-MM-DD HH:MM:SS` UTC text form
/// stored in `session.timestamp`.
///
/// Accepts RFC 3339, the stored form itself (read as UTC) and epoch seconds.
pub fn normalize_session_timestamp(raw: &str) -> Result<String> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("timestamp input is empty");
    }

    let parsed = if let Ok(epoch_seconds) = candidate.parse::<i64>() {
        OffsetDateTime::from_unix_timestamp(epoch_seconds)
            .map_err(|error| anyhow!("epoch seconds out of range: {error}"))?
    } else if let Ok(parsed) = OffsetDateTime::parse(candidate, &Rfc3339) {
        parsed.to_offset(UtcOffset::UTC)
    } else {
        PrimitiveDateTime::parse(candidate, STORED_FORMAT)
            .map_err(|_| anyhow!("unsupported timestamp format: {candidate}"))?
            .assume_utc()
    };

    parsed
        .format(STORED_FORMAT)
        .map_err(|error| anyhow!("failed to format timestamp: {error}"))
}

const STORED_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
