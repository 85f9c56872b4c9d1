use time::OffsetDateTime;
use time::macros::format_description;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    millis_of(OffsetDateTime::now_utc())
}

/// Converts a timestamp to Unix milliseconds.
pub fn millis_of(datetime: OffsetDateTime) -> i64 {
    (datetime.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Formats a Unix-millisecond timestamp as `YYYY-MM-DD HH:MM` (UTC).
///
/// Out-of-range values fall back to the raw number.
pub fn format_millis(millis: i64) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|datetime| datetime.format(&format).ok())
        .unwrap_or_else(|| millis.to_string())
}
