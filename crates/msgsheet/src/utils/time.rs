use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const NANOS_PER_MILLI: i128 = 1_000_000;
const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// Days between the spreadsheet epoch (1899-12-30) and the Unix epoch.
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;

/// Spreadsheet date serial (fractional days) for a UTC timestamp.
#[must_use]
pub fn excel_serial_from_unix_ms(timestamp_ms: i64) -> f64 {
    timestamp_ms as f64 / MILLIS_PER_DAY + UNIX_EPOCH_SERIAL
}

#[must_use]
pub fn format_unix_ms(timestamp_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * NANOS_PER_MILLI)
        .ok()
        .and_then(|datetime| datetime.format(&Rfc3339).ok())
        .unwrap_or_else(|| timestamp_ms.to_string())
}
