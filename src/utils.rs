/// Utility functions for time handling and formatting
use log::warn;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use time_tz::{timezones, OffsetDateTimeExt};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Calendar date of an instant as seen in a station's timezone
///
/// An unknown IANA name falls back to UTC so a misconfigured station still
/// gets a summary.
///
/// # Arguments
/// * `instant` - Point in time to convert
/// * `timezone` - IANA timezone name, e.g. "America/Vancouver"
pub fn local_date(instant: OffsetDateTime, timezone: &str) -> Date {
    match timezones::get_by_name(timezone) {
        Some(tz) => instant.to_timezone(tz).date(),
        None => {
            warn!("Unknown timezone '{}', using UTC for local date", timezone);
            instant.date()
        }
    }
}

/// Convert a time::Duration to seconds as u64
///
/// Negative durations count as zero.
pub fn duration_to_seconds(duration: time::Duration) -> u64 {
    duration.whole_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn local_date_crosses_midnight_west_of_utc() {
        // 05:30 UTC is still the previous evening in Vancouver
        let instant = datetime!(2025-07-02 05:30 UTC);
        assert_eq!(local_date(instant, "America/Vancouver"), date!(2025-07-01));
        assert_eq!(local_date(instant, "UTC"), date!(2025-07-02));
    }

    #[test]
    fn local_date_crosses_midnight_east_of_utc() {
        let instant = datetime!(2025-01-15 20:00 UTC);
        assert_eq!(local_date(instant, "Asia/Tokyo"), date!(2025-01-16));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let instant = datetime!(2025-07-02 05:30 UTC);
        assert_eq!(local_date(instant, "Mars/Olympus_Mons"), date!(2025-07-02));
    }

    #[test]
    fn formats_for_logging() {
        let dt = datetime!(2025-03-09 07:05:03 UTC);
        assert_eq!(format_datetime(&dt), "09.03.2025 - 07:05:03");
    }

    #[test]
    fn negative_durations_clamp_to_zero() {
        assert_eq!(duration_to_seconds(time::Duration::seconds(-5)), 0);
        assert_eq!(duration_to_seconds(time::Duration::minutes(2)), 120);
    }
}
