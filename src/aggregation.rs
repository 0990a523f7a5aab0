/// Reduction of one device's raw readings into a single summary
use crate::error::{CompactionError, Result};
use crate::models::{AggregateSummary, Range, RawReading, TimeSpan, WeatherData, WeatherRanges};

/// Summarize the readings of a single device
///
/// Every numeric field becomes a `Range` over its finite values. Descriptive
/// fields and the device metadata come from the first reading, the `runtime`
/// counter from the last one. All readings are assumed to belong to the same
/// station; nothing is cross-checked.
///
/// # Arguments
/// * `readings` - Readings of one device, in arrival order
///
/// # Returns
/// The summary, or `EmptyInput` if `readings` is empty
pub fn summarize(readings: &[RawReading]) -> Result<AggregateSummary> {
    let (first, last) = match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(CompactionError::EmptyInput("aggregate summary")),
    };

    let data = WeatherRanges {
        barom_abs_in: field_range(readings, |d| d.barom_abs_in),
        barom_rel_in: field_range(readings, |d| d.barom_rel_in),
        daily_rain_in: field_range(readings, |d| d.daily_rain_in),
        event_rain_in: field_range(readings, |d| d.event_rain_in),
        heap: field_range(readings, |d| d.heap),
        hourly_rain_in: field_range(readings, |d| d.hourly_rain_in),
        humidity: field_range(readings, |d| d.humidity),
        humidity_in: field_range(readings, |d| d.humidity_in),
        interval: field_range(readings, |d| d.interval),
        max_daily_gust: field_range(readings, |d| d.max_daily_gust),
        monthly_rain_in: field_range(readings, |d| d.monthly_rain_in),
        rain_rate_in: field_range(readings, |d| d.rain_rate_in),
        solar_radiation: field_range(readings, |d| d.solar_radiation),
        temp_f: field_range(readings, |d| d.temp_f),
        temp_in_f: field_range(readings, |d| d.temp_in_f),
        total_rain_in: field_range(readings, |d| d.total_rain_in),
        uv: field_range(readings, |d| d.uv),
        vpd: field_range(readings, |d| d.vpd),
        weekly_rain_in: field_range(readings, |d| d.weekly_rain_in),
        wh65_batt: field_range(readings, |d| d.wh65_batt),
        wind_dir: field_range(readings, |d| d.wind_dir),
        wind_gust_mph: field_range(readings, |d| d.wind_gust_mph),
        wind_speed_mph: field_range(readings, |d| d.wind_speed_mph),
        yearly_rain_in: field_range(readings, |d| d.yearly_rain_in),
    };

    let date_time_range_utc = TimeSpan::from_timestamps(readings.iter().map(|r| r.date_utc))?;

    Ok(AggregateSummary {
        device_id: first.device_id.clone(),
        data,
        // Monotonic counter: the latest state wins
        runtime: last.data.runtime,
        freq: first.data.freq.clone(),
        model: first.data.model.clone(),
        passkey: first.data.passkey.clone(),
        station_type: first.data.station_type.clone(),
        record_count: readings.len(),
        date_time_range_utc,
        device: first.device.clone(),
    })
}

type FieldGetter = fn(&WeatherData) -> Option<f64>;

fn field_range(readings: &[RawReading], field: FieldGetter) -> Range {
    Range::from_samples(readings.iter().map(|r| field(&r.data)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::DeviceInfo;
    use time::macros::datetime;
    use time::OffsetDateTime;

    pub(crate) fn station(id: &str) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: format!("Station {}", id),
            location: "Mount Woodside launch".to_string(),
            latitude: 49.24,
            longitude: -121.89,
            elevation: 2460.0,
            height: 10.0,
            timezone: "America/Vancouver".to_string(),
        }
    }

    pub(crate) fn reading(device: &str, at: OffsetDateTime, temp_f: Option<f64>) -> RawReading {
        let data = WeatherData {
            temp_f,
            humidity: Some(55.0),
            model: "WS2900".to_string(),
            freq: "915M".to_string(),
            station_type: "EasyWeatherPro_V5.1.1".to_string(),
            passkey: "ABC123".to_string(),
            ..Default::default()
        };
        RawReading::new(station(device), at, data)
    }

    #[test]
    fn summarize_rejects_empty_group() {
        assert!(matches!(summarize(&[]), Err(CompactionError::EmptyInput(_))));
    }

    #[test]
    fn summarize_builds_ranges_per_field() {
        let readings = vec![
            reading("D1", datetime!(2025-06-01 10:00 UTC), Some(70.0)),
            reading("D1", datetime!(2025-06-01 10:05 UTC), Some(72.0)),
            reading("D1", datetime!(2025-06-01 10:10 UTC), Some(74.0)),
        ];

        let summary = summarize(&readings).unwrap();

        assert_eq!(summary.device_id, "D1");
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.data.temp_f.min, 70.0);
        assert_eq!(summary.data.temp_f.max, 74.0);
        assert_eq!(summary.data.temp_f.avg, Some(72.0));
        assert_eq!(summary.data.humidity.avg, Some(55.0));
        // Fields never reported stay empty
        assert_eq!(summary.data.uv.avg, None);
        assert_eq!(summary.date_time_range_utc.earliest, datetime!(2025-06-01 10:00 UTC));
        assert_eq!(summary.date_time_range_utc.latest, datetime!(2025-06-01 10:10 UTC));
    }

    #[test]
    fn summarize_excludes_nan_samples() {
        let readings = vec![
            reading("D1", datetime!(2025-06-01 10:00 UTC), Some(f64::NAN)),
            reading("D1", datetime!(2025-06-01 10:05 UTC), Some(68.0)),
        ];

        let summary = summarize(&readings).unwrap();

        assert_eq!(summary.data.temp_f.min, 68.0);
        assert_eq!(summary.data.temp_f.max, 68.0);
        assert_eq!(summary.data.temp_f.avg, Some(68.0));
    }

    #[test]
    fn descriptive_fields_from_first_runtime_from_last() {
        let mut first = reading("D1", datetime!(2025-06-01 10:00 UTC), Some(60.0));
        first.data.runtime = Some(100.0);
        first.data.model = "first-model".to_string();
        let mut last = reading("D1", datetime!(2025-06-01 09:00 UTC), Some(61.0));
        last.data.runtime = Some(400.0);
        last.data.model = "last-model".to_string();

        let summary = summarize(&[first.clone(), last]).unwrap();

        assert_eq!(summary.model, "first-model");
        assert_eq!(summary.runtime, Some(400.0));
        assert_eq!(summary.passkey, "ABC123");
        assert_eq!(summary.device, first.device);
        // Arrival order decides runtime, timestamps decide the span
        assert_eq!(summary.date_time_range_utc.earliest, datetime!(2025-06-01 09:00 UTC));
    }
}
