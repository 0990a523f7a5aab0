use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Static metadata about a physical weather station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Feet above sea level
    pub elevation: f64,
    /// Feet above ground
    pub height: f64,
    /// IANA timezone name, e.g. "America/Vancouver"
    pub timezone: String,
}

/// One sample as uploaded by a station.
///
/// Numeric fields are optional: stations omit sensors they do not have and
/// the upload may carry garbage, so nothing here is trusted to be finite.
/// Unknown keys are rejected: a payload under other field names must fail to
/// decode rather than summarize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherData {
    pub barom_abs_in: Option<f64>,
    pub barom_rel_in: Option<f64>,
    pub daily_rain_in: Option<f64>,
    pub event_rain_in: Option<f64>,
    #[serde(default)]
    pub freq: String,
    pub heap: Option<f64>,
    pub hourly_rain_in: Option<f64>,
    pub humidity: Option<f64>,
    pub humidity_in: Option<f64>,
    pub interval: Option<f64>,
    pub max_daily_gust: Option<f64>,
    #[serde(default)]
    pub model: String,
    pub monthly_rain_in: Option<f64>,
    #[serde(default)]
    pub passkey: String,
    pub rain_rate_in: Option<f64>,
    pub runtime: Option<f64>,
    pub solar_radiation: Option<f64>,
    #[serde(default)]
    pub station_type: String,
    pub temp_f: Option<f64>,
    pub temp_in_f: Option<f64>,
    pub total_rain_in: Option<f64>,
    pub uv: Option<f64>,
    pub vpd: Option<f64>,
    pub weekly_rain_in: Option<f64>,
    pub wh65_batt: Option<f64>,
    pub wind_dir: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub yearly_rain_in: Option<f64>,
}

/// Primary key of a raw reading in the live table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReadingKey(pub Uuid);

/// A raw reading waiting to be compacted
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub id: ReadingKey,
    pub device_id: String,
    pub date_utc: OffsetDateTime,
    pub data: WeatherData,
    pub device: DeviceInfo,
}

impl RawReading {
    /// Build a new reading with a fresh key, as the ingestion path does
    pub fn new(device: DeviceInfo, date_utc: OffsetDateTime, data: WeatherData) -> Self {
        Self {
            id: ReadingKey(Uuid::new_v4()),
            device_id: device.id.clone(),
            date_utc,
            data,
            device,
        }
    }
}

/// Minimum, maximum and mean of a sample set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    /// `None` when the sample set had no finite values
    pub avg: Option<f64>,
}

/// Earliest and latest timestamp of a sample set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    #[serde(with = "time::serde::rfc3339")]
    pub earliest: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub latest: OffsetDateTime,
}

/// One `Range` per numeric field of `WeatherData` (runtime excluded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRanges {
    pub barom_abs_in: Range,
    pub barom_rel_in: Range,
    pub daily_rain_in: Range,
    pub event_rain_in: Range,
    pub heap: Range,
    pub hourly_rain_in: Range,
    pub humidity: Range,
    pub humidity_in: Range,
    pub interval: Range,
    pub max_daily_gust: Range,
    pub monthly_rain_in: Range,
    pub rain_rate_in: Range,
    pub solar_radiation: Range,
    pub temp_f: Range,
    pub temp_in_f: Range,
    pub total_rain_in: Range,
    pub uv: Range,
    pub vpd: Range,
    pub weekly_rain_in: Range,
    pub wh65_batt: Range,
    pub wind_dir: Range,
    pub wind_gust_mph: Range,
    pub wind_speed_mph: Range,
    pub yearly_rain_in: Range,
}

/// Compacted statistics for one device over one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub device_id: String,
    pub data: WeatherRanges,
    /// Station uptime counter from the most recent reading
    pub runtime: Option<f64>,
    pub freq: String,
    pub model: String,
    pub passkey: String,
    pub station_type: String,
    pub record_count: usize,
    pub date_time_range_utc: TimeSpan,
    pub device: DeviceInfo,
}

/// A summary as persisted in the summary table
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub id: Uuid,
    pub timestamp: OffsetDateTime,
    pub local_date: Date,
    pub summary: AggregateSummary,
}

/// Readings of a single device collected during one pass
#[derive(Debug, Clone)]
pub struct DeviceGroup {
    pub device_id: String,
    pub readings: Vec<RawReading>,
}

/// Opaque cursor handed back by a paginated key query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(pub String);

/// Whether a key query has more pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    Continue(ContinuationToken),
    Done,
}

/// One page of raw-reading keys for a device
#[derive(Debug, Clone)]
pub struct KeyPage {
    pub keys: Vec<ReadingKey>,
    pub next: NextPage,
}
