use std::env;

const DEFAULT_RAW_TABLE: &str = "live_weather";
const DEFAULT_SUMMARY_TABLE: &str = "weather_summary";
const DEFAULT_KEY_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct CompactionConfig {
    pub database_url: String,
    pub raw_table: String,
    pub summary_table: String,
    /// Keys fetched per page while collecting a device's raw readings
    pub key_page_size: i64,
    /// Defensive cap on key pages per device; unbounded when `None`
    pub max_key_pages: Option<usize>,
    /// Create missing tables before the first pass
    pub create_schema: bool,
    /// Run a pass every this many seconds instead of once
    pub interval_secs: Option<u64>,
}

impl CompactionConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL environment variable not set")?;

        let raw_table = table_name("RAW_TABLE", DEFAULT_RAW_TABLE)?;
        let summary_table = table_name("SUMMARY_TABLE", DEFAULT_SUMMARY_TABLE)?;
        if raw_table == summary_table {
            return Err("RAW_TABLE and SUMMARY_TABLE must differ".into());
        }

        let key_page_size = parse_var::<i64>("KEY_PAGE_SIZE")?.unwrap_or(DEFAULT_KEY_PAGE_SIZE);
        if key_page_size <= 0 {
            return Err(format!("KEY_PAGE_SIZE must be positive, got {}", key_page_size).into());
        }

        let max_key_pages = parse_var::<usize>("MAX_KEY_PAGES")?;
        if max_key_pages == Some(0) {
            return Err("MAX_KEY_PAGES must be at least 1".into());
        }

        let create_schema = parse_var::<bool>("CREATE_SCHEMA")?.unwrap_or(false);

        let interval_secs = parse_var::<u64>("COMPACTION_INTERVAL_SECS")?;
        if interval_secs == Some(0) {
            return Err("COMPACTION_INTERVAL_SECS must be at least 1".into());
        }

        Ok(CompactionConfig {
            database_url,
            raw_table,
            summary_table,
            key_page_size,
            max_key_pages,
            create_schema,
            interval_secs,
        })
    }
}

/// Read an optional variable, failing on values that do not parse
fn parse_var<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {} '{}': {}", key, raw, e).into()),
        Err(_) => Ok(None),
    }
}

fn table_name(key: &str, default: &str) -> Result<String, Box<dyn std::error::Error>> {
    resolve_table_name(key, env::var(key).ok(), default)
}

/// Unset and blank values both fall back to the default, as in `parse_var`
fn resolve_table_name(
    key: &str,
    value: Option<String>,
    default: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let name = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());
    if !is_identifier(&name) {
        return Err(format!("{} '{}' is not a valid SQL identifier", key, name).into());
    }
    Ok(name)
}

/// Table names go straight into SQL text, so only plain identifiers pass
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
