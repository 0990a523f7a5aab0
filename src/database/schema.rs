/// DDL for the live-readings and summary tables
pub fn create_tables(raw_table: &str, summary_table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {raw} (
            id UUID PRIMARY KEY,
            device_id TEXT NOT NULL,
            date_utc TIMESTAMPTZ NOT NULL,
            device JSONB NOT NULL,
            data JSONB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {raw}_device_id_idx ON {raw} (device_id, id);
        CREATE TABLE IF NOT EXISTS {summary} (
            id UUID PRIMARY KEY,
            device_id TEXT NOT NULL,
            local_date DATE NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            record_count INTEGER NOT NULL,
            earliest TIMESTAMPTZ NOT NULL,
            latest TIMESTAMPTZ NOT NULL,
            summary JSONB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS {summary}_device_date_idx ON {summary} (device_id, local_date);",
        raw = raw_table,
        summary = summary_table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_uses_configured_table_names() {
        let ddl = create_tables("live_weather", "weather_summary");
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS live_weather ("));
        assert!(ddl.contains("ON live_weather (device_id, id)"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS weather_summary ("));
        assert!(ddl.contains("weather_summary_device_date_idx"));
    }
}
