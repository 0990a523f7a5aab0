/// PostgreSQL-backed weather store
use async_trait::async_trait;
use futures_util::{pin_mut, TryStreamExt};
use log::debug;
use time::{Date, OffsetDateTime};
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::{Client, Row};
use uuid::Uuid;

use crate::config::CompactionConfig;
use crate::database::connection::connect;
use crate::database::schema;
use crate::database::store::{check_batch_size, WeatherStore};
use crate::error::StoreError;
use crate::models::{
    AggregateSummary, ContinuationToken, DeviceInfo, KeyPage, NextPage, RawReading, ReadingKey,
    SummaryRecord, WeatherData,
};

/// Weather store over a live-readings table and a summary table
pub struct PgWeatherStore {
    client: Client,
    raw_table: String,
    summary_table: String,
    key_page_size: i64,
}

impl PgWeatherStore {
    /// Connect using the database URL and table names from the configuration
    pub async fn connect(config: &CompactionConfig) -> Result<Self, StoreError> {
        let client = connect(&config.database_url).await?;
        Ok(Self::with_client(
            client,
            &config.raw_table,
            &config.summary_table,
            config.key_page_size,
        ))
    }

    /// Wrap an existing client
    ///
    /// Table names are interpolated into SQL and must already be validated
    /// identifiers.
    pub fn with_client(client: Client, raw_table: &str, summary_table: &str, key_page_size: i64) -> Self {
        Self {
            client,
            raw_table: raw_table.to_string(),
            summary_table: summary_table.to_string(),
            key_page_size,
        }
    }

    /// Create both tables and their indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let ddl = schema::create_tables(&self.raw_table, &self.summary_table);
        self.client.batch_execute(&ddl).await?;
        debug!(
            "Schema ready: raw table {}, summary table {}",
            self.raw_table, self.summary_table
        );
        Ok(())
    }
}

#[async_trait]
impl WeatherStore for PgWeatherStore {
    async fn list_current(&self) -> Result<Vec<RawReading>, StoreError> {
        // One statement streamed to the end; the caller always gets the full set
        let statement = format!(
            "SELECT id, device_id, date_utc, device, data FROM {} ORDER BY date_utc, id",
            self.raw_table
        );
        let rows = self
            .client
            .query_raw(statement.as_str(), std::iter::empty::<&(dyn ToSql + Sync)>())
            .await?;
        pin_mut!(rows);

        let mut readings = Vec::new();
        while let Some(row) = rows.try_next().await? {
            readings.push(reading_from_row(&row)?);
        }
        Ok(readings)
    }

    async fn save_current(&self, reading: &RawReading) -> Result<(), StoreError> {
        let statement = format!(
            "INSERT INTO {}(id, device_id, date_utc, device, data) VALUES ($1, $2, $3, $4, $5)",
            self.raw_table
        );
        self.client
            .execute(
                statement.as_str(),
                &[
                    &reading.id.0,
                    &reading.device_id,
                    &reading.date_utc,
                    &Json(&reading.device),
                    &Json(&reading.data),
                ],
            )
            .await?;
        Ok(())
    }

    async fn save_average(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        let summary = &record.summary;
        let record_count = record_count_param(summary.record_count)?;

        let statement = format!(
            "INSERT INTO {}(id, device_id, local_date, created_at, record_count, earliest, latest, summary)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                device_id = EXCLUDED.device_id,
                local_date = EXCLUDED.local_date,
                created_at = EXCLUDED.created_at,
                record_count = EXCLUDED.record_count,
                earliest = EXCLUDED.earliest,
                latest = EXCLUDED.latest,
                summary = EXCLUDED.summary",
            self.summary_table
        );
        self.client
            .execute(
                statement.as_str(),
                &[
                    &record.id,
                    &summary.device_id,
                    &record.local_date,
                    &record.timestamp,
                    &record_count,
                    &summary.date_time_range_utc.earliest,
                    &summary.date_time_range_utc.latest,
                    &Json(summary),
                ],
            )
            .await?;
        Ok(())
    }

    async fn query_keys_by_device(
        &self,
        device_id: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<KeyPage, StoreError> {
        let after = token.map(parse_token).transpose()?;

        // Keyset pagination: the cursor is the last key seen, so rows deleted
        // or inserted elsewhere never shift later pages
        let statement = format!(
            "SELECT id FROM {} WHERE device_id = $1 AND ($2::uuid IS NULL OR id > $2)
             ORDER BY id LIMIT $3",
            self.raw_table
        );
        let rows = self
            .client
            .query(statement.as_str(), &[&device_id, &after, &self.key_page_size])
            .await?;

        let keys = rows
            .iter()
            .map(|row| row.try_get::<_, Uuid>("id").map(ReadingKey))
            .collect::<Result<Vec<_>, _>>()?;

        let next = next_page(&keys, self.key_page_size);
        Ok(KeyPage { keys, next })
    }

    async fn batch_delete(&self, keys: &[ReadingKey]) -> Result<(), StoreError> {
        check_batch_size(keys)?;
        if keys.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = keys.iter().map(|k| k.0).collect();
        let statement = format!("DELETE FROM {} WHERE id = ANY($1)", self.raw_table);
        let deleted = self.client.execute(statement.as_str(), &[&ids]).await?;
        debug!("Batch delete removed {} of {} rows", deleted, ids.len());
        Ok(())
    }

    async fn query(&self, device_id: &str, local_date: Date) -> Result<Vec<SummaryRecord>, StoreError> {
        let statement = format!(
            "SELECT id, created_at, local_date, summary FROM {}
             WHERE device_id = $1 AND local_date = $2 ORDER BY created_at",
            self.summary_table
        );
        let rows = self
            .client
            .query(statement.as_str(), &[&device_id, &local_date])
            .await?;

        rows.iter().map(summary_from_row).collect()
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

/// A full page may have more behind it; a short or empty one is the last
fn next_page(keys: &[ReadingKey], page_size: i64) -> NextPage {
    match keys.last() {
        Some(last) if keys.len() as i64 == page_size => {
            NextPage::Continue(ContinuationToken(last.0.to_string()))
        }
        _ => NextPage::Done,
    }
}

fn record_count_param(record_count: usize) -> Result<i32, StoreError> {
    i32::try_from(record_count)
        .map_err(|_| StoreError::Encode(format!("record count {} does not fit INTEGER", record_count)))
}

fn parse_token(token: &ContinuationToken) -> Result<Uuid, StoreError> {
    Uuid::parse_str(&token.0)
        .map_err(|e| StoreError::Decode(format!("invalid continuation token {:?}: {}", token.0, e)))
}

fn reading_from_row(row: &Row) -> Result<RawReading, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let date_utc: OffsetDateTime = row.try_get("date_utc")?;
    let Json(device): Json<DeviceInfo> = row.try_get("device")?;
    let Json(data): Json<serde_json::Value> = row.try_get("data")?;
    let data = weather_data_from_json(id, data)?;

    Ok(RawReading {
        id: ReadingKey(id),
        device_id: row.try_get("device_id")?,
        date_utc,
        data,
        device,
    })
}

/// Decode a reading payload, naming the row when it does not fit `WeatherData`
fn weather_data_from_json(id: Uuid, value: serde_json::Value) -> Result<WeatherData, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Decode(format!("reading {} has an unreadable payload: {}", id, e)))
}

fn summary_from_row(row: &Row) -> Result<SummaryRecord, StoreError> {
    let Json(summary): Json<AggregateSummary> = row.try_get("summary")?;

    Ok(SummaryRecord {
        id: row.try_get("id")?,
        timestamp: row.try_get("created_at")?,
        local_date: row.try_get("local_date")?,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(count: usize) -> Vec<ReadingKey> {
        let mut keys: Vec<ReadingKey> = (0..count).map(|_| ReadingKey(Uuid::new_v4())).collect();
        keys.sort();
        keys
    }

    #[test]
    fn full_page_continues_after_its_last_key() {
        let page = keys(3);
        match next_page(&page, 3) {
            NextPage::Continue(token) => assert_eq!(token.0, page[2].0.to_string()),
            NextPage::Done => panic!("a full page should continue"),
        }
    }

    #[test]
    fn short_page_is_the_last_one() {
        assert_eq!(next_page(&keys(2), 3), NextPage::Done);
    }

    #[test]
    fn empty_page_is_the_last_one() {
        assert_eq!(next_page(&[], 3), NextPage::Done);
    }

    #[test]
    fn continuation_token_parses_back_to_the_key() {
        let page = keys(1);
        let token = match next_page(&page, 1) {
            NextPage::Continue(token) => token,
            NextPage::Done => panic!("a full page should continue"),
        };
        assert_eq!(parse_token(&token).unwrap(), page[0].0);
    }

    #[test]
    fn oversized_record_count_is_an_encode_error() {
        assert_eq!(record_count_param(37).unwrap(), 37);
        let too_many = i32::MAX as usize + 1;
        assert!(matches!(record_count_param(too_many), Err(StoreError::Encode(_))));
    }

    #[test]
    fn payload_with_foreign_field_names_is_a_decode_error() {
        let payload = json!({"tempf": 70.0, "baromabsin": 29.9, "PASSKEY": "ABC", "model": "WS2900"});
        let result = weather_data_from_json(Uuid::new_v4(), payload);
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[test]
    fn well_formed_payload_decodes() {
        let payload = json!({"temp_f": 70.0, "humidity": 41.0, "model": "WS2900"});
        let data = weather_data_from_json(Uuid::new_v4(), payload).unwrap();
        assert_eq!(data.temp_f, Some(70.0));
        assert_eq!(data.humidity, Some(41.0));
        assert_eq!(data.model, "WS2900");
    }
}
