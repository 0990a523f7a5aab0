/// Boundary between the compaction core and whatever holds the data
use async_trait::async_trait;
use time::Date;

use crate::error::StoreError;
use crate::models::{ContinuationToken, KeyPage, RawReading, ReadingKey, SummaryRecord};

/// Largest number of keys a single `batch_delete` call may carry
pub const MAX_BATCH_DELETE: usize = 25;

/// Raw-reading and summary storage used by a compaction pass
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Every raw reading currently waiting to be compacted
    async fn list_current(&self) -> Result<Vec<RawReading>, StoreError>;

    /// Insert one raw reading (ingestion path)
    async fn save_current(&self, reading: &RawReading) -> Result<(), StoreError>;

    /// Upsert one summary keyed by its id
    async fn save_average(&self, record: &SummaryRecord) -> Result<(), StoreError>;

    /// One page of raw-reading keys for a device
    ///
    /// Pass `None` for the first page and the token from `NextPage::Continue`
    /// for the following ones.
    async fn query_keys_by_device(
        &self,
        device_id: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<KeyPage, StoreError>;

    /// Delete up to `MAX_BATCH_DELETE` raw readings in one call
    async fn batch_delete(&self, keys: &[ReadingKey]) -> Result<(), StoreError>;

    /// Summaries of a device for one local calendar date
    async fn query(&self, device_id: &str, local_date: Date) -> Result<Vec<SummaryRecord>, StoreError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

/// Reject batches the store cannot take in one call
pub fn check_batch_size(keys: &[ReadingKey]) -> Result<(), StoreError> {
    if keys.len() > MAX_BATCH_DELETE {
        return Err(StoreError::BatchTooLarge {
            len: keys.len(),
            max: MAX_BATCH_DELETE,
        });
    }
    Ok(())
}
