/// In-process weather store
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::debug;
use time::Date;

use crate::database::store::{check_batch_size, WeatherStore};
use crate::error::StoreError;
use crate::models::{ContinuationToken, KeyPage, NextPage, RawReading, ReadingKey, SummaryRecord};

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Default)]
struct Inner {
    raw: Vec<RawReading>,
    summaries: Vec<SummaryRecord>,
    delete_calls: Vec<usize>,
    key_queries: usize,
    fail_list_current: bool,
    fail_save_average_for: Option<String>,
    fail_batch_delete_after: Option<usize>,
}

/// Weather store kept in memory
///
/// Enforces the same page and batch limits as the Postgres store, records
/// every batch-delete call it receives and can be told to fail on purpose.
pub struct MemoryStore {
    page_size: usize,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Store returning at most `page_size` keys per key query
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Make `list_current` fail
    pub fn fail_list_current(&self) {
        self.lock().fail_list_current = true;
    }

    /// Make `save_average` fail for one device
    pub fn fail_save_average_for(&self, device_id: &str) {
        self.lock().fail_save_average_for = Some(device_id.to_string());
    }

    /// Let `calls` batch deletes succeed, then fail every following one
    pub fn fail_batch_delete_after(&self, calls: usize) {
        self.lock().fail_batch_delete_after = Some(calls);
    }

    /// Number of keys in each batch-delete call, in call order
    pub fn delete_call_sizes(&self) -> Vec<usize> {
        self.lock().delete_calls.clone()
    }

    /// Number of key-page queries served
    pub fn key_query_count(&self) -> usize {
        self.lock().key_queries
    }

    pub fn raw_count(&self) -> usize {
        self.lock().raw.len()
    }

    pub fn raw_count_for(&self, device_id: &str) -> usize {
        self.lock().raw.iter().filter(|r| r.device_id == device_id).count()
    }

    pub fn summaries(&self) -> Vec<SummaryRecord> {
        self.lock().summaries.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherStore for MemoryStore {
    async fn list_current(&self) -> Result<Vec<RawReading>, StoreError> {
        let inner = self.lock();
        if inner.fail_list_current {
            return Err(StoreError::Unavailable("list_current failed".to_string()));
        }
        Ok(inner.raw.clone())
    }

    async fn save_current(&self, reading: &RawReading) -> Result<(), StoreError> {
        self.lock().raw.push(reading.clone());
        Ok(())
    }

    async fn save_average(&self, record: &SummaryRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.fail_save_average_for.as_deref() == Some(record.summary.device_id.as_str()) {
            return Err(StoreError::Unavailable(format!(
                "save_average failed for {}",
                record.summary.device_id
            )));
        }

        match inner.summaries.iter().position(|s| s.id == record.id) {
            Some(i) => inner.summaries[i] = record.clone(),
            None => inner.summaries.push(record.clone()),
        }
        Ok(())
    }

    async fn query_keys_by_device(
        &self,
        device_id: &str,
        token: Option<&ContinuationToken>,
    ) -> Result<KeyPage, StoreError> {
        // Offset cursor: only stable while nothing is deleted mid-pagination
        let offset = match token {
            Some(token) => token
                .0
                .parse::<usize>()
                .map_err(|e| StoreError::Decode(format!("invalid continuation token {:?}: {}", token.0, e)))?,
            None => 0,
        };

        let mut inner = self.lock();
        inner.key_queries += 1;

        let matching: Vec<ReadingKey> = inner
            .raw
            .iter()
            .filter(|r| r.device_id == device_id)
            .map(|r| r.id)
            .collect();

        let keys: Vec<ReadingKey> = matching.iter().skip(offset).take(self.page_size).copied().collect();
        let end = offset + keys.len();
        let next = if end < matching.len() {
            NextPage::Continue(ContinuationToken(end.to_string()))
        } else {
            NextPage::Done
        };

        Ok(KeyPage { keys, next })
    }

    async fn batch_delete(&self, keys: &[ReadingKey]) -> Result<(), StoreError> {
        check_batch_size(keys)?;

        let mut inner = self.lock();
        if let Some(limit) = inner.fail_batch_delete_after {
            if inner.delete_calls.len() >= limit {
                return Err(StoreError::Unavailable("batch_delete failed".to_string()));
            }
        }

        inner.delete_calls.push(keys.len());
        let before = inner.raw.len();
        inner.raw.retain(|r| !keys.contains(&r.id));
        debug!("Memory batch delete removed {} rows", before - inner.raw.len());
        Ok(())
    }

    async fn query(&self, device_id: &str, local_date: Date) -> Result<Vec<SummaryRecord>, StoreError> {
        Ok(self
            .lock()
            .summaries
            .iter()
            .filter(|s| s.summary.device_id == device_id && s.local_date == local_date)
            .cloned()
            .collect())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::reading;
    use time::macros::datetime;

    async fn seeded(page_size: usize, count: usize) -> MemoryStore {
        let store = MemoryStore::with_page_size(page_size);
        for i in 0..count {
            let at = datetime!(2025-06-01 00:00 UTC) + time::Duration::minutes(i as i64);
            store.save_current(&reading("D1", at, Some(60.0))).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn key_pages_follow_continuation_until_done() {
        let store = seeded(4, 10).await;

        let first = store.query_keys_by_device("D1", None).await.unwrap();
        assert_eq!(first.keys.len(), 4);
        let token = match first.next {
            NextPage::Continue(token) => token,
            NextPage::Done => panic!("expected more pages"),
        };

        let second = store.query_keys_by_device("D1", Some(&token)).await.unwrap();
        assert_eq!(second.keys.len(), 4);
        assert!(second.keys.iter().all(|k| !first.keys.contains(k)));

        let token = match second.next {
            NextPage::Continue(token) => token,
            NextPage::Done => panic!("expected a third page"),
        };
        let third = store.query_keys_by_device("D1", Some(&token)).await.unwrap();
        assert_eq!(third.keys.len(), 2);
        assert_eq!(third.next, NextPage::Done);
    }

    #[tokio::test]
    async fn unknown_device_has_single_empty_page() {
        let store = seeded(4, 3).await;
        let page = store.query_keys_by_device("nope", None).await.unwrap();
        assert!(page.keys.is_empty());
        assert_eq!(page.next, NextPage::Done);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let store = seeded(100, 30).await;
        let page = store.query_keys_by_device("D1", None).await.unwrap();

        let result = store.batch_delete(&page.keys).await;

        assert!(matches!(result, Err(StoreError::BatchTooLarge { len: 30, max: 25 })));
        assert_eq!(store.raw_count(), 30);
        assert!(store.delete_call_sizes().is_empty());
    }

    #[tokio::test]
    async fn garbage_token_is_a_decode_error() {
        let store = seeded(4, 3).await;
        let token = ContinuationToken("not-an-offset".to_string());
        let result = store.query_keys_by_device("D1", Some(&token)).await;
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }
}
