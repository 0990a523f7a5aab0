/// Purging of raw readings once their devices have been summarized
use std::collections::BTreeSet;

use log::{debug, info};

use crate::database::{WeatherStore, MAX_BATCH_DELETE};
use crate::error::{CompactionError, Result};
use crate::models::{NextPage, ReadingKey};

/// Totals of one purge, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub devices: usize,
    pub keys: usize,
    pub batches: usize,
}

/// Deletes every stored raw reading of a set of devices
pub struct RetentionCoordinator<'a, S: WeatherStore + ?Sized> {
    store: &'a S,
    max_pages: Option<usize>,
}

impl<'a, S: WeatherStore + ?Sized> RetentionCoordinator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_pages: None,
        }
    }

    /// Give up on a device whose key pagination runs past `max_pages`
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Purge all raw readings of the given devices
    ///
    /// Devices are handled one after another. For each one every key is
    /// collected first and only then deleted, in chunks of at most
    /// `MAX_BATCH_DELETE`. The first store error aborts the purge; chunks
    /// already deleted stay deleted.
    ///
    /// # Arguments
    /// * `device_ids` - Devices whose raw readings should be removed
    ///
    /// # Returns
    /// Totals of what was deleted
    pub async fn purge(&self, device_ids: &BTreeSet<String>) -> Result<PurgeStats> {
        let mut stats = PurgeStats::default();

        for device_id in device_ids {
            let keys = self.collect_keys(device_id).await?;
            let batches = self.delete_in_batches(&keys).await?;

            info!(
                "Purged {} raw readings for device {} in {} batches",
                keys.len(),
                device_id,
                batches
            );

            stats.devices += 1;
            stats.keys += keys.len();
            stats.batches += batches;
        }

        Ok(stats)
    }

    /// Drain the key pagination of one device
    async fn collect_keys(&self, device_id: &str) -> Result<Vec<ReadingKey>> {
        let mut keys = Vec::new();
        let mut token = None;
        let mut pages = 0usize;

        loop {
            if let Some(max_pages) = self.max_pages {
                if pages >= max_pages {
                    return Err(CompactionError::ContinuationExhausted {
                        device_id: device_id.to_string(),
                        pages,
                    });
                }
            }

            let page = self.store.query_keys_by_device(device_id, token.as_ref()).await?;
            pages += 1;
            debug!(
                "Device {}: page {} returned {} keys",
                device_id,
                pages,
                page.keys.len()
            );
            keys.extend(page.keys);

            match page.next {
                NextPage::Continue(next) => token = Some(next),
                NextPage::Done => break,
            }
        }

        Ok(keys)
    }

    async fn delete_in_batches(&self, keys: &[ReadingKey]) -> Result<usize> {
        let mut batches = 0;
        for chunk in keys.chunks(MAX_BATCH_DELETE) {
            self.store.batch_delete(chunk).await?;
            batches += 1;
        }
        Ok(batches)
    }
}
