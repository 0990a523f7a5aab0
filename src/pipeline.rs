/// One compaction pass: fetch, group, summarize, persist, purge
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use log::{debug, error, info, warn};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::aggregation::summarize;
use crate::database::WeatherStore;
use crate::error::Result;
use crate::models::{AggregateSummary, DeviceGroup, RawReading, SummaryRecord};
use crate::retention::{PurgeStats, RetentionCoordinator};
use crate::utils::local_date;

/// Stage of a pass, for logging and failure reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    Fetching,
    Grouping,
    Summarizing,
    Purging,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassPhase::Idle => "idle",
            PassPhase::Fetching => "fetching",
            PassPhase::Grouping => "grouping",
            PassPhase::Summarizing => "summarizing",
            PassPhase::Purging => "purging",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub readings: usize,
    pub summaries: usize,
    /// `None` when there was nothing to purge
    pub purge: Option<PurgeStats>,
}

/// Group readings by device id, keeping first-seen device order
///
/// Every reading ends up in exactly one group, and within a group readings
/// keep their arrival order.
pub fn group_by_device(readings: Vec<RawReading>) -> Vec<DeviceGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DeviceGroup> = Vec::new();

    for reading in readings {
        match index.get(&reading.device_id) {
            Some(&i) => groups[i].readings.push(reading),
            None => {
                index.insert(reading.device_id.clone(), groups.len());
                groups.push(DeviceGroup {
                    device_id: reading.device_id.clone(),
                    readings: vec![reading],
                });
            }
        }
    }

    groups
}

/// Wrap a summary for persistence with a fresh id and its local date
///
/// The local date is the day of the latest summarized reading in the
/// station's own timezone.
pub fn summary_record(summary: AggregateSummary, now: OffsetDateTime) -> SummaryRecord {
    let local_date = local_date(summary.date_time_range_utc.latest, &summary.device.timezone);
    SummaryRecord {
        id: Uuid::new_v4(),
        timestamp: now,
        local_date,
        summary,
    }
}

/// Drives a single compaction pass against a store
///
/// Not safe to run concurrently with another pass on the same store.
pub struct CompactionPipeline<'a, S: WeatherStore + ?Sized> {
    store: &'a S,
    max_key_pages: Option<usize>,
}

impl<'a, S: WeatherStore + ?Sized> CompactionPipeline<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_key_pages: None,
        }
    }

    /// Cap key pagination per device during the purge
    pub fn with_max_key_pages(mut self, max_key_pages: Option<usize>) -> Self {
        self.max_key_pages = max_key_pages;
        self
    }

    /// Run one pass
    ///
    /// Any error aborts the pass as is: summaries already written stay
    /// written, and raw data is only purged after every summary was saved.
    /// A device whose summary was not saved keeps its raw readings, so
    /// running the pass again picks it up.
    pub async fn run(&self) -> Result<PassReport> {
        let mut phase = PassPhase::Idle;
        let mut persisted = Vec::new();

        let result = self.run_phases(&mut phase, &mut persisted).await;
        match &result {
            Ok(report) => info!(
                "Pass complete: {} readings, {} summaries",
                report.readings, report.summaries
            ),
            Err(e) => error!(
                "Pass failed while {} after persisting {} summaries {:?}: {}",
                phase,
                persisted.len(),
                persisted,
                e
            ),
        }
        result
    }

    async fn run_phases(&self, phase: &mut PassPhase, persisted: &mut Vec<String>) -> Result<PassReport> {
        self.enter(phase, PassPhase::Fetching);
        let readings = self.store.list_current().await?;
        let reading_count = readings.len();
        info!(
            "Fetched {} raw readings from {} store",
            reading_count,
            self.store.backend_type()
        );

        self.enter(phase, PassPhase::Grouping);
        let groups = group_by_device(readings);
        info!("Grouped readings into {} devices", groups.len());

        self.enter(phase, PassPhase::Summarizing);
        for group in &groups {
            if group.readings.is_empty() {
                continue;
            }
            debug!(
                "Summarizing device {} with {} readings",
                group.device_id,
                group.readings.len()
            );

            let summary = summarize(&group.readings)?;
            let record = summary_record(summary, OffsetDateTime::now_utc());
            self.store.save_average(&record).await?;

            info!(
                "Saved summary {} for device {} ({})",
                record.id, group.device_id, record.local_date
            );
            persisted.push(group.device_id.clone());
        }

        // Purge goes by device, not by the keys read above: readings that
        // arrived after the fetch are deleted unsummarized.
        let processed: BTreeSet<String> = persisted.iter().cloned().collect();
        let purge = if processed.is_empty() {
            warn!("No raw readings to compact in this pass");
            None
        } else {
            self.enter(phase, PassPhase::Purging);
            let stats = RetentionCoordinator::new(self.store)
                .with_max_pages(self.max_key_pages)
                .purge(&processed)
                .await?;
            info!(
                "Purged {} raw readings of {} devices in {} batches",
                stats.keys, stats.devices, stats.batches
            );
            Some(stats)
        };

        self.enter(phase, PassPhase::Idle);
        Ok(PassReport {
            readings: reading_count,
            summaries: persisted.len(),
            purge,
        })
    }

    fn enter(&self, phase: &mut PassPhase, next: PassPhase) {
        debug!("Pass phase {} -> {}", phase, next);
        *phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::reading;
    use crate::database::MemoryStore;
    use crate::error::CompactionError;
    use time::macros::{date, datetime};

    async fn seed(store: &MemoryStore, device: &str, temps: &[f64]) {
        for (i, temp) in temps.iter().enumerate() {
            let at = datetime!(2025-06-01 18:00 UTC) + time::Duration::minutes(5 * i as i64);
            store.save_current(&reading(device, at, Some(*temp))).await.unwrap();
        }
    }

    #[test]
    fn grouping_is_a_stable_partition() {
        let at = datetime!(2025-06-01 00:00 UTC);
        let readings = vec![
            reading("D2", at, Some(1.0)),
            reading("D1", at, Some(2.0)),
            reading("D2", at, Some(3.0)),
            reading("d1", at, Some(4.0)),
            reading("D1", at, Some(5.0)),
        ];
        let ids: Vec<_> = readings.iter().map(|r| r.id).collect();

        let groups = group_by_device(readings);

        let order: Vec<_> = groups.iter().map(|g| g.device_id.as_str()).collect();
        assert_eq!(order, vec!["D2", "D1", "d1"]);
        for group in &groups {
            assert!(group.readings.iter().all(|r| r.device_id == group.device_id));
        }
        let mut grouped: Vec<_> = groups.iter().flat_map(|g| g.readings.iter().map(|r| r.id)).collect();
        let mut expected = ids;
        grouped.sort();
        expected.sort();
        assert_eq!(grouped, expected);
        let d2_temps: Vec<_> = groups[0].readings.iter().map(|r| r.data.temp_f).collect();
        assert_eq!(d2_temps, vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn summary_record_uses_station_local_date() {
        let readings = vec![reading("D1", datetime!(2025-06-02 03:00 UTC), Some(60.0))];
        let summary = summarize(&readings).unwrap();

        let record = summary_record(summary, datetime!(2025-06-02 04:00 UTC));

        // 03:00 UTC is 20:00 the previous day in Vancouver
        assert_eq!(record.local_date, date!(2025-06-01));
        assert_eq!(record.timestamp, datetime!(2025-06-02 04:00 UTC));
    }

    #[tokio::test]
    async fn pass_summarizes_each_device_and_purges_once() {
        let store = MemoryStore::new();
        seed(&store, "D1", &[70.0, 72.0, 74.0]).await;
        seed(&store, "D2", &[50.0, 52.0]).await;

        let report = CompactionPipeline::new(&store).run().await.unwrap();

        assert_eq!(report.readings, 5);
        assert_eq!(report.summaries, 2);
        assert_eq!(report.purge, Some(PurgeStats { devices: 2, keys: 5, batches: 2 }));
        assert_eq!(store.raw_count(), 0);

        let summaries = store.summaries();
        let d1 = summaries.iter().find(|s| s.summary.device_id == "D1").unwrap();
        assert_eq!(d1.summary.record_count, 3);
        assert_eq!(d1.summary.data.temp_f.avg, Some(72.0));
    }

    #[tokio::test]
    async fn empty_store_is_a_quiet_no_op() {
        let store = MemoryStore::new();

        let report = CompactionPipeline::new(&store).run().await.unwrap();

        assert_eq!(report, PassReport::default());
        assert_eq!(store.key_query_count(), 0);
        assert!(store.delete_call_sizes().is_empty());
    }

    #[tokio::test]
    async fn failed_save_skips_purge_entirely() {
        let store = MemoryStore::new();
        seed(&store, "D1", &[70.0, 71.0]).await;
        seed(&store, "D2", &[40.0]).await;
        store.fail_save_average_for("D2");

        let result = CompactionPipeline::new(&store).run().await;

        assert!(matches!(result, Err(CompactionError::Store(_))));
        // D1 was saved, but purge never ran, so nothing is lost
        assert_eq!(store.summaries().len(), 1);
        assert_eq!(store.raw_count(), 3);
        assert_eq!(store.key_query_count(), 0);
    }

    #[tokio::test]
    async fn failed_fetch_touches_nothing() {
        let store = MemoryStore::new();
        seed(&store, "D1", &[70.0]).await;
        store.fail_list_current();

        let result = CompactionPipeline::new(&store).run().await;

        assert!(matches!(result, Err(CompactionError::Store(_))));
        assert!(store.summaries().is_empty());
        assert_eq!(store.raw_count(), 1);
    }
}
