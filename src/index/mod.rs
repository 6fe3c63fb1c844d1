//! Metadata index over the partitioned detection dataset.
//!
//! Queries prune site/date partitions from the object listing before any
//! parquet file is opened, then scan the surviving files with column
//! projection and confidence pushdown. Results are ordered by
//! `(recording_timestamp, source_relative_path, offset_seconds)` ascending,
//! so pagination over repeated identical queries is deterministic.

mod partition;
mod scan;
mod types;

pub use scan::{COL_CONFIDENCE, COL_OFFSET, COL_PATH, COL_SITE, COL_SPECIES, COL_TIMESTAMP};
pub use types::{DetectionRecord, QueryFilters};

use crate::error::{Error, Result};
use crate::store::StoreClient;
use partition::{PartitionFile, parse_partition_key};
use std::collections::HashMap;
use tracing::debug;

/// Read-only index over the columnar detection dataset.
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    store: StoreClient,
    root: String,
}

impl MetadataIndex {
    /// Create an index over the dataset rooted at `detections_root`.
    pub fn new(store: StoreClient, detections_root: impl Into<String>) -> Self {
        let root = detections_root.into();
        Self {
            store,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// Detections matching the filters, in stable ascending order.
    pub async fn query(&self, filters: &QueryFilters) -> Result<Vec<DetectionRecord>> {
        self.collect(filters).await
    }

    /// Number of detections matching the filters.
    pub async fn count(&self, filters: &QueryFilters) -> Result<usize> {
        Ok(self.collect(filters).await?.len())
    }

    /// Top species by detection count across the whole dataset, descending.
    /// Ties break by species name so the checklist is stable.
    pub async fn species_summary(&self, limit: usize) -> Result<Vec<(String, usize)>> {
        let records = self.collect(&QueryFilters::all()).await?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in records {
            *counts.entry(record.species_label).or_insert(0) += 1;
        }

        let mut summary: Vec<(String, usize)> = counts.into_iter().collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary.truncate(limit);
        Ok(summary)
    }

    async fn collect(&self, filters: &QueryFilters) -> Result<Vec<DetectionRecord>> {
        let mut partitions = self.matching_partitions(filters).await?;
        // Deterministic scan order regardless of listing order.
        partitions.sort_by(|a, b| a.key.cmp(&b.key));

        let mut records = Vec::new();
        for partition in &partitions {
            records.extend(scan::scan_file(&self.store, &partition.key, filters).await?);
        }

        records.sort_by(|a, b| {
            a.recording_timestamp
                .cmp(&b.recording_timestamp)
                .then_with(|| a.source_relative_path.cmp(&b.source_relative_path))
                .then_with(|| a.offset_seconds.total_cmp(&b.offset_seconds))
        });

        Ok(records)
    }

    async fn matching_partitions(&self, filters: &QueryFilters) -> Result<Vec<PartitionFile>> {
        let keys = self.store.list(&self.root).await?;

        let total = keys.len();
        let matched: Vec<PartitionFile> = keys
            .iter()
            .filter_map(|key| parse_partition_key(&self.root, key))
            .filter(|partition| partition.matches(filters))
            .collect();

        debug!(
            root = %self.root,
            listed = total,
            matched = matched.len(),
            "pruned dataset partitions"
        );

        if matched.is_empty() {
            return Err(Error::DataUnavailable {
                root: self.root.clone(),
            });
        }

        Ok(matched)
    }
}
