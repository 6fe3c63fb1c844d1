//! Detection record and query filter types.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;

/// A single model-predicted detection, read from the columnar dataset.
///
/// Produced by an offline pipeline; this system only reads it. Uniquely
/// identified by `(source_relative_path, offset_seconds)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    /// Monitoring site the recording came from.
    pub site_id: String,
    /// Start of the source recording (UTC, naive).
    pub recording_timestamp: NaiveDateTime,
    /// Predicted species (scientific name).
    pub species_label: String,
    /// Model confidence in `[0, 1]`.
    pub model_confidence: f32,
    /// Path of the source audio file, relative to the audio archive root.
    pub source_relative_path: String,
    /// Offset of the detection within the source recording, in seconds.
    pub offset_seconds: f64,
}

impl DetectionRecord {
    /// Stable identity derived from the record's unique key.
    pub fn detection_id(&self) -> String {
        format!("{}@{:.3}", self.source_relative_path, self.offset_seconds)
    }

    /// Date component of the recording timestamp (partition date).
    pub fn recording_date(&self) -> NaiveDate {
        self.recording_timestamp.date()
    }
}

/// Filters applied to a metadata query.
///
/// Site and date bounds prune partitions before any file is opened; the
/// confidence threshold is pushed into the parquet row-group scan; species
/// and exclusion sets are applied per decoded row.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    /// Restrict to these sites. `None` means all sites.
    pub sites: Option<HashSet<String>>,
    /// Inclusive date range on the partition date.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Restrict to these species labels. `None` means all species.
    pub species: Option<HashSet<String>>,
    /// Minimum model confidence.
    pub min_confidence: Option<f32>,
    /// Detection ids to exclude (already-annotated detections).
    pub exclude_ids: HashSet<String>,
}

impl QueryFilters {
    /// No filtering: the entire dataset.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given sites.
    #[must_use]
    pub fn with_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites = Some(sites.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to partition dates in `[start, end]`.
    #[must_use]
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    /// Restrict to the given species labels.
    #[must_use]
    pub fn with_species<I, S>(mut self, species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.species = Some(species.into_iter().map(Into::into).collect());
        self
    }

    /// Require at least this model confidence.
    #[must_use]
    pub fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = Some(threshold);
        self
    }

    /// Exclude the given detection ids.
    #[must_use]
    pub fn with_excluded(mut self, ids: HashSet<String>) -> Self {
        self.exclude_ids = ids;
        self
    }

    /// Row-level check applied after the columnar scan.
    pub(crate) fn matches_row(&self, record: &DetectionRecord) -> bool {
        if let Some(species) = &self.species
            && !species.contains(&record.species_label)
        {
            return false;
        }
        if let Some(threshold) = self.min_confidence
            && record.model_confidence < threshold
        {
            return false;
        }
        if !self.exclude_ids.is_empty() && self.exclude_ids.contains(&record.detection_id()) {
            return false;
        }
        true
    }
}
