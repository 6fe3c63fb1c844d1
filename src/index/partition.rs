//! Hive-style partition handling for the detection dataset.
//!
//! Dataset layout: `<root>/site=<id>/date=<YYYY-MM-DD>/<file>.parquet`.
//! Partition pruning happens on these path segments alone, so only files
//! inside the filter's site/date bounds are ever opened.

use crate::index::QueryFilters;
use chrono::NaiveDate;

/// One parquet file within a site/date partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionFile {
    /// Site partition value.
    pub site: String,
    /// Date partition value.
    pub date: NaiveDate,
    /// Full object key.
    pub key: String,
}

/// Parse an object key into its partition values.
///
/// Returns `None` for keys outside the expected layout (stray manifests,
/// non-parquet objects), which are ignored rather than failed on.
pub(crate) fn parse_partition_key(root: &str, key: &str) -> Option<PartitionFile> {
    let relative = key.strip_prefix(root)?.strip_prefix('/')?;
    let mut segments = relative.split('/');

    let site = segments.next()?.strip_prefix("site=")?;
    let date_str = segments.next()?.strip_prefix("date=")?;
    let file = segments.next()?;

    if segments.next().is_some() || !file.ends_with(".parquet") {
        return None;
    }

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;

    Some(PartitionFile {
        site: site.to_string(),
        date,
        key: key.to_string(),
    })
}

impl PartitionFile {
    /// Whether this partition falls within the filter's site/date bounds.
    pub(crate) fn matches(&self, filters: &QueryFilters) -> bool {
        if let Some(sites) = &filters.sites
            && !sites.contains(&self.site)
        {
            return false;
        }
        if let Some((start, end)) = filters.date_range
            && (self.date < start || self.date > end)
        {
            return false;
        }
        true
    }
}
