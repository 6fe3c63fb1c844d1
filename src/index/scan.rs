//! Async parquet scan over a single partition file.
//!
//! Reads via byte-range requests against the object store, projecting only
//! the detection columns and pushing the confidence threshold into the row
//! scan so non-matching row groups are skipped.

use crate::error::{Error, Result};
use crate::index::{DetectionRecord, QueryFilters};
use crate::store::StoreClient;
use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, StringArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime};
use futures_util::TryStreamExt;
use object_store::path::Path as ObjectPath;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ArrowPredicateFn, RowFilter};
use parquet::arrow::async_reader::{ParquetObjectReader, ParquetRecordBatchStreamBuilder};
use tracing::warn;

/// Site identifier column.
pub const COL_SITE: &str = "site_id";
/// Recording start timestamp column.
pub const COL_TIMESTAMP: &str = "recording_timestamp";
/// Predicted species column.
pub const COL_SPECIES: &str = "species_label";
/// Model confidence column.
pub const COL_CONFIDENCE: &str = "model_confidence";
/// Source audio path column (relative to the audio root).
pub const COL_PATH: &str = "source_relative_path";
/// Detection offset column, in seconds.
pub const COL_OFFSET: &str = "offset_seconds";

struct ColumnIndices {
    all: Vec<usize>,
    confidence: usize,
}

/// Scan one parquet object and return the decoded rows that pass the
/// filters. Rows are in file order; the caller sorts.
pub(crate) async fn scan_file(
    store: &StoreClient,
    key: &str,
    filters: &QueryFilters,
) -> Result<Vec<DetectionRecord>> {
    let size = store.head(key).await?.ok_or_else(|| Error::ObjectNotFound {
        key: key.to_string(),
    })?;

    let reader =
        ParquetObjectReader::new(store.inner(), ObjectPath::from(key)).with_file_size(size);
    let mut builder = ParquetRecordBatchStreamBuilder::new(reader)
        .await
        .map_err(|e| parquet_error(key, e))?;

    let indices = required_column_indices(key, builder.schema())?;
    let projection = ProjectionMask::roots(builder.parquet_schema(), indices.all.clone());

    if let Some(threshold) = filters.min_confidence {
        let predicate_mask =
            ProjectionMask::roots(builder.parquet_schema(), vec![indices.confidence]);
        let predicate = ArrowPredicateFn::new(predicate_mask, move |batch: RecordBatch| {
            let values: Vec<bool> = batch
                .column(0)
                .as_any()
                .downcast_ref::<Float32Array>()
                .map_or_else(
                    || vec![true; batch.num_rows()],
                    |arr| {
                        (0..arr.len())
                            .map(|i| !arr.is_null(i) && arr.value(i) >= threshold)
                            .collect()
                    },
                );
            Ok(BooleanArray::from(values))
        });
        builder = builder.with_row_filter(RowFilter::new(vec![Box::new(predicate)]));
    }

    let mut stream = builder
        .with_projection(projection)
        .build()
        .map_err(|e| parquet_error(key, e))?;

    let mut records = Vec::new();
    while let Some(batch) = stream
        .try_next()
        .await
        .map_err(|e| parquet_error(key, e))?
    {
        append_batch_rows(key, &batch, filters, &mut records)?;
    }

    Ok(records)
}

fn parquet_error(key: &str, source: parquet::errors::ParquetError) -> Error {
    Error::ParquetRead {
        key: key.to_string(),
        source,
    }
}

fn schema_mismatch(key: &str, message: impl Into<String>) -> Error {
    Error::SchemaMismatch {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Resolve the required columns to file-schema indices, failing with
/// `SchemaMismatch` when a column is absent or mistyped. Results are never
/// silently dropped on upstream format drift.
fn required_column_indices(key: &str, schema: &SchemaRef) -> Result<ColumnIndices> {
    let mut all = Vec::with_capacity(6);
    let mut confidence = 0;

    for name in [
        COL_SITE,
        COL_TIMESTAMP,
        COL_SPECIES,
        COL_CONFIDENCE,
        COL_PATH,
        COL_OFFSET,
    ] {
        let idx = schema
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| schema_mismatch(key, format!("missing required column '{name}'")))?;

        let data_type = schema.field(idx).data_type();
        let ok = match name {
            COL_SITE | COL_SPECIES | COL_PATH => matches!(data_type, DataType::Utf8),
            COL_TIMESTAMP => matches!(data_type, DataType::Timestamp(_, _)),
            COL_CONFIDENCE => matches!(data_type, DataType::Float32),
            _ => matches!(data_type, DataType::Float64),
        };
        if !ok {
            return Err(schema_mismatch(
                key,
                format!("column '{name}' has unexpected type {data_type}"),
            ));
        }

        if name == COL_CONFIDENCE {
            confidence = idx;
        }
        all.push(idx);
    }

    Ok(ColumnIndices { all, confidence })
}

fn string_column<'a>(key: &str, batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| schema_mismatch(key, format!("column '{name}' is not a string column")))
}

/// Decode the timestamp column at second, millisecond or microsecond
/// precision. Other precisions are upstream drift and fail loudly.
fn timestamp_values(key: &str, batch: &RecordBatch) -> Result<Vec<Option<NaiveDateTime>>> {
    let col = batch
        .column_by_name(COL_TIMESTAMP)
        .ok_or_else(|| schema_mismatch(key, format!("missing column '{COL_TIMESTAMP}'")))?;

    let values = match col.data_type() {
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let arr = col
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .ok_or_else(|| schema_mismatch(key, "timestamp column downcast failed"))?;
            (0..arr.len())
                .map(|i| {
                    (!arr.is_null(i))
                        .then(|| DateTime::from_timestamp_micros(arr.value(i)))
                        .flatten()
                        .map(|dt| dt.naive_utc())
                })
                .collect()
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            let arr = col
                .as_any()
                .downcast_ref::<TimestampMillisecondArray>()
                .ok_or_else(|| schema_mismatch(key, "timestamp column downcast failed"))?;
            (0..arr.len())
                .map(|i| {
                    (!arr.is_null(i))
                        .then(|| DateTime::from_timestamp_millis(arr.value(i)))
                        .flatten()
                        .map(|dt| dt.naive_utc())
                })
                .collect()
        }
        DataType::Timestamp(TimeUnit::Second, _) => {
            let arr = col
                .as_any()
                .downcast_ref::<TimestampSecondArray>()
                .ok_or_else(|| schema_mismatch(key, "timestamp column downcast failed"))?;
            (0..arr.len())
                .map(|i| {
                    (!arr.is_null(i))
                        .then(|| DateTime::from_timestamp(arr.value(i), 0))
                        .flatten()
                        .map(|dt| dt.naive_utc())
                })
                .collect()
        }
        other => {
            return Err(schema_mismatch(
                key,
                format!("column '{COL_TIMESTAMP}' has unsupported precision {other}"),
            ));
        }
    };

    Ok(values)
}

fn append_batch_rows(
    key: &str,
    batch: &RecordBatch,
    filters: &QueryFilters,
    out: &mut Vec<DetectionRecord>,
) -> Result<()> {
    let sites = string_column(key, batch, COL_SITE)?;
    let species = string_column(key, batch, COL_SPECIES)?;
    let paths = string_column(key, batch, COL_PATH)?;
    let timestamps = timestamp_values(key, batch)?;

    let confidences = batch
        .column_by_name(COL_CONFIDENCE)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| schema_mismatch(key, "confidence column is not float32"))?;
    let offsets = batch
        .column_by_name(COL_OFFSET)
        .and_then(|col| col.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| schema_mismatch(key, "offset column is not float64"))?;

    for i in 0..batch.num_rows() {
        let Some(timestamp) = timestamps.get(i).copied().flatten() else {
            warn!(key, row = i, "skipping row with null or invalid timestamp");
            continue;
        };
        if sites.is_null(i) || species.is_null(i) || paths.is_null(i) || confidences.is_null(i)
            || offsets.is_null(i)
        {
            warn!(key, row = i, "skipping row with null required field");
            continue;
        }

        let record = DetectionRecord {
            site_id: sites.value(i).to_string(),
            recording_timestamp: timestamp,
            species_label: species.value(i).to_string(),
            model_confidence: confidences.value(i),
            source_relative_path: paths.value(i).to_string(),
            offset_seconds: offsets.value(i),
        };

        if filters.matches_row(&record) {
            out.push(record);
        }
    }

    Ok(())
}
