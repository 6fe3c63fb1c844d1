//! End-to-end review flow over an in-memory object store: seed a partitioned
//! detection dataset and an audio archive, then query, resolve, extract and
//! validate through the public API.

use arrow::array::{Float32Array, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::NaiveDateTime;
use object_store::memory::InMemory;
use parquet::arrow::ArrowWriter;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use verdin::validate::ValidationStore;
use verdin::{
    AppendOutcome, Config, Decision, Error, MetadataIndex, QueryFilters, ReviewSession,
    StoreClient,
};

/// (site, timestamp, species, confidence, source path, offset seconds)
type Row = (
    &'static str,
    &'static str,
    &'static str,
    f32,
    &'static str,
    f64,
);

const SITE_A_ROWS: &[Row] = &[
    (
        "site_a",
        "2024-06-01T05:15:00",
        "Turdus merula",
        0.91,
        "site_a/rec_20240601T051500.wav",
        12.0,
    ),
    (
        "site_a",
        "2024-06-01T05:15:00",
        "Erithacus rubecula",
        0.35,
        "site_a/rec_20240601T051500.wav",
        21.0,
    ),
    (
        "site_a",
        "2024-06-01T06:15:00",
        "Turdus merula",
        0.77,
        "site_a/rec_20240601T061500.wav",
        3.0,
    ),
];

const SITE_B_ROWS: &[Row] = &[(
    "site_b",
    "2024-06-02T04:30:00",
    "Fringilla coelebs",
    0.88,
    "site_b/rec_20240602T043000.wav",
    6.0,
)];

fn parquet_object(rows: &[Row]) -> Bytes {
    let schema = Arc::new(Schema::new(vec![
        Field::new("site_id", DataType::Utf8, false),
        Field::new(
            "recording_timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new("species_label", DataType::Utf8, false),
        Field::new("model_confidence", DataType::Float32, false),
        Field::new("source_relative_path", DataType::Utf8, false),
        Field::new("offset_seconds", DataType::Float64, false),
    ]));

    let timestamps: Vec<i64> = rows
        .iter()
        .map(|r| {
            NaiveDateTime::parse_from_str(r.1, "%Y-%m-%dT%H:%M:%S")
                .unwrap()
                .and_utc()
                .timestamp_micros()
        })
        .collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.0))),
            Arc::new(TimestampMicrosecondArray::from(timestamps)),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.2))),
            Arc::new(Float32Array::from_iter_values(rows.iter().map(|r| r.3))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.4))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.5))),
        ],
    )
    .unwrap();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    Bytes::from(buf)
}

/// A partition file whose schema lost the confidence column upstream.
fn parquet_object_missing_confidence() -> Bytes {
    let schema = Arc::new(Schema::new(vec![
        Field::new("site_id", DataType::Utf8, false),
        Field::new(
            "recording_timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new("species_label", DataType::Utf8, false),
        Field::new("source_relative_path", DataType::Utf8, false),
        Field::new("offset_seconds", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(["site_a"])),
            Arc::new(TimestampMicrosecondArray::from(vec![1_717_218_900_000_000i64])),
            Arc::new(StringArray::from_iter_values(["Turdus merula"])),
            Arc::new(StringArray::from_iter_values([
                "site_a/rec_20240601T051500.wav",
            ])),
            Arc::new(Float64Array::from_iter_values([12.0])),
        ],
    )
    .unwrap();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    Bytes::from(buf)
}

fn wav_object(sample_rate: u32, seconds: u32) -> Bytes {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(sample_rate * seconds) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            writer.write_sample(((i % 200) as i16 - 100) * 50).unwrap();
        }
        writer.finalize().unwrap();
    }
    Bytes::from(cursor.into_inner())
}

async fn seeded_store() -> StoreClient {
    // RUST_LOG=debug surfaces partition pruning and range-read traces.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let store = StoreClient::new(Arc::new(InMemory::new()));

    store
        .put(
            "detections/site=site_a/date=2024-06-01/part-00000.parquet",
            parquet_object(SITE_A_ROWS),
        )
        .await
        .unwrap();
    store
        .put(
            "detections/site=site_b/date=2024-06-02/part-00000.parquet",
            parquet_object(SITE_B_ROWS),
        )
        .await
        .unwrap();

    // First recording is present under its expected key; the second drifted
    // to an upper-case extension in the archive.
    store
        .put(
            "audio/site_a/rec_20240601T051500.wav",
            wav_object(8_000, 30),
        )
        .await
        .unwrap();
    store
        .put(
            "audio/site_a/rec_20240601T061500.WAV",
            wav_object(8_000, 30),
        )
        .await
        .unwrap();
    store
        .put(
            "audio/site_b/rec_20240602T043000.wav",
            wav_object(8_000, 30),
        )
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn query_prunes_partitions_and_orders_results() {
    let store = seeded_store().await;
    let index = MetadataIndex::new(store, "detections");

    let filters = QueryFilters::all().with_sites(["site_a"]);
    let records = index.query(&filters).await.unwrap();

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.site_id == "site_a"));
    // Ascending by timestamp, then path, then offset.
    assert_eq!(records[0].offset_seconds, 12.0);
    assert_eq!(records[1].offset_seconds, 21.0);
    assert_eq!(records[2].source_relative_path, "site_a/rec_20240601T061500.wav");

    assert_eq!(index.count(&filters).await.unwrap(), 3);
}

#[tokio::test]
async fn confidence_threshold_filters_rows() {
    let store = seeded_store().await;
    let index = MetadataIndex::new(store, "detections");

    let filters = QueryFilters::all()
        .with_sites(["site_a"])
        .with_min_confidence(0.5);
    let records = index.query(&filters).await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.model_confidence >= 0.5));
}

#[tokio::test]
async fn repeated_queries_return_identical_pages() {
    let store = seeded_store().await;
    let index = MetadataIndex::new(store, "detections");

    let filters = QueryFilters::all();
    let first = index.query(&filters).await.unwrap();
    let second = index.query(&filters).await.unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[tokio::test]
async fn unmatched_filters_are_data_unavailable() {
    let store = seeded_store().await;
    let index = MetadataIndex::new(store, "detections");

    let filters = QueryFilters::all().with_sites(["site_z"]);
    assert!(matches!(
        index.query(&filters).await,
        Err(Error::DataUnavailable { .. })
    ));
}

#[tokio::test]
async fn missing_required_column_is_schema_mismatch() {
    let store = StoreClient::new(Arc::new(InMemory::new()));
    store
        .put(
            "detections/site=site_a/date=2024-06-01/part-00000.parquet",
            parquet_object_missing_confidence(),
        )
        .await
        .unwrap();

    let index = MetadataIndex::new(store, "detections");
    let err = index.query(&QueryFilters::all()).await.unwrap_err();

    // Upstream format drift fails loudly and names the column; rows are
    // never silently dropped.
    match err {
        Error::SchemaMismatch { key, message } => {
            assert!(key.ends_with("part-00000.parquet"));
            assert!(message.contains("model_confidence"));
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn species_summary_counts_descending() {
    let store = seeded_store().await;
    let index = MetadataIndex::new(store, "detections");

    let summary = index.species_summary(10).await.unwrap();
    assert_eq!(summary[0], ("Turdus merula".to_string(), 2));
    assert_eq!(summary.len(), 3);
}

#[tokio::test]
async fn full_review_flow_extracts_and_records() {
    let store = seeded_store().await;
    let session = ReviewSession::new(store.clone(), &Config::default(), "alice");

    let filters = QueryFilters::all().with_sites(["site_a"]);
    let candidates = session.candidates(filters.clone()).await.unwrap();
    assert_eq!(candidates.len(), 3);

    // Listen to the first candidate: exactly 3 seconds at the canonical rate.
    let record = &candidates[0];
    let clip = session.review(record).await.unwrap();
    assert_eq!(clip.sample_rate, 48_000);
    assert_eq!(clip.samples.len(), 3 * 48_000);
    assert!(!clip.short);

    let preview = clip.spectrogram();
    assert!(preview.num_frames() > 100);
    assert!(preview.num_bins() > 0);

    let wav = clip.to_wav_bytes().unwrap();
    assert!(wav.len() > 44);

    // Record the judgement; the detection disappears from later candidate
    // queries for this annotator.
    let outcome = session
        .submit(record, Decision::Present, None, None)
        .await
        .unwrap();
    assert_eq!(outcome, AppendOutcome::Recorded);

    let remaining = session.candidates(filters).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|r| r.detection_id() != record.detection_id()));
}

#[tokio::test]
async fn drifted_audio_key_still_reviews() {
    let store = seeded_store().await;
    let session = ReviewSession::new(store, &Config::default(), "alice");

    let candidates = session
        .candidates(QueryFilters::all().with_sites(["site_a"]))
        .await
        .unwrap();
    // Archive stores this one as .WAV; resolution and extraction still work.
    let drifted = candidates
        .iter()
        .find(|r| r.source_relative_path == "site_a/rec_20240601T061500.wav")
        .unwrap();

    let clip = session.review(drifted).await.unwrap();
    assert_eq!(clip.samples.len(), 3 * 48_000);
}

#[tokio::test]
async fn concurrent_sessions_never_lose_records() {
    let store = seeded_store().await;
    let config = Config::default();

    let alice = ReviewSession::new(store.clone(), &config, "alice");
    let bob = ReviewSession::new(store.clone(), &config, "bob");

    let candidates = alice
        .candidates(QueryFilters::all().with_sites(["site_a"]))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        alice.submit(&candidates[0], Decision::Present, None, None),
        bob.submit(&candidates[1], Decision::Absent, None, None),
    );
    assert_eq!(a.unwrap(), AppendOutcome::Recorded);
    assert_eq!(b.unwrap(), AppendOutcome::Recorded);

    // Both records are durable and visible to a fresh reader.
    let reader = ValidationStore::new(store, "validations", "reader");
    let ids: HashSet<String> = reader.list_existing(None).await.unwrap();
    assert!(ids.contains(&candidates[0].detection_id()));
    assert!(ids.contains(&candidates[1].detection_id()));
}

#[tokio::test]
async fn annotated_detections_are_excluded_across_sessions() {
    let store = seeded_store().await;
    let config = Config::default();

    let filters = QueryFilters::all().with_sites(["site_a"]);

    let first = ReviewSession::new(store.clone(), &config, "alice");
    let candidates = first.candidates(filters.clone()).await.unwrap();
    first
        .submit(&candidates[0], Decision::Unsure, Some("wind noise".to_string()), None)
        .await
        .unwrap();

    // A brand-new session for the same annotator sees one fewer candidate.
    let second = ReviewSession::new(store.clone(), &config, "alice");
    assert_eq!(second.candidates(filters.clone()).await.unwrap().len(), 2);

    // A different annotator still sees all three.
    let carol = ReviewSession::new(store, &config, "carol");
    assert_eq!(carol.candidates(filters).await.unwrap().len(), 3);
}
