//! Error types for verdin.

/// Result type alias for verdin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for verdin.
///
/// Transient I/O failures (`Timeout`, retryable `Store` errors) are retried
/// internally at the store-client boundary; data-integrity failures
/// (`SchemaMismatch`, `CorruptAudio`, `AmbiguousResolution`) are surfaced
/// immediately with the record identity so callers can skip the affected
/// detection and continue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Remote object store operation failed after retries were exhausted.
    #[error("object store {operation} failed for '{key}'")]
    Store {
        /// The operation that failed (list, head, get, put).
        operation: &'static str,
        /// Object key or prefix involved.
        key: String,
        /// Underlying store error.
        #[source]
        source: object_store::Error,
    },

    /// Remote I/O call exceeded its bounded timeout.
    ///
    /// Distinct from [`Error::DataUnavailable`]: timeouts are transient and
    /// may be retried by the caller, missing data may not.
    #[error("object store {operation} timed out for '{key}' after {attempts} attempt(s)")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// Object key or prefix involved.
        key: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Requested object does not exist in the store.
    #[error("object not found: '{key}'")]
    ObjectNotFound {
        /// The missing object key.
        key: String,
    },

    /// No dataset partitions match the query filters.
    #[error("no dataset partitions match the given filters under '{root}'")]
    DataUnavailable {
        /// Dataset root that was searched.
        root: String,
    },

    /// Expected columns are absent or mistyped in the columnar dataset.
    #[error("dataset schema mismatch in '{key}': {message}")]
    SchemaMismatch {
        /// Parquet object where the mismatch was found.
        key: String,
        /// Description of the missing or mistyped column.
        message: String,
    },

    /// Failed to read a parquet object.
    #[error("failed to read parquet object '{key}'")]
    ParquetRead {
        /// Parquet object key.
        key: String,
        /// Underlying parquet error.
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// Locator found several equally plausible audio objects for a record.
    #[error(
        "ambiguous resolution for detection '{detection_id}': {} candidate(s) remain: {candidates:?}",
        candidates.len()
    )]
    AmbiguousResolution {
        /// Identity of the detection being resolved.
        detection_id: String,
        /// The equally plausible candidate keys.
        candidates: Vec<String>,
    },

    /// Locator found no audio object matching a record.
    #[error("no audio object found for detection '{detection_id}' (expected key '{expected_key}')")]
    AudioNotFound {
        /// Identity of the detection being resolved.
        detection_id: String,
        /// The key constructed from the record's source path.
        expected_key: String,
    },

    /// Clip window arguments are malformed before any source is consulted
    /// (negative offset, non-positive or non-finite duration).
    #[error(
        "invalid clip window: offset {offset_seconds}s, duration {duration_seconds}s"
    )]
    InvalidClipWindow {
        /// Requested clip offset.
        offset_seconds: f64,
        /// Requested clip duration.
        duration_seconds: f64,
    },

    /// Requested clip offset lies beyond the end of the source recording.
    #[error(
        "requested offset {offset_seconds:.3}s exceeds source duration {source_duration_seconds:.3}s in '{key}'"
    )]
    RangeUnsatisfiable {
        /// Audio object key.
        key: String,
        /// Requested clip offset.
        offset_seconds: f64,
        /// Actual source duration.
        source_duration_seconds: f64,
    },

    /// Audio object could not be decoded.
    #[error("failed to decode audio object '{key}'")]
    CorruptAudio {
        /// Audio object key.
        key: String,
        /// Underlying decode error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to resample audio.
    #[error("failed to resample audio: {reason}")]
    Resample {
        /// Description of the resampling failure.
        reason: String,
    },

    /// Failed to serialize a clip to WAV.
    #[error("failed to encode clip as WAV")]
    WavEncode {
        /// Underlying encoder error.
        #[source]
        source: hound::Error,
    },

    /// Failed to serialize validation responses to CSV.
    #[error("failed to write validation log '{key}'")]
    ValidationWrite {
        /// Validation log object key.
        key: String,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
}
