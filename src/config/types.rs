//! Configuration type definitions.

use crate::constants::{CANONICAL_SAMPLE_RATE, DEFAULT_CLIP_DURATION_SECS, store};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for the retrieval-and-annotation core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote object store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Dataset layout within the store.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Clip extraction settings.
    #[serde(default)]
    pub clip: ClipConfig,

    /// Audio object name-drift matching rules.
    #[serde(default)]
    pub matcher: MatcherConfig,
}

/// Which backend the object store client talks to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// S3-compatible remote store.
    #[default]
    S3,
    /// Local filesystem (development and offline runs).
    Local,
    /// In-process memory store (tests).
    Memory,
}

/// Object store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend to use.
    pub backend: StoreBackend,

    /// Bucket name (S3 backend).
    pub bucket: String,

    /// AWS region (S3 backend).
    pub region: Option<String>,

    /// Custom endpoint URL for S3-compatible stores.
    pub endpoint: Option<String>,

    /// Explicit access key (S3 backend). Falls back to ambient credentials.
    pub access_key: Option<String>,

    /// Explicit secret key (S3 backend).
    pub secret_key: Option<String>,

    /// Allow plain-HTTP endpoints (local S3 emulators).
    pub allow_http: bool,

    /// Root directory for the local backend.
    pub local_root: Option<PathBuf>,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            bucket: String::new(),
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            allow_http: false,
            local_root: None,
            timeout_secs: store::DEFAULT_TIMEOUT_SECS,
            max_retries: store::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Layout of the detection dataset, audio archive and validation logs
/// within the bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Prefix of the partitioned detection dataset
    /// (`<detections_root>/site=<id>/date=<YYYY-MM-DD>/*.parquet`).
    pub detections_root: String,

    /// Prefix of the audio archive. Detection records reference audio by a
    /// path relative to this prefix.
    pub audio_root: String,

    /// Prefix under which per-session validation logs are appended.
    pub validations_root: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            detections_root: "detections".to_string(),
            audio_root: "audio".to_string(),
            validations_root: "validations".to_string(),
        }
    }
}

/// Clip extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    /// Fixed clip duration in seconds.
    pub duration_seconds: f64,

    /// Canonical output sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_CLIP_DURATION_SECS,
            sample_rate: CANONICAL_SAMPLE_RATE,
        }
    }
}

/// Rules for matching a detection record to an audio object when the
/// expected key is missing (upstream renames, extension changes).
///
/// The drift heuristic is dataset-specific, so the rules are configuration
/// rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Compare names case-insensitively.
    pub case_insensitive: bool,

    /// Ignore file extensions when comparing names.
    pub ignore_extension: bool,

    /// `chrono` format string for the timestamp token expected to appear in
    /// the audio object's name. Used as the tie-break between several
    /// plausible candidates.
    pub timestamp_token: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            ignore_extension: true,
            timestamp_token: "%Y%m%dT%H%M%S".to_string(),
        }
    }
}
