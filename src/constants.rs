//! Shared constants for verdin.

/// Canonical sample rate for extracted clips, in Hz.
///
/// All clips are resampled to this rate regardless of the source recording's
/// native rate, so downstream playback and preview rendering see a single
/// format.
pub const CANONICAL_SAMPLE_RATE: u32 = 48_000;

/// Default duration of an extracted clip, in seconds.
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 3.0;

/// Remote I/O constants.
pub mod store {
    /// Default per-call timeout for remote store operations, in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Maximum retry attempts for transient store failures.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Initial backoff between retries, in milliseconds. Doubles per attempt.
    pub const INITIAL_BACKOFF_MS: u64 = 200;
}

/// Audio extraction constants.
pub mod clip {
    /// Bytes fetched from the head of a WAV object to parse its RIFF chunks.
    ///
    /// The fmt and data chunk headers sit within the first few hundred bytes
    /// of well-formed files; 8 KiB covers files with oversized metadata
    /// chunks before the data chunk.
    pub const WAV_PROBE_BYTES: u64 = 8192;
}

/// Time-frequency preview constants, matching the review UI's display
/// settings (1024-point FFT, 50% overlap, 12 kHz cap).
pub mod spectrogram {
    /// FFT size in samples.
    pub const NFFT: usize = 1024;

    /// Hop between consecutive frames, in samples.
    pub const HOP: usize = 512;

    /// Highest frequency retained in the preview, in Hz.
    pub const MAX_FREQ_HZ: f32 = 12_000.0;

    /// Floor applied before converting power to dB.
    pub const POWER_FLOOR: f32 = 1e-12;
}

/// Validation log constants.
pub mod validation {
    /// Filename prefix for per-session validation logs.
    pub const SESSION_FILE_PREFIX: &str = "session_";

    /// Extension for validation log objects.
    pub const LOG_EXTENSION: &str = "csv";
}
