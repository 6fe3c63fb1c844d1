//! Configuration validation.

use crate::config::{Config, StoreBackend};
use crate::error::{Error, Result};

/// Validate a configuration.
///
/// Catches settings that would only fail later and deeper inside a query or
/// extraction, where the cause is harder to see.
pub fn validate_config(config: &Config) -> Result<()> {
    match config.store.backend {
        StoreBackend::S3 => {
            if config.store.bucket.is_empty() {
                return Err(validation_error("store.bucket is required for the s3 backend"));
            }
        }
        StoreBackend::Local => {
            if config.store.local_root.is_none() {
                return Err(validation_error(
                    "store.local_root is required for the local backend",
                ));
            }
        }
        StoreBackend::Memory => {}
    }

    if config.store.timeout_secs == 0 {
        return Err(validation_error("store.timeout_secs must be at least 1"));
    }

    if config.clip.duration_seconds <= 0.0 {
        return Err(validation_error("clip.duration_seconds must be positive"));
    }

    if config.clip.sample_rate == 0 {
        return Err(validation_error("clip.sample_rate must be positive"));
    }

    if config.dataset.detections_root.is_empty()
        || config.dataset.audio_root.is_empty()
        || config.dataset.validations_root.is_empty()
    {
        return Err(validation_error("dataset prefixes must not be empty"));
    }

    if config.matcher.timestamp_token.is_empty() {
        return Err(validation_error("matcher.timestamp_token must not be empty"));
    }

    Ok(())
}

fn validation_error(message: &str) -> Error {
    Error::ConfigValidation {
        message: message.to_string(),
    }
}
