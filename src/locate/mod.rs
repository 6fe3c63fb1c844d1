//! Resolution of detection records to audio objects in the remote archive.
//!
//! The fast path is a direct `head` on the expected key. When the archive
//! has drifted from the dataset paths, the locator lists the sibling prefix
//! once (cached per prefix) and hands the listing to the matcher.

mod matcher;

use crate::audio::wav;
use crate::config::MatcherConfig;
use crate::constants::clip::WAV_PROBE_BYTES;
use crate::error::Result;
use crate::index::DetectionRecord;
use crate::store::StoreClient;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A detection's audio, pinned to a concrete archive object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAudioRef {
    /// Object key within the store.
    pub remote_object_key: String,
    /// Byte range of the source's sample data, when the container exposes
    /// one. `None` means the extractor must download the whole object.
    pub byte_range: Option<Range<u64>>,
    /// Source duration in seconds, scaled by 1000 (fixed-point millis), when
    /// cheaply known from the container header.
    pub duration_hint_millis: Option<u64>,
}

impl ResolvedAudioRef {
    /// Source duration hint in seconds, if known.
    pub fn duration_hint(&self) -> Option<f64> {
        #[allow(clippy::cast_precision_loss)]
        self.duration_hint_millis.map(|ms| ms as f64 / 1000.0)
    }
}

/// Resolves detection records to archive objects.
#[derive(Debug)]
pub struct AudioLocator {
    store: StoreClient,
    audio_root: String,
    matcher: MatcherConfig,
    // Prefix listings are immutable per session; cache them.
    listings: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl AudioLocator {
    /// Create a locator over the archive rooted at `audio_root`.
    pub fn new(store: StoreClient, audio_root: impl Into<String>, matcher: MatcherConfig) -> Self {
        let root = audio_root.into();
        Self {
            store,
            audio_root: root.trim_end_matches('/').to_string(),
            matcher,
            listings: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a record to its audio object.
    ///
    /// Resolution is deterministic: the same record against the same archive
    /// state always yields the same key or the same error.
    pub async fn resolve(&self, record: &DetectionRecord) -> Result<ResolvedAudioRef> {
        let expected_key = format!(
            "{}/{}",
            self.audio_root,
            record.source_relative_path.trim_start_matches('/')
        );

        if let Some(size) = self.store.head(&expected_key).await? {
            return self.make_ref(expected_key, size).await;
        }

        let prefix = parent_prefix(&expected_key, &self.audio_root);
        let listing = self.prefix_listing(&prefix).await?;
        let key = matcher::best_match(&self.matcher, record, &expected_key, &listing)?;

        debug!(
            detection_id = %record.detection_id(),
            expected = %expected_key,
            resolved = %key,
            "resolved drifted audio key via listing search"
        );

        let size = self.store.head(&key).await?.unwrap_or(0);
        self.make_ref(key, size).await
    }

    /// Build the reference, probing WAV headers for range geometry.
    async fn make_ref(&self, key: String, size: u64) -> Result<ResolvedAudioRef> {
        if size > 0 && has_wav_extension(&key) {
            let probe = self
                .store
                .read_range(&key, 0..size.min(WAV_PROBE_BYTES))
                .await?;
            if let Some(info) = wav::parse_header(&probe, size) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let hint_millis = (info.duration_seconds() * 1000.0).round() as u64;
                return Ok(ResolvedAudioRef {
                    remote_object_key: key,
                    byte_range: Some(info.data_offset..info.data_offset + info.data_len),
                    duration_hint_millis: Some(hint_millis),
                });
            }
        }

        Ok(ResolvedAudioRef {
            remote_object_key: key,
            byte_range: None,
            duration_hint_millis: None,
        })
    }

    async fn prefix_listing(&self, prefix: &str) -> Result<Arc<Vec<String>>> {
        if let Some(cached) = self.listings.lock().await.get(prefix) {
            return Ok(Arc::clone(cached));
        }

        let keys = Arc::new(self.store.list(prefix).await?);
        self.listings
            .lock()
            .await
            .insert(prefix.to_string(), Arc::clone(&keys));
        Ok(keys)
    }
}

fn parent_prefix(key: &str, root: &str) -> String {
    key.rsplit_once('/')
        .map_or_else(|| root.to_string(), |(parent, _)| parent.to_string())
}

fn has_wav_extension(key: &str) -> bool {
    key.rsplit('.')
        .next()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}
