//! A review session: query candidates, listen, record judgements.
//!
//! Ties the index, locator, extractor and validation store together behind
//! one handle. Each session gets a unique id, which names its validation
//! log object; two sessions never write the same key.

use crate::clip::{AudioClip, ClipExtractor};
use crate::config::Config;
use crate::error::Result;
use crate::index::{DetectionRecord, MetadataIndex, QueryFilters};
use crate::locate::AudioLocator;
use crate::store::StoreClient;
use crate::validate::{
    AppendOutcome, ConfidenceRating, Decision, ValidationResponse, ValidationStore,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::info;

/// One annotator's review session.
#[derive(Debug)]
pub struct ReviewSession {
    session_id: String,
    annotator_id: String,
    clip_duration: f64,
    index: MetadataIndex,
    locator: AudioLocator,
    extractor: ClipExtractor,
    validations: ValidationStore,
    // Detections submitted in this session; excluded from later candidate
    // queries without waiting for a store round-trip.
    submitted: Mutex<HashSet<String>>,
}

impl ReviewSession {
    /// Start a session for `annotator_id` against the configured dataset.
    pub fn new(store: StoreClient, config: &Config, annotator_id: impl Into<String>) -> Self {
        let session_id = next_session_id();
        let annotator_id = annotator_id.into();
        info!(session_id = %session_id, annotator_id = %annotator_id, "starting review session");

        Self {
            index: MetadataIndex::new(store.clone(), config.dataset.detections_root.clone()),
            locator: AudioLocator::new(
                store.clone(),
                config.dataset.audio_root.clone(),
                config.matcher.clone(),
            ),
            extractor: ClipExtractor::new(store.clone(), config.clip.sample_rate),
            validations: ValidationStore::new(
                store,
                config.dataset.validations_root.clone(),
                &session_id,
            ),
            clip_duration: config.clip.duration_seconds,
            session_id,
            annotator_id,
            submitted: Mutex::new(HashSet::new()),
        }
    }

    /// Unique id of this session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Detections matching the filters that this annotator has not yet
    /// validated, in stable query order.
    pub async fn candidates(&self, filters: QueryFilters) -> Result<Vec<DetectionRecord>> {
        let mut exclude = self
            .validations
            .list_existing(Some(&self.annotator_id))
            .await?;
        exclude.extend(self.submitted.lock().await.iter().cloned());

        self.index.query(&filters.with_excluded(exclude)).await
    }

    /// Fetch the listening clip for a detection.
    pub async fn review(&self, record: &DetectionRecord) -> Result<AudioClip> {
        let resolved = self.locator.resolve(record).await?;
        self.extractor
            .extract(&resolved, record.offset_seconds, self.clip_duration)
            .await
    }

    /// Record the annotator's judgement on a detection.
    pub async fn submit(
        &self,
        record: &DetectionRecord,
        decision: Decision,
        notes: Option<String>,
        confidence: Option<ConfidenceRating>,
    ) -> Result<AppendOutcome> {
        let response = ValidationResponse {
            detection_id: record.detection_id(),
            annotator_id: self.annotator_id.clone(),
            decision,
            submitted_at: Utc::now(),
            notes,
            confidence,
        };

        let outcome = self.validations.append(&response).await?;
        self.submitted.lock().await.insert(record.detection_id());
        Ok(outcome)
    }

    /// Top species by detection count, for the session's species picker.
    pub async fn species_summary(&self, limit: usize) -> Result<Vec<(String, usize)>> {
        self.index.species_summary(limit).await
    }
}

/// Timestamp plus a process-wide counter: unique within a process, and
/// collision-free enough across processes for log object naming.
fn next_session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{seq:04}", Utc::now().format("%Y%m%dT%H%M%S%3f"))
}
