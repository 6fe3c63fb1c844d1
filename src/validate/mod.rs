//! Append-only validation store over per-session CSV logs.
//!
//! Each review session owns exactly one log object under the validations
//! prefix, so concurrent sessions never write the same key and appends need
//! no cross-process coordination. Reads combine every log under the prefix.
//! Records are never rewritten: a correction is a new record with a later
//! `submitted_at`, and the effective decision is the latest one.

mod types;

pub use types::{AppendOutcome, ConfidenceRating, Decision, ValidationResponse};

use crate::constants::validation::{LOG_EXTENSION, SESSION_FILE_PREFIX};
use crate::error::{Error, Result};
use crate::store::StoreClient;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Durable store for validation records.
#[derive(Debug, Clone)]
pub struct ValidationStore {
    store: StoreClient,
    root: String,
    session_key: String,
}

impl ValidationStore {
    /// Open the store for one session. All appends from this instance go to
    /// the session's own log object.
    pub fn new(
        store: StoreClient,
        validations_root: impl Into<String>,
        session_id: &str,
    ) -> Self {
        let root = validations_root.into().trim_end_matches('/').to_string();
        let session_key = format!("{root}/{SESSION_FILE_PREFIX}{session_id}.{LOG_EXTENSION}");
        Self {
            store,
            root,
            session_key,
        }
    }

    /// Object key of this session's log.
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Append one validation record.
    ///
    /// Duplicate submissions (same detection and annotator, submitted at or
    /// before an existing record) are reported as `AlreadyRecorded` and
    /// leave the store untouched, so client retries are idempotent. A
    /// strictly later submission is appended as a correction.
    pub async fn append(&self, response: &ValidationResponse) -> Result<AppendOutcome> {
        // Fresh read across all session logs; no cached view can miss a
        // record another session already persisted.
        let existing = self.read_all_responses().await?;
        let superseded = existing.iter().any(|r| {
            r.detection_id == response.detection_id
                && r.annotator_id == response.annotator_id
                && r.submitted_at >= response.submitted_at
        });
        if superseded {
            debug!(
                detection_id = %response.detection_id,
                annotator_id = %response.annotator_id,
                "validation already recorded, skipping append"
            );
            return Ok(AppendOutcome::AlreadyRecorded);
        }

        let mut log = self
            .read_log(&self.session_key)
            .await?
            .unwrap_or_default();
        log.push(response.clone());

        let bytes = serialize_log(&self.session_key, &log)?;
        self.store.put(&self.session_key, bytes).await?;

        Ok(AppendOutcome::Recorded)
    }

    /// Detection ids that already have a validation, across all sessions.
    /// With `annotator_id` set, only that annotator's records count.
    pub async fn list_existing(&self, annotator_id: Option<&str>) -> Result<HashSet<String>> {
        let responses = self.read_all_responses().await?;
        Ok(responses
            .into_iter()
            .filter(|r| annotator_id.is_none_or(|a| r.annotator_id == a))
            .map(|r| r.detection_id)
            .collect())
    }

    /// Effective decision per `(detection_id, annotator_id)`: the record
    /// with the latest `submitted_at` wins.
    pub async fn latest_decisions(
        &self,
    ) -> Result<HashMap<(String, String), ValidationResponse>> {
        let mut responses = self.read_all_responses().await?;
        // Stable sort: equal timestamps keep log-key order, so ties resolve
        // the same way on every read.
        responses.sort_by_key(|r| r.submitted_at);

        let mut latest = HashMap::new();
        for response in responses {
            latest.insert(
                (response.detection_id.clone(), response.annotator_id.clone()),
                response,
            );
        }
        Ok(latest)
    }

    /// All records from all session logs, in log-key order.
    async fn read_all_responses(&self) -> Result<Vec<ValidationResponse>> {
        let mut keys: Vec<String> = self
            .store
            .list(&self.root)
            .await?
            .into_iter()
            .filter(|key| is_session_log(&self.root, key))
            .collect();
        keys.sort();

        let mut responses = Vec::new();
        for key in &keys {
            if let Some(log) = self.read_log(key).await? {
                responses.extend(log);
            }
        }
        Ok(responses)
    }

    /// Read one session log. Missing objects are `None`; rows that fail to
    /// parse are skipped with a warning rather than poisoning the read.
    async fn read_log(&self, key: &str) -> Result<Option<Vec<ValidationResponse>>> {
        let bytes = match self.store.read_all(key).await {
            Ok(bytes) => bytes,
            Err(Error::ObjectNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut reader = csv::Reader::from_reader(bytes.as_ref());
        let mut responses = Vec::new();
        for record in reader.deserialize::<ValidationResponse>() {
            match record {
                Ok(response) => responses.push(response),
                Err(e) => warn!(key, error = %e, "skipping unparseable validation row"),
            }
        }
        Ok(Some(responses))
    }
}

fn is_session_log(root: &str, key: &str) -> bool {
    key.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| {
            name.starts_with(SESSION_FILE_PREFIX)
                && name.ends_with(&format!(".{LOG_EXTENSION}"))
                && !name.contains('/')
        })
}

fn serialize_log(key: &str, responses: &[ValidationResponse]) -> Result<Bytes> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for response in responses {
        writer.serialize(response).map_err(|e| Error::ValidationWrite {
            key: key.to_string(),
            source: e,
        })?;
    }
    let inner = writer.into_inner().map_err(|e| Error::ValidationWrite {
        key: key.to_string(),
        source: csv::Error::from(e.into_error()),
    })?;
    Ok(Bytes::from(inner))
}
