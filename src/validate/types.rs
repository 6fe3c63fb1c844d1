//! Validation record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotator's judgement on one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The predicted species is audible in the clip.
    Present,
    /// The predicted species is not in the clip.
    Absent,
    /// The annotator could not decide.
    Unsure,
}

/// How sure the annotator was of their decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceRating {
    /// Barely more than a guess.
    Low,
    /// Reasonably sure.
    Moderate,
    /// Certain.
    High,
}

/// One validation record, as appended to a session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    /// Detection being validated.
    pub detection_id: String,
    /// Who validated it.
    pub annotator_id: String,
    /// The judgement.
    pub decision: Decision,
    /// Submission time (UTC). Corrections carry a later time and supersede
    /// earlier records for the same detection and annotator.
    pub submitted_at: DateTime<Utc>,
    /// Optional free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Optional self-reported confidence.
    #[serde(default)]
    pub confidence: Option<ConfidenceRating>,
}

/// Result of an append attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written.
    Recorded,
    /// An equal-or-newer record for the same detection and annotator
    /// already exists; nothing was written.
    AlreadyRecorded,
}
