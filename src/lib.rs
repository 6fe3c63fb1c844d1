//! Verdin - validation core for automated bird-species detections.
//!
//! Annotators review short audio excerpts behind model detections stored in
//! a remote archive: query the partitioned detection dataset, resolve each
//! record to its audio object, extract a fixed-duration clip by byte-range
//! reads, and append the judgement to a durable validation log.

#![warn(missing_docs)]

pub mod audio;
pub mod clip;
pub mod config;
pub mod constants;
pub mod error;
pub mod index;
pub mod locate;
pub mod session;
pub mod store;
pub mod validate;

pub use clip::{AudioClip, ClipExtractor};
pub use config::{Config, load_config_file};
pub use error::{Error, Result};
pub use index::{DetectionRecord, MetadataIndex, QueryFilters};
pub use locate::{AudioLocator, ResolvedAudioRef};
pub use session::ReviewSession;
pub use store::StoreClient;
pub use validate::{
    AppendOutcome, ConfidenceRating, Decision, ValidationResponse, ValidationStore,
};
