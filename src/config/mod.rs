//! Configuration loading and validation.
//!
//! The core is a library: the path to the config file is supplied by the
//! embedding application, nothing is read from platform-specific locations.

mod file;
mod types;
mod validate;

pub use file::load_config_file;
pub use types::{ClipConfig, Config, DatasetConfig, MatcherConfig, StoreBackend, StoreConfig};
pub use validate::validate_config;
