//! Remote object store access.

mod client;

pub use client::StoreClient;
