//! Core domain types and shared logic for the pinfile registry.
//!
//! This crate defines the data model used across all other crates:
//! - File records and their string-encoded timestamps
//! - Opaque content identifiers handed out by content backends
//! - SHA-256 content hashing for the local content-addressed backend
//! - Configuration for the metadata store, content backend and registry

pub mod config;
pub mod error;
pub mod hash;
pub mod record;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use record::{ContentId, FileRecord, Timestamp, TimestampPolicy};

/// Default keyspace base name.
pub const DEFAULT_KEYSPACE: &str = "ipfs_files";

/// Default bound on a single content fetch, and on metadata queries (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
