//! Content backend implementations.

pub mod filesystem;
pub mod ipfs;
