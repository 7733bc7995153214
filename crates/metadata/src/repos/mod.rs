//! Repository traits for metadata operations.

pub mod files;
pub mod keyspace;

pub use files::FileRepo;
pub use keyspace::KeyspaceRepo;
