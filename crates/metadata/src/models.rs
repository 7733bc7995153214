//! Database models mapping to the metadata schema.

use sqlx::FromRow;

/// A row of the `files` table.
///
/// Values are stored exactly as written: `timestamp` is a decimal string and
/// `ipfs_cid` an opaque content identifier. Parsing happens in the registry.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRow {
    pub filename: String,
    pub timestamp: String,
    pub ipfs_cid: String,
}

impl FileRow {
    pub fn new(
        filename: impl Into<String>,
        ipfs_cid: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            timestamp: timestamp.into(),
            ipfs_cid: ipfs_cid.into(),
        }
    }
}
