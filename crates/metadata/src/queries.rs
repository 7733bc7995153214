//! SQL text for the `files` table, built once per store.

/// Statements for one backend and keyspace.
#[derive(Debug, Clone)]
pub(crate) struct FileQueries {
    pub create_table: String,
    pub insert: String,
    pub delete: String,
    pub update_timestamp: String,
    pub select_content_id: String,
    pub select_timestamp: String,
    pub select_exists: String,
}

impl FileQueries {
    /// SQLite keeps one keyspace per database file, so the table is unqualified.
    pub fn sqlite() -> Self {
        Self::build("files", |_| "?".to_string())
    }

    /// PostgreSQL keeps one keyspace per schema.
    pub fn postgres(keyspace: &str) -> Self {
        Self::build(&format!("{keyspace}.files"), |n| format!("${n}"))
    }

    fn build(table: &str, param: impl Fn(usize) -> String) -> Self {
        let (p1, p2, p3) = (param(1), param(2), param(3));
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    filename TEXT PRIMARY KEY NOT NULL,
                    timestamp TEXT NOT NULL,
                    ipfs_cid TEXT NOT NULL
                )"
            ),
            insert: format!(
                "INSERT INTO {table} (filename, timestamp, ipfs_cid) VALUES ({p1}, {p2}, {p3})
                 ON CONFLICT (filename) DO NOTHING"
            ),
            delete: format!("DELETE FROM {table} WHERE filename = {p1}"),
            update_timestamp: format!("UPDATE {table} SET timestamp = {p1} WHERE filename = {p2}"),
            select_content_id: format!("SELECT ipfs_cid FROM {table} WHERE filename = {p1}"),
            select_timestamp: format!("SELECT timestamp FROM {table} WHERE filename = {p1}"),
            select_exists: format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE filename = {p1})"),
        }
    }
}
