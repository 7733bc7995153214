//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for a registry instance.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Keyspace (namespace) holding the files table.
    #[serde(default)]
    pub keyspace: KeyspaceConfig,
    /// Metadata store backend.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Content backend.
    #[serde(default)]
    pub content: ContentConfig,
    /// Registry behaviour.
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl AppConfig {
    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.keyspace.validate()?;
        self.metadata.validate()?;
        self.content.validate()?;
        self.registry.validate()
    }
}

/// Keyspace naming.
///
/// The effective name is `name`, or `name_suffix` when a suffix is set, so
/// several deployments can share one metadata cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    /// Base keyspace name (default: "ipfs_files").
    #[serde(default = "default_keyspace_name")]
    pub name: String,
    /// Optional suffix appended as `_<suffix>`.
    #[serde(default)]
    pub suffix: String,
}

fn default_keyspace_name() -> String {
    crate::DEFAULT_KEYSPACE.to_string()
}

impl Default for KeyspaceConfig {
    fn default() -> Self {
        Self {
            name: default_keyspace_name(),
            suffix: String::new(),
        }
    }
}

impl KeyspaceConfig {
    /// Build a config for a base name and suffix.
    pub fn new(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
        }
    }

    /// The keyspace name actually used by the metadata store.
    pub fn resolved_name(&self) -> String {
        if self.suffix.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, self.suffix)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_keyspace_name(&self.resolved_name()).map_err(|e| e.to_string())
    }
}

/// Maximum keyspace name length.
pub const MAX_KEYSPACE_LEN: usize = 48;

/// Check that a keyspace name is a safe SQL identifier.
///
/// Keyspace names are interpolated into DDL, so only lowercase ASCII
/// letters, digits and underscores are allowed, not starting with a digit.
pub fn validate_keyspace_name(name: &str) -> crate::Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(crate::Error::InvalidKeyspace("empty".to_string()));
    };
    if name.len() > MAX_KEYSPACE_LEN {
        return Err(crate::Error::InvalidKeyspace(format!(
            "{name} is longer than {MAX_KEYSPACE_LEN} characters"
        )));
    }
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(crate::Error::InvalidKeyspace(format!(
            "{name} must start with a lowercase letter or underscore"
        )));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(crate::Error::InvalidKeyspace(format!(
            "{name} may only contain lowercase letters, digits and underscores"
        )));
    }
    Ok(())
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite, one database file per keyspace.
    Sqlite {
        /// Directory holding `<keyspace>.db`, or ":memory:".
        path: PathBuf,
        /// Per-query timeout in seconds.
        #[serde(default = "default_session_timeout_secs")]
        session_timeout_secs: u64,
    },
    /// PostgreSQL, one schema per keyspace.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer PINFILE_METADATA__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Per-query timeout in seconds, also set as the server-side
        /// statement_timeout.
        #[serde(default = "default_session_timeout_secs")]
        session_timeout_secs: u64,
    },
}

fn default_session_timeout_secs() -> u64 {
    crate::DEFAULT_TIMEOUT_SECS
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata"),
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Session-level timeout applied to every metadata query.
    pub fn session_timeout(&self) -> Duration {
        match self {
            Self::Sqlite {
                session_timeout_secs,
                ..
            }
            | Self::Postgres {
                session_timeout_secs,
                ..
            } => Duration::from_secs(*session_timeout_secs),
        }
    }

    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.session_timeout().is_zero() {
            return Err("metadata.session_timeout_secs must be greater than zero".to_string());
        }
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Pinning hints passed along with every upload to an IPFS cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinConfig {
    /// Add to the local peer only and let the cluster replicate later.
    #[serde(default)]
    pub local: bool,
    /// Minimum replication factor (-1 means every peer).
    #[serde(default)]
    pub replication_min: Option<i32>,
    /// Maximum replication factor (-1 means every peer).
    #[serde(default)]
    pub replication_max: Option<i32>,
    /// Seconds after which the cluster may drop the pin.
    #[serde(default)]
    pub expire_in_secs: Option<u64>,
}

impl PinConfig {
    pub fn expire_in(&self) -> Option<Duration> {
        self.expire_in_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("replication_min", self.replication_min),
            ("replication_max", self.replication_max),
        ] {
            if let Some(v) = value
                && (v == 0 || v < -1)
            {
                return Err(format!("pin.{name} must be -1 or a positive number, got {v}"));
            }
        }
        if let (Some(min), Some(max)) = (self.replication_min, self.replication_max)
            && min > 0
            && max > 0
            && min > max
        {
            return Err(format!(
                "pin.replication_min ({min}) exceeds pin.replication_max ({max})"
            ));
        }
        if self.expire_in_secs == Some(0) {
            return Err("pin.expire_in_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Content backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentConfig {
    /// IPFS daemon for reads plus an IPFS cluster for writes and unpins.
    Ipfs {
        /// IPFS daemon host used for downloads.
        #[serde(default = "default_ipfs_host")]
        host: String,
        /// IPFS daemon RPC API port.
        #[serde(default = "default_ipfs_port")]
        port: u16,
        /// IPFS cluster host. Defaults to `host`.
        #[serde(default)]
        cluster_host: Option<String>,
        /// IPFS cluster REST API port.
        #[serde(default = "default_cluster_port")]
        cluster_port: u16,
        /// Pinning hints for uploads.
        #[serde(default)]
        pin: PinConfig,
        /// Upper bound in seconds on add, unpin and health requests.
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    /// Local content-addressed directory (development and tests).
    Filesystem {
        /// Root directory for stored objects.
        path: PathBuf,
    },
}

fn default_ipfs_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ipfs_port() -> u16 {
    5001
}

fn default_cluster_port() -> u16 {
    9094
}

fn default_request_timeout_secs() -> u64 {
    crate::DEFAULT_TIMEOUT_SECS
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self::Ipfs {
            host: default_ipfs_host(),
            port: default_ipfs_port(),
            cluster_host: None,
            cluster_port: default_cluster_port(),
            pin: PinConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ContentConfig {
    /// Validate content backend configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ContentConfig::Ipfs {
                host,
                pin,
                request_timeout_secs,
                ..
            } => {
                if host.trim().is_empty() {
                    return Err("content.host must not be empty".to_string());
                }
                if *request_timeout_secs == 0 {
                    return Err("content.request_timeout_secs must be > 0".to_string());
                }
                pin.validate()
            }
            ContentConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Registry behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Upper bound on a single download, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    crate::DEFAULT_TIMEOUT_SECS
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_timeout_secs == 0 {
            return Err("registry.fetch_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::{Env, Format, Toml};

    #[test]
    fn keyspace_suffix_is_appended() {
        assert_eq!(KeyspaceConfig::default().resolved_name(), "ipfs_files");
        assert_eq!(
            KeyspaceConfig::new("ipfs_files", "test").resolved_name(),
            "ipfs_files_test"
        );
    }

    #[test]
    fn keyspace_names_must_be_identifiers() {
        assert!(validate_keyspace_name("ipfs_files_test").is_ok());
        assert!(validate_keyspace_name("_private").is_ok());
        assert!(validate_keyspace_name("").is_err());
        assert!(validate_keyspace_name("9lives").is_err());
        assert!(validate_keyspace_name("files; DROP TABLE x").is_err());
        assert!(validate_keyspace_name("Files").is_err());
        assert!(validate_keyspace_name(&"a".repeat(MAX_KEYSPACE_LEN + 1)).is_err());
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.metadata.session_timeout(), Duration::from_secs(120));
        assert_eq!(config.registry.fetch_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn postgres_requires_url_or_host_and_database() {
        let config = MetadataConfig::Postgres {
            url: None,
            host: Some("db".to_string()),
            port: None,
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: 10,
            session_timeout_secs: 30,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn pin_config_rejects_inverted_replication() {
        let pin = PinConfig {
            replication_min: Some(3),
            replication_max: Some(2),
            ..Default::default()
        };
        assert!(pin.validate().is_err());

        let everywhere = PinConfig {
            replication_min: Some(-1),
            replication_max: Some(-1),
            ..Default::default()
        };
        everywhere.validate().unwrap();

        let zero = PinConfig {
            replication_min: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn ipfs_request_timeout_must_be_positive() {
        let mut config = ContentConfig::default();
        config.validate().unwrap();
        if let ContentConfig::Ipfs {
            request_timeout_secs,
            ..
        } = &mut config
        {
            *request_timeout_secs = 0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "pinfile.toml",
                r#"
                [keyspace]
                suffix = "test"

                [metadata]
                type = "sqlite"
                path = "/var/lib/pinfile"

                [content]
                type = "ipfs"
                host = "10.0.0.5"
                cluster_host = "10.0.0.6"

                [content.pin]
                local = true
                replication_min = 2
                replication_max = 3
                expire_in_secs = 3600
                "#,
            )?;
            jail.set_env("PINFILE_REGISTRY__FETCH_TIMEOUT_SECS", "30");

            let config: AppConfig = Figment::new()
                .merge(Toml::file("pinfile.toml"))
                .merge(Env::prefixed("PINFILE_").split("__"))
                .extract()?;

            assert_eq!(config.keyspace.resolved_name(), "ipfs_files_test");
            assert_eq!(config.registry.fetch_timeout_secs, 30);
            match &config.content {
                ContentConfig::Ipfs {
                    host,
                    port,
                    cluster_host,
                    cluster_port,
                    pin,
                    request_timeout_secs,
                } => {
                    assert_eq!(host, "10.0.0.5");
                    assert_eq!(*request_timeout_secs, 120);
                    assert_eq!(*port, 5001);
                    assert_eq!(cluster_host.as_deref(), Some("10.0.0.6"));
                    assert_eq!(*cluster_port, 9094);
                    assert!(pin.local);
                    assert_eq!(pin.expire_in(), Some(Duration::from_secs(3600)));
                }
                other => panic!("unexpected content config: {other:?}"),
            }
            config.validate().map_err(figment::Error::from)?;
            Ok(())
        });
    }
}
