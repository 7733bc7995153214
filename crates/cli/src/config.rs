//! Configuration loading.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pinfile_core::config::AppConfig;
use std::path::Path;

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `PINFILE_METADATA__TYPE=postgres`.
pub const ENV_PREFIX: &str = "PINFILE_";

/// Load configuration from an optional TOML file and `PINFILE_*` variables.
///
/// A file passed explicitly must exist. Environment variables override file
/// values, and anything left unset falls back to the local defaults.
pub fn load_config(path: Option<&Path>, explicit: bool) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            figment = figment.merge(Toml::file(path));
        } else if explicit {
            anyhow::bail!("config file not found: {}", path.display());
        }
    }

    let config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pinfile_core::config::{ContentConfig, MetadataConfig};
    use std::path::PathBuf;

    #[test]
    fn defaults_without_file_or_env() {
        Jail::expect_with(|_jail| {
            let config = load_config(Some(Path::new("pinfile.toml")), false)
                .map_err(|e| e.to_string())?;
            assert_eq!(config.keyspace.resolved_name(), "ipfs_files");
            assert!(matches!(config.content, ContentConfig::Ipfs { port: 5001, .. }));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let err = load_config(Some(Path::new("missing.toml")), true).unwrap_err();
            assert!(err.to_string().contains("missing.toml"));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pinfile.toml",
                r#"
                [keyspace]
                name = "ipfs_files"
                suffix = "staging"

                [metadata]
                type = "sqlite"
                path = "./meta"

                [content]
                type = "filesystem"
                path = "./blobs"
                "#,
            )?;
            jail.set_env("PINFILE_KEYSPACE__SUFFIX", "prod");
            jail.set_env("PINFILE_CONFIG", "pinfile.toml");

            let config = load_config(Some(Path::new("pinfile.toml")), true)
                .map_err(|e| e.to_string())?;
            assert_eq!(config.keyspace.resolved_name(), "ipfs_files_prod");
            match config.metadata {
                MetadataConfig::Sqlite { path, .. } => assert_eq!(path, PathBuf::from("./meta")),
                other => panic!("unexpected metadata config: {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("PINFILE_KEYSPACE__NAME", "Not-Valid");
            let err = load_config(None, false).unwrap_err();
            assert!(err.to_string().contains("invalid configuration"));
            Ok(())
        });
    }
}
