//! Configuration loading and validation.
//!
//! Sources are layered, later wins: built-in defaults, then `kura.toml`
//! from the platform config directory, then one from the working directory,
//! then `KURA_*` environment variables (`__` separates nesting, e.g.
//! `KURA_RETRY__BUSY_WAIT_MS=250`).

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in both config locations.
const CONFIG_FILE: &str = "kura.toml";

/// Everything the binaries need to wire the store together.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub library: LibraryConfig,
}

/// Location of the embedded database file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Busy-retry policy of the execution engine.
///
/// The fixed interval (no backoff, no cap) is a deliberate trade-off for a
/// single-writer local store; commit is the one exception and gives up
/// after `commit_busy_retries` additional attempts, rolling back instead.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub busy_wait_ms: u64,
    pub commit_busy_retries: u32,
}

/// Filesystem roots of the archived page, thumbnail and animation files,
/// consulted by the file-existence post-filter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub originals: PathBuf,
    pub thumbnails: PathBuf,
    pub archives: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
            library: LibraryConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("kura.db") }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            busy_wait_ms: 1000,
            commit_busy_retries: 0,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            originals: PathBuf::from("library/originals"),
            thumbnails: PathBuf::from("library/thumbnails"),
            archives: PathBuf::from("library/archives"),
        }
    }
}

impl Config {
    /// Load from the default locations.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(dirs) = directories::ProjectDirs::from("", "", "kura") {
            figment = figment.merge(Toml::file(dirs.config_dir().join(CONFIG_FILE)));
        }
        Self::extract(figment.merge(Toml::file(CONFIG_FILE)).merge(Env::prefixed("KURA_").split("__")))
    }

    /// Load from one explicit file plus the environment; for tests and for
    /// callers passing `--config`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("KURA_").split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(database = %config.database.path.display(), "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retry.busy_wait_ms == 0 {
            exn::bail!(ErrorKind::Invalid("retry.busy_wait_ms must be positive"));
        }
        if self.database.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("database.path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[retry]\nbusy_wait_ms = 250\ncommit_busy_retries = 3\n\n[database]\npath = \"archive.db\"\n"
        )
        .unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.retry.busy_wait_ms, 250);
        assert_eq!(config.retry.commit_busy_retries, 3);
        assert_eq!(config.database.path, PathBuf::from("archive.db"));
        // Untouched section keeps its default.
        assert_eq!(config.library, LibraryConfig::default());
    }

    #[test]
    fn test_zero_busy_wait_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nbusy_wait_ms = 0\n").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }
}
