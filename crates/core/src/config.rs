// crates/core/src/config.rs
//! Environment-provided configuration.
//!
//! The pipeline takes its store locations from the environment, not from
//! CLI flags: `VAULT_DB_PATH` (primary document store) and
//! `VAULT_SEARCH_DIR` (secondary search index) are both required.
//! `VAULT_ROOT` optionally overrides the transcript root (`~/.claude`),
//! which is mostly useful for tests and automation.

use crate::error::ConfigError;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "VAULT_DB_PATH";
pub const ENV_SEARCH_DIR: &str = "VAULT_SEARCH_DIR";
pub const ENV_ROOT: &str = "VAULT_ROOT";

/// Run configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file backing the primary store.
    pub db_path: PathBuf,
    /// Directory holding the tantivy search index.
    pub search_dir: PathBuf,
    /// Root of the transcript tree (contains `projects/` and `todos/`).
    pub root: PathBuf,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// # Errors
    /// Missing store variables are fatal: the run must not start without
    /// knowing where to persist.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var(ENV_DB_PATH)
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingVar(ENV_DB_PATH))?;
        let search_dir = std::env::var(ENV_SEARCH_DIR)
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingVar(ENV_SEARCH_DIR))?;
        let root = match std::env::var(ENV_ROOT) {
            Ok(v) => PathBuf::from(v),
            Err(_) => dirs::home_dir()
                .ok_or(ConfigError::HomeDirNotFound)?
                .join(".claude"),
        };

        Ok(Self {
            db_path,
            search_dir,
            root,
        })
    }

    /// Per-project transcript directories live here.
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Sidecar checklist payloads live here, one JSON file per session.
    pub fn todos_dir(&self) -> PathBuf {
        self.root.join("todos")
    }
}
