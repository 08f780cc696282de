// crates/sync/src/lib.rs
//! Sync orchestration: walk the transcript tree, classify and filter
//! projects, redact secrets, and persist everything into the primary
//! store plus the best-effort search index.
//!
//! Failure handling is tiered. Failing to open the primary store aborts
//! the run; a broken search index only degrades it; a project or
//! session that cannot be processed is recorded in the run summary and
//! skipped; a malformed transcript line is dropped by the parser.

mod manager;

pub use manager::{available_owners, available_repos, SyncManager};

use prompt_vault_core::redaction::RedactionStats;
use prompt_vault_db::DbError;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("primary store unavailable: {0}")]
    Db(#[from] DbError),
}

/// What to sync and how.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Only sync projects resolving to one of these repository names.
    pub repos: Option<BTreeSet<String>>,
    /// Only sync projects whose git-config owner is one of these.
    pub owners: Option<BTreeSet<String>>,
    /// Redact secrets before anything is persisted. On by default.
    pub redaction: bool,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self {
            repos: None,
            owners: None,
            redaction: true,
        }
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub projects_found: usize,
    pub projects_synced: usize,
    pub sessions_found: usize,
    pub sessions_synced: usize,
    pub total_messages: usize,
    /// Per-entity failures that were skipped, in occurrence order.
    pub errors: Vec<String>,
    /// Aggregate per-label redaction counts across all messages.
    pub redaction_stats: RedactionStats,
    /// True when the search index could not be opened and the run
    /// persisted to the primary store only.
    pub search_degraded: bool,
}
