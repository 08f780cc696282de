// crates/sync/src/manager.rs
//! The sync run itself: project scan, session build, persistence,
//! search indexing.

use prompt_vault_core::config::Config;
use prompt_vault_core::parser;
use prompt_vault_core::redaction::{self, RedactionStats};
use prompt_vault_core::{discovery, ownership, MessageRecord, ParseError, Project, SessionRecord};
use prompt_vault_db::{Database, DbError};
use prompt_vault_search::{MessageDocument, ProjectContext, SearchError, SearchIndex};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::{RunSummary, SyncError, SyncOptions};

/// Orchestrates one sync run.
pub struct SyncManager {
    config: Config,
    options: SyncOptions,
}

/// A fully built session, ready to persist.
struct SessionData {
    record: SessionRecord,
    messages: Vec<MessageRecord>,
    stats: RedactionStats,
}

impl SyncManager {
    pub fn new(config: Config, options: SyncOptions) -> Self {
        Self { config, options }
    }

    /// Run a sync against the configured stores.
    ///
    /// Opening the primary store is the only fatal step. A search index
    /// that cannot be opened degrades the run to primary-store-only.
    pub async fn run(&self) -> Result<RunSummary, SyncError> {
        let db = Database::new(&self.config.db_path).await?;
        let search = match SearchIndex::open(&self.config.search_dir) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(
                    dir = %self.config.search_dir.display(),
                    error = %e,
                    "search index unavailable, continuing without it"
                );
                None
            }
        };

        Ok(self.run_with(&db, search.as_ref()).await)
    }

    /// Run a sync against already-opened stores. Never fails as a
    /// whole; per-entity failures are recorded in the summary.
    pub async fn run_with(&self, db: &Database, search: Option<&SearchIndex>) -> RunSummary {
        let mut summary = RunSummary {
            search_degraded: search.is_none(),
            ..Default::default()
        };

        let projects = self.scan_projects().await;
        summary.projects_found = projects.len();

        for project in &projects {
            if let Err(e) = db.upsert_project(project).await {
                error!(project = %project.id, error = %e, "failed to sync project");
                summary
                    .errors
                    .push(format!("failed to sync project {}: {e}", project.id));
                continue;
            }
            summary.projects_synced += 1;

            let context = project_context(project);
            let project_dir = self.config.projects_dir().join(&project.id);

            for session_id in &project.session_ids {
                summary.sessions_found += 1;
                let session_file = project_dir.join(format!("{session_id}.jsonl"));
                let session = match self.build_session(project, session_id, &session_file).await
                {
                    Ok(s) => s,
                    Err(e) => {
                        error!(session = session_id, error = %e, "failed to process session");
                        summary
                            .errors
                            .push(format!("failed to process session {session_id}: {e}"));
                        continue;
                    }
                };
                redaction::merge_stats(&mut summary.redaction_stats, session.stats.clone());

                if let Err(e) = persist_session(db, &session).await {
                    error!(session = session_id, error = %e, "failed to sync session");
                    summary
                        .errors
                        .push(format!("failed to sync session {session_id}: {e}"));
                    continue;
                }
                summary.sessions_synced += 1;
                summary.total_messages += session.messages.len();

                // Search indexing is best-effort: a failure here must
                // not lose the rows already persisted above.
                if let Some(index) = search {
                    if let Err(e) = index_session_documents(index, &context, &session) {
                        warn!(session = session_id, error = %e, "failed to index session");
                    }
                }
            }

            if let Err(e) = db.update_project_statistics(&project.id).await {
                warn!(project = %project.id, error = %e, "failed to update project statistics");
                summary.errors.push(format!(
                    "failed to update statistics for project {}: {e}",
                    project.id
                ));
            }
        }

        if let Some(index) = search {
            if let Err(e) = index.commit() {
                warn!(error = %e, "failed to commit search index");
            }
        }

        info!(
            projects_found = summary.projects_found,
            projects_synced = summary.projects_synced,
            sessions_synced = summary.sessions_synced,
            total_messages = summary.total_messages,
            errors = summary.errors.len(),
            "sync completed"
        );
        summary
    }

    /// Enumerate project directories, resolve their real paths, and
    /// apply the repo/owner filters.
    async fn scan_projects(&self) -> Vec<Project> {
        let projects_dir = self.config.projects_dir();
        let mut projects = Vec::new();

        let mut entries = match fs::read_dir(&projects_dir).await {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %projects_dir.display(), error = %e, "projects directory unreadable");
                return projects;
            }
        };

        if let Some(repos) = &self.options.repos {
            info!(repos = ?repos, "filtering for repositories");
        }
        if let Some(owners) = &self.options.owners {
            info!(owners = ?owners, "filtering for owners");
        }

        let mut dirs = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();

        for project_dir in dirs {
            let Some(project_id) = project_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
            else {
                continue;
            };

            // Prefer the real path embedded in session records over the
            // lossy directory-name decoding.
            let project_path = match discovery::project_path_from_sessions(&project_dir).await {
                Some(p) => p,
                None => discovery::decode_project_path(&project_id),
            };

            let ownership = ownership::resolve(&project_path);
            if let Some(repos) = &self.options.repos {
                let keep = ownership
                    .repo
                    .as_ref()
                    .map(|r| repos.contains(r))
                    .unwrap_or(false);
                if !keep {
                    debug!(path = %project_path, repo = ?ownership.repo, "skipping project");
                    continue;
                }
            }
            if let Some(owners) = &self.options.owners {
                let keep = ownership
                    .owner
                    .as_ref()
                    .map(|o| owners.contains(o))
                    .unwrap_or(false);
                if !keep {
                    debug!(path = %project_path, owner = ?ownership.owner, "skipping project");
                    continue;
                }
            }

            let session_ids = discovery::session_ids(&project_dir).await;
            let created_at = discovery::file_created_at(&project_dir).await;
            info!(
                project = %project_id,
                sessions = session_ids.len(),
                "found project"
            );
            projects.push(Project {
                id: project_id,
                path: project_path,
                session_ids,
                created_at,
            });
        }

        projects
    }

    /// Parse a session transcript and assemble the records to persist.
    /// Redaction happens here, before anything leaves this function.
    async fn build_session(
        &self,
        project: &Project,
        session_id: &str,
        session_file: &Path,
    ) -> Result<SessionData, ParseError> {
        let records = parser::parse_transcript(session_file).await?;
        let (first_message, message_timestamp) = parser::first_user_message(session_file).await;

        let mut stats = RedactionStats::new();
        let mut messages = Vec::with_capacity(records.len());
        for mut record in records {
            let mut content = record.content().map(|c| parser::flatten_content(&c));

            if self.options.redaction {
                if let Some(text) = content.as_ref().filter(|t| !t.is_empty()) {
                    let (redacted, text_stats) = redaction::redact_text(text);
                    redaction::merge_stats(&mut stats, text_stats);
                    record.set_message_content(&redacted);
                    content = Some(redacted);
                }
            }

            messages.push(MessageRecord {
                kind: record.kind(),
                role: record.role(),
                content,
                timestamp: record.timestamp(),
                raw_data: record.into_raw(),
            });
        }

        // The first-message preview duplicates content already counted
        // above, so redact it without touching the run statistics.
        let first_message = match first_message {
            Some(text) if self.options.redaction => Some(redaction::redact_text(&text).0),
            other => other,
        };

        let todo_data = self.load_todo(session_id).await;
        let created_at = discovery::file_created_at(session_file).await;

        Ok(SessionData {
            record: SessionRecord {
                id: session_id.to_string(),
                project_id: project.id.clone(),
                project_path: project.path.clone(),
                first_message,
                message_timestamp,
                todo_data,
                created_at,
                message_count: messages.len(),
            },
            messages,
            stats,
        })
    }

    /// Sidecar checklist payload for a session, if one exists and
    /// parses. A broken sidecar never fails the session.
    async fn load_todo(&self, session_id: &str) -> Option<Value> {
        let path = self.config.todos_dir().join(format!("{session_id}.json"));
        let bytes = fs::read(&path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(session = session_id, error = %e, "failed to load todo sidecar");
                None
            }
        }
    }
}

async fn persist_session(db: &Database, session: &SessionData) -> Result<(), DbError> {
    db.upsert_session(&session.record).await?;
    db.bulk_upsert_messages(
        &session.record.id,
        &session.record.project_id,
        &session.messages,
    )
    .await?;
    info!(
        session = %session.record.id,
        messages = session.messages.len(),
        "synced session"
    );
    Ok(())
}

fn project_context(project: &Project) -> ProjectContext {
    let info = ownership::workspace_info(&project.path);
    ProjectContext {
        project_id: project.id.clone(),
        project_name: info.project_name.unwrap_or_default(),
        project_path: project.path.clone(),
        workspace_type: info.workspace_type,
        branch_info: info.branch_info,
    }
}

fn index_session_documents(
    index: &SearchIndex,
    context: &ProjectContext,
    session: &SessionData,
) -> Result<(), SearchError> {
    let docs: Vec<MessageDocument> = session
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| MessageDocument {
            id: format!("{}_{i}", session.record.id),
            session_id: session.record.id.clone(),
            message_index: i as u64,
            kind: m.kind.clone().unwrap_or_default(),
            role: m.role.clone().unwrap_or_default(),
            content: m.content.clone().unwrap_or_default(),
            timestamp: m.timestamp.clone().unwrap_or_default(),
        })
        .collect();
    index.index_session(&session.record.id, context, &docs)
}

/// Repository names resolvable from the transcript tree, for filter
/// validation and `--list`.
pub async fn available_repos(config: &Config) -> BTreeSet<String> {
    let mut repos = BTreeSet::new();
    for project_path in project_paths(config).await {
        if let Some(repo) = ownership::resolve(&project_path).repo {
            repos.insert(repo);
        }
    }
    repos
}

/// Owners resolvable from git configs only; path heuristics never
/// produce an owner.
pub async fn available_owners(config: &Config) -> BTreeSet<String> {
    let mut owners = BTreeSet::new();
    for project_path in project_paths(config).await {
        if let Some((owner, _)) = ownership::owner_from_git_config(&project_path) {
            owners.insert(owner);
        }
    }
    owners
}

async fn project_paths(config: &Config) -> Vec<String> {
    let projects_dir = config.projects_dir();
    let mut paths = Vec::new();
    let Ok(mut entries) = fs::read_dir(&projects_dir).await else {
        return paths;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(id) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let path = match discovery::project_path_from_sessions(&dir).await {
            Some(p) => p,
            None => discovery::decode_project_path(&id),
        };
        paths.push(path);
    }

    paths
}
