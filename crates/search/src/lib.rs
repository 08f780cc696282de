//! Secondary full-text index over synced conversation messages.
//!
//! Uses Tantivy (embedded Rust search engine). Each persisted message
//! becomes one document with metadata fields for filtering and a
//! full-text `content` field for BM25-ranked search. The index is
//! derived data: it can always be rebuilt from the primary store, so
//! sync treats it as best-effort.
//!
//! - **Write path**: `indexer::MessageDocument` -> `SearchIndex::index_session` -> `commit`
//! - **Read path**: `SearchIndex::search` -> optional project filter -> ranked hits
//! - **Storage**: on-disk directory, or in-RAM for tests

pub mod indexer;
pub mod query;

use std::path::Path;
use std::sync::Mutex;

use tantivy::schema::{Field, Schema, FAST, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};

pub use indexer::{CodeBlock, MessageDocument, ProjectContext};
pub use query::{SearchFilters, SearchHit};

/// Schema version for the Tantivy index. Bump when the schema changes
/// (field types, new fields, removed fields). A mismatch triggers
/// auto-rebuild on open.
pub const SEARCH_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur during search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build the Tantivy schema for conversation messages.
///
/// Fields:
/// - `id`: STRING | STORED — stable message id, `{session_id}_{index}`
/// - `session_id`: STRING | STORED — exact match, delete-by-session
/// - `project_id`: STRING | STORED — encoded project directory name
/// - `project_name`: STRING | STORED — short project name filter
/// - `project_path`: STRING | STORED — decoded working-directory path
/// - `workspace_type`: STRING | STORED — "feature" or "unknown"
/// - `branch_info`: STRING | STORED — flattened workspace segment
/// - `message_index`: u64, FAST | STORED — position within the session
/// - `type`: STRING | STORED — record type filter
/// - `role`: STRING | STORED — role filter
/// - `content`: TEXT | STORED — full-text BM25 search
/// - `timestamp`: STRING | STORED — original record timestamp
/// - `tags`: STRING | STORED — multi-valued topical keywords
/// - `language`: STRING | STORED — detected code language, "" if none
/// - `code_blocks`: STORED — JSON array of fenced code snippets
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("session_id", STRING | STORED);
    schema_builder.add_text_field("project_id", STRING | STORED);
    schema_builder.add_text_field("project_name", STRING | STORED);
    schema_builder.add_text_field("project_path", STRING | STORED);
    schema_builder.add_text_field("workspace_type", STRING | STORED);
    schema_builder.add_text_field("branch_info", STRING | STORED);
    schema_builder.add_u64_field("message_index", FAST | STORED);
    schema_builder.add_text_field("type", STRING | STORED);
    schema_builder.add_text_field("role", STRING | STORED);
    schema_builder.add_text_field("content", TEXT | STORED);
    schema_builder.add_text_field("timestamp", STRING | STORED);
    schema_builder.add_text_field("tags", STRING | STORED);
    schema_builder.add_text_field("language", STRING | STORED);
    schema_builder.add_text_field("code_blocks", STORED);

    schema_builder.build()
}

/// The search index: a Tantivy index plus reader, writer, and
/// pre-resolved field handles.
pub struct SearchIndex {
    pub index: Index,
    /// Reader for executing queries. Automatically reloads on commit.
    pub reader: IndexReader,
    /// Writer for indexing documents. Wrapped in Mutex because
    /// `IndexWriter` requires `&mut self` but may be used from
    /// different async contexts.
    pub writer: Mutex<IndexWriter>,
    pub schema: Schema,

    pub(crate) id_field: Field,
    pub(crate) session_id_field: Field,
    pub(crate) project_id_field: Field,
    pub(crate) project_name_field: Field,
    pub(crate) project_path_field: Field,
    pub(crate) workspace_type_field: Field,
    pub(crate) branch_info_field: Field,
    pub(crate) message_index_field: Field,
    pub(crate) type_field: Field,
    pub(crate) role_field: Field,
    pub(crate) content_field: Field,
    pub(crate) timestamp_field: Field,
    pub(crate) tags_field: Field,
    pub(crate) language_field: Field,
    pub(crate) code_blocks_field: Field,
}

impl SearchIndex {
    /// Open or create a Tantivy index at the given directory path.
    ///
    /// Schema versioning: if a `schema_version` file exists in the
    /// index directory and its value does not match
    /// `SEARCH_SCHEMA_VERSION`, the index is wiped and rebuilt from
    /// scratch on the next sync.
    pub fn open(path: &Path) -> Result<Self, SearchError> {
        std::fs::create_dir_all(path)?;

        let version_path = path.join("schema_version");
        let needs_rebuild = match std::fs::read_to_string(&version_path) {
            Ok(v) => v.trim().parse::<u32>().unwrap_or(0) != SEARCH_SCHEMA_VERSION,
            Err(_) => false, // no version file = first creation, not a rebuild
        };

        if needs_rebuild {
            tracing::info!(
                path = %path.display(),
                "search schema version mismatch, rebuilding index"
            );
            if let Ok(entries) = std::fs::read_dir(path) {
                for entry in entries.flatten() {
                    let p = entry.path();
                    if p.file_name().map(|n| n != "schema_version").unwrap_or(false) {
                        if p.is_dir() {
                            let _ = std::fs::remove_dir_all(&p);
                        } else {
                            let _ = std::fs::remove_file(&p);
                        }
                    }
                }
            }
        }

        let schema = build_schema();

        let index = match Index::open_in_dir(path) {
            Ok(idx) => {
                tracing::info!(path = %path.display(), "opened existing search index");
                idx
            }
            Err(_) => {
                tracing::info!(path = %path.display(), "creating new search index");
                Index::create_in_dir(path, schema.clone())?
            }
        };

        let _ = std::fs::write(&version_path, format!("{}", SEARCH_SCHEMA_VERSION));

        Self::from_index(index, schema)
    }

    /// Create a Tantivy index entirely in RAM. Useful for tests.
    pub fn open_in_ram() -> Result<Self, SearchError> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        Self::from_index(index, schema)
    }

    fn from_index(index: Index, schema: Schema) -> Result<Self, SearchError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        // 50MB writer heap, reasonable for batch indexing
        let writer = index.writer(50_000_000)?;

        let field = |name: &str| {
            schema
                .get_field(name)
                .unwrap_or_else(|_| panic!("schema missing {name} field"))
        };

        Ok(Self {
            id_field: field("id"),
            session_id_field: field("session_id"),
            project_id_field: field("project_id"),
            project_name_field: field("project_name"),
            project_path_field: field("project_path"),
            workspace_type_field: field("workspace_type"),
            branch_info_field: field("branch_info"),
            message_index_field: field("message_index"),
            type_field: field("type"),
            role_field: field("role"),
            content_field: field("content"),
            timestamp_field: field("timestamp"),
            tags_field: field("tags"),
            language_field: field("language"),
            code_blocks_field: field("code_blocks"),
            index,
            reader,
            writer: Mutex::new(writer),
            schema,
        })
    }
}
