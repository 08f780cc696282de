// crates/search/src/indexer.rs
//! Write path: message documents, content enrichment, and
//! session-granular re-indexing.

use regex_lite::Regex;
use serde_json::json;
use std::sync::LazyLock;
use tantivy::doc;
use tantivy::Term;
use tracing::{debug, info};

use crate::{SearchError, SearchIndex};

static CODE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(\w+)?\n([\s\S]*?)```").expect("code block pattern must compile")
});

/// Project-level metadata attached to every document of a session.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub project_id: String,
    pub project_name: String,
    pub project_path: String,
    /// "feature" or "unknown".
    pub workspace_type: String,
    /// Flattened workspace segment; "" when not a feature workspace.
    pub branch_info: String,
}

/// A document to be indexed, representing a single persisted message.
#[derive(Debug, Clone)]
pub struct MessageDocument {
    /// Stable message id, `{session_id}_{index}`.
    pub id: String,
    pub session_id: String,
    /// Zero-based position within the session.
    pub message_index: u64,
    /// Record type ("user", "assistant", "summary", ...). "" if absent.
    pub kind: String,
    /// Role of the embedded message. "" if absent.
    pub role: String,
    /// Flattened, redacted text content.
    pub content: String,
    /// Original timestamp string. "" if absent.
    pub timestamp: String,
}

/// One fenced code block extracted from message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// Topical tags derived from message content by keyword scan.
pub fn extract_tags(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    let mut tags = Vec::new();

    let rules: &[(&str, &[&str])] = &[
        ("python", &["python"]),
        ("javascript", &["javascript", "js"]),
        ("docker", &["docker"]),
        ("api", &["api"]),
        ("database", &["database", "db"]),
        ("error", &["error", "bug"]),
        ("fix", &["fix", "solve"]),
    ];
    for (tag, keywords) in rules {
        if keywords.iter().any(|k| lower.contains(k)) {
            tags.push((*tag).to_string());
        }
    }

    tags
}

/// Best-effort primary-language detection over message content.
pub fn detect_language(content: &str) -> String {
    if content.is_empty() {
        return "unknown".to_string();
    }
    let lower = content.to_lowercase();
    let upper = content.to_uppercase();

    if content.contains("def ") || content.contains("import ") || lower.contains("python") {
        return "python".to_string();
    }
    if content.contains("function") || content.contains("const ") || content.contains("let ") {
        return "javascript".to_string();
    }
    if upper.contains("SELECT") || upper.contains("FROM") {
        return "sql".to_string();
    }
    if lower.contains("docker") || content.contains("FROM ") {
        return "docker".to_string();
    }

    "text".to_string()
}

/// Extract fenced code blocks, with their language hints when present.
pub fn extract_code_blocks(content: &str) -> Vec<CodeBlock> {
    CODE_BLOCK_RE
        .captures_iter(content)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let code = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            CodeBlock { language, code }
        })
        .collect()
}

impl SearchIndex {
    /// Index all messages for a session. Deletes any existing documents
    /// for this session_id first, then adds the new documents. Does NOT
    /// commit; call `commit()` after indexing a batch.
    pub fn index_session(
        &self,
        session_id: &str,
        context: &ProjectContext,
        docs: &[MessageDocument],
    ) -> Result<(), SearchError> {
        let writer = self.writer.lock().map_err(|e| {
            SearchError::Io(std::io::Error::other(format!("writer lock poisoned: {e}")))
        })?;

        // Replace the session wholesale; message ids are positional.
        let delete_term = Term::from_field_text(self.session_id_field, session_id);
        writer.delete_term(delete_term);

        for doc_data in docs {
            let code_blocks = extract_code_blocks(&doc_data.content);
            let code_blocks_json = serde_json::to_string(
                &code_blocks
                    .iter()
                    .map(|b| json!({"language": b.language, "code": b.code}))
                    .collect::<Vec<_>>(),
            )?;

            let mut tantivy_doc = doc!(
                self.id_field => doc_data.id.as_str(),
                self.session_id_field => doc_data.session_id.as_str(),
                self.project_id_field => context.project_id.as_str(),
                self.project_name_field => context.project_name.as_str(),
                self.project_path_field => context.project_path.as_str(),
                self.workspace_type_field => context.workspace_type.as_str(),
                self.branch_info_field => context.branch_info.as_str(),
                self.message_index_field => doc_data.message_index,
                self.type_field => doc_data.kind.as_str(),
                self.role_field => doc_data.role.as_str(),
                self.content_field => doc_data.content.as_str(),
                self.timestamp_field => doc_data.timestamp.as_str(),
                self.language_field => detect_language(&doc_data.content).as_str(),
                self.code_blocks_field => code_blocks_json.as_str(),
            );

            // Tags are a multi-valued field, one value per keyword hit.
            for tag in extract_tags(&doc_data.content) {
                tantivy_doc.add_text(self.tags_field, &tag);
            }

            writer.add_document(tantivy_doc)?;
        }

        debug!(
            session_id = session_id,
            doc_count = docs.len(),
            "indexed session documents"
        );

        Ok(())
    }

    /// Delete all documents for a given session_id. Does NOT commit.
    pub fn delete_session(&self, session_id: &str) -> Result<(), SearchError> {
        let writer = self.writer.lock().map_err(|e| {
            SearchError::Io(std::io::Error::other(format!("writer lock poisoned: {e}")))
        })?;

        let delete_term = Term::from_field_text(self.session_id_field, session_id);
        writer.delete_term(delete_term);

        debug!(session_id = session_id, "deleted session from search index");

        Ok(())
    }

    /// Commit all pending writes (inserts and deletes) to disk.
    /// Call this after indexing a batch of sessions.
    pub fn commit(&self) -> Result<(), SearchError> {
        let mut writer = self.writer.lock().map_err(|e| {
            SearchError::Io(std::io::Error::other(format!("writer lock poisoned: {e}")))
        })?;

        writer.commit()?;
        info!("search index committed");

        Ok(())
    }
}
