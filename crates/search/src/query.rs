// crates/search/src/query.rs
//! Read path: ranked full-text queries with optional exact-match
//! filters over the metadata fields.

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};
use tracing::debug;

use crate::{SearchError, SearchIndex};

/// Exact-match filters applied alongside the text query.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub project_name: Option<String>,
    pub session_id: Option<String>,
    pub role: Option<String>,
}

/// One ranked search hit with its stored metadata.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub message_id: String,
    pub session_id: String,
    pub project_name: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
    pub score: f32,
}

impl SearchIndex {
    /// Execute a ranked full-text search over message content.
    ///
    /// An empty query returns no hits. Filters narrow the result to
    /// exact values of the untokenized metadata fields.
    pub fn search(
        &self,
        query_str: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let query_str = query_str.trim();
        if query_str.is_empty() {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let text_query = parser.parse_query(query_str)?;

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, text_query)];
        for (field, value) in [
            (self.project_name_field, &filters.project_name),
            (self.session_id_field, &filters.session_id),
            (self.role_field, &filters.role),
        ] {
            if let Some(value) = value {
                let term = Term::from_field_text(field, value);
                clauses.push((
                    Occur::Must,
                    Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
                ));
            }
        }
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?;

        let get_str = |doc: &TantivyDocument, field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(SearchHit {
                message_id: get_str(&doc, self.id_field),
                session_id: get_str(&doc, self.session_id_field),
                project_name: get_str(&doc, self.project_name_field),
                role: get_str(&doc, self.role_field),
                content: get_str(&doc, self.content_field),
                timestamp: get_str(&doc, self.timestamp_field),
                score,
            });
        }

        debug!(query = query_str, hits = hits.len(), "search executed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{MessageDocument, ProjectContext};

    fn context(name: &str) -> ProjectContext {
        ProjectContext {
            project_id: format!("-workspace-{name}"),
            project_name: name.to_string(),
            project_path: format!("/workspace/{name}"),
            workspace_type: "unknown".to_string(),
            branch_info: String::new(),
        }
    }

    fn message(session_id: &str, index: u64, role: &str, content: &str) -> MessageDocument {
        MessageDocument {
            id: format!("{session_id}_{index}"),
            session_id: session_id.to_string(),
            message_index: index,
            kind: role.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_index_and_search_round_trip() {
        let idx = SearchIndex::open_in_ram().expect("create index");

        idx.index_session(
            "s1",
            &context("widgets"),
            &[
                message("s1", 0, "user", "add token refresh to the auth flow"),
                message("s1", 1, "assistant", "the auth flow now refreshes tokens"),
            ],
        )
        .expect("index s1");
        idx.index_session(
            "s2",
            &context("gadgets"),
            &[message("s2", 0, "user", "speed up the build pipeline")],
        )
        .expect("index s2");
        idx.commit().expect("commit");
        idx.reader.reload().expect("reload");

        let hits = idx
            .search("auth flow", &SearchFilters::default(), 10)
            .expect("search");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.session_id == "s1"));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_with_filters() {
        let idx = SearchIndex::open_in_ram().expect("create index");
        idx.index_session(
            "s1",
            &context("widgets"),
            &[
                message("s1", 0, "user", "please fix the login bug"),
                message("s1", 1, "assistant", "the login bug is fixed"),
            ],
        )
        .expect("index s1");
        idx.index_session(
            "s2",
            &context("gadgets"),
            &[message("s2", 0, "user", "another login bug elsewhere")],
        )
        .expect("index s2");
        idx.commit().expect("commit");
        idx.reader.reload().expect("reload");

        let filters = SearchFilters {
            project_name: Some("widgets".to_string()),
            role: Some("user".to_string()),
            ..Default::default()
        };
        let hits = idx.search("login bug", &filters, 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "s1_0");
        assert_eq!(hits[0].project_name, "widgets");
    }

    #[test]
    fn test_reindex_session_replaces_old_docs() {
        let idx = SearchIndex::open_in_ram().expect("create index");
        let ctx = context("widgets");

        idx.index_session("s1", &ctx, &[message("s1", 0, "user", "original about databases")])
            .expect("index v1");
        idx.commit().expect("commit");
        idx.reader.reload().expect("reload");
        assert_eq!(
            idx.search("databases", &SearchFilters::default(), 10)
                .expect("search v1")
                .len(),
            1
        );

        idx.index_session("s1", &ctx, &[message("s1", 0, "user", "updated about networking")])
            .expect("index v2");
        idx.commit().expect("commit");
        idx.reader.reload().expect("reload");

        assert!(idx
            .search("databases", &SearchFilters::default(), 10)
            .expect("search old")
            .is_empty());
        assert_eq!(
            idx.search("networking", &SearchFilters::default(), 10)
                .expect("search new")
                .len(),
            1
        );
    }

    #[test]
    fn test_delete_session() {
        let idx = SearchIndex::open_in_ram().expect("create index");
        idx.index_session(
            "doomed",
            &context("widgets"),
            &[message("doomed", 0, "user", "transient content")],
        )
        .expect("index");
        idx.commit().expect("commit");
        idx.reader.reload().expect("reload");
        assert_eq!(
            idx.search("transient", &SearchFilters::default(), 10)
                .expect("search")
                .len(),
            1
        );

        idx.delete_session("doomed").expect("delete");
        idx.commit().expect("commit");
        idx.reader.reload().expect("reload");
        assert!(idx
            .search("transient", &SearchFilters::default(), 10)
            .expect("search")
            .is_empty());
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let idx = SearchIndex::open_in_ram().expect("create index");
        assert!(idx
            .search("  ", &SearchFilters::default(), 10)
            .expect("search")
            .is_empty());
    }
}
