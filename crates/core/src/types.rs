// crates/core/src/types.rs
//! Entity types persisted by the pipeline, plus the message-content
//! variant shared by the parser and the redaction engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message content as it appears on the wire: either a plain string or
/// a list of typed blocks (tool use, text, thinking, ...).
///
/// Flattening to display text is done by [`crate::parser::flatten_content`]
/// at the storage boundary, never inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One element of a block-structured content list.
///
/// Blocks we do not model (or non-object list items) round-trip through
/// the `Other` variant untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Block {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(flatten)]
        rest: serde_json::Map<String, Value>,
    },
    Other(Value),
}

/// A project: one directory under `<root>/projects/`, identified by its
/// encoded directory name. Never deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub path: String,
    pub session_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A session ready for persistence. Messages are carried separately so
/// the session row stays small.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub project_id: String,
    pub project_path: String,
    pub first_message: Option<String>,
    pub message_timestamp: Option<String>,
    pub todo_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

/// One message, post-redaction. The persisted primary key is
/// `{session_id}_{index}` where index is the zero-based position in the
/// session; the key is assigned at write time by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Record type ("user", "assistant", "summary", ...).
    pub kind: Option<String>,
    /// Role from the embedded message object, if any.
    pub role: Option<String>,
    /// Flattened, redacted text content.
    pub content: Option<String>,
    /// Original timestamp string from the record.
    pub timestamp: Option<String>,
    /// Full original record, with redacted content written back in.
    pub raw_data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_deserializes_plain_string() {
        let content: MessageContent = serde_json::from_value(json!("hello")).unwrap();
        assert_eq!(content, MessageContent::Text("hello".into()));
    }

    #[test]
    fn test_content_deserializes_blocks() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "text", "text": "hi"},
            {"type": "tool_use", "name": "Read", "input": {"file_path": "/x"}},
        ]))
        .unwrap();
        let MessageContent::Blocks(blocks) = content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 2);
        let ContentBlock::Block { kind, text, rest, .. } = &blocks[0] else {
            panic!("expected typed block");
        };
        assert_eq!(kind.as_deref(), Some("text"));
        assert_eq!(text.as_deref(), Some("hi"));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_non_object_block_round_trips() {
        let raw = json!(["just a string", {"type": "text", "text": "t"}]);
        let content: MessageContent = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&content).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_tool_block_preserves_unknown_fields() {
        let raw = json!([{"type": "tool_use", "name": "Bash", "input": {"command": "ls"}}]);
        let content: MessageContent = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&content).unwrap();
        assert_eq!(back, raw);
    }
}
