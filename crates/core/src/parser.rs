// crates/core/src/parser.rs
//! Transcript parsing for append-only newline-delimited-JSON session files.
//!
//! Every line is an independent record; a line that fails to decode is
//! logged and dropped without aborting the file. Records keep their raw
//! JSON value so the orchestrator can persist a faithful (post-redaction)
//! copy alongside the extracted fields.

use crate::error::ParseError;
use crate::types::{ContentBlock, MessageContent};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// Synthetic preamble injected ahead of some user turns; never a real
/// first message.
pub const CAVEAT_MARKER: &str = "Caveat: The messages below were generated";

/// Slash-command invocations are recorded as user turns but carry no
/// conversational content.
pub const COMMAND_MARKER: &str = "<command-name>";

/// One successfully decoded transcript line.
#[derive(Debug, Clone)]
pub struct TranscriptRecord {
    /// 1-based line number in the source file, for diagnostics.
    pub line: usize,
    raw: Value,
}

impl TranscriptRecord {
    pub fn new(line: usize, raw: Value) -> Self {
        Self { line, raw }
    }

    /// Record type field ("user", "assistant", "summary", ...).
    pub fn kind(&self) -> Option<String> {
        self.raw.get("type").and_then(Value::as_str).map(String::from)
    }

    /// Role of the embedded message object, if the record carries one.
    pub fn role(&self) -> Option<String> {
        self.raw
            .get("message")
            .and_then(|m| m.get("role"))
            .and_then(Value::as_str)
            .map(String::from)
    }

    /// Content of the embedded message object, decoded into the
    /// string-or-blocks variant.
    pub fn content(&self) -> Option<MessageContent> {
        let content = self.raw.get("message")?.get("content")?;
        serde_json::from_value(content.clone()).ok()
    }

    pub fn timestamp(&self) -> Option<String> {
        self.raw
            .get("timestamp")
            .and_then(Value::as_str)
            .map(String::from)
    }

    /// Whether the record carries a message object at all.
    pub fn has_message(&self) -> bool {
        self.raw.get("message").map(Value::is_object).unwrap_or(false)
    }

    /// Replace the embedded message content with redacted text. No-op
    /// when the record has no message object.
    pub fn set_message_content(&mut self, content: &str) {
        if let Some(message) = self.raw.get_mut("message").and_then(Value::as_object_mut) {
            message.insert("content".to_string(), Value::String(content.to_string()));
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// Parse every line of a transcript file, in file order.
///
/// Malformed lines are logged at warn with their 1-based line number and
/// skipped; blank lines are ignored silently. Only failing to open or
/// read the file itself is an error.
pub async fn parse_transcript(path: &Path) -> Result<Vec<TranscriptRecord>, ParseError> {
    let file = fs::File::open(path)
        .await
        .map_err(|e| ParseError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut records = Vec::new();
    let mut line_number = 0usize;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ParseError::io(path, e))?
    {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => records.push(TranscriptRecord::new(line_number, value)),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = line_number,
                    error = %e,
                    "skipping malformed transcript line"
                );
            }
        }
    }

    Ok(records)
}

/// Flatten message content to a single text value.
///
/// Block lists concatenate the `text` of every `type == "text"` block,
/// joined with newlines; blocks of other types contribute nothing. An
/// all-non-text block list flattens to the empty string.
pub fn flatten_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Blocks(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Block {
                        kind: Some(kind),
                        text,
                        ..
                    } if kind == "text" => Some(text.as_deref().unwrap_or("")),
                    _ => None,
                })
                .collect();
            parts.join("\n")
        }
    }
}

/// Find the first real user message in a transcript.
///
/// Scans in file order for a user-role message whose flattened content
/// is neither a synthetic caveat preamble nor a command invocation.
/// Returns `(content, timestamp)` of the first qualifying record, or
/// `(None, None)` if none qualifies. Unreadable files yield `(None, None)`
/// with a warning, never an error.
pub async fn first_user_message(path: &Path) -> (Option<String>, Option<String>) {
    let records = match parse_transcript(path).await {
        Ok(r) => r,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to extract first user message");
            return (None, None);
        }
    };

    for record in &records {
        if record.role().as_deref() != Some("user") {
            continue;
        }
        let Some(content) = record.content() else {
            continue;
        };
        let text = flatten_content(&content);

        if text.contains(CAVEAT_MARKER) || text.starts_with(COMMAND_MARKER) {
            continue;
        }

        return (Some(text), record.timestamp());
    }

    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn write_transcript(lines: &[&str]) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        tokio::fs::write(&path, lines.join("\n")).await.unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_parse_transcript_all_lines() {
        let (_dir, path) = write_transcript(&[
            r#"{"type":"user","message":{"role":"user","content":"hi"},"timestamp":"2026-01-01T00:00:00Z"}"#,
            r#"{"type":"assistant","message":{"role":"assistant","content":"hello"}}"#,
        ])
        .await;

        let records = parse_transcript(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[0].kind().as_deref(), Some("user"));
        assert_eq!(records[0].timestamp().as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(records[1].line, 2);
        assert_eq!(records[1].role().as_deref(), Some("assistant"));
    }

    #[tokio::test]
    async fn test_parse_transcript_skips_malformed_lines() {
        let (_dir, path) = write_transcript(&[
            r#"{"type":"user","message":{"role":"user","content":"a"}}"#,
            r#"{not json at all"#,
            "",
            r#"{"type":"user","message":{"role":"user","content":"b"}}"#,
        ])
        .await;

        let records = parse_transcript(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        // Line numbers point at the original file, not the surviving set.
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].line, 4);
    }

    #[tokio::test]
    async fn test_parse_transcript_missing_file() {
        let result = parse_transcript(Path::new("/nonexistent/session.jsonl")).await;
        assert!(matches!(result, Err(ParseError::NotFound { .. })));
    }

    #[test]
    fn test_flatten_plain_text() {
        let content = MessageContent::Text("hello".into());
        assert_eq!(flatten_content(&content), "hello");
    }

    #[test]
    fn test_flatten_blocks_text_only() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "text", "text": "first"},
            {"type": "tool_use", "name": "Read", "input": {}},
            {"type": "text", "text": "second"},
        ]))
        .unwrap();
        assert_eq!(flatten_content(&content), "first\nsecond");
    }

    #[test]
    fn test_flatten_blocks_without_text_is_empty() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "tool_result", "content": "output"},
        ]))
        .unwrap();
        assert_eq!(flatten_content(&content), "");
    }

    #[tokio::test]
    async fn test_first_user_message_skip_rule() {
        // Caveat preamble, then a command invocation, then the real turn.
        let (_dir, path) = write_transcript(&[
            r#"{"type":"user","message":{"role":"user","content":"Caveat: The messages below were generated by the user"},"timestamp":"2026-01-01T00:00:00Z"}"#,
            r#"{"type":"user","message":{"role":"user","content":"<command-name>/commit</command-name>"},"timestamp":"2026-01-01T00:00:01Z"}"#,
            r#"{"type":"user","message":{"role":"user","content":"please fix the bug"},"timestamp":"2026-01-01T00:00:02Z"}"#,
        ])
        .await;

        let (content, timestamp) = first_user_message(&path).await;
        assert_eq!(content.as_deref(), Some("please fix the bug"));
        assert_eq!(timestamp.as_deref(), Some("2026-01-01T00:00:02Z"));
    }

    #[tokio::test]
    async fn test_first_user_message_flattens_blocks() {
        let (_dir, path) = write_transcript(&[
            r#"{"type":"assistant","message":{"role":"assistant","content":"ignored"}}"#,
            r#"{"type":"user","message":{"role":"user","content":[{"type":"text","text":"from a block"}]},"timestamp":"2026-02-02T00:00:00Z"}"#,
        ])
        .await;

        let (content, timestamp) = first_user_message(&path).await;
        assert_eq!(content.as_deref(), Some("from a block"));
        assert_eq!(timestamp.as_deref(), Some("2026-02-02T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_first_user_message_none_qualifies() {
        let (_dir, path) = write_transcript(&[
            r#"{"type":"user","message":{"role":"user","content":"<command-name>/clear</command-name>"}}"#,
            r#"{"type":"assistant","message":{"role":"assistant","content":"ok"}}"#,
        ])
        .await;

        let (content, timestamp) = first_user_message(&path).await;
        assert_eq!(content, None);
        assert_eq!(timestamp, None);
    }

    #[test]
    fn test_set_message_content_rewrites_raw() {
        let raw = json!({
            "type": "user",
            "message": {"role": "user", "content": [{"type": "text", "text": "secret"}]},
        });
        let mut record = TranscriptRecord::new(1, raw);
        record.set_message_content("[REDACTED_PASSWORD]");
        assert_eq!(
            record.raw()["message"]["content"],
            json!("[REDACTED_PASSWORD]")
        );
    }

    #[test]
    fn test_set_message_content_without_message_is_noop() {
        let mut record = TranscriptRecord::new(1, json!({"type": "summary"}));
        record.set_message_content("x");
        assert_eq!(record.raw(), &json!({"type": "summary"}));
    }
}
