// crates/core/src/discovery.rs
//! Project directory discovery helpers.
//!
//! Directory names under `<root>/projects/` are lossy encodings of the
//! original working-directory path (separators replaced by hyphens), so
//! path resolution prefers the `projectPath` embedded in session records
//! and only decodes the directory name as a fallback.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Decode an encoded project directory name back to a path.
///
/// Lossy: hyphens that were part of real directory names also become
/// separators. Only used when no session file embeds the real path.
pub fn decode_project_path(encoded: &str) -> String {
    encoded.replace('-', "/")
}

/// Look for the real project path inside the project's session files.
///
/// Scans each `.jsonl` file line by line for a record carrying a
/// `projectPath` field and returns the first one found. Returns `None`
/// when no session embeds a path or the directory is unreadable.
pub async fn project_path_from_sessions(project_dir: &Path) -> Option<String> {
    let mut entries = match fs::read_dir(project_dir).await {
        Ok(e) => e,
        Err(e) => {
            debug!(dir = %project_dir.display(), error = %e, "cannot read project dir");
            return None;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().map(|e| e != "jsonl").unwrap_or(true) {
            continue;
        }

        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(_) => continue,
        };
        let mut lines = BufReader::new(file).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            if let Some(project_path) = value.get("projectPath").and_then(Value::as_str) {
                return Some(project_path.to_string());
            }
        }
    }

    None
}

/// List session ids (file stems of `.jsonl` files) in a project
/// directory, sorted by name for stable enumeration order.
pub async fn session_ids(project_dir: &Path) -> Vec<String> {
    let mut ids = Vec::new();
    let Ok(mut entries) = fs::read_dir(project_dir).await else {
        return ids;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                ids.push(stem.to_string_lossy().to_string());
            }
        }
    }

    ids.sort();
    ids
}

/// Filesystem creation time of a path, falling back to modification
/// time, then to now. Never errors.
pub async fn file_created_at(path: &Path) -> DateTime<Utc> {
    match fs::metadata(path).await {
        Ok(meta) => meta
            .created()
            .or_else(|_| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now()),
        Err(_) => Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_project_path() {
        assert_eq!(decode_project_path("-Users-foo-my-project"), "/Users/foo/my/project");
        assert_eq!(decode_project_path("-tmp"), "/tmp");
    }

    #[tokio::test]
    async fn test_project_path_from_sessions() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("abc.jsonl");
        tokio::fs::write(
            &file,
            concat!(
                "{\"type\":\"summary\"}\n",
                "not json\n",
                "{\"type\":\"user\",\"projectPath\":\"/workspace/real-path\"}\n",
            ),
        )
        .await
        .unwrap();

        let path = project_path_from_sessions(dir.path()).await;
        assert_eq!(path.as_deref(), Some("/workspace/real-path"));
    }

    #[tokio::test]
    async fn test_project_path_from_sessions_absent() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("abc.jsonl"), "{\"type\":\"user\"}\n")
            .await
            .unwrap();
        assert_eq!(project_path_from_sessions(dir.path()).await, None);
    }

    #[tokio::test]
    async fn test_session_ids_sorted_jsonl_only() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("b.jsonl"), "{}").await.unwrap();
        tokio::fs::write(dir.path().join("a.jsonl"), "{}").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "x").await.unwrap();

        assert_eq!(session_ids(dir.path()).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_file_created_at_missing_path() {
        let before = Utc::now();
        let got = file_created_at(Path::new("/nonexistent/file")).await;
        assert!(got >= before);
    }
}
