// crates/core/src/ownership.rs
//! Ownership classification for project paths.
//!
//! Layered heuristics, in priority order: a `remote "origin"` URL from
//! the nearest `.git/config` up the ancestor chain, then path-shape
//! heuristics (`/workspace/`, `/projects/` segments), then the last
//! path segment. Only a git-config hit can establish an owner; path
//! heuristics yield repository names alone.
//!
//! Resolution is deterministic, side-effect free (read-only fs), and
//! never errors: any parse failure degrades to the next tier at debug
//! level.

use regex_lite::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Hosting-provider URL shapes, both HTTPS and SSH style.
static REMOTE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"github\.com[:/]([^/]+)/([^/\s]+)",
        r"gitlab\.com[:/]([^/]+)/([^/\s]+)",
        r"bitbucket\.org[:/]([^/]+)/([^/\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("remote pattern must compile"))
    .collect()
});

static PROJECT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/projects/(.+?)$").expect("project name pattern must compile"));

static BRANCH_INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/workspace/(.+?)/projects/").expect("branch info pattern must compile")
});

/// Resolved (owner, repository-name) pair; both optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    /// Hosting-provider account owning the repository. Only ever set
    /// from a version-control remote, never from path shapes.
    pub owner: Option<String>,
    /// Short repository / project name.
    pub repo: Option<String>,
}

/// Path-shape classification used to tag search documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub project_name: Option<String>,
    /// "feature" for `/workspace/<branch>/projects/<name>` shapes,
    /// "unknown" otherwise.
    pub workspace_type: String,
    /// Workspace segment with '/' flattened to '-'; empty when not a
    /// feature workspace.
    pub branch_info: String,
}

/// Resolve ownership for a project path.
pub fn resolve(project_path: &str) -> Ownership {
    if let Some((owner, repo)) = owner_from_git_config(project_path) {
        return Ownership {
            owner: Some(owner),
            repo: Some(repo),
        };
    }

    Ownership {
        owner: None,
        repo: repo_from_path(project_path),
    }
}

/// Walk the ancestor chain looking for `.git/config` and extract
/// (owner, repo) from its origin remote. Returns on the first config
/// whose remote matches a known provider shape.
pub fn owner_from_git_config(project_path: &str) -> Option<(String, String)> {
    let mut current = Some(Path::new(project_path));

    while let Some(dir) = current {
        let config_path = dir.join(".git").join("config");
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(contents) => {
                    if let Some(found) = origin_url(&contents).and_then(|url| parse_remote(&url)) {
                        debug!(
                            path = project_path,
                            owner = %found.0,
                            repo = %found.1,
                            "ownership resolved from git config"
                        );
                        return Some(found);
                    }
                }
                Err(e) => {
                    debug!(config = %config_path.display(), error = %e, "unreadable git config");
                }
            }
        }
        current = dir.parent();
    }

    None
}

/// Extract the url of the `[remote "origin"]` section from git config
/// INI text.
fn origin_url(config: &str) -> Option<String> {
    let mut in_origin = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
            continue;
        }
        if in_origin {
            if let Some(value) = line.strip_prefix("url") {
                let value = value.trim_start().strip_prefix('=')?.trim();
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Match a remote URL against known provider shapes, ignoring an
/// optional trailing `.git`.
fn parse_remote(url: &str) -> Option<(String, String)> {
    let url = url.strip_suffix(".git").unwrap_or(url);
    for pattern in REMOTE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            let owner = caps.get(1)?.as_str().to_string();
            let repo = caps.get(2)?.as_str().to_string();
            return Some((owner, repo));
        }
    }
    None
}

/// Repo-name heuristics for paths without usable version-control
/// metadata. The owner is never derivable here.
fn repo_from_path(project_path: &str) -> Option<String> {
    if let Some((_, workspace_part)) = project_path.split_once("/workspace/") {
        // A /projects/ subdirectory names the repo more precisely than
        // the workspace segment itself.
        if let Some((_, after_projects)) = workspace_part.split_once("/projects/") {
            if let Some(first) = after_projects.split('/').next() {
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
        if let Some(first) = workspace_part.split('/').next() {
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    project_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Classify a path into project name, workspace type, and branch info.
pub fn workspace_info(project_path: &str) -> WorkspaceInfo {
    let project_name = PROJECT_NAME_RE
        .captures(project_path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            project_path
                .split('/')
                .filter(|p| !p.is_empty() && *p != "workspace")
                .next_back()
                .map(String::from)
        });

    let is_feature = project_path.contains("/workspace/") && project_path.contains("/projects/");

    let branch_info = if is_feature {
        BRANCH_INFO_RE
            .captures(project_path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace('/', "-"))
            .unwrap_or_default()
    } else {
        String::new()
    };

    WorkspaceInfo {
        project_name,
        workspace_type: if is_feature { "feature" } else { "unknown" }.to_string(),
        branch_info,
    }
}
