// crates/cli/src/main.rs
//! Command-line entry point for the vault sync pipeline.
//!
//! Store locations come from the environment (`VAULT_DB_PATH`,
//! `VAULT_SEARCH_DIR`, optional `VAULT_ROOT`); flags select what to
//! sync. Exit codes: 0 success (including degraded runs), 1 primary
//! store failure, 2 configuration error.

use clap::Parser;
use prompt_vault_core::Config;
use prompt_vault_sync::{available_owners, available_repos, RunSummary, SyncManager, SyncOptions};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "prompt-vault")]
#[command(about = "Sync conversation transcripts into a searchable vault", long_about = None)]
#[command(version)]
struct Cli {
    /// Sync only these repositories (comma-separated or repeated)
    #[arg(short = 'r', long = "repos", value_delimiter = ',', conflicts_with = "owners")]
    repos: Vec<String>,

    /// Sync only projects owned by these accounts (git remotes only)
    #[arg(short = 'o', long = "owners", value_delimiter = ',')]
    owners: Vec<String>,

    /// Sync everything, explicitly (same as passing no filters)
    #[arg(short = 'a', long = "all", conflicts_with_all = ["repos", "owners"])]
    all: bool,

    /// List available repositories and owners, then exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Persist transcripts without secret redaction
    #[arg(long = "no-redaction")]
    no_redaction: bool,

    /// Override the transcript root directory
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(2);
        }
    };
    if let Some(root) = cli.root {
        config.root = root;
    }

    if cli.list {
        return list_available(&config).await;
    }

    let repos: BTreeSet<String> = cli.repos.into_iter().collect();
    let owners: BTreeSet<String> = cli.owners.into_iter().collect();

    if !repos.is_empty() {
        let known = available_repos(&config).await;
        let unknown: Vec<_> = repos.difference(&known).cloned().collect();
        if !unknown.is_empty() {
            eprintln!("unknown repositories: {}", unknown.join(", "));
            eprintln!("run with --list to see what is available");
            return ExitCode::from(2);
        }
    }
    if !owners.is_empty() {
        let known = available_owners(&config).await;
        let unknown: Vec<_> = owners.difference(&known).cloned().collect();
        if !unknown.is_empty() {
            eprintln!("unknown owners: {}", unknown.join(", "));
            eprintln!("run with --list to see what is available");
            return ExitCode::from(2);
        }
    }

    if cli.all || (repos.is_empty() && owners.is_empty()) {
        tracing::info!("syncing all projects");
    }

    let options = SyncOptions {
        repos: (!repos.is_empty()).then_some(repos),
        owners: (!owners.is_empty()).then_some(owners),
        redaction: !cli.no_redaction,
    };

    let manager = SyncManager::new(config, options);
    match manager.run().await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("sync failed: {e}");
            ExitCode::from(1)
        }
    }
}

async fn list_available(config: &Config) -> ExitCode {
    let repos = available_repos(config).await;
    let owners = available_owners(config).await;

    println!("Repositories ({}):", repos.len());
    for repo in &repos {
        println!("  {repo}");
    }
    println!("Owners ({}):", owners.len());
    for owner in &owners {
        println!("  {owner}");
    }

    ExitCode::SUCCESS
}

fn print_summary(summary: &RunSummary) {
    println!("Sync complete:");
    println!(
        "  projects: {}/{}",
        summary.projects_synced, summary.projects_found
    );
    println!(
        "  sessions: {}/{}",
        summary.sessions_synced, summary.sessions_found
    );
    println!("  messages: {}", summary.total_messages);

    if summary.search_degraded {
        println!("  search index unavailable; primary store only");
    }

    if !summary.redaction_stats.is_empty() {
        println!("  redacted:");
        for (label, count) in &summary.redaction_stats {
            println!("    {label}: {count}");
        }
    }

    if !summary.errors.is_empty() {
        println!("  errors ({}):", summary.errors.len());
        for error in &summary.errors {
            println!("    {error}");
        }
    }
}
