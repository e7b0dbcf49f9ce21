//! dotmerge — reconcile customized dotfiles against their upstream source.
//!
//! `init` sets up the merge workspace and imports the upstream tree;
//! `sync` runs one reconciliation pass with interactive review of whatever
//! cannot be resolved automatically; `status` shows the tracked revisions
//! and the last run.

mod review;
mod style;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use dotmerge_core::config::ReconcileConfig;
use dotmerge_core::errors::ConfigError;
use dotmerge_core::git::{GitBackend, Revision, VcsBackend};
use dotmerge_core::models::RunStats;
use dotmerge_core::render::TemplateRenderer;
use dotmerge_core::workflow::{read_last_run, ReconcileWorkflow};

/// Reconcile customized dotfiles against their upstream source.
#[derive(Parser)]
#[command(name = "dotmerge", version, about)]
struct Cli {
    /// Path to the config file.
    #[arg(short, long, default_value = "~/.config/dotmerge/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the merge workspace and import the upstream tree (first run).
    Init {
        /// Upstream clone URL (overrides the config).
        #[arg(long)]
        url: Option<String>,
    },

    /// Run one reconciliation pass.
    Sync,

    /// Show tracked revisions and the last run.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            if let Some(ConfigError::FileNotFound(path)) = e.downcast_ref::<ConfigError>() {
                eprintln!("No configuration found at {}.", path);
                eprintln!("Create one like this:\n");
                eprintln!("{}", ReconcileConfig::default_template());
                std::process::exit(1);
            }
            return Err(e);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.options.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { url } => cmd_init(config, url).await,
        Commands::Sync => cmd_sync(config).await,
        Commands::Status => cmd_status(config).await,
    }
}

/// Load the config, expanding `~` in the config path and the tree root.
fn load_config(path: &str) -> Result<ReconcileConfig> {
    let resolved = expand_tilde(path);
    let mut config = ReconcileConfig::load_and_resolve(&resolved)
        .with_context(|| format!("failed to load configuration from {}", resolved))?;
    config.repo.root = PathBuf::from(expand_tilde(&config.repo.root.to_string_lossy()));
    Ok(config)
}

/// Assemble the workflow for the configured tree.
fn build_workflow(config: &ReconcileConfig) -> ReconcileWorkflow<GitBackend, TemplateRenderer> {
    let backend = GitBackend::new(&config.repo.root, &config.repo.workspace_dir);
    let renderer = TemplateRenderer::new(&config.render.command, config.render.args.clone());
    ReconcileWorkflow::new(config.clone(), backend, renderer)
}

/// Set up the workspace and bulk-import the upstream tree.
async fn cmd_init(config: ReconcileConfig, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| config.upstream.url.clone());

    std::fs::create_dir_all(&config.repo.root)
        .with_context(|| format!("failed to create {}", config.repo.root.display()))?;

    let mut workflow = build_workflow(&config);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(format!("Cloning {} and importing...", url));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let count = workflow.initialize(&url).await;
    spinner.finish_and_clear();
    let count = count.context("initialization failed")?;

    println!("{}", style::success(&format!("Workspace initialized, {} files imported", count)));
    println!("Next: run 'dotmerge sync' once upstream has new changes");
    Ok(())
}

/// Run one reconciliation pass with the console review session.
async fn cmd_sync(config: ReconcileConfig) -> Result<()> {
    let mut workflow = build_workflow(&config);
    workflow
        .ensure_initialized()
        .context("run 'dotmerge init' first")?;

    let mut session = review::ConsoleReviewSession::new();
    let stats = workflow.run(&mut session).await.context("sync failed")?;

    print_run_summary(&stats);
    Ok(())
}

/// Show tracked revisions and the last run record.
async fn cmd_status(config: ReconcileConfig) -> Result<()> {
    let backend = GitBackend::new(&config.repo.root, &config.repo.workspace_dir);

    if !backend.is_initialized() {
        println!("○ Not initialized — run 'dotmerge init'");
        return Ok(());
    }

    let base = backend.head_revision(Revision::Base).await?;
    let latest = backend.head_revision(Revision::Latest).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "Revision"]);
    table.add_row(vec!["base (reconciled)", &base[..8.min(base.len())]]);
    table.add_row(vec!["latest (fetched)", &latest[..8.min(latest.len())]]);
    println!("{}", table);

    match read_last_run(&config) {
        Some(record) => {
            let outcome = if record.completed {
                style::success("completed")
            } else {
                style::warn("aborted early")
            };
            println!(
                "Last run: {} file(s) at {} — {}",
                record.files_reconciled,
                record
                    .finished_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                outcome
            );
        }
        None => println!("{}", style::dim("No runs recorded yet")),
    }
    Ok(())
}

/// Print the post-run summary table.
fn print_run_summary(stats: &RunStats) {
    println!();
    if stats.changed == 0 {
        println!("{}", style::success("Already up to date with upstream"));
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Outcome", "Files"]);
    table.add_row(vec!["already in sync".to_string(), stats.already_synced.to_string()]);
    table.add_row(vec!["auto-updated".to_string(), stats.auto_updated.to_string()]);
    table.add_row(vec!["auto-merged".to_string(), stats.auto_merged.to_string()]);
    table.add_row(vec!["kept local".to_string(), stats.auto_kept.to_string()]);
    table.add_row(vec!["reviewed".to_string(), stats.reviewed.to_string()]);
    table.add_row(vec!["skipped".to_string(), stats.skipped.len().to_string()]);
    println!("{}", table);

    if stats.aborted {
        println!(
            "{}",
            style::warn("Run aborted — remaining items will come back next sync")
        );
    } else {
        println!("{}", style::success("Reconciliation complete"));
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
