//! Trigger - commit-triggered build dispatch CLI
//!
//! The `trigger` command runs the dispatch pipeline against a JSON catalog.
//!
//! ## Commands
//!
//! - `revision`: decide which projects build a recorded revision and request those builds
//! - `options show`: print a project's effective options
//! - `options set`: validate and store option values
//! - `changed-files`: list the files a revision touched

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use trigger_core::telemetry::{init_tracing, TelemetryConfig};
use trigger_core::{
    extract_changed_files, handle_revision_created, DispatchStatus, GitVcsProvider,
    HttpBuildCreator, Metrics, OptionUpdates, ProjectOptionsService, TriggerOutcome,
    TriggerServices, VcsProvider,
};
use trigger_state::{MemoryCatalog, RepositoryId, RepositoryStore};

#[derive(Parser)]
#[command(name = "trigger")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Commit-triggered build dispatch", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Catalog of repositories, revisions, projects, options and snapshots
    #[arg(long, global = true, env = "TRIGGER_CATALOG", default_value = "catalog.json")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the commit trigger for a recorded revision
    Revision {
        /// Commit sha
        #[arg(long)]
        sha: String,

        /// Repository id the revision belongs to
        #[arg(long)]
        repository: u64,

        #[command(flatten)]
        vcs: VcsArgs,

        #[command(flatten)]
        builds: BuildArgs,
    },

    /// Inspect or change project options
    Options {
        #[command(subcommand)]
        action: OptionsAction,
    },

    /// List the files changed by a revision
    ChangedFiles {
        /// Repository id
        #[arg(long)]
        repository: u64,

        /// Commit sha
        #[arg(long)]
        sha: String,

        #[command(flatten)]
        vcs: VcsArgs,
    },
}

#[derive(Subcommand)]
enum OptionsAction {
    /// Print every option of a project, defaults applied
    Show {
        /// Project slug or id
        #[arg(long)]
        project: String,
    },

    /// Set option values (NAME=VALUE; an empty VALUE stores an empty string)
    Set {
        /// Project slug or id
        #[arg(long)]
        project: String,

        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },
}

#[derive(Args)]
struct VcsArgs {
    /// git executable
    #[arg(long, env = "TRIGGER_GIT_BIN", default_value = "git")]
    git_bin: String,

    /// Directory holding one bare mirror per repository
    #[arg(long, env = "TRIGGER_MIRROR_ROOT", default_value = ".trigger/mirrors")]
    mirror_root: PathBuf,
}

impl VcsArgs {
    fn provider(&self) -> GitVcsProvider {
        GitVcsProvider::new(self.git_bin.clone(), self.mirror_root.clone())
    }
}

#[derive(Args)]
struct BuildArgs {
    /// Build creation endpoint
    #[arg(long, env = "TRIGGER_BUILDS_URL")]
    builds_url: String,

    /// Timeout for each build creation request, in seconds
    #[arg(long, env = "TRIGGER_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing option name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(TelemetryConfig::new(cli.json, cli.verbose));

    let catalog = Arc::new(load_catalog(&cli.catalog)?);
    let metrics = Arc::new(Metrics::new());

    let result = match cli.command {
        Commands::Revision {
            sha,
            repository,
            vcs,
            builds,
        } => cmd_revision(catalog, metrics.clone(), &sha, repository, &vcs, &builds).await,
        Commands::Options { action } => match action {
            OptionsAction::Show { project } => {
                cmd_options_show(catalog, metrics.clone(), &project).await
            }
            OptionsAction::Set {
                project,
                assignments,
            } => {
                cmd_options_set(catalog, metrics.clone(), &cli.catalog, &project, assignments).await
            }
        },
        Commands::ChangedFiles {
            repository,
            sha,
            vcs,
        } => cmd_changed_files(&catalog, &metrics, repository, &sha, &vcs).await,
    };

    metrics.flush();
    result
}

fn load_catalog(path: &Path) -> Result<MemoryCatalog> {
    MemoryCatalog::from_json_file(path)
        .with_context(|| format!("Failed to load catalog from {}", path.display()))
}

async fn cmd_revision(
    catalog: Arc<MemoryCatalog>,
    metrics: Arc<Metrics>,
    sha: &str,
    repository: u64,
    vcs: &VcsArgs,
    builds: &BuildArgs,
) -> Result<()> {
    let creator = HttpBuildCreator::new(
        builds.builds_url.clone(),
        Duration::from_secs(builds.http_timeout_secs),
    )
    .context("Failed to build HTTP client")?;
    let services = TriggerServices::from_catalog(
        catalog,
        Arc::new(vcs.provider()),
        Arc::new(creator),
        metrics,
    );

    let outcome = handle_revision_created(&services, sha, RepositoryId(repository))
        .await
        .with_context(|| format!("Trigger run for {sha} failed"))?;

    match outcome {
        TriggerOutcome::RevisionUnknown => {
            println!("Revision {sha} is not recorded for repository {repository}");
        }
        TriggerOutcome::NoCandidates => {
            println!("No active projects for repository {repository}");
        }
        TriggerOutcome::Dispatched(report) => {
            for skipped in &report.skipped {
                println!("skipped  {}: {}", skipped.project, skipped.reason);
            }
            for outcome in &report.dispatch.outcomes {
                match &outcome.status {
                    DispatchStatus::Created { status } => {
                        println!("created  {} ({status})", outcome.project)
                    }
                    DispatchStatus::Rejected { status, body } => {
                        println!("rejected {} ({status}): {body}", outcome.project)
                    }
                    DispatchStatus::Failed { reason } => {
                        println!("failed   {}: {reason}", outcome.project)
                    }
                }
            }
            info!(
                created = report.dispatch.created_count(),
                failed = report.dispatch.failed_count(),
                skipped = report.skipped.len(),
                "Trigger run complete"
            );
        }
    }

    Ok(())
}

async fn cmd_options_show(
    catalog: Arc<MemoryCatalog>,
    metrics: Arc<Metrics>,
    project: &str,
) -> Result<()> {
    let service = ProjectOptionsService::from_catalog(catalog, metrics);
    let (project, options) = service.show(project).await?;

    let out = serde_json::json!({
        "project": project.slug,
        "id": project.id,
        "options": options.values(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_options_set(
    catalog: Arc<MemoryCatalog>,
    metrics: Arc<Metrics>,
    catalog_path: &Path,
    project: &str,
    assignments: Vec<(String, String)>,
) -> Result<()> {
    let updates: OptionUpdates = assignments
        .into_iter()
        .map(|(name, value)| (name, Some(value)))
        .collect();

    let service = ProjectOptionsService::from_catalog(catalog.clone(), metrics);
    let written = service
        .update(project, &updates)
        .await
        .with_context(|| format!("Failed to update options for {project}"))?;

    catalog
        .save_json_file(catalog_path)
        .with_context(|| format!("Failed to save catalog to {}", catalog_path.display()))?;

    println!("Updated {} option(s) for {project}", written.len());
    for name in written {
        println!("  {name}");
    }
    Ok(())
}

async fn cmd_changed_files(
    catalog: &MemoryCatalog,
    metrics: &Metrics,
    repository: u64,
    sha: &str,
    vcs: &VcsArgs,
) -> Result<()> {
    let repository = catalog
        .get_repository(RepositoryId(repository))
        .await?
        .ok_or_else(|| anyhow!("Repository {repository} not found"))?;
    let handle = vcs
        .provider()
        .vcs_for(&repository)
        .with_context(|| format!("No VCS available for repository {}", repository.id))?;

    let files = extract_changed_files(handle.as_ref(), sha, metrics)
        .await
        .with_context(|| format!("Failed to extract changes for {sha}"))?;
    for file in files {
        println!("{file}");
    }
    Ok(())
}
