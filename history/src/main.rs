use clap::{Parser, Subcommand};
use history::report::{render_branches, render_history, render_reports, render_repositories};
use history::{AppConfig, HistoryEngine, OutputFormat, Retrier};
use provider::prelude::*;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "commit-trail")]
#[command(about = "Reconstruct first-parent commit history across CodeCommit repositories")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Service endpoint (overrides config and environment)
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// AWS region used to derive the endpoint
    #[arg(long, global = true)]
    region: Option<String>,
    /// Attempts per remote call when throttled
    #[arg(long, global = true)]
    max_attempts: Option<u32>,
    /// Serve data from a JSON fixture instead of the remote service
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories
    Repos,
    /// List a repository's branches and their head commits
    Branches {
        /// Repository name
        repository: String,
    },
    /// Print the first-parent history of one branch
    History {
        /// Repository name
        repository: String,
        /// Branch name
        branch: String,
    },
    /// Walk every branch of every repository
    All {
        /// Branches walked at the same time within a repository
        #[arg(long)]
        concurrency: Option<usize>,
        /// Only repositories matching this glob
        #[arg(long)]
        repo: Option<String>,
        /// Only branches matching this glob
        #[arg(long)]
        branch: Option<String>,
    },
}

fn build_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    if let Some(region) = &cli.region {
        config.client.region = Some(region.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        config.client.endpoint = Some(endpoint.clone());
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Commands::All {
        concurrency,
        repo,
        branch,
    } = &cli.command
    {
        if let Some(concurrency) = concurrency {
            config.traversal.concurrency = *concurrency;
        }
        if repo.is_some() {
            config.filters.repositories = repo.clone();
        }
        if branch.is_some() {
            config.filters.branches = branch.clone();
        }
    }

    let config = config.apply_env();
    config.validate()?;
    Ok(config)
}

fn build_provider(
    cli: &Cli,
    config: &AppConfig,
) -> Result<Box<dyn SourceProvider>, Box<dyn std::error::Error>> {
    match &cli.fixture {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            info!("Serving repositories from fixture {}", path.display());
            Ok(Box::new(InMemoryProvider::from_fixture_json(&json)?))
        }
        None => {
            let client = CodeCommitProvider::new(config.client_config())?;
            info!("Using CodeCommit endpoint in {}", client.region());
            Ok(Box::new(client))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let provider = build_provider(&cli, &config).map_err(|e| {
        error!("Failed to initialize provider client: {}", e);
        e
    })?;

    let engine = HistoryEngine::new(provider.as_ref(), Retrier::new(config.retry.clone()))
        .with_options(config.traversal_options()?);

    let output = match &cli.command {
        Commands::Repos => {
            let repositories = engine.list_repositories().await?;
            render_repositories(&repositories, cli.format)?
        }
        Commands::Branches { repository } => {
            let resolutions = engine.list_branches(repository).await?;
            render_branches(&resolutions, cli.format)?
        }
        Commands::History { repository, branch } => {
            let history = engine.branch_history(repository, branch).await?;
            render_history(&history, cli.format)?
        }
        Commands::All { .. } => {
            let reports = engine.enumerate_all().await?;
            let failures: usize = reports.iter().map(|r| r.failure_count()).sum();
            if failures > 0 {
                warn!("{} branch or repository traversals failed", failures);
            }
            render_reports(&reports, cli.format)?
        }
    };

    print!("{}", output);
    Ok(())
}
