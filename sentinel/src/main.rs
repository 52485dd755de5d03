/*
sentinel - command line entry point
Manages subscriptions, runs one-off reports and hosts the scheduled daemon.
*/

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use tokio::select;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use sentinel::artifact::Category;
use sentinel::llm::{BackendConfig, Provider};
use sentinel::pipeline::{Pipeline, PipelineOutcome, SourceRequest};
use sentinel::scheduler;
use sentinel::sources::{BibliographyQuery, NewsMode, RepoActivityParams};
use sentinel::subscriptions::{AddOutcome, RemoveOutcome};

#[derive(Parser, Debug)]
#[command(name = "sentinel", about = "Multi-source ingestion and LLM summarization")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Backend provider for this run (openai or ollama)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name for this run
    #[arg(long, global = true)]
    model: Option<String>,

    /// Save the prompt instead of calling the backend
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage watched repositories
    Subscriptions {
        #[command(subcommand)]
        action: SubscriptionAction,
    },
    /// Fetch one source and summarize it
    Report {
        #[command(subcommand)]
        target: ReportTarget,
    },
    /// Run scheduled reports until Ctrl-C
    Daemon,
}

#[derive(Subcommand, Debug)]
enum SubscriptionAction {
    List,
    Add { repo: String },
    Remove { repo: String },
}

#[derive(Subcommand, Debug)]
enum ReportTarget {
    /// Repository progress; every subscription when no repository is given
    Github {
        repo: Option<String>,
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    HackerNews,
    News {
        /// breaking, latest or all
        #[arg(long, default_value = "breaking")]
        mode: String,
    },
    Wos {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config.clone()).await?;
    let pipeline = Pipeline::from_config(&config).context("failed to initialize sources")?;

    match args.command {
        Command::Subscriptions { ref action } => manage_subscriptions(&pipeline, action).await,
        Command::Report { ref target } => {
            let backend = resolve_backend(&args, &config)?;
            run_report(&pipeline, target, &backend).await
        }
        Command::Daemon => {
            let backend = resolve_backend(&args, &config)?;
            run_daemon(&pipeline, &config, &backend).await
        }
    }
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override_file = ?override_path, "configuration loaded");
    Ok(config)
}

fn resolve_backend(args: &Args, config: &Config) -> Result<BackendConfig> {
    let provider = args
        .provider
        .as_deref()
        .map(str::parse::<Provider>)
        .transpose()?;
    let mut backend = BackendConfig::from_config(config, provider, args.model.as_deref())?;
    if args.dry_run {
        backend.dry_run = true;
    }
    info!(provider = %backend.provider, model = %backend.model, dry_run = backend.dry_run, "backend resolved");
    Ok(backend)
}

async fn manage_subscriptions(pipeline: &Pipeline, action: &SubscriptionAction) -> Result<()> {
    let registry = pipeline.registry();
    match action {
        SubscriptionAction::List => {
            let repos = registry.list().await?;
            if repos.is_empty() {
                println!("No subscriptions ({})", registry.path().display());
            }
            for repo in repos {
                println!("{}", repo);
            }
        }
        SubscriptionAction::Add { repo } => match registry.add(repo).await? {
            AddOutcome::Added => println!("Added {}", repo.trim()),
            AddOutcome::AlreadyPresent => println!("{} is already subscribed", repo.trim()),
        },
        SubscriptionAction::Remove { repo } => match registry.remove(repo).await? {
            RemoveOutcome::Removed => println!("Removed {}", repo.trim()),
            RemoveOutcome::NotPresent => println!("{} was not subscribed", repo.trim()),
        },
    }
    Ok(())
}

async fn run_report(pipeline: &Pipeline, target: &ReportTarget, backend: &BackendConfig) -> Result<()> {
    let request = match target {
        ReportTarget::Github { repo: None, days } => {
            for (repo, outcome) in pipeline.run_subscriptions(*days, backend).await? {
                match outcome {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => eprintln!("{}: {}", repo, e),
                }
            }
            return Ok(());
        }
        ReportTarget::Github { repo: Some(repo), days } => {
            SourceRequest::RepoActivity(RepoActivityParams::new(repo, *days)?)
        }
        ReportTarget::HackerNews => SourceRequest::SocialNews,
        ReportTarget::News { mode } => SourceRequest::News(mode.parse::<NewsMode>()?),
        ReportTarget::Wos { query, page, limit } => {
            SourceRequest::Bibliography(BibliographyQuery::new(query, *page, *limit)?)
        }
    };

    let outcome = pipeline.run(&request, backend).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Reported(report) => {
            println!("{}", report.content);
            println!("\nReport saved to {}", report.path.display());
        }
        PipelineOutcome::Skipped(reason) => println!("No report generated: {}", reason),
    }
}

/// Wait for each configured wall-clock slot and run the configured report
/// types. Repository progress runs at most every `progress_frequency_days`.
async fn run_daemon(pipeline: &Pipeline, config: &Config, backend: &BackendConfig) -> Result<()> {
    let times = scheduler::parse_times(&config.scheduler.times)?;
    if times.is_empty() {
        anyhow::bail!("daemon needs at least one entry in scheduler.times");
    }

    let mut categories = Vec::new();
    for name in &config.report_types {
        match name.parse::<Category>() {
            Ok(c) => categories.push(c),
            Err(e) => warn!(%e, "ignoring report type"),
        }
    }
    if categories.is_empty() {
        categories.push(Category::RepoActivity);
    }

    let frequency = config.progress_frequency_days();
    let mut last_progress: Option<NaiveDate> = None;
    info!(times = ?config.scheduler.times, ?categories, frequency, "daemon started");

    loop {
        let now = Local::now();
        let Some(next) = scheduler::next_run_after(&now, &times) else {
            anyhow::bail!("no upcoming scheduler slot");
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next = %next.format("%Y-%m-%d %H:%M"), "daemon: waiting for next slot");

        select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, stopping daemon");
                return Ok(());
            }
        }

        let today = Local::now().date_naive();
        for category in &categories {
            match category {
                Category::RepoActivity => {
                    if !scheduler::should_run(last_progress, today, frequency) {
                        info!(?last_progress, "repository progress not due yet");
                        continue;
                    }
                    match pipeline.run_subscriptions(frequency, backend).await {
                        Ok(results) => {
                            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                            info!(repos = results.len(), failed, "repository progress finished");
                            last_progress = Some(today);
                        }
                        Err(e) => error!(%e, "could not read subscriptions"),
                    }
                }
                Category::SocialNews => run_scheduled(pipeline, SourceRequest::SocialNews, backend).await,
                Category::News => run_scheduled(pipeline, SourceRequest::News(NewsMode::All), backend).await,
                Category::Bibliography => {
                    warn!("bibliography reports need a query and are not scheduled");
                }
            }
        }
    }
}

async fn run_scheduled(pipeline: &Pipeline, request: SourceRequest, backend: &BackendConfig) {
    let category = request.category();
    match pipeline.run(&request, backend).await {
        Ok(PipelineOutcome::Reported(report)) => info!(%category, path = %report.path.display(), "scheduled report done"),
        Ok(PipelineOutcome::Skipped(reason)) => warn!(%category, %reason, "scheduled report skipped"),
        Err(e) => error!(%category, %e, "scheduled report failed"),
    }
}
