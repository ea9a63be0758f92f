//! CLI binary for running the Briefing pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use briefing_feed::{GmailFeed, SourceFeed};
use briefing_llm::{LlmClient, LoggingMiddleware, OpenAiAdapter, UsageTrackingMiddleware};
use briefing_pipeline::{
    ArtifactGenerator, BackoffPolicy, BriefingConfig, Orchestrator, Renderer, RunEvent, RunOptions,
};
use briefing_publish::{GitCli, GitHubHost, PublicationWorkflow, ReviewHost, VersionControl};
use briefing_store::{FileCounter, IdentityStore};
use briefing_types::{ArtifactStatus, Category, CategoryOutcome, Period, RunReport};

#[derive(Parser)]
#[command(name = "briefing", version, about = "Turns newsletter emails into merged blog posts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "briefing.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, render, and publish posts for the configured categories
    Run {
        /// weekly or midweek (default: derived from today's weekday)
        #[arg(long)]
        period: Option<Period>,

        /// Only these categories (default: every category with an active newsletter)
        #[arg(long = "category")]
        categories: Vec<Category>,

        /// Stop after rendering; nothing is committed or merged
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored artifacts
    Status {
        /// Only artifacts in this state, e.g. DRAFT
        #[arg(long)]
        status: Option<ArtifactStatus>,
    },

    /// Validate the configuration file
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            period,
            categories,
            dry_run,
        } => {
            let report = cmd_run(&cli.config, period, categories, dry_run).await?;
            if report.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Status { status } => {
            cmd_status(&cli.config, status).await?;
        }
        Commands::Check => {
            cmd_check(&cli.config)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<BriefingConfig> {
    let config = BriefingConfig::load(path)?;
    config.validate()?;
    tracing::debug!(path = %path.display(), newsletters = config.newsletters.len(), "loaded configuration");
    Ok(config)
}

async fn open_store(config: &BriefingConfig) -> anyhow::Result<IdentityStore> {
    let store = IdentityStore::connect(&config.store.database_url).await?;
    Ok(match &config.store.counter_file {
        Some(path) => store.with_counter(Arc::new(FileCounter::new(path))),
        None => store,
    })
}

fn build_llm(config: &BriefingConfig, usage: &UsageTrackingMiddleware) -> anyhow::Result<LlmClient> {
    let client = match &config.llm.base_url {
        Some(url) => {
            let adapter = OpenAiAdapter::from_env()?
                .with_base_url(url.clone())
                .with_default_model(config.llm.model.clone());
            let mut client = LlmClient::new();
            client.register_provider(adapter);
            client
        }
        None => LlmClient::from_env()?,
    };
    Ok(client
        .with_middleware(LoggingMiddleware)
        .with_middleware(usage.clone())
        .with_timeout(Duration::from_secs(config.llm.timeout_secs)))
}

async fn cmd_run(
    config_path: &Path,
    period: Option<Period>,
    categories: Vec<Category>,
    dry_run: bool,
) -> anyhow::Result<RunReport> {
    let config = load_config(config_path)?;
    let period = period.unwrap_or_else(|| Period::for_date(chrono::Local::now().date_naive()));
    let categories = if categories.is_empty() {
        config.active_categories()
    } else {
        categories
    };

    println!("Running {} briefing for: {}", period, join(&categories));
    if dry_run {
        println!("(dry run -- nothing will be committed)");
    }

    let feed: Arc<dyn SourceFeed> = Arc::new(
        GmailFeed::from_env(config.gmail_labels())?.with_base_url(config.feed.api_base.clone()),
    );

    let usage = UsageTrackingMiddleware::new();
    let generator = ArtifactGenerator::new(Arc::new(build_llm(&config, &usage)?), config.generator_settings());

    let mut git = GitCli::new(&config.blog.repo_path);
    if let (Some(name), Some(email)) = (&config.git.user_name, &config.git.user_email) {
        git = git.with_identity(name.clone(), email.clone());
    }
    let vcs: Arc<dyn VersionControl> = Arc::new(git);
    let host: Arc<dyn ReviewHost> = if dry_run {
        Arc::new(GitHubHost::new(String::new(), &config.git.owner, &config.git.repo))
    } else {
        Arc::new(
            GitHubHost::from_env(&config.git.owner, &config.git.repo)?.with_api_base(&config.git.api_base),
        )
    };
    let publisher = PublicationWorkflow::new(vcs, host).with_config(config.publish_config());

    let orchestrator = Orchestrator::new(
        feed,
        generator,
        Arc::new(open_store(&config).await?),
        Renderer::new(config.blog.posts_path()),
        publisher,
        config.newsletters.clone(),
    )
    .with_options(RunOptions {
        dry_run,
        generation_retries: config.llm.generation_retries,
        backoff: BackoffPolicy::default(),
    });

    let mut events = orchestrator.events().subscribe();
    let progress = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, RunEvent::RunCompleted { .. });
            print_event(&event);
            if done {
                break;
            }
        }
    });

    let report = orchestrator.run(&categories, period).await;
    let _ = progress.await;

    println!();
    for (category, outcome) in &report.outcomes {
        println!("  {:<14} {}", category.as_str(), describe(outcome));
    }
    if !report.recovered.is_empty() {
        println!("  recovered from earlier runs: {:?}", report.recovered);
    }
    if let Some(number) = report.review_request {
        println!("Review request: #{}", number);
    }
    println!(
        "Tokens: {} in / {} out over {} calls",
        usage.total_input_tokens(),
        usage.total_output_tokens(),
        usage.calls()
    );

    Ok(report)
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::BatchStarted { category } => println!("[{}] started", category),
        RunEvent::DocumentsClaimed { category, count } => {
            println!("[{}] claimed {} newsletters", category, count)
        }
        RunEvent::ArtifactRendered { artifact_id, path } => {
            println!("  artifact {} rendered to {}", artifact_id, path)
        }
        RunEvent::BatchFailed { category, stage, error } => {
            println!("[{}] failed at {}: {}", category, stage, error)
        }
        RunEvent::ArtifactRecovered { artifact_id, from } => {
            println!("  carrying artifact {} forward from {}", artifact_id, from)
        }
        RunEvent::ReviewRequestReady { number } => println!("Review request #{} ready", number),
        RunEvent::Merged { number, forced } => {
            let how = if *forced { "force-merged" } else { "merged" };
            println!("Review request #{} {}", number, how)
        }
        RunEvent::PublicationFailed { error } => println!("Publication failed: {}", error),
        _ => {}
    }
}

fn describe(outcome: &CategoryOutcome) -> String {
    match outcome {
        CategoryOutcome::SkippedNoNewsletters => "skipped (no active newsletters)".to_string(),
        CategoryOutcome::SkippedNoEmails => "skipped (no new emails)".to_string(),
        CategoryOutcome::GenerationFailedRolledBack { stage, reason } => {
            format!("rolled back at {}: {}", stage, reason)
        }
        CategoryOutcome::Published { slug, .. } => format!("published {}", slug),
        CategoryOutcome::PublishFailed { slug, reason, .. } => {
            format!("rendered {} but not published: {}", slug, reason)
        }
        CategoryOutcome::Rendered { slug, .. } => format!("rendered {}", slug),
    }
}

async fn cmd_status(config_path: &Path, status: Option<ArtifactStatus>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = open_store(&config).await?;

    let statuses = match status {
        Some(s) => vec![s],
        None => vec![
            ArtifactStatus::Draft,
            ArtifactStatus::MarkdownCreated,
            ArtifactStatus::Published,
            ArtifactStatus::Archived,
        ],
    };

    let mut total = 0;
    for status in statuses {
        for artifact in store.artifacts_with_status(status).await? {
            total += 1;
            let documents = store.documents_for_artifact(artifact.id).await?;
            println!(
                "{:>5}  {:<16} {:<28} {:<10} {} docs  {}",
                artifact.id,
                status.as_str(),
                artifact.slug().unwrap_or("(no slug)"),
                artifact.category().as_str(),
                documents.len(),
                artifact.artifact.created_at.format("%Y-%m-%d %H:%M"),
            );
        }
    }
    if total == 0 {
        println!("No artifacts");
    }
    Ok(())
}

fn cmd_check(config_path: &Path) -> anyhow::Result<()> {
    let config = BriefingConfig::load(config_path)?;
    if let Err(e) = config.validate() {
        println!("[ERROR] {}", e);
        std::process::exit(1);
    }

    println!("Configuration is valid");
    println!("Model: {} ({} max tokens)", config.llm.model, config.llm.max_tokens);
    println!("Database: {}", config.store.database_url);
    println!("Posts: {}", config.blog.posts_path().display());
    println!(
        "Branches: {} -> {} on {}",
        config.git.integration_branch, config.git.base_branch, config.git.remote
    );
    println!("Mood: {}", config.mood.as_str());
    println!("Active categories: {}", join(&config.active_categories()));
    for secret in ["OPENAI_API_KEY", "GH_TOKEN", "GMAIL_ACCESS_TOKEN"] {
        if std::env::var_os(secret).is_none() {
            println!("[WARN] {} is not set", secret);
        }
    }
    if config.git.owner.is_empty() || config.git.repo.is_empty() {
        println!("[WARN] git.owner / git.repo not set; publication will fail");
    }
    Ok(())
}

fn join(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "(none)".to_string();
    }
    categories.iter().map(Category::as_str).collect::<Vec<_>>().join(", ")
}
