use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use gleaner::collector::Collector;
use gleaner::config::Config;
use gleaner::dedup::DuplicationDetector;
use gleaner::loader::Loader;
use gleaner::orchestrator::{Orchestrator, PipelineParams};
use gleaner::processor::Processor;
use gleaner::scheduler::schedule::ScheduleConfig;
use gleaner::scheduler::PipelineScheduler;
use gleaner::storage::SqliteStore;

#[derive(Parser)]
#[command(
    name = "gleaner",
    version,
    about = "Job-posting ingestion pipeline: collect, normalize, deduplicate, load",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (environment variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect raw pages from the search API
    Collect {
        /// Search query
        query: String,

        /// Country filter (config default otherwise)
        #[arg(long)]
        country: Option<String>,

        /// First page to fetch
        #[arg(long, default_value = "1")]
        start_page: u32,

        /// Number of pages to fetch
        #[arg(short, long, default_value = "5")]
        pages: u32,
    },

    /// Process pending raw collections into normalized records
    Process {
        /// Process a single collection instead of all pending ones
        #[arg(long)]
        collection_id: Option<Uuid>,
    },

    /// Load processed batches into canonical storage
    Load {
        /// Load a single batch instead of all pending ones
        #[arg(long)]
        collection_id: Option<Uuid>,
    },

    /// Run collection, processing and loading in sequence
    Pipeline {
        /// Search query
        query: String,

        /// Country filter (config default otherwise)
        #[arg(long)]
        country: Option<String>,

        /// First page to fetch
        #[arg(long, default_value = "1")]
        start_page: u32,

        /// Number of pages to fetch
        #[arg(short, long, default_value = "5")]
        pages: u32,
    },

    /// Run maintenance: duplicate cleanup, statistics, health check
    Maintain,

    /// Run the recurring scheduler until interrupted
    Schedule {
        /// Job definitions file (built-in defaults otherwise)
        #[arg(long)]
        jobs: Option<PathBuf>,
    },

    /// Show pipeline statistics and health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Fail fast on configuration problems, reporting all of them at once.
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!(%problem, "Invalid configuration");
        }
        anyhow::bail!("{} configuration problem(s), aborting", problems.len());
    }
    config.initialize()?;

    if let Err(e) = gleaner::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without");
    }

    let store = Arc::new(SqliteStore::open(&config.database.sqlite_path)?);

    match cli.command {
        Commands::Collect {
            query,
            country,
            start_page,
            pages,
        } => {
            let collector = Collector::new(&config, store.clone())?;
            let ids = collector
                .collect(&query, country.as_deref(), start_page, pages)
                .await?;
            println!("Stored {} raw collections:", ids.len());
            for id in ids {
                println!("  {id}");
            }
        }

        Commands::Process { collection_id } => {
            let processor = Processor::new(config.processor.clone(), store.clone());
            match collection_id {
                Some(id) => {
                    let log_id = processor.process(id).await?;
                    println!("Processing log: {log_id}");
                }
                None => {
                    let orchestrator = build_orchestrator(&config, store.clone())?;
                    let phase = orchestrator.run_processing_phase().await;
                    println!("Processing phase: {} ({})", phase.status, phase.detail);
                }
            }
        }

        Commands::Load { collection_id } => {
            let detector = DuplicationDetector::new(config.dedup.clone(), store.clone());
            let loader = Loader::new(config.loader.clone(), detector, store.clone());
            match collection_id {
                Some(id) => {
                    let log_id = loader.load_batch(id).await?;
                    println!("Loading log: {log_id}");
                }
                None => {
                    let orchestrator = build_orchestrator(&config, store.clone())?;
                    let phase = orchestrator.run_loading_phase().await;
                    println!("Loading phase: {} ({})", phase.status, phase.detail);
                }
            }
        }

        Commands::Pipeline {
            query,
            country,
            start_page,
            pages,
        } => {
            let orchestrator = build_orchestrator(&config, store.clone())?;
            let params = PipelineParams {
                query,
                country,
                start_page,
                num_pages: pages,
            };
            let result = orchestrator.run_full_pipeline(&params).await;

            println!("Pipeline: {}", result.overall);
            for phase in &result.phases {
                println!("  {}: {} ({})", phase.operation.as_str(), phase.status, phase.detail);
            }
        }

        Commands::Maintain => {
            let orchestrator = build_orchestrator(&config, store.clone())?;
            let report = orchestrator.run_maintenance_tasks().await?;

            println!("Deleted {} stale duplication links", report.links_deleted);
            println!(
                "Totals: {} collections, {} normalized, {} canonical, {} links",
                report.statistics.raw_collections,
                report.statistics.normalized_jobs,
                report.statistics.canonical_jobs,
                report.statistics.duplication_links
            );
            println!(
                "Health: {} (failure rate {:.0}%)",
                report.health.state.as_str(),
                report.health.failure_rate * 100.0
            );
            for note in &report.health.notes {
                println!("  note: {note}");
            }
        }

        Commands::Schedule { jobs } => {
            let schedule_config = match jobs {
                Some(path) => ScheduleConfig::from_file(&path)?,
                None => ScheduleConfig::builtin_defaults(),
            };

            let orchestrator = Arc::new(build_orchestrator(&config, store.clone())?);
            let mut scheduler = PipelineScheduler::new(orchestrator, schedule_config)?;
            scheduler.start().await?;

            for status in scheduler.status().await {
                println!(
                    "{}: {} ({}), next run {}",
                    status.name,
                    status.schedule,
                    status.phase.as_str(),
                    status
                        .next_run
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "unknown".to_string())
                );
            }

            tracing::info!("Scheduler running; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            scheduler.shutdown().await;
        }

        Commands::Status => {
            let stats = store.statistics()?;
            println!("Raw collections:   {}", stats.raw_collections);
            println!("Normalized jobs:   {}", stats.normalized_jobs);
            println!("Canonical jobs:    {}", stats.canonical_jobs);
            println!("Duplication links: {}", stats.duplication_links);
            if let Some(at) = stats.latest_collection_at {
                println!("Latest collection: {}", at.to_rfc3339());
            }

            let health = gleaner::orchestrator::health::assess(&store)?;
            println!(
                "Health: {} ({} recent operations, failure rate {:.0}%)",
                health.state.as_str(),
                health.recent_operations,
                health.failure_rate * 100.0
            );
            for note in &health.notes {
                println!("  note: {note}");
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Config, store: Arc<SqliteStore>) -> Result<Orchestrator> {
    let collector = Collector::new(config, store.clone())?;
    let processor = Processor::new(config.processor.clone(), store.clone());
    let detector = DuplicationDetector::new(config.dedup.clone(), store.clone());
    let loader = Loader::new(config.loader.clone(), detector, store.clone());

    Ok(Orchestrator::new(
        store,
        collector,
        processor,
        loader,
        config.orchestrator.max_concurrent,
        config.loader.cleanup_after_days,
    ))
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("gleaner=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("gleaner=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
