//! Site planner demo: metadata report, one-off estimates, the concurrent
//! site simulation, and a message-counter stress run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use siteplan_core::{
    ConstructionTeam, EstimationEngine, MessageType, OperationDescriptor, ProjectDescriptor,
    Worker,
};
use siteplan_server::{
    reference_assignments, register_builtin_catalog, LogFormat, MessageLogger,
    MetadataLookupService, OperationMetadataStore, ServiceContext, ServiceRegistry,
    SiteSimulation, SitePlannerConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "siteplan-demo")]
#[command(about = "Construction site planning demo", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(long, env = "SITEPLAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format; overrides the config file.
    #[arg(long, env = "SITEPLAN_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    /// Extra operation metadata (JSON array of owners).
    #[arg(long, env = "SITEPLAN_CATALOG")]
    catalog: Option<PathBuf>,

    /// Resolve every descriptor at startup.
    #[arg(long)]
    warm: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Default)]
enum Command {
    /// Metadata report followed by the site simulation.
    #[default]
    All,
    /// Print operation metadata, budgets included.
    Metadata {
        /// Only this owner.
        #[arg(long)]
        owner: Option<String>,
        /// Print descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Estimate a single project.
    Estimate {
        #[arg(long, default_value = "House")]
        name: String,
        #[arg(long)]
        area: f64,
        #[arg(long, default_value_t = 1)]
        floors: u32,
        #[arg(long, default_value = "brick")]
        material: String,
        #[arg(long, default_value_t = 3)]
        team_size: usize,
    },
    /// Run the reference construction sites concurrently.
    Simulate,
    /// Log from many threads at once and check the final count.
    Stress {
        #[arg(long, default_value_t = 8)]
        threads: usize,
        #[arg(long, default_value_t = 250)]
        messages: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SitePlannerConfig::from_file(path)?,
        None => SitePlannerConfig::default(),
    };
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if cli.warm {
        config.warm_metadata_cache = true;
    }
    config.validate()?;
    init_tracing(config.log_format);

    let store = Arc::new(OperationMetadataStore::new());
    register_builtin_catalog(&store);
    if let Some(path) = &cli.catalog {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let owners = store.load_json(&json)?;
        info!(owners, path = %path.display(), "metadata catalog loaded");
    }

    let metadata = Arc::new(MetadataLookupService::new(store));
    let logger = MessageLogger::global();

    let registry = ServiceRegistry::new();
    registry.register_shared(Arc::clone(&metadata));
    registry.register_shared(Arc::clone(&logger));

    let ctx = ServiceContext::new(config);
    registry.init_all(&ctx).await?;

    let outcome = run(cli.command.unwrap_or_default(), &ctx.config, &metadata, &logger).await;

    registry.shutdown_all(false).await?;
    outcome
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run(
    command: Command,
    config: &SitePlannerConfig,
    metadata: &MetadataLookupService,
    logger: &Arc<MessageLogger>,
) -> anyhow::Result<()> {
    match command {
        Command::All => {
            metadata_report(metadata, None, false, config.contingency_rate)?;
            simulate(config, logger).await
        }
        Command::Metadata { owner, json } => {
            metadata_report(metadata, owner.as_deref(), json, config.contingency_rate)
        }
        Command::Estimate {
            name,
            area,
            floors,
            material,
            team_size,
        } => {
            let project = ProjectDescriptor::new(name, area, floors, material)?;
            estimate(config, &project, &demo_team(team_size));
            Ok(())
        }
        Command::Simulate => simulate(config, logger).await,
        Command::Stress { threads, messages } => {
            stress(logger, threads, messages);
            Ok(())
        }
    }
}

fn metadata_report(
    metadata: &MetadataLookupService,
    owner: Option<&str>,
    json: bool,
    contingency_rate: f64,
) -> anyhow::Result<()> {
    let owners = match owner {
        Some(owner) => vec![owner.to_string()],
        None => metadata.store().owners(),
    };

    for owner in &owners {
        let descriptors = metadata.list_all(owner);
        if json {
            let plain: Vec<&OperationDescriptor> = descriptors.iter().map(|d| &**d).collect();
            println!("{}", serde_json::to_string_pretty(&plain)?);
            continue;
        }

        metadata.log_operations(owner);
        println!("== {owner} ==");
        if descriptors.is_empty() {
            println!("  (no operation metadata)");
        }
        for descriptor in &descriptors {
            println!("  {descriptor}");
        }
        println!(
            "  total ${:.2}, with {:.0}% contingency on high priority ${:.2}",
            metadata.total_estimated_cost(owner),
            contingency_rate * 100.0,
            metadata.budget_with_contingency(owner, contingency_rate)
        );
    }
    Ok(())
}

fn estimate(config: &SitePlannerConfig, project: &ProjectDescriptor, team: &ConstructionTeam) {
    let engine = EstimationEngine::with_config(config.estimation.clone());
    println!("{project}");
    println!("{team}");
    match engine.estimate(project, team) {
        Ok(result) => {
            println!("{result}");
            println!(
                "  material ${:.2}, labor ${:.2}",
                result.material_cost(),
                result.labor_cost()
            );
            if result.has_negative_duration() {
                println!("  warning: team size drives the duration formula negative");
            }
        }
        Err(e) => {
            println!("estimate rejected: {e}");
            if let Some(over) = e.exceeded_amount() {
                println!("  over budget by ${over:.2}");
            }
        }
    }
}

async fn simulate(config: &SitePlannerConfig, logger: &Arc<MessageLogger>) -> anyhow::Result<()> {
    let engine = Arc::new(EstimationEngine::with_config(config.estimation.clone()));
    let simulation = SiteSimulation::new(engine, Arc::clone(logger), config.simulation.clone());

    let outcomes = simulation.run(reference_assignments()?).await?;
    println!("== site simulation ==");
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => println!("  {}: {result}", outcome.label),
            Err(e) => println!("  {}: {} failed: {e}", outcome.label, outcome.project.name()),
        }
        println!("    monthly payroll ${:.2}", outcome.payroll);
    }
    println!("  messages logged: {}", logger.count());
    Ok(())
}

fn stress(logger: &MessageLogger, threads: usize, messages: usize) {
    logger.reset();
    std::thread::scope(|s| {
        for t in 0..threads {
            s.spawn(move || {
                let source = format!("stress-{t}");
                for i in 0..messages {
                    logger.log_message(&source, MessageType::Debug, &format!("message {i}"));
                }
            });
        }
    });
    println!(
        "{threads} threads x {messages} messages: counter at {} (expected {})",
        logger.count(),
        threads * messages
    );
}

/// `size` workers cycling builder, plumber, electrician.
fn demo_team(size: usize) -> ConstructionTeam {
    (0..size)
        .map(|i| match i % 3 {
            0 => Worker::builder(format!("Builder-{}", i + 1), "mason", 45.0),
            1 => Worker::plumber(format!("Plumber-{}", i + 1), true, 40.0),
            _ => Worker::electrician(format!("Electrician-{}", i + 1), 1000.0, 50.0),
        })
        .collect()
}
