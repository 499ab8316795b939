//! CLI entry point for the retail ETL pipelines.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use retail_etl::{
    EtlConfig, EtlError, LocalObjectStore, MemoryWarehouse, PipelineEnv, PipelineRunner,
    RecordingExecutor, RunContext, RunSummary, SqlWarehouse, Warehouse, Workflow,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where warehouse writes go.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliWarehouse {
    /// Keep loaded tables in memory for the duration of the run
    Memory,
    /// Render SQL statements and write them to `--sql-out`
    Sql,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Retail ETL pipelines",
    long_about = "Extract, clean, validate, aggregate and load retail data.\n\n\
                  Buckets are directories under --data-root; a key such as\n\
                  `input/sales.csv` in bucket `retail` is read from\n\
                  <data-root>/retail/input/sales.csv.\n\n\
                  EXAMPLES:\n  \
                  # Show the pipelines and their task order\n  \
                  retail-etl list\n\n  \
                  # Run the sales analysis against ./data\n  \
                  retail-etl --config config.yaml run sales_analysis\n\n  \
                  # Render warehouse SQL instead of holding tables in memory\n  \
                  retail-etl run order_fulfillment --warehouse sql --sql-out upserts.sql"
)]
struct Cli {
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long, global = true, default_value = "./data")]
    data_root: PathBuf,

    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one pipeline end to end
    Run {
        #[arg(value_enum)]
        pipeline: Workflow,

        #[arg(long, value_enum, default_value = "memory")]
        warehouse: CliWarehouse,

        #[arg(long)]
        sql_out: Option<PathBuf>,
    },
    /// Load and validate the configuration file
    ValidateConfig,
    /// List pipelines and their task order
    List,
}

#[derive(Serialize)]
struct RunReport<'a> {
    pipeline: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a EtlError>,
}

#[derive(Serialize)]
struct PipelineListing {
    name: &'static str,
    description: &'static str,
    tasks: Vec<String>,
}

fn init_logging(level: &str, quiet: bool, json_output: bool) {
    // Keep stdout clean for the JSON report
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.quiet, cli.json);

    dotenv().ok();

    match &cli.command {
        Command::Run {
            pipeline,
            warehouse,
            sql_out,
        } => run(&cli, *pipeline, *warehouse, sql_out.as_deref()),
        Command::ValidateConfig => validate_config(&cli),
        Command::List => list(&cli),
    }
}

fn load_config(path: &Path) -> Result<EtlConfig> {
    EtlConfig::from_yaml_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn validate_config(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let context = RunContext::new(config)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(context.config())?);
    } else {
        let storage = context.storage();
        println!("Configuration OK: {}", cli.config.display());
        println!("  Bucket:    {}", storage.bucket);
        println!("  Folders:   folder={} input={} output={} analytics={}",
            storage.folder, storage.input_folder, storage.output_folder, storage.analytics_folder);
        let targets = &context.config().snowflake.targets;
        println!("  Targets:   {}", targets.len());
        for entity in targets.keys() {
            println!("    {:<28} {}", entity, context.target_or_default(entity));
        }
    }
    Ok(())
}

fn list(cli: &Cli) -> Result<()> {
    // Task order only depends on optional sources, so a missing file is fine here
    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        debug!("No configuration at {}, listing with defaults", cli.config.display());
        EtlConfig::builder().bucket("retail").build()?
    };
    let context = RunContext::new(config)?;

    let mut listings = Vec::new();
    for workflow in Workflow::ALL {
        let env = PipelineEnv::new(
            context.clone(),
            Arc::new(LocalObjectStore::new(&cli.data_root)),
            Arc::new(MemoryWarehouse::new()),
        );
        let graph = workflow.build(env);
        let tasks = graph.ordered_names()?.into_iter().map(String::from).collect();
        listings.push(PipelineListing {
            name: workflow.name(),
            description: workflow.description(),
            tasks,
        });
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }
    for listing in &listings {
        println!("{:<18} {}", listing.name, listing.description);
        for (i, task) in listing.tasks.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, task);
        }
        println!();
    }
    Ok(())
}

fn run(
    cli: &Cli,
    workflow: Workflow,
    warehouse: CliWarehouse,
    sql_out: Option<&Path>,
) -> Result<()> {
    let context = RunContext::new(load_config(&cli.config)?)?;
    let store = Arc::new(LocalObjectStore::new(&cli.data_root));

    let sql_warehouse = match warehouse {
        CliWarehouse::Sql => {
            if sql_out.is_none() {
                return Err(anyhow!("--warehouse sql needs --sql-out <PATH>"));
            }
            Some(Arc::new(SqlWarehouse::new(RecordingExecutor::new())))
        }
        CliWarehouse::Memory => None,
    };
    let sink: Arc<dyn Warehouse> = match &sql_warehouse {
        Some(sql) => sql.clone() as Arc<dyn Warehouse>,
        None => Arc::new(MemoryWarehouse::new()),
    };

    let env = PipelineEnv::new(context, store, sink);
    let graph = workflow.build(env);

    info!("{}", "=".repeat(80));
    info!("Starting pipeline '{}' ({} tasks)", workflow, graph.len());
    info!("{}", "=".repeat(80));

    let json = cli.json;
    let runner = PipelineRunner::builder()
        .on_progress(move |update| {
            if !json {
                info!("[{:>3.0}%] {}", update.progress * 100.0, update.message);
            }
        })
        .build();

    let outcome = runner.run(&graph);

    if let (Some(sql), Some(path)) = (&sql_warehouse, sql_out) {
        let statements = sql.executor().statements();
        let mut script = statements.join(";\n");
        if !script.is_empty() {
            script.push_str(";\n");
        }
        fs::write(path, script)
            .with_context(|| format!("Failed to write SQL to {}", path.display()))?;
        info!("Wrote {} statements to {}", statements.len(), path.display());
    }

    match outcome {
        Ok(run) => {
            if cli.json {
                let report = RunReport {
                    pipeline: workflow.name(),
                    success: true,
                    summary: Some(&run.summary),
                    error: None,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&run.summary);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let report = RunReport {
                    pipeline: workflow.name(),
                    success: false,
                    summary: None,
                    error: Some(&e),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                error!("Pipeline '{}' failed: {}", workflow, e);
                if let Some(report) = e.validation_report() {
                    for failure in report.failures.iter().take(20) {
                        error!("  {}", failure);
                    }
                }
            }
            Err(anyhow!("Pipeline '{}' failed [{}]", workflow, e.error_code()))
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=".repeat(80));
    println!("PIPELINE COMPLETE: {}", summary.pipeline);
    println!("{}", "=".repeat(80));

    println!("\nTASKS");
    println!("{}", "-".repeat(40));
    for task in &summary.tasks {
        println!("  {:<32} {:<14} {:>8} ms", task.name, format!("{:?}", task.stage), task.elapsed_ms);
    }

    println!("\nTABLES");
    println!("{}", "-".repeat(40));
    for table in &summary.tables {
        println!("  {:<32} {:>8} rows {:>4} cols", table.name, table.rows, table.columns);
    }

    println!("\nTotal: {} ms", summary.elapsed_ms);
}
