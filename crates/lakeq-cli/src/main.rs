//! lakeq CLI: run and inspect queries against the remote datasets.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use lakeq_core::config::EngineConfig;
use lakeq_exec::{QueryOutput, QueryPlan, QueryPlanner};
use lakeq_io::{CsvWriter, JsonlWriter, OutputFormat};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "lakeq")]
#[command(about = "Memory-bounded SQL over partitioned parquet in object storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against a dataset
    Query {
        #[command(flatten)]
        target: Target,

        /// SQL referencing the dataset's view
        #[arg(long)]
        sql: String,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: jsonl or csv
        #[arg(long, default_value = "jsonl")]
        format: OutputFormat,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the partition paths a query would read
    Paths {
        #[command(flatten)]
        target: Target,

        /// Optional SQL to extract implicit date bounds from
        #[arg(long, default_value = "")]
        sql: String,
    },

    /// Show the date bounds and size class inferred from SQL
    Explain {
        #[arg(long)]
        sql: String,

        /// Also resolve partitions for this dataset
        #[arg(long)]
        dataset: Option<String>,
    },

    /// List known datasets
    Datasets,
}

#[derive(Args)]
struct Target {
    /// Dataset id (see `lakeq datasets`)
    #[arg(short, long)]
    dataset: String,

    /// Table (notes_highlights) or event type (event_capture)
    #[arg(long)]
    table: Option<String>,

    /// Inclusive start date, YYYY-MM-DD
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Inclusive end date, YYYY-MM-DD
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Args, Default)]
struct Overrides {
    /// Engine memory ceiling in bytes (overrides config)
    #[arg(long)]
    memory_cap: Option<usize>,

    /// Spill directory (overrides config)
    #[arg(long)]
    spill_dir: Option<String>,

    /// Engine threads (overrides config)
    #[arg(long)]
    threads: Option<usize>,

    /// Rows per page for large results (overrides config)
    #[arg(long)]
    page_rows: Option<usize>,

    /// Skip partitions that do not exist in object storage
    #[arg(long)]
    probe_partitions: bool,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query {
            target,
            sql,
            output,
            format,
            overrides,
        } => run_query(&target, &sql, output, format, &overrides),
        Commands::Paths { target, sql } => show_paths(&target, &sql),
        Commands::Explain { sql, dataset } => explain(&sql, dataset.as_deref()),
        Commands::Datasets => list_datasets(),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_overrides(cfg: &mut EngineConfig, overrides: &Overrides) {
    if let Some(cap) = overrides.memory_cap {
        cfg.mem_cap_bytes = cap;
    }
    if let Some(dir) = &overrides.spill_dir {
        cfg.spill_dir = dir.clone();
    }
    if let Some(threads) = overrides.threads {
        cfg.threads = threads;
    }
    if let Some(rows) = overrides.page_rows {
        cfg.page_rows = rows;
    }
    if overrides.probe_partitions {
        cfg.probe_partitions = true;
    }
}

fn plan_target(planner: &QueryPlanner, target: &Target, sql: &str) -> CliResult<QueryPlan> {
    Ok(planner.plan(
        &target.dataset,
        target.table.as_deref(),
        sql,
        target.start,
        target.end,
    )?)
}

#[cfg(feature = "duckdb")]
fn run_query(
    target: &Target,
    sql: &str,
    output: Option<PathBuf>,
    format: OutputFormat,
    overrides: &Overrides,
) -> CliResult<()> {
    use lakeq_core::dataset::{EVENT_CAPTURE, NOTES_HIGHLIGHTS};
    use lakeq_exec::QueryRunner;

    let mut cfg = EngineConfig::from_env();
    apply_overrides(&mut cfg, overrides);
    let mut runner = QueryRunner::duckdb(cfg.clone())?;
    if cfg.probe_partitions {
        runner = runner.with_partition_filter(partition_probe(&cfg)?);
    }

    let out = match (target.dataset.as_str(), target.table.as_deref()) {
        (EVENT_CAPTURE, Some(event_type)) => {
            let (Some(start), Some(end)) = (target.start, target.end) else {
                return Err("event_capture needs --start and --end".into());
            };
            runner.query_event_capture(event_type, start, end, sql)?
        }
        (EVENT_CAPTURE, None) => return Err("event_capture needs --table <event type>".into()),
        (NOTES_HIGHLIGHTS, Some(table)) => runner.query_notes_highlights(table, sql)?,
        (dataset, _) => runner.query(dataset, sql, target.start, target.end)?,
    };

    write_output(&out, output, format)?;
    report(&out);
    Ok(())
}

#[cfg(not(feature = "duckdb"))]
fn run_query(
    _target: &Target,
    _sql: &str,
    _output: Option<PathBuf>,
    _format: OutputFormat,
    _overrides: &Overrides,
) -> CliResult<()> {
    Err("lakeq was built without an analytic engine; \
         rebuild with `--features duckdb` to run queries"
        .into())
}

#[cfg(all(feature = "duckdb", feature = "s3"))]
fn partition_probe(cfg: &EngineConfig) -> CliResult<Box<dyn lakeq_io::PartitionFilter>> {
    let probe = lakeq_io::ObjectStoreProbe::from_storage_config(&cfg.data_root, &cfg.storage)?;
    Ok(Box::new(probe))
}

#[cfg(all(feature = "duckdb", not(feature = "s3")))]
fn partition_probe(_cfg: &EngineConfig) -> CliResult<Box<dyn lakeq_io::PartitionFilter>> {
    Err("--probe-partitions needs the `s3` feature".into())
}

#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn write_output(out: &QueryOutput, output: Option<PathBuf>, format: OutputFormat) -> CliResult<()> {
    match (output, format) {
        (Some(path), OutputFormat::Jsonl) => {
            let mut w = JsonlWriter::to_path(&path)?;
            w.write_batch(&out.batch)?;
            w.finish()?;
        }
        (Some(path), OutputFormat::Csv) => {
            let mut w = CsvWriter::to_path(&path)?;
            w.write_batch(&out.batch)?;
            w.finish()?;
        }
        (None, OutputFormat::Jsonl) => {
            let mut w = JsonlWriter::to_writer(std::io::stdout().lock());
            w.write_batch(&out.batch)?;
            w.finish()?;
        }
        (None, OutputFormat::Csv) => {
            let mut w = CsvWriter::to_writer(std::io::stdout().lock());
            w.write_batch(&out.batch)?;
            w.finish()?;
        }
    }
    Ok(())
}

#[cfg_attr(not(feature = "duckdb"), allow(dead_code))]
fn report(out: &QueryOutput) {
    eprintln!(
        "{} rows, {} columns, {} page(s), {} partition(s)",
        out.num_rows(),
        out.batch.num_columns(),
        out.pages,
        out.resolved_paths.len()
    );
    tracing::debug!(schema = %out.batch.schema(), "result columns");
    if let Some(gb) = out.peak_resident_gb {
        eprintln!("peak resident memory: {gb:.2} GB");
    }
    for w in &out.warnings {
        eprintln!("warning: {w}");
    }
}

fn show_paths(target: &Target, sql: &str) -> CliResult<()> {
    let cfg = EngineConfig::from_env();
    let plan = plan_target(&QueryPlanner::new(&cfg), target, sql)?;
    if let Some(range) = plan.range {
        eprintln!("{} ({}, {})", plan.dataset, plan.scheme, range);
    }
    let mut stdout = std::io::stdout().lock();
    for path in &plan.paths {
        writeln!(stdout, "{path}")?;
    }
    Ok(())
}

fn explain(sql: &str, dataset: Option<&str>) -> CliResult<()> {
    let cfg = EngineConfig::from_env();
    let planner = QueryPlanner::new(&cfg);
    let bounds = planner.date_bounds(sql);
    let mut doc = serde_json::json!({
        "size_class": planner.size_class(sql),
        "extracted_lower": bounds.lower.map(|d| d.to_string()),
        "extracted_upper": bounds.upper.map(|d| d.to_string()),
        "range": bounds.resolve().to_string(),
    });
    if let Some(dataset) = dataset {
        let plan = planner.plan(dataset, None, sql, None, None)?;
        doc["plan"] = serde_json::to_value(&plan)?;
    }
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn list_datasets() -> CliResult<()> {
    let cfg = EngineConfig::from_env();
    let planner = QueryPlanner::new(&cfg);
    for d in planner.catalog().iter() {
        println!("{:<18} {:<9} {}", d.id(), d.scheme().to_string(), d.base_template());
    }
    Ok(())
}
