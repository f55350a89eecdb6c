/// querybench: run a family of query variants against an Elasticsearch index
/// for every row of an input CSV, then write detailed and summary reports.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use querybench::benchmark::dataset::load_rows;
use querybench::benchmark::executor::{HttpTransport, RequestExecutor};
use querybench::benchmark::report;
use querybench::benchmark::runner::Pipeline;
use querybench::config::{Config, DEFAULT_CONFIG_FILE};
use querybench::logging;

#[derive(Parser)]
#[command(name = "querybench", version, about = "Query-variant benchmark for Elasticsearch")]
struct Cli {
    /// Input CSV with row_id, segment_id and segment_text columns
    csv_file: PathBuf,

    /// Index to search
    index_name: String,

    /// Elasticsearch base URL (e.g. http://localhost:9200)
    es_url: String,

    /// Directory for the detailed and summary CSV reports
    output_dir: PathBuf,

    /// JSON overrides for the benchmark section,
    /// e.g. '{"execute_wildcard_query": true, "match_phrase_slop": [0, 2]}'
    config_json: Option<String>,

    /// TOML configuration file (skipped if missing)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration; malformed configuration is fatal
    let config = Config::load_from(&cli.config_file, cli.config_json.as_deref())?;

    // 3. Initialize logging (stderr only)
    logging::init_logging(&config);

    tracing::info!(
        csv_file = %cli.csv_file.display(),
        index = %cli.index_name,
        es_url = %cli.es_url,
        output_dir = %cli.output_dir.display(),
        "Search benchmark starting"
    );
    tracing::debug!(config = ?config, "Effective configuration");

    // 4. Load input rows before touching the engine
    let rows = load_rows(&cli.csv_file)?;

    std::fs::create_dir_all(&cli.output_dir)?;

    // 5. Build the pipeline and probe the engine
    let transport = Arc::new(HttpTransport::new(&cli.es_url, config.retry_policy().request_timeout)?);
    let executor = RequestExecutor::new(transport, config.retry_policy());
    let pipeline = Pipeline::new(&config.benchmark, config.fields.clone(), &cli.index_name, executor)?;
    pipeline.check_connection().await?;

    // 6. Ctrl-C stops the run between variants; partial results are still saved
    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current query and saving results");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    // 7. Run
    let started = Instant::now();
    let mut aggregator = pipeline.new_aggregator();
    let summary = pipeline.run(&rows, &mut aggregator, &stop).await;
    tracing::info!(
        rows_processed = summary.rows_processed,
        rows_skipped = summary.rows_skipped,
        records = summary.records,
        interrupted = summary.interrupted,
        total_secs = started.elapsed().as_secs_f64(),
        "Benchmark run finished"
    );

    // 8. Save reports with job id and timestamp for uniqueness
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let job_id = std::env::var("SLURM_JOB_ID").unwrap_or_else(|_| "local".to_string());
    let detailed_path = cli
        .output_dir
        .join(format!("search_results_detailed_{}_{}.csv", job_id, timestamp));
    let summary_path = cli
        .output_dir
        .join(format!("search_results_summary_{}_{}.csv", job_id, timestamp));

    let stats = aggregator.summarize();
    report::write_detailed(&detailed_path, aggregator.records())?;
    report::write_summary(&summary_path, &stats)?;

    report::print_summary(aggregator.records(), &stats);
    println!();
    println!("Total execution time: {:.2} seconds", started.elapsed().as_secs_f64());
    println!("Detailed results: {}", detailed_path.display());
    println!("Summary statistics: {}", summary_path.display());

    Ok(())
}
