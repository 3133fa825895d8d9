//! Run a batch of policies sequentially, on a fixed thread pool and with rayon
//!
//! Jobs come from a cases CSV when given, otherwise the reference policy is
//! repeated `--jobs` times.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use ul_illustration::assumptions::DEFAULT_RATES_PATH;
use ul_illustration::batch::BatchSummary;
use ul_illustration::policy::load_cases;
use ul_illustration::{
    BatchConfig, BatchMode, BatchRunner, Gender, Job, PolicyKey, ProductParameters, RateSetBuilder, RateSetCache,
    RateSources, RiskClass,
};

/// Batch throughput comparison
#[derive(Parser)]
#[command(name = "run_batch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory holding coi.csv, unit_load.csv and corridor_factors.csv
    #[arg(short, long, default_value = DEFAULT_RATES_PATH)]
    data_dir: PathBuf,

    /// Cases CSV; rows without a premium are solved
    #[arg(short, long)]
    cases: Option<PathBuf>,

    /// Product parameter overrides (JSON)
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Number of copies of the reference policy when no cases file is given
    #[arg(short, long, default_value = "1000")]
    jobs: usize,

    /// Worker threads for the pooled and parallel runs
    #[arg(short, long)]
    workers: Option<usize>,

    /// Bounded queue capacity for the pooled run
    #[arg(short, long, default_value = "64")]
    queue_capacity: usize,

    /// Solve for premium instead of projecting the reference premium
    #[arg(short, long)]
    solve: bool,

    /// Print the batch reports as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let start = Instant::now();
    let params = match &cli.params {
        Some(path) => ProductParameters::from_json_path(path)
            .with_context(|| format!("Failed to load product parameters from {}", path.display()))?,
        None => ProductParameters::default(),
    };
    let builder = RateSetBuilder::from_sources(&RateSources::in_dir(&cli.data_dir), params)
        .with_context(|| format!("Failed to load rate tables from {}", cli.data_dir.display()))?;
    let cache = RateSetCache::new(builder);

    let jobs = match &cli.cases {
        Some(path) => load_cases(path)
            .with_context(|| format!("Failed to load cases from {}", path.display()))?
            .iter()
            .map(Job::from_case)
            .collect::<Vec<_>>(),
        None => {
            let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
            let job = if cli.solve {
                Job::solve(key, 100_000.0)
            } else {
                Job::project(key, 100_000.0, 1_255.03)
            };
            vec![job; cli.jobs]
        }
    };

    let mut config = BatchConfig {
        queue_capacity: cli.queue_capacity,
        ..Default::default()
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    let runner = BatchRunner::new(&cache, &jobs, config)?;
    println!(
        "Loaded {} jobs over {} rate sets in {:?}",
        jobs.len(),
        cache.len(),
        start.elapsed()
    );

    let mut summaries: Vec<BatchSummary> = Vec::new();
    for mode in BatchMode::ALL {
        let report = runner.run(&jobs, mode)?;
        println!(
            "{:<10} runs: {:>7}  workers: {:>3}  total: {:>12?}  per job: {:>10?}  failed: {}",
            mode.name(),
            report.len(),
            report.workers,
            report.elapsed,
            report.per_job_average(),
            report.failures()
        );
        summaries.push(report.summary());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    Ok(())
}
