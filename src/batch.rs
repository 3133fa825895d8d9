//! Batch runner for many independent policy evaluations
//!
//! Rate sets are built once per distinct policy key before any fan-out, then
//! shared read-only. Jobs run sequentially, on a fixed pool of scoped threads
//! fed through bounded queues, or on a rayon pool. Every mode returns the
//! outcomes indexed by job position.

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::assumptions::{RateSet, RateSetCache};
use crate::error::{BatchError, SolverError};
use crate::policy::{Case, PolicyKey};
use crate::projection::{PremiumSolver, ProjectionEngine, SolverConfig};

/// Ending account value for a projection, or premium for a solve
pub type JobOutcome = Result<f64, SolverError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JobKind {
    Project { face_amount: f64, annual_premium: f64 },
    Solve { face_amount: f64 },
}

/// One policy scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub key: PolicyKey,
    pub kind: JobKind,
}

impl Job {
    pub fn project(key: PolicyKey, face_amount: f64, annual_premium: f64) -> Self {
        Self {
            key,
            kind: JobKind::Project {
                face_amount,
                annual_premium,
            },
        }
    }

    pub fn solve(key: PolicyKey, face_amount: f64) -> Self {
        Self {
            key,
            kind: JobKind::Solve { face_amount },
        }
    }

    /// Project cases that carry a premium, solve the rest
    pub fn from_case(case: &Case) -> Self {
        match case.annual_premium {
            Some(premium) => Self::project(case.key, case.face_amount, premium),
            None => Self::solve(case.key, case.face_amount),
        }
    }

    fn evaluate(&self, rates: &RateSet, solver: &SolverConfig) -> JobOutcome {
        match self.kind {
            JobKind::Project {
                face_amount,
                annual_premium,
            } => Ok(ProjectionEngine::new(rates).project(face_amount, annual_premium)?),
            JobKind::Solve { face_amount } => {
                Ok(PremiumSolver::with_config(rates, *solver).solve(face_amount)?.premium)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchMode {
    Sequential,
    Pooled,
    Parallel,
}

impl BatchMode {
    pub const ALL: [BatchMode; 3] = [BatchMode::Sequential, BatchMode::Pooled, BatchMode::Parallel];

    pub fn name(&self) -> &'static str {
        match self {
            BatchMode::Sequential => "sequential",
            BatchMode::Pooled => "pooled",
            BatchMode::Parallel => "parallel",
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pool sizing for the concurrent modes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    /// Capacity of both the work and result queues
    pub queue_capacity: usize,
    pub solver: SolverConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1),
            queue_capacity: 64,
            solver: SolverConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.workers == 0 {
            return Err(BatchError::NoWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(BatchError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Outcomes of one batch run, indexed by job position
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub workers: usize,
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome(&self, job: usize) -> Option<&JobOutcome> {
        self.outcomes.get(job)
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    pub fn per_job_average(&self) -> Duration {
        match u32::try_from(self.outcomes.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.elapsed / n,
        }
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            mode: self.mode,
            jobs: self.len(),
            workers: self.workers,
            failures: self.failures(),
            elapsed_secs: self.elapsed.as_secs_f64(),
            per_job_micros: self.per_job_average().as_secs_f64() * 1e6,
            results: self
                .outcomes
                .iter()
                .enumerate()
                .map(|(job, outcome)| JobSummary {
                    job,
                    value: outcome.as_ref().ok().copied(),
                    error: outcome.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

/// Serializable view of a [`BatchReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub mode: BatchMode,
    pub jobs: usize,
    pub workers: usize,
    pub failures: usize,
    pub elapsed_secs: f64,
    pub per_job_micros: f64,
    pub results: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job: usize,
    pub value: Option<f64>,
    pub error: Option<String>,
}

/// Runs job lists against prepared rate sets
#[derive(Debug, Clone)]
pub struct BatchRunner {
    rate_sets: HashMap<PolicyKey, Arc<RateSet>>,
    config: BatchConfig,
}

impl BatchRunner {
    /// Build or fetch the rate set for every key in `jobs`
    pub fn new(cache: &RateSetCache, jobs: &[Job], config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;
        let rate_sets = cache.prepare(jobs.iter().map(|job| &job.key))?;
        Ok(Self { rate_sets, config })
    }

    pub fn with_rate_sets(rate_sets: HashMap<PolicyKey, Arc<RateSet>>, config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self { rate_sets, config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn run(&self, jobs: &[Job], mode: BatchMode) -> Result<BatchReport, BatchError> {
        let report = match mode {
            BatchMode::Sequential => self.run_sequential(jobs)?,
            BatchMode::Pooled => self.run_pooled(jobs)?,
            BatchMode::Parallel => self.run_parallel(jobs)?,
        };
        info!(
            "{} batch: {} jobs on {} workers in {:?} ({} failed)",
            report.mode,
            report.len(),
            report.workers,
            report.elapsed,
            report.failures()
        );
        Ok(report)
    }

    pub fn run_sequential(&self, jobs: &[Job]) -> Result<BatchReport, BatchError> {
        let rates = self.resolve(jobs)?;
        let solver = self.config.solver;

        let start = Instant::now();
        let outcomes: Vec<JobOutcome> = jobs
            .iter()
            .zip(&rates)
            .map(|(job, rates)| job.evaluate(rates, &solver))
            .collect();

        Ok(BatchReport {
            mode: BatchMode::Sequential,
            workers: 1,
            outcomes,
            elapsed: start.elapsed(),
        })
    }

    /// Fixed pool of scoped worker threads fed through bounded queues
    pub fn run_pooled(&self, jobs: &[Job]) -> Result<BatchReport, BatchError> {
        let rates = self.resolve(jobs)?;
        let solver = self.config.solver;
        let workers = self.config.workers;
        let capacity = self.config.queue_capacity;
        let job_count = jobs.len();

        let start = Instant::now();
        let (work_tx, work_rx) = async_channel::bounded::<usize>(capacity);
        let (result_tx, result_rx) = async_channel::bounded::<(usize, JobOutcome)>(capacity);
        let mut collected: Vec<Option<JobOutcome>> = vec![None; job_count];

        thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let rates = &rates;
                scope.spawn(move || {
                    while let Ok(index) = work_rx.recv_blocking() {
                        let outcome = jobs[index].evaluate(rates[index], &solver);
                        if result_tx.send_blocking((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(work_rx);
            drop(result_tx);

            // Submit from a separate thread so a full result queue cannot stall dispatch
            scope.spawn(move || {
                for index in 0..job_count {
                    if work_tx.send_blocking(index).is_err() {
                        break;
                    }
                }
            });

            while let Ok((index, outcome)) = result_rx.recv_blocking() {
                collected[index] = Some(outcome);
            }
        });

        let outcomes = collected
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| outcome.ok_or(BatchError::MissingResult(index)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchReport {
            mode: BatchMode::Pooled,
            workers,
            outcomes,
            elapsed: start.elapsed(),
        })
    }

    /// Rayon pool sized to the configured worker count
    pub fn run_parallel(&self, jobs: &[Job]) -> Result<BatchReport, BatchError> {
        let rates = self.resolve(jobs)?;
        let solver = self.config.solver;
        let workers = self.config.workers;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| BatchError::ThreadPool(e.to_string()))?;

        let start = Instant::now();
        let outcomes: Vec<JobOutcome> = pool.install(|| {
            jobs.par_iter()
                .zip(rates.par_iter())
                .map(|(job, rates)| job.evaluate(rates, &solver))
                .collect()
        });

        Ok(BatchReport {
            mode: BatchMode::Parallel,
            workers,
            outcomes,
            elapsed: start.elapsed(),
        })
    }

    /// Rate set for each job, in job order
    fn resolve(&self, jobs: &[Job]) -> Result<Vec<&RateSet>, BatchError> {
        jobs.iter()
            .map(|job| {
                self.rate_sets
                    .get(&job.key)
                    .map(Arc::as_ref)
                    .ok_or_else(|| BatchError::MissingRateSet(job.key.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::{ProductParameters, RateSetBuilder, RateSources, DEFAULT_RATES_PATH};
    use crate::error::ProjectionError;
    use crate::policy::{Gender, RiskClass};
    use crate::projection::{project, solve};
    use std::path::Path;

    fn bundled_cache() -> RateSetCache {
        let sources = RateSources::in_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_RATES_PATH));
        let builder = RateSetBuilder::from_sources(&sources, ProductParameters::default())
            .expect("Failed to load bundled rate tables");
        RateSetCache::new(builder)
    }

    fn small_pool() -> BatchConfig {
        BatchConfig {
            workers: 3,
            queue_capacity: 2,
            ..Default::default()
        }
    }

    fn mixed_jobs(n: usize) -> Vec<Job> {
        let keys = [
            PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35),
            PolicyKey::new(Gender::Female, RiskClass::Smoker, 55),
            PolicyKey::new(Gender::Male, RiskClass::Smoker, 80),
        ];
        (0..n)
            .map(|i| {
                let key = keys[i % keys.len()];
                if i % 7 == 3 {
                    Job::solve(key, 100_000.0)
                } else {
                    Job::project(key, 100_000.0 + 1_000.0 * i as f64, 500.0 + 25.0 * i as f64)
                }
            })
            .collect()
    }

    #[test]
    fn test_concurrent_modes_match_sequential() {
        let cache = bundled_cache();
        for n in [0usize, 1, 2, 5, 37] {
            let jobs = mixed_jobs(n);
            let runner = BatchRunner::new(&cache, &jobs, small_pool()).unwrap();

            let sequential = runner.run(&jobs, BatchMode::Sequential).unwrap();
            let pooled = runner.run(&jobs, BatchMode::Pooled).unwrap();
            let parallel = runner.run(&jobs, BatchMode::Parallel).unwrap();

            assert_eq!(sequential.len(), n);
            assert_eq!(pooled.outcomes, sequential.outcomes, "pooled differs for {} jobs", n);
            assert_eq!(parallel.outcomes, sequential.outcomes, "parallel differs for {} jobs", n);
        }
        // Three distinct keys built once
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_pooled_with_single_slot_queues() {
        let cache = bundled_cache();
        let jobs = mixed_jobs(50);
        let config = BatchConfig {
            workers: 8,
            queue_capacity: 1,
            ..Default::default()
        };
        let runner = BatchRunner::new(&cache, &jobs, config).unwrap();

        let sequential = runner.run(&jobs, BatchMode::Sequential).unwrap();
        let pooled = runner.run(&jobs, BatchMode::Pooled).unwrap();
        assert_eq!(pooled.workers, 8);
        assert_eq!(pooled.outcomes, sequential.outcomes);
    }

    #[test]
    fn test_outcomes_indexed_by_job() {
        let cache = bundled_cache();
        let jobs = mixed_jobs(12);
        let runner = BatchRunner::new(&cache, &jobs, small_pool()).unwrap();
        let report = runner.run(&jobs, BatchMode::Pooled).unwrap();

        for (index, job) in jobs.iter().enumerate() {
            let rates = cache.get_or_build(&job.key).unwrap();
            let expected = match job.kind {
                JobKind::Project {
                    face_amount,
                    annual_premium,
                } => project(&rates, job.key.issue_age, face_amount, annual_premium).unwrap(),
                JobKind::Solve { face_amount } => solve(&rates, job.key.issue_age, face_amount).unwrap(),
            };
            assert_eq!(report.outcome(index), Some(&Ok(expected)));
        }
    }

    #[test]
    fn test_failed_job_does_not_stop_batch() {
        let cache = bundled_cache();
        let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
        let jobs = vec![
            Job::project(key, 100_000.0, 1_255.03),
            Job::project(key, 100_000.0, -1.0),
            Job::solve(key, 0.0),
            Job::solve(key, 100_000.0),
        ];
        let runner = BatchRunner::new(&cache, &jobs, small_pool()).unwrap();

        for mode in BatchMode::ALL {
            let report = runner.run(&jobs, mode).unwrap();
            assert_eq!(report.failures(), 2);
            assert_eq!(
                report.outcome(1),
                Some(&Err(SolverError::Projection(ProjectionError::InvalidPremium(-1.0))))
            );
            assert!(report.outcome(3).unwrap().is_ok());
        }
    }

    #[test]
    fn test_jobs_from_cases() {
        let key = PolicyKey::new(Gender::Female, RiskClass::NonSmoker, 45);
        let priced = Case::new(1, key, 50_000.0, Some(900.0));
        let unpriced = Case::new(2, key, 50_000.0, None);

        assert_eq!(Job::from_case(&priced), Job::project(key, 50_000.0, 900.0));
        assert_eq!(Job::from_case(&unpriced), Job::solve(key, 50_000.0));
    }

    #[test]
    fn test_unprepared_key_rejected() {
        let runner = BatchRunner::with_rate_sets(HashMap::new(), small_pool()).unwrap();
        let jobs = vec![Job::solve(PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35), 100_000.0)];
        for mode in BatchMode::ALL {
            assert!(matches!(runner.run(&jobs, mode), Err(BatchError::MissingRateSet(_))));
        }
    }

    #[test]
    fn test_invalid_pool_config_rejected() {
        let no_workers = BatchConfig {
            workers: 0,
            ..small_pool()
        };
        let no_capacity = BatchConfig {
            queue_capacity: 0,
            ..small_pool()
        };
        assert!(matches!(BatchRunner::with_rate_sets(HashMap::new(), no_workers), Err(BatchError::NoWorkers)));
        assert!(matches!(BatchRunner::with_rate_sets(HashMap::new(), no_capacity), Err(BatchError::ZeroCapacity)));
    }

    #[test]
    fn test_unsupported_issue_age_fails_preparation() {
        let cache = bundled_cache();
        let jobs = vec![Job::solve(PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 121), 100_000.0)];
        assert!(matches!(
            BatchRunner::new(&cache, &jobs, small_pool()),
            Err(BatchError::RateSet(ProjectionError::UnsupportedIssueAge { .. }))
        ));
    }

    #[test]
    fn test_summary_serializes_outcomes() {
        let cache = bundled_cache();
        let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
        let jobs = vec![Job::solve(key, 100_000.0), Job::project(key, -1.0, 0.0)];
        let runner = BatchRunner::new(&cache, &jobs, small_pool()).unwrap();
        let summary = runner.run(&jobs, BatchMode::Parallel).unwrap().summary();

        assert_eq!(summary.mode, BatchMode::Parallel);
        assert_eq!(summary.jobs, 2);
        assert_eq!(summary.failures, 1);
        assert!(summary.results[0].value.is_some());
        assert!(summary.results[1].error.is_some());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["mode"], "Parallel");
        assert_eq!(json["results"][1]["job"], 1);
    }
}
