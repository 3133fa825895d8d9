//! Error types for rate loading, projection, premium solving and batch runs
//!
//! Configuration problems (missing tables, bad headers, out of range product
//! parameters) are fatal. Row-level problems in a rate table are recoverable
//! and reported as [`RowIssue`] values rather than errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::assumptions::RateKind;

/// Fatal problems reading a rate table source
#[derive(Error, Debug)]
pub enum RateTableError {
    /// The source file could not be opened
    #[error("unable to open rate table {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reader failed below the record level (I/O, unreadable header)
    #[error("error reading rate table {table}: {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    /// A column role required by the table layout is absent from the header
    #[error("rate table {table} has no {column} column")]
    MissingColumn { table: String, column: &'static str },
}

/// A data row that was left out of a rate table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowIssue {
    /// A numeric column did not parse
    #[error("line {line}: {column} value {value:?} is not numeric")]
    Malformed {
        line: u64,
        column: &'static str,
        value: String,
    },

    /// The record itself could not be decoded (wrong field count, bad UTF-8)
    #[error("line {line}: unreadable record ({reason})")]
    Unreadable { line: u64, reason: String },

    /// The row maps to a duration outside the schedule
    #[error("line {line}: duration index {index} outside schedule of {years} years")]
    OutOfRange { line: u64, index: i64, years: usize },
}

/// A product parameter outside its valid range
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field} must be {expected}, got {value}")]
pub struct ParameterError {
    pub field: &'static str,
    pub expected: &'static str,
    pub value: f64,
}

/// Fatal configuration errors: rate tables and product parameters
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    RateTable(#[from] RateTableError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// A table was supplied in the wrong role
    #[error("rate table {table} has layout {found}, expected {expected}")]
    WrongLayout {
        table: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unable to read product parameters from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid product parameters: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Invalid inputs to a projection or rate set construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error(
        "issue age {issue_age} is not supported for maturity age {maturity_age} \
         (1 to {max_years} projection years required)"
    )]
    UnsupportedIssueAge {
        issue_age: u8,
        maturity_age: u8,
        max_years: usize,
    },

    #[error("issue age {requested} does not match rate set issue age {rate_set}")]
    IssueAgeMismatch { requested: u8, rate_set: u8 },

    #[error("{kind:?} schedule has {found} years, expected {expected}")]
    ScheduleLength {
        kind: RateKind,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("face amount must be positive and finite, got {0}")]
    InvalidFaceAmount(f64),

    #[error("annual premium must be non-negative and finite, got {0}")]
    InvalidPremium(f64),
}

/// Failures of the premium root-finder
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Bracket expansion never reached a premium with a positive ending value
    #[error("no premium up to {high} keeps the policy in force after {doublings} doublings")]
    BracketNotFound { high: f64, doublings: u32 },

    /// Bisection did not narrow the bracket within the iteration cap
    #[error(
        "bisection left [{low}, {high}] wider than {tolerance} after {iterations} iterations"
    )]
    NonConvergence {
        low: f64,
        high: f64,
        tolerance: f64,
        iterations: u32,
    },

    /// The projection produced NaN or an infinite ending value
    #[error("projection at premium {premium} produced a non-finite ending value")]
    NonFiniteValue { premium: f64 },
}

/// Problems reading policy cases
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("unknown {field} code {code:?}")]
    UnknownCode { field: &'static str, code: String },

    #[error("unable to read cases from {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid case record: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures that stop a whole batch run
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("batch needs at least one worker")]
    NoWorkers,

    #[error("batch queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("no rate set was prepared for policy {0}")]
    MissingRateSet(String),

    #[error(transparent)]
    RateSet(#[from] ProjectionError),

    #[error("unable to start worker pool: {0}")]
    ThreadPool(String),

    /// Every worker hung up before all results arrived
    #[error("workers stopped before job {0} reported a result")]
    MissingResult(usize),
}
