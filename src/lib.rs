//! UL Illustration - account value projection and premium solving for universal life
//!
//! This library provides:
//! - Rate table loading (COI, per-unit load, corridor factors) into per-policy rate sets
//! - Monthly account value projection with full illustration output
//! - Level annual premium solving to keep a policy in force to maturity
//! - Sequential, pooled and rayon batch runners over many policies

pub mod assumptions;
pub mod batch;
pub mod error;
pub mod policy;
pub mod projection;

// Re-export commonly used types
pub use assumptions::{ProductParameters, RateSet, RateSetBuilder, RateSetCache, RateSources};
pub use batch::{BatchConfig, BatchMode, BatchReport, BatchRunner, Job};
pub use error::{BatchError, ConfigError, ParameterError, ProjectionError, RateTableError, SolverError};
pub use policy::{Case, Gender, PolicyKey, RiskClass};
pub use projection::{project, solve, Illustration, PremiumSolver, ProjectionEngine};
