//! Level annual premium solver
//!
//! Finds the smallest premium, to the cent, that keeps the ending account
//! value non-negative. Relies on the ending value being non-decreasing in
//! premium: the bracket is widened by doubling and then bisected.

use log::debug;
use serde::{Deserialize, Serialize};

use super::cashflows::Illustration;
use super::engine::ProjectionEngine;
use crate::assumptions::RateSet;
use crate::error::{ProjectionError, SolverError};

/// Solver tolerances and safety caps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Bisection stops once the bracket is no wider than this
    pub tolerance: f64,
    /// First upper bound is face amount divided by this
    pub initial_high_divisor: f64,
    /// Rounding increment for the solved premium
    pub cent: f64,
    pub max_bracket_doublings: u32,
    pub max_bisection_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.005,
            initial_high_divisor: 100.0,
            cent: 0.01,
            max_bracket_doublings: 64,
            max_bisection_iterations: 200,
        }
    }
}

/// Final bisection bracket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverBracket {
    pub low: f64,
    pub high: f64,
    /// Last midpoint evaluated, or `high` if no bisection step ran
    pub mid: f64,
}

/// Solved premium with diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PremiumSolution {
    pub premium: f64,
    pub bracket: SolverBracket,
    pub bracket_doublings: u32,
    pub bisection_iterations: u32,
    /// Number of projections run
    pub evaluations: u32,
    /// True if the rounded premium lapsed and one cent was added
    pub rounding_corrected: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PremiumSolver<'a> {
    engine: ProjectionEngine<'a>,
    config: SolverConfig,
}

impl<'a> PremiumSolver<'a> {
    pub fn new(rates: &'a RateSet) -> Self {
        Self::with_config(rates, SolverConfig::default())
    }

    pub fn with_config(rates: &'a RateSet, config: SolverConfig) -> Self {
        Self {
            engine: ProjectionEngine::new(rates),
            config,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve for the level annual premium that carries the policy to maturity
    pub fn solve(&self, face_amount: f64) -> Result<PremiumSolution, SolverError> {
        if !face_amount.is_finite() || face_amount <= 0.0 {
            return Err(ProjectionError::InvalidFaceAmount(face_amount).into());
        }

        let config = &self.config;
        let mut evaluations = 0u32;
        let mut ending_value = |premium: f64| -> Result<f64, SolverError> {
            evaluations += 1;
            let value = self.engine.project(face_amount, premium)?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(SolverError::NonFiniteValue { premium })
            }
        };

        // Widen until the upper bound keeps the policy in force
        let mut low = 0.0;
        let mut high = face_amount / config.initial_high_divisor;
        let mut bracket_doublings = 0u32;
        while ending_value(high)? <= 0.0 {
            if bracket_doublings >= config.max_bracket_doublings {
                return Err(SolverError::BracketNotFound {
                    high,
                    doublings: bracket_doublings,
                });
            }
            low = high;
            high *= 2.0;
            bracket_doublings += 1;
        }

        let mut mid = high;
        let mut bisection_iterations = 0u32;
        while (high - low) > config.tolerance {
            if bisection_iterations >= config.max_bisection_iterations {
                return Err(SolverError::NonConvergence {
                    low,
                    high,
                    tolerance: config.tolerance,
                    iterations: bisection_iterations,
                });
            }
            mid = (low + high) / 2.0;
            if ending_value(mid)? <= 0.0 {
                low = mid;
            } else {
                high = mid;
            }
            bisection_iterations += 1;
        }

        // One cent up if rounding landed on the lapsing side; not re-checked
        let scale = 1.0 / config.cent;
        let mut premium = (mid * scale).round() / scale;
        let rounding_corrected = ending_value(premium)? <= 0.0;
        if rounding_corrected {
            premium += config.cent;
        }

        debug!(
            "Solved {} face {}: premium {} after {} doublings, {} bisections",
            self.engine.rates().key(),
            face_amount,
            premium,
            bracket_doublings,
            bisection_iterations
        );

        Ok(PremiumSolution {
            premium,
            bracket: SolverBracket { low, high, mid },
            bracket_doublings,
            bisection_iterations,
            evaluations,
            rounding_corrected,
        })
    }

    /// Solve, then illustrate the policy at the solved premium
    pub fn solve_with_illustration(&self, face_amount: f64) -> Result<(PremiumSolution, Illustration), SolverError> {
        let solution = self.solve(face_amount)?;
        let illustration = self.engine.illustrate(face_amount, solution.premium)?;
        Ok((solution, illustration))
    }
}

/// Solved level annual premium for `rate_set`
///
/// `issue_age` must agree with the key the rate set was built for.
pub fn solve(rate_set: &RateSet, issue_age: u8, face_amount: f64) -> Result<f64, SolverError> {
    if issue_age != rate_set.issue_age() {
        return Err(ProjectionError::IssueAgeMismatch {
            requested: issue_age,
            rate_set: rate_set.issue_age(),
        }
        .into());
    }
    Ok(PremiumSolver::new(rate_set).solve(face_amount)?.premium)
}
