//! Account value projection, monthly illustration and premium solving

mod cashflows;
mod engine;
mod solver;
mod state;

pub use cashflows::{Illustration, IllustrationSummary, MonthRow};
pub use engine::{project, ProjectionEngine};
pub use solver::{solve, PremiumSolution, PremiumSolver, SolverBracket, SolverConfig};
pub use state::ProjectionState;
