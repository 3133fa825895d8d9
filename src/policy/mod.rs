//! Insured characteristics, policy keys and case loading

mod data;
pub mod loader;

pub use data::{Case, Gender, PolicyKey, RiskClass};
pub use loader::{load_cases, load_cases_from_reader, DEFAULT_CASES_PATH};
