//! Core projection engine for the monthly account value recursion
//!
//! Each month: premium (anniversary months only) less premium load and
//! expense charge gives the value for the death benefit; the death benefit is
//! the greater of face and the corridor multiple of that value; COI is
//! charged on the discounted net amount at risk; interest is credited on any
//! positive remainder.

use super::cashflows::{Illustration, MonthRow};
use super::state::ProjectionState;
use crate::assumptions::{RateSet, YearRates};
use crate::error::ProjectionError;

/// Main projection engine
///
/// Borrows a rate set, so one set can back any number of engines across
/// threads.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionEngine<'a> {
    rates: &'a RateSet,
}

impl<'a> ProjectionEngine<'a> {
    /// Create a new projection engine over a rate set
    pub fn new(rates: &'a RateSet) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &'a RateSet {
        self.rates
    }

    /// Account value at maturity for a level annual premium
    pub fn project(&self, face_amount: f64, annual_premium: f64) -> Result<f64, ProjectionError> {
        check_inputs(face_amount, annual_premium)?;
        Ok(self.run(face_amount, annual_premium, |_| {}))
    }

    /// Full monthly illustration for a level annual premium
    ///
    /// The ending value is identical to [`ProjectionEngine::project`] for the
    /// same inputs.
    pub fn illustrate(&self, face_amount: f64, annual_premium: f64) -> Result<Illustration, ProjectionError> {
        check_inputs(face_amount, annual_premium)?;
        let mut illustration = Illustration::new(*self.rates.key(), face_amount, annual_premium);
        illustration.rows.reserve(self.rates.months() as usize);
        self.run(face_amount, annual_premium, |row| illustration.add_row(row));
        Ok(illustration)
    }

    /// Run every month to maturity, handing each row to `record`
    fn run<F: FnMut(MonthRow)>(&self, face_amount: f64, annual_premium: f64, mut record: F) -> f64 {
        let mut state = ProjectionState::at_issue();

        for year in self.rates.iter_years() {
            for _ in 0..12 {
                state.advance_month();
                let row = calculate_month(&state, &year, face_amount, annual_premium);
                state.account_value = row.value_end;
                record(row);
            }
        }

        state.account_value
    }
}

/// Calculate the roll-forward for a single month
fn calculate_month(state: &ProjectionState, year: &YearRates, face_amount: f64, annual_premium: f64) -> MonthRow {
    let premium = if state.is_anniversary() { annual_premium } else { 0.0 };
    let value_start = state.account_value;

    let premium_load = premium * year.premium_load;
    let expense_charge = (year.policy_fee + year.per_unit_load * face_amount / 1000.0) / 12.0;
    let value_for_db = value_start + premium - premium_load - expense_charge;

    // Corridor test
    let death_benefit = face_amount.max(year.corridor_factor * value_for_db);
    let naar = (death_benefit * year.naar_discount - value_for_db.max(0.0)).max(0.0);
    let coi_charge = (naar / 1000.0) * (year.cost_of_insurance / 12.0);

    let value_for_interest = value_for_db - coi_charge;
    let interest = value_for_interest.max(0.0) * year.interest_rate;

    MonthRow {
        policy_month: state.projection_month,
        policy_year: state.policy_year,
        month_in_policy_year: state.month_in_policy_year,
        value_start,
        premium,
        premium_load,
        expense_charge,
        value_for_db,
        death_benefit,
        naar,
        coi_charge,
        interest,
        value_end: value_for_interest + interest,
    }
}

fn check_inputs(face_amount: f64, annual_premium: f64) -> Result<(), ProjectionError> {
    if !face_amount.is_finite() || face_amount <= 0.0 {
        return Err(ProjectionError::InvalidFaceAmount(face_amount));
    }
    if !annual_premium.is_finite() || annual_premium < 0.0 {
        return Err(ProjectionError::InvalidPremium(annual_premium));
    }
    Ok(())
}

/// Ending account value for `rate_set`
///
/// `issue_age` must agree with the key the rate set was built for.
pub fn project(
    rate_set: &RateSet,
    issue_age: u8,
    face_amount: f64,
    annual_premium: f64,
) -> Result<f64, ProjectionError> {
    if issue_age != rate_set.issue_age() {
        return Err(ProjectionError::IssueAgeMismatch {
            requested: issue_age,
            rate_set: rate_set.issue_age(),
        });
    }
    ProjectionEngine::new(rate_set).project(face_amount, annual_premium)
}
