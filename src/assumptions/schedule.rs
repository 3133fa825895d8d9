//! Per-duration rate schedules

use serde::{Deserialize, Serialize};

/// Longest supported projection, in policy years
pub const MAX_POLICY_YEARS: usize = 120;

/// Rates by policy year (index 0 = policy year 1)
///
/// The length is fixed when the schedule is created, normally to the number
/// of projection years for one issue age. Writes outside that length are
/// refused rather than growing or wrapping the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSchedule {
    rates: Vec<f64>,
}

impl RateSchedule {
    /// Schedule of `years` entries all equal to `value`
    pub fn filled(years: usize, value: f64) -> Self {
        Self {
            rates: vec![value; years],
        }
    }

    /// Schedule from explicit rates, first entry for policy year 1
    pub fn from_rates(rates: Vec<f64>) -> Self {
        Self { rates }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate for a 1-indexed policy year, `None` outside the schedule
    pub fn get(&self, policy_year: u32) -> Option<f64> {
        let idx = (policy_year as usize).checked_sub(1)?;
        self.rates.get(idx).copied()
    }

    /// Store `rate` at a 0-based index
    ///
    /// Returns false, leaving the schedule untouched, when the index is
    /// negative or past the end.
    pub fn try_set(&mut self, index: i64, rate: f64) -> bool {
        match usize::try_from(index).ok().and_then(|i| self.rates.get_mut(i)) {
            Some(slot) => {
                *slot = rate;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.rates
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.rates.iter().copied()
    }
}
