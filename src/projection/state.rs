//! Projection state tracking for a single policy

/// State of a policy at a point in time during projection
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionState {
    /// Current projection month (1-indexed, 0 before the first month)
    pub projection_month: u32,

    /// Policy year (1-indexed)
    pub policy_year: u32,

    /// Month within policy year (1-12)
    pub month_in_policy_year: u32,

    /// Account value at the end of the last projected month
    pub account_value: f64,
}

impl ProjectionState {
    /// State at issue, before the first month is projected
    pub fn at_issue() -> Self {
        Self {
            projection_month: 0,
            policy_year: 0,
            month_in_policy_year: 0,
            account_value: 0.0,
        }
    }

    /// Move to the next month, rolling the policy year on each anniversary
    pub fn advance_month(&mut self) {
        self.projection_month += 1;
        if self.projection_month % 12 == 1 {
            self.policy_year += 1;
            self.month_in_policy_year = 1;
        } else {
            self.month_in_policy_year += 1;
        }
    }

    /// True in the first month of a policy year, when premium is paid
    pub fn is_anniversary(&self) -> bool {
        self.month_in_policy_year == 1
    }
}
