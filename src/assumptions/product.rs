//! Product parameters: loads, fees, discounting and crediting
//!
//! These apply uniformly across durations and are not read from the rate
//! tables. Defaults describe the standard product; any field can be
//! overridden in code or from a JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::schedule::MAX_POLICY_YEARS;
use crate::error::{ConfigError, ParameterError, ProjectionError};

/// Level product parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductParameters {
    /// Fraction of each premium deducted before crediting
    pub premium_load: f64,

    /// Flat annual policy fee, charged monthly as fee / 12
    pub annual_policy_fee: f64,

    /// Annual rate used to discount the death benefit in the NAAR
    pub naar_discount_rate: f64,

    /// Annual effective interest credited to account value
    pub annual_interest_rate: f64,

    /// Attained age at which the projection ends
    pub maturity_age: u8,
}

impl Default for ProductParameters {
    fn default() -> Self {
        Self {
            premium_load: 0.06,
            annual_policy_fee: 120.0,
            naar_discount_rate: 0.01,
            annual_interest_rate: 0.03,
            maturity_age: 121,
        }
    }
}

impl ProductParameters {
    /// Load overrides from a JSON file; missing fields keep their defaults
    pub fn from_json_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate parameters from a JSON document
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Check every field is within its meaningful range
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(0.0..1.0).contains(&self.premium_load) {
            return Err(ParameterError {
                field: "premium_load",
                expected: "in [0, 1)",
                value: self.premium_load,
            });
        }
        if !self.annual_policy_fee.is_finite() || self.annual_policy_fee < 0.0 {
            return Err(ParameterError {
                field: "annual_policy_fee",
                expected: "finite and non-negative",
                value: self.annual_policy_fee,
            });
        }
        if !self.naar_discount_rate.is_finite() || self.naar_discount_rate <= -1.0 {
            return Err(ParameterError {
                field: "naar_discount_rate",
                expected: "finite and greater than -1",
                value: self.naar_discount_rate,
            });
        }
        if !self.annual_interest_rate.is_finite() || self.annual_interest_rate <= -1.0 {
            return Err(ParameterError {
                field: "annual_interest_rate",
                expected: "finite and greater than -1",
                value: self.annual_interest_rate,
            });
        }
        if self.maturity_age < 2 || self.maturity_age as usize > MAX_POLICY_YEARS + 1 {
            return Err(ParameterError {
                field: "maturity_age",
                expected: "between 2 and 121",
                value: self.maturity_age as f64,
            });
        }
        Ok(())
    }

    /// Monthly factor discounting the death benefit: (1 + i)^(-1/12)
    pub fn monthly_naar_discount(&self) -> f64 {
        (1.0 + self.naar_discount_rate).powf(-1.0 / 12.0)
    }

    /// Monthly effective interest rate: (1 + i)^(1/12) - 1
    pub fn monthly_interest_rate(&self) -> f64 {
        (1.0 + self.annual_interest_rate).powf(1.0 / 12.0) - 1.0
    }

    /// Policy years from issue to maturity
    pub fn projection_years(&self, issue_age: u8) -> Result<usize, ProjectionError> {
        let years = self.maturity_age as i32 - issue_age as i32;
        if years < 1 || years as usize > MAX_POLICY_YEARS {
            return Err(ProjectionError::UnsupportedIssueAge {
                issue_age,
                maturity_age: self.maturity_age,
                max_years: MAX_POLICY_YEARS,
            });
        }
        Ok(years as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_monthly_rates() {
        let params = ProductParameters::default();
        assert_relative_eq!(params.monthly_interest_rate(), 0.0024662697723036864, max_relative = 1e-12);
        assert_relative_eq!(params.monthly_naar_discount(), 0.999171149448777, max_relative = 1e-12);

        // Twelve months of crediting recovers the annual rate
        let annual = (1.0 + params.monthly_interest_rate()).powi(12) - 1.0;
        assert_relative_eq!(annual, 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_years() {
        let params = ProductParameters::default();
        assert_eq!(params.projection_years(35).unwrap(), 86);
        assert_eq!(params.projection_years(1).unwrap(), 120);
        assert_eq!(params.projection_years(120).unwrap(), 1);
        assert!(params.projection_years(0).is_err());
        assert!(params.projection_years(121).is_err());
        assert!(params.projection_years(200).is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let params = ProductParameters::from_json(r#"{ "annual_interest_rate": 0.04 }"#).unwrap();
        assert_eq!(params.annual_interest_rate, 0.04);
        assert_eq!(params.premium_load, 0.06);
        assert_eq!(params.maturity_age, 121);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let result = ProductParameters::from_json(r#"{ "premium_load": 1.5 }"#);
        assert!(matches!(result, Err(ConfigError::Parameter(ParameterError { field: "premium_load", .. }))));

        let params = ProductParameters {
            annual_policy_fee: f64::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ProductParameters {
            maturity_age: 150,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
