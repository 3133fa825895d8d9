//! Insured characteristics and illustration cases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// Gender of the insured, coded as in the cost of insurance table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M", alias = "Male")]
    Male,
    #[serde(rename = "F", alias = "Female")]
    Female,
}

impl Gender {
    /// Code used in the `Gender` column of rate tables
    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl FromStr for Gender {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" | "Male" => Ok(Gender::Male),
            "F" | "Female" => Ok(Gender::Female),
            other => Err(PolicyError::UnknownCode {
                field: "gender",
                code: other.to_string(),
            }),
        }
    }
}

/// Underwriting risk class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskClass {
    /// Non-smoker
    #[serde(rename = "NS")]
    NonSmoker,
    /// Smoker
    #[serde(rename = "SM")]
    Smoker,
}

impl RiskClass {
    /// Code used in the `Risk_Class` column of rate tables
    pub fn code(&self) -> &'static str {
        match self {
            RiskClass::NonSmoker => "NS",
            RiskClass::Smoker => "SM",
        }
    }
}

impl FromStr for RiskClass {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NS" => Ok(RiskClass::NonSmoker),
            "SM" => Ok(RiskClass::Smoker),
            other => Err(PolicyError::UnknownCode {
                field: "risk class",
                code: other.to_string(),
            }),
        }
    }
}

/// Identifies which rate rows apply to an insured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub gender: Gender,
    pub risk_class: RiskClass,
    pub issue_age: u8,
}

impl PolicyKey {
    pub fn new(gender: Gender, risk_class: RiskClass, issue_age: u8) -> Self {
        Self {
            gender,
            risk_class,
            issue_age,
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.gender.code(),
            self.risk_class.code(),
            self.issue_age
        )
    }
}

/// A single illustration request
///
/// Cases with an annual premium are projected at that premium; cases
/// without one are solved for the minimum premium to maturity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Caller-assigned identifier
    pub case_id: u32,

    /// Insured characteristics
    pub key: PolicyKey,

    /// Level death benefit
    pub face_amount: f64,

    /// Premium paid at the start of each policy year
    pub annual_premium: Option<f64>,
}

impl Case {
    pub fn new(case_id: u32, key: PolicyKey, face_amount: f64, annual_premium: Option<f64>) -> Self {
        Self {
            case_id,
            key,
            face_amount,
            annual_premium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_from_str() {
        for gender in [Gender::Male, Gender::Female] {
            assert_eq!(gender.code().parse::<Gender>().unwrap(), gender);
        }
        for class in [RiskClass::NonSmoker, RiskClass::Smoker] {
            assert_eq!(class.code().parse::<RiskClass>().unwrap(), class);
        }
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
    }

    #[test]
    fn test_unknown_code_rejected() {
        let err = "X".parse::<Gender>().unwrap_err();
        assert!(matches!(err, PolicyError::UnknownCode { field: "gender", .. }));
        assert!("PN".parse::<RiskClass>().is_err());
    }

    #[test]
    fn test_policy_key_display() {
        let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
        assert_eq!(key.to_string(), "M/NS/35");
    }
}
