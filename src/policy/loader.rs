//! Load illustration cases from CSV

use super::{Case, Gender, PolicyKey, RiskClass};
use crate::error::PolicyError;
use csv::Reader;
use std::fs::File;
use std::path::Path;

/// Default location of the sample case file
pub const DEFAULT_CASES_PATH: &str = "data/cases.csv";

/// Raw CSV row matching the case file columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "Case_ID")]
    case_id: u32,
    #[serde(rename = "Gender")]
    gender: Gender,
    #[serde(rename = "Risk_Class")]
    risk_class: RiskClass,
    #[serde(rename = "Issue_Age")]
    issue_age: u8,
    #[serde(rename = "Face_Amount")]
    face_amount: f64,
    #[serde(rename = "Annual_Premium", default)]
    annual_premium: Option<f64>,
}

impl CsvRow {
    fn into_case(self) -> Case {
        Case {
            case_id: self.case_id,
            key: PolicyKey::new(self.gender, self.risk_class, self.issue_age),
            face_amount: self.face_amount,
            annual_premium: self.annual_premium,
        }
    }
}

/// Load all cases from a CSV file
pub fn load_cases<P: AsRef<Path>>(path: P) -> Result<Vec<Case>, PolicyError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| PolicyError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    load_cases_from_reader(file)
}

/// Load cases from any reader (e.g., string buffer, network stream)
pub fn load_cases_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<Case>, PolicyError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut cases = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        cases.push(row.into_case());
    }

    Ok(cases)
}
