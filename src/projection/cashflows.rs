//! Illustration output structures for projections

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::policy::PolicyKey;

/// A single row of illustration output for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRow {
    // Timing
    #[serde(rename = "Policy_Month")]
    pub policy_month: u32,
    #[serde(rename = "Policy_Year")]
    pub policy_year: u32,
    #[serde(rename = "Month_In_Policy_Year")]
    pub month_in_policy_year: u32,

    // Account value roll-forward
    #[serde(rename = "Value_Start")]
    pub value_start: f64,
    #[serde(rename = "Premium")]
    pub premium: f64,
    #[serde(rename = "Premium_Load")]
    pub premium_load: f64,
    #[serde(rename = "Expense_Charge")]
    pub expense_charge: f64,
    #[serde(rename = "Value_For_DB")]
    pub value_for_db: f64,

    // Death benefit and cost of insurance
    #[serde(rename = "Death_Benefit")]
    pub death_benefit: f64,
    #[serde(rename = "NAAR")]
    pub naar: f64,
    #[serde(rename = "COI_Charge")]
    pub coi_charge: f64,

    #[serde(rename = "Interest")]
    pub interest: f64,
    #[serde(rename = "Value_End")]
    pub value_end: f64,
}

/// Monthly illustration for one policy at one premium
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Illustration {
    pub key: PolicyKey,
    pub face_amount: f64,
    pub annual_premium: f64,

    /// Monthly rows from issue to maturity
    pub rows: Vec<MonthRow>,
}

impl Illustration {
    pub fn new(key: PolicyKey, face_amount: f64, annual_premium: f64) -> Self {
        Self {
            key,
            face_amount,
            annual_premium,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: MonthRow) {
        self.rows.push(row);
    }

    /// Account value at maturity
    pub fn ending_value(&self) -> f64 {
        self.rows.last().map(|r| r.value_end).unwrap_or(0.0)
    }

    /// First month whose ending value is negative
    pub fn lapse_month(&self) -> Option<u32> {
        self.rows
            .iter()
            .find(|r| r.value_end < 0.0)
            .map(|r| r.policy_month)
    }

    /// Get summary statistics
    pub fn summary(&self) -> IllustrationSummary {
        IllustrationSummary {
            total_months: self.rows.len() as u32,
            total_premium: self.rows.iter().map(|r| r.premium).sum(),
            total_premium_load: self.rows.iter().map(|r| r.premium_load).sum(),
            total_expense_charges: self.rows.iter().map(|r| r.expense_charge).sum(),
            total_coi: self.rows.iter().map(|r| r.coi_charge).sum(),
            total_interest: self.rows.iter().map(|r| r.interest).sum(),
            ending_value: self.ending_value(),
            lapse_month: self.lapse_month(),
        }
    }

    /// Write the monthly rows as CSV with a header line
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<(), csv::Error> {
        self.write_csv(File::create(path)?)
    }
}

/// Summary statistics for an illustration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IllustrationSummary {
    pub total_months: u32,
    pub total_premium: f64,
    pub total_premium_load: f64,
    pub total_expense_charges: f64,
    pub total_coi: f64,
    pub total_interest: f64,
    pub ending_value: f64,
    pub lapse_month: Option<u32>,
}
