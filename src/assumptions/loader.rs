//! CSV rate table loader
//!
//! Each table is scanned once into memory. Schedules for any number of
//! policy keys are then selected from the parsed rows without re-reading
//! the file.
//!
//! Row policy: a row whose age, year or rate does not parse is skipped,
//! logged and counted in [`LoadReport::malformed_rows`]. A row that maps to
//! a duration outside the requested schedule is rejected and counted in
//! [`Selection::out_of_range_rows`]. Neither ever writes a default value.

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::schedule::RateSchedule;
use crate::error::{RateTableError, RowIssue};
use crate::policy::PolicyKey;

/// Default path to rate tables directory
pub const DEFAULT_RATES_PATH: &str = "data/rates";

pub const ISSUE_AGE: &str = "Issue_Age";
pub const POLICY_YEAR: &str = "Policy_Year";
pub const ATTAINED_AGE: &str = "Attained_Age";
pub const RATE: &str = "Rate";
pub const GENDER: &str = "Gender";
pub const RISK_CLASS: &str = "Risk_Class";

/// Shape of a rate table and how its rows map onto durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TableLayout {
    /// Per $1,000 face load by issue age and policy year
    PerUnitLoad,
    /// Per $1,000 annual COI rate by gender, risk class, issue age and policy year
    CostOfInsurance,
    /// Corridor factor by attained age
    CorridorFactor,
}

impl TableLayout {
    pub fn name(&self) -> &'static str {
        match self {
            TableLayout::PerUnitLoad => "per-unit load",
            TableLayout::CostOfInsurance => "cost of insurance",
            TableLayout::CorridorFactor => "corridor factor",
        }
    }

    /// Value used for durations with no row in the table
    pub fn default_rate(&self) -> f64 {
        match self {
            TableLayout::PerUnitLoad | TableLayout::CostOfInsurance => 0.0,
            TableLayout::CorridorFactor => 1.0,
        }
    }

    fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TableLayout::PerUnitLoad => &[ISSUE_AGE, POLICY_YEAR, RATE],
            TableLayout::CostOfInsurance => &[ISSUE_AGE, POLICY_YEAR, RATE, GENDER, RISK_CLASS],
            TableLayout::CorridorFactor => &[ATTAINED_AGE, RATE],
        }
    }
}

/// Locations of the three rate tables
#[derive(Debug, Clone, PartialEq)]
pub struct RateSources {
    pub dir: PathBuf,
    pub coi_file: String,
    pub unit_load_file: String,
    pub corridor_file: String,
}

impl Default for RateSources {
    fn default() -> Self {
        Self::in_dir(DEFAULT_RATES_PATH)
    }
}

impl RateSources {
    /// Standard file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            coi_file: "coi.csv".to_string(),
            unit_load_file: "unit_load.csv".to_string(),
            corridor_file: "corridor_factors.csv".to_string(),
        }
    }

    pub fn path_for(&self, layout: TableLayout) -> PathBuf {
        let file = match layout {
            TableLayout::PerUnitLoad => &self.unit_load_file,
            TableLayout::CostOfInsurance => &self.coi_file,
            TableLayout::CorridorFactor => &self.corridor_file,
        };
        self.dir.join(file)
    }
}

/// Counts from scanning one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Data records encountered (header excluded)
    pub rows_read: usize,
    /// Records skipped because a field did not parse
    pub malformed_rows: usize,
}

/// Schedule selected for one policy key, with rejection counts
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub schedule: RateSchedule,
    /// Rows that matched the key and were written
    pub matched_rows: usize,
    /// Rows that matched the key but fell outside the schedule
    pub out_of_range_rows: usize,
}

/// Positions of the column roles in the header
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    issue_age: Option<usize>,
    duration: usize,
    rate: usize,
    gender: Option<usize>,
    risk_class: Option<usize>,
}

impl ColumnMap {
    fn resolve(headers: &StringRecord, layout: TableLayout, table: &str) -> Result<Self, RateTableError> {
        let position = |column: &str| headers.iter().position(|h| h == column);

        for &column in layout.required_columns() {
            if position(column).is_none() {
                return Err(RateTableError::MissingColumn {
                    table: table.to_string(),
                    column,
                });
            }
        }

        let duration_column = match layout {
            TableLayout::CorridorFactor => ATTAINED_AGE,
            _ => POLICY_YEAR,
        };
        let keyed = layout == TableLayout::CostOfInsurance;

        // Required columns were checked above
        Ok(Self {
            issue_age: position(ISSUE_AGE).filter(|_| layout != TableLayout::CorridorFactor),
            duration: position(duration_column).unwrap_or_default(),
            rate: position(RATE).unwrap_or_default(),
            gender: position(GENDER).filter(|_| keyed),
            risk_class: position(RISK_CLASS).filter(|_| keyed),
        })
    }

    fn parse(&self, record: &StringRecord, layout: TableLayout, line: u64) -> Result<RateRow, RowIssue> {
        let duration_column = match layout {
            TableLayout::CorridorFactor => ATTAINED_AGE,
            _ => POLICY_YEAR,
        };
        let issue_age = match self.issue_age {
            Some(idx) => Some(parse_field::<i64>(record, idx, ISSUE_AGE, line)?),
            None => None,
        };
        Ok(RateRow {
            line,
            issue_age,
            duration: parse_field(record, self.duration, duration_column, line)?,
            rate: parse_rate(record, self.rate, line)?,
            gender: self.gender.and_then(|idx| record.get(idx)).map(str::to_string),
            risk_class: self.risk_class.and_then(|idx| record.get(idx)).map(str::to_string),
        })
    }
}

fn parse_field<T: FromStr>(record: &StringRecord, idx: usize, column: &'static str, line: u64) -> Result<T, RowIssue> {
    let value = record.get(idx).unwrap_or_default();
    value.parse().map_err(|_| RowIssue::Malformed {
        line,
        column,
        value: value.to_string(),
    })
}

/// Rates must be finite; `NaN` and `inf` parse as `f64` but are malformed here
fn parse_rate(record: &StringRecord, idx: usize, line: u64) -> Result<f64, RowIssue> {
    let rate: f64 = parse_field(record, idx, RATE, line)?;
    if rate.is_finite() {
        Ok(rate)
    } else {
        Err(RowIssue::Malformed {
            line,
            column: RATE,
            value: record.get(idx).unwrap_or_default().to_string(),
        })
    }
}

/// One parsed data row
#[derive(Debug, Clone, PartialEq)]
struct RateRow {
    line: u64,
    issue_age: Option<i64>,
    /// Policy year, or attained age for corridor tables
    duration: i64,
    rate: f64,
    gender: Option<String>,
    risk_class: Option<String>,
}

impl RateRow {
    fn applies_to(&self, layout: TableLayout, key: &PolicyKey) -> bool {
        let issue_age = key.issue_age as i64;
        match layout {
            TableLayout::CorridorFactor => self.duration >= issue_age,
            TableLayout::PerUnitLoad => self.issue_age == Some(issue_age),
            TableLayout::CostOfInsurance => {
                self.issue_age == Some(issue_age)
                    && self.gender.as_deref() == Some(key.gender.code())
                    && self.risk_class.as_deref() == Some(key.risk_class.code())
            }
        }
    }

    fn index(&self, layout: TableLayout, key: &PolicyKey) -> i64 {
        match layout {
            TableLayout::CorridorFactor => self.duration - key.issue_age as i64,
            _ => self.duration - 1,
        }
    }
}

/// A rate table held in memory after a single scan
#[derive(Debug, Clone)]
pub struct RateTable {
    name: String,
    layout: TableLayout,
    rows: Vec<RateRow>,
    report: LoadReport,
}

impl RateTable {
    /// Scan a table from a CSV file
    pub fn from_path(path: &Path, layout: TableLayout) -> Result<Self, RateTableError> {
        let file = File::open(path).map_err(|source| RateTableError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, &path.display().to_string(), layout)
    }

    /// Scan a table from any reader; `name` labels log lines and errors
    pub fn from_reader<R: Read>(reader: R, name: &str, layout: TableLayout) -> Result<Self, RateTableError> {
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let csv_error = |source: csv::Error| RateTableError::Csv {
            table: name.to_string(),
            source,
        };

        let headers = reader.headers().map_err(csv_error)?.clone();
        let columns = ColumnMap::resolve(&headers, layout, name)?;

        let mut rows = Vec::new();
        let mut report = LoadReport::default();

        for result in reader.records() {
            report.rows_read += 1;
            let parsed = match result {
                Ok(record) => {
                    let line = record.position().map(|p| p.line()).unwrap_or_default();
                    columns.parse(&record, layout, line)
                }
                Err(err) if err.is_io_error() => return Err(csv_error(err)),
                Err(err) => Err(RowIssue::Unreadable {
                    line: err.position().map(|p| p.line()).unwrap_or_default(),
                    reason: err.to_string(),
                }),
            };

            match parsed {
                Ok(row) => rows.push(row),
                Err(issue) => {
                    warn!("{}: skipping row, {}", name, issue);
                    report.malformed_rows += 1;
                }
            }
        }

        info!(
            "Loaded {} table {}: {} rows, {} malformed rows skipped",
            layout.name(),
            name,
            report.rows_read,
            report.malformed_rows
        );

        Ok(Self {
            name: name.to_string(),
            layout,
            rows,
            report,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> TableLayout {
        self.layout
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Build a `years`-long schedule for `key` from the rows in memory
    pub fn select(&self, key: &PolicyKey, years: usize) -> Selection {
        let mut schedule = RateSchedule::filled(years, self.layout.default_rate());
        let mut matched_rows = 0;
        let mut out_of_range_rows = 0;

        for row in self.rows.iter().filter(|r| r.applies_to(self.layout, key)) {
            let index = row.index(self.layout, key);
            if schedule.try_set(index, row.rate) {
                matched_rows += 1;
            } else {
                let issue = RowIssue::OutOfRange {
                    line: row.line,
                    index,
                    years,
                };
                debug!("{}: rejecting row for {}, {}", self.name, key, issue);
                out_of_range_rows += 1;
            }
        }

        Selection {
            schedule,
            matched_rows,
            out_of_range_rows,
        }
    }
}

/// Scan `source` and return the schedule for `key` in one call
///
/// Convenient for a single lookup. Callers needing many keys from the same
/// file should hold a [`RateTable`] and call [`RateTable::select`].
pub fn load_schedule(
    source: &Path,
    layout: TableLayout,
    key: &PolicyKey,
    years: usize,
) -> Result<RateSchedule, RateTableError> {
    let table = RateTable::from_path(source, layout)?;
    Ok(table.select(key, years).schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Gender, RiskClass};

    const COI: &str = "\
Gender,Risk_Class,Issue_Age,Policy_Year,Rate
M,NS,35,1,0.50
M,NS,35,2,0.60
M,NS,35,3,0.70
F,NS,35,1,0.40
M,SM,35,1,1.10
M,NS,36,1,0.55
";

    fn key(issue_age: u8) -> PolicyKey {
        PolicyKey::new(Gender::Male, RiskClass::NonSmoker, issue_age)
    }

    #[test]
    fn test_coi_filters_on_all_keys() {
        let table = RateTable::from_reader(COI.as_bytes(), "coi", TableLayout::CostOfInsurance).unwrap();
        assert_eq!(table.report().rows_read, 6);
        assert_eq!(table.report().malformed_rows, 0);

        let selection = table.select(&key(35), 86);
        assert_eq!(selection.schedule.len(), 86);
        assert_eq!(selection.matched_rows, 3);
        assert_eq!(&selection.schedule.as_slice()[..4], &[0.50, 0.60, 0.70, 0.0]);

        let female = PolicyKey::new(Gender::Female, RiskClass::NonSmoker, 35);
        assert_eq!(table.select(&female, 86).schedule.get(1), Some(0.40));

        let smoker = PolicyKey::new(Gender::Male, RiskClass::Smoker, 35);
        assert_eq!(table.select(&smoker, 86).schedule.get(1), Some(1.10));
    }

    #[test]
    fn test_columns_resolved_by_name_not_position() {
        let data = "\
Rate,Policy_Year,Issue_Age
0.25,2,40
";
        let table = RateTable::from_reader(data.as_bytes(), "unit", TableLayout::PerUnitLoad).unwrap();
        let schedule = table.select(&key(40), 81).schedule;
        assert_eq!(schedule.get(1), Some(0.0));
        assert_eq!(schedule.get(2), Some(0.25));
    }

    #[test]
    fn test_corridor_indexed_by_attained_age() {
        let data = "\
Attained_Age,Rate
40,2.50
41,2.43
42,2.36
120,1.00
";
        let table = RateTable::from_reader(data.as_bytes(), "corridor", TableLayout::CorridorFactor).unwrap();
        let selection = table.select(&key(41), 80);
        assert_eq!(selection.schedule.get(1), Some(2.43));
        assert_eq!(selection.schedule.get(2), Some(2.36));
        // Missing ages keep the default
        assert_eq!(selection.schedule.get(3), Some(1.0));
        assert_eq!(selection.schedule.get(80), Some(1.0));
        // Age 40 is before issue and is simply not applicable
        assert_eq!(selection.matched_rows, 3);
        assert_eq!(selection.out_of_range_rows, 0);
    }

    #[test]
    fn test_malformed_rows_are_skipped_and_counted() {
        let data = "\
Attained_Age,Rate
50,1.85
51,abc
fifty-two,1.78
53,1.71
";
        let table = RateTable::from_reader(data.as_bytes(), "corridor", TableLayout::CorridorFactor).unwrap();
        assert_eq!(table.report().rows_read, 4);
        assert_eq!(table.report().malformed_rows, 2);

        let schedule = table.select(&key(50), 71).schedule;
        assert_eq!(schedule.get(1), Some(1.85));
        // Skipped rows leave the default, never a parsed zero
        assert_eq!(schedule.get(2), Some(1.0));
        assert_eq!(schedule.get(3), Some(1.0));
        assert_eq!(schedule.get(4), Some(1.71));
    }

    #[test]
    fn test_non_finite_rates_are_malformed() {
        let data = "\
Issue_Age,Policy_Year,Rate
35,1,NaN
35,2,inf
35,3,infinity
35,4,-inf
35,5,0.25
";
        let table = RateTable::from_reader(data.as_bytes(), "unit", TableLayout::PerUnitLoad).unwrap();
        assert_eq!(table.report().rows_read, 5);
        assert_eq!(table.report().malformed_rows, 4);

        let schedule = table.select(&key(35), 86).schedule;
        assert!(schedule.iter().all(f64::is_finite));
        assert_eq!(&schedule.as_slice()[..5], &[0.0, 0.0, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn test_short_record_is_malformed_not_fatal() {
        let data = "\
Issue_Age,Policy_Year,Rate
35,1,0.10
35,2
35,3,0.30
";
        let table = RateTable::from_reader(data.as_bytes(), "unit", TableLayout::PerUnitLoad).unwrap();
        assert_eq!(table.report().malformed_rows, 1);
        let schedule = table.select(&key(35), 86).schedule;
        assert_eq!(schedule.get(1), Some(0.10));
        assert_eq!(schedule.get(2), Some(0.0));
        assert_eq!(schedule.get(3), Some(0.30));
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let data = "\
Issue_Age,Policy_Year,Rate
120,0,9.0
120,1,0.5
120,2,9.0
120,500,9.0
";
        let table = RateTable::from_reader(data.as_bytes(), "unit", TableLayout::PerUnitLoad).unwrap();
        let selection = table.select(&key(120), 1);
        assert_eq!(selection.schedule.as_slice(), &[0.5]);
        assert_eq!(selection.matched_rows, 1);
        assert_eq!(selection.out_of_range_rows, 3);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let data = "\
Issue_Age,Policy_Year,Rate
35,1,0.5
";
        let err = RateTable::from_reader(data.as_bytes(), "coi", TableLayout::CostOfInsurance).unwrap_err();
        assert!(matches!(err, RateTableError::MissingColumn { column: GENDER, .. }));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = RateTable::from_path(Path::new("no/such/table.csv"), TableLayout::PerUnitLoad).unwrap_err();
        assert!(matches!(err, RateTableError::Open { .. }));
    }

    #[test]
    fn test_load_schedule_from_bundled_tables() {
        let sources = RateSources::in_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_RATES_PATH));
        let coi = load_schedule(
            &sources.path_for(TableLayout::CostOfInsurance),
            TableLayout::CostOfInsurance,
            &key(35),
            86,
        )
        .expect("Failed to load bundled COI table");

        assert_eq!(coi.len(), 86);
        assert!(coi.iter().all(|rate| rate > 0.0));
        assert_eq!(coi.get(1), Some(0.7312));
        assert_eq!(coi.get(86), Some(1000.0));
    }
}
