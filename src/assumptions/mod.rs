//! Illustration rates: tabular rate loading, product parameters and rate sets

mod cache;
pub mod loader;
mod product;
mod schedule;

pub use cache::RateSetCache;
pub use loader::{
    load_schedule, LoadReport, RateSources, RateTable, Selection, TableLayout, DEFAULT_RATES_PATH,
};
pub use product::ProductParameters;
pub use schedule::{RateSchedule, MAX_POLICY_YEARS};

use log::debug;
use serde::Serialize;

use crate::error::{ConfigError, ProjectionError};
use crate::policy::{Gender, PolicyKey, RiskClass};

/// Names of the schedules in a [`RateSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RateKind {
    CostOfInsurance,
    PerUnitLoad,
    CorridorFactor,
    PremiumLoad,
    PolicyFee,
    NaarDiscount,
    Interest,
}

impl RateKind {
    pub const ALL: [RateKind; 7] = [
        RateKind::CostOfInsurance,
        RateKind::PerUnitLoad,
        RateKind::CorridorFactor,
        RateKind::PremiumLoad,
        RateKind::PolicyFee,
        RateKind::NaarDiscount,
        RateKind::Interest,
    ];
}

/// Every rate that applies in one policy year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearRates {
    /// Annual COI rate per $1,000 of NAAR
    pub cost_of_insurance: f64,
    /// Annual load per $1,000 of face
    pub per_unit_load: f64,
    pub corridor_factor: f64,
    pub premium_load: f64,
    /// Annual flat fee
    pub policy_fee: f64,
    /// Monthly NAAR discount factor
    pub naar_discount: f64,
    /// Monthly effective interest rate
    pub interest_rate: f64,
}

/// Complete, immutable set of rates for one policy key
///
/// All schedules share one length: the policy years from issue to maturity.
/// A rate set is `Send + Sync` and is shared read-only between workers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSet {
    key: PolicyKey,
    maturity_age: u8,
    cost_of_insurance: RateSchedule,
    per_unit_load: RateSchedule,
    corridor_factor: RateSchedule,
    premium_load: RateSchedule,
    policy_fee: RateSchedule,
    naar_discount: RateSchedule,
    interest: RateSchedule,
}

impl RateSet {
    /// Combine tabular schedules with the level product parameters
    ///
    /// `params` is validated here as well as in [`RateSetBuilder::new`].
    pub fn new(
        key: PolicyKey,
        params: &ProductParameters,
        cost_of_insurance: RateSchedule,
        per_unit_load: RateSchedule,
        corridor_factor: RateSchedule,
    ) -> Result<Self, ProjectionError> {
        params.validate()?;
        let years = params.projection_years(key.issue_age)?;

        for (kind, schedule) in [
            (RateKind::CostOfInsurance, &cost_of_insurance),
            (RateKind::PerUnitLoad, &per_unit_load),
            (RateKind::CorridorFactor, &corridor_factor),
        ] {
            if schedule.len() != years {
                return Err(ProjectionError::ScheduleLength {
                    kind,
                    expected: years,
                    found: schedule.len(),
                });
            }
        }

        Ok(Self {
            key,
            maturity_age: params.maturity_age,
            cost_of_insurance,
            per_unit_load,
            corridor_factor,
            premium_load: RateSchedule::filled(years, params.premium_load),
            policy_fee: RateSchedule::filled(years, params.annual_policy_fee),
            naar_discount: RateSchedule::filled(years, params.monthly_naar_discount()),
            interest: RateSchedule::filled(years, params.monthly_interest_rate()),
        })
    }

    /// Rate set with the same tabular rate in every year
    pub fn flat(
        key: PolicyKey,
        params: &ProductParameters,
        cost_of_insurance: f64,
        per_unit_load: f64,
        corridor_factor: f64,
    ) -> Result<Self, ProjectionError> {
        let years = params.projection_years(key.issue_age)?;
        Self::new(
            key,
            params,
            RateSchedule::filled(years, cost_of_insurance),
            RateSchedule::filled(years, per_unit_load),
            RateSchedule::filled(years, corridor_factor),
        )
    }

    pub fn key(&self) -> &PolicyKey {
        &self.key
    }

    pub fn issue_age(&self) -> u8 {
        self.key.issue_age
    }

    pub fn maturity_age(&self) -> u8 {
        self.maturity_age
    }

    /// Policy years from issue to maturity
    pub fn years(&self) -> usize {
        self.interest.len()
    }

    pub fn months(&self) -> u32 {
        self.years() as u32 * 12
    }

    pub fn schedule(&self, kind: RateKind) -> &RateSchedule {
        match kind {
            RateKind::CostOfInsurance => &self.cost_of_insurance,
            RateKind::PerUnitLoad => &self.per_unit_load,
            RateKind::CorridorFactor => &self.corridor_factor,
            RateKind::PremiumLoad => &self.premium_load,
            RateKind::PolicyFee => &self.policy_fee,
            RateKind::NaarDiscount => &self.naar_discount,
            RateKind::Interest => &self.interest,
        }
    }

    /// Rates for a 1-indexed policy year, `None` past maturity
    pub fn year(&self, policy_year: u32) -> Option<YearRates> {
        Some(YearRates {
            cost_of_insurance: self.cost_of_insurance.get(policy_year)?,
            per_unit_load: self.per_unit_load.get(policy_year)?,
            corridor_factor: self.corridor_factor.get(policy_year)?,
            premium_load: self.premium_load.get(policy_year)?,
            policy_fee: self.policy_fee.get(policy_year)?,
            naar_discount: self.naar_discount.get(policy_year)?,
            interest_rate: self.interest.get(policy_year)?,
        })
    }

    /// Rates for each policy year from issue to maturity
    pub fn iter_years(&self) -> impl Iterator<Item = YearRates> + '_ {
        (1..=self.years() as u32).filter_map(move |policy_year| self.year(policy_year))
    }
}

/// Builds rate sets from the three tables held in memory
#[derive(Debug, Clone)]
pub struct RateSetBuilder {
    cost_of_insurance: RateTable,
    per_unit_load: RateTable,
    corridor_factor: RateTable,
    params: ProductParameters,
}

impl RateSetBuilder {
    /// Combine already-scanned tables with product parameters
    pub fn new(
        cost_of_insurance: RateTable,
        per_unit_load: RateTable,
        corridor_factor: RateTable,
        params: ProductParameters,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        for (table, expected) in [
            (&cost_of_insurance, TableLayout::CostOfInsurance),
            (&per_unit_load, TableLayout::PerUnitLoad),
            (&corridor_factor, TableLayout::CorridorFactor),
        ] {
            if table.layout() != expected {
                return Err(ConfigError::WrongLayout {
                    table: table.name().to_string(),
                    expected: expected.name(),
                    found: table.layout().name(),
                });
            }
        }
        Ok(Self {
            cost_of_insurance,
            per_unit_load,
            corridor_factor,
            params,
        })
    }

    /// Scan all three tables from `sources`
    pub fn from_sources(sources: &RateSources, params: ProductParameters) -> Result<Self, ConfigError> {
        let load = |layout| RateTable::from_path(&sources.path_for(layout), layout);
        Self::new(
            load(TableLayout::CostOfInsurance)?,
            load(TableLayout::PerUnitLoad)?,
            load(TableLayout::CorridorFactor)?,
            params,
        )
    }

    /// Scan the tables in the default location (data/rates/) with default parameters
    pub fn from_default_sources() -> Result<Self, ConfigError> {
        Self::from_sources(&RateSources::default(), ProductParameters::default())
    }

    pub fn params(&self) -> &ProductParameters {
        &self.params
    }

    pub fn table(&self, layout: TableLayout) -> &RateTable {
        match layout {
            TableLayout::CostOfInsurance => &self.cost_of_insurance,
            TableLayout::PerUnitLoad => &self.per_unit_load,
            TableLayout::CorridorFactor => &self.corridor_factor,
        }
    }

    /// Build the rate set for an insured
    pub fn build(&self, gender: Gender, risk_class: RiskClass, issue_age: u8) -> Result<RateSet, ProjectionError> {
        self.build_key(&PolicyKey::new(gender, risk_class, issue_age))
    }

    pub fn build_key(&self, key: &PolicyKey) -> Result<RateSet, ProjectionError> {
        let years = self.params.projection_years(key.issue_age)?;

        let coi = self.cost_of_insurance.select(key, years);
        let unit = self.per_unit_load.select(key, years);
        let corridor = self.corridor_factor.select(key, years);

        debug!(
            "Built rate set for {}: {} years, {}/{}/{} rows matched, {} rejected",
            key,
            years,
            coi.matched_rows,
            unit.matched_rows,
            corridor.matched_rows,
            coi.out_of_range_rows + unit.out_of_range_rows + corridor.out_of_range_rows
        );

        RateSet::new(*key, &self.params, coi.schedule, unit.schedule, corridor.schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParameterError;
    use approx::assert_relative_eq;
    use std::path::Path;

    fn bundled_builder() -> RateSetBuilder {
        let sources = RateSources::in_dir(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_RATES_PATH));
        RateSetBuilder::from_sources(&sources, ProductParameters::default())
            .expect("Failed to load bundled rate tables")
    }

    #[test]
    fn test_rate_set_lengths_follow_issue_age() {
        let builder = bundled_builder();
        for issue_age in [1u8, 20, 35, 37, 80, 119, 120] {
            let rates = builder.build(Gender::Male, RiskClass::NonSmoker, issue_age).unwrap();
            let years = 121 - issue_age as usize;
            assert_eq!(rates.years(), years);
            for kind in RateKind::ALL {
                assert_eq!(rates.schedule(kind).len(), years, "{:?} at issue age {}", kind, issue_age);
            }
        }
    }

    #[test]
    fn test_defaults_for_keys_without_rows() {
        // Issue age 37 has no COI or unit load rows in the bundled tables
        let rates = bundled_builder().build(Gender::Female, RiskClass::Smoker, 37).unwrap();
        assert!(rates.schedule(RateKind::CostOfInsurance).iter().all(|r| r == 0.0));
        assert!(rates.schedule(RateKind::PerUnitLoad).iter().all(|r| r == 0.0));
        // Corridor applies by attained age regardless of issue age
        assert_eq!(rates.schedule(RateKind::CorridorFactor).get(1), Some(2.5));
    }

    #[test]
    fn test_constant_schedules_are_uniform() {
        let rates = bundled_builder().build(Gender::Male, RiskClass::NonSmoker, 35).unwrap();
        let params = ProductParameters::default();
        assert!(rates.schedule(RateKind::PremiumLoad).iter().all(|r| r == 0.06));
        assert!(rates.schedule(RateKind::PolicyFee).iter().all(|r| r == 120.0));
        assert!(rates
            .schedule(RateKind::Interest)
            .iter()
            .all(|r| r == params.monthly_interest_rate()));
        assert!(rates
            .schedule(RateKind::NaarDiscount)
            .iter()
            .all(|r| r == params.monthly_naar_discount()));
    }

    #[test]
    fn test_year_lookup_is_bounds_checked() {
        let rates = bundled_builder().build(Gender::Male, RiskClass::NonSmoker, 120).unwrap();
        assert_eq!(rates.months(), 12);
        assert!(rates.year(0).is_none());
        assert!(rates.year(2).is_none());

        let year = rates.year(1).unwrap();
        assert_relative_eq!(year.corridor_factor, 1.0);
        assert_relative_eq!(year.cost_of_insurance, 1000.0);
    }

    #[test]
    fn test_overridden_parameters_flow_into_rate_set() {
        let params = ProductParameters {
            premium_load: 0.08,
            annual_policy_fee: 60.0,
            maturity_age: 100,
            ..Default::default()
        };
        let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
        let rates = RateSet::flat(key, &params, 1.0, 0.0, 1.0).unwrap();
        assert_eq!(rates.years(), 65);
        assert_eq!(rates.year(1).unwrap().premium_load, 0.08);
        assert_eq!(rates.year(65).unwrap().policy_fee, 60.0);
    }

    #[test]
    fn test_schedule_length_mismatch_rejected() {
        let params = ProductParameters::default();
        let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
        let err = RateSet::new(
            key,
            &params,
            RateSchedule::filled(120, 0.0),
            RateSchedule::filled(86, 0.0),
            RateSchedule::filled(86, 1.0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProjectionError::ScheduleLength {
                kind: RateKind::CostOfInsurance,
                expected: 86,
                found: 120
            }
        );
    }

    #[test]
    fn test_direct_construction_validates_parameters() {
        let key = PolicyKey::new(Gender::Male, RiskClass::NonSmoker, 35);
        let nan_interest = ProductParameters {
            annual_interest_rate: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            RateSet::flat(key, &nan_interest, 1.0, 0.0, 1.0),
            Err(ProjectionError::Parameter(ParameterError { field: "annual_interest_rate", .. }))
        ));

        let full_load = ProductParameters {
            premium_load: 1.0,
            ..Default::default()
        };
        let err = RateSet::new(
            key,
            &full_load,
            RateSchedule::filled(86, 0.0),
            RateSchedule::filled(86, 0.0),
            RateSchedule::filled(86, 1.0),
        )
        .unwrap_err();
        assert!(matches!(err, ProjectionError::Parameter(ParameterError { field: "premium_load", .. })));
    }

    #[test]
    fn test_wrong_table_role_rejected() {
        let corridor = RateTable::from_reader("Attained_Age,Rate\n40,2.5\n".as_bytes(), "corridor", TableLayout::CorridorFactor).unwrap();
        let unit = RateTable::from_reader("Issue_Age,Policy_Year,Rate\n".as_bytes(), "unit", TableLayout::PerUnitLoad).unwrap();
        let result = RateSetBuilder::new(corridor.clone(), unit, corridor, ProductParameters::default());
        assert!(matches!(result, Err(ConfigError::WrongLayout { .. })));
    }
}
