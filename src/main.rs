//! UL Illustration CLI
//!
//! Projects and solves the reference policy against the bundled rate tables

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use ul_illustration::{Gender, PremiumSolver, ProjectionEngine, RateSetBuilder, RiskClass};

fn main() -> Result<()> {
    env_logger::init();

    println!("UL Illustration v0.1.0");
    println!("======================\n");
    println!("Start");
    let start = Instant::now();

    let builder = RateSetBuilder::from_default_sources().context("Failed to load rate tables from data/rates")?;

    let issue_age = 35;
    let face_amount = 100_000.0;
    let annual_premium = 1_255.03;
    let rates = builder.build(Gender::Male, RiskClass::NonSmoker, issue_age)?;

    println!("Policy: {}", rates.key());
    println!("  Face Amount: ${:.2}", face_amount);
    println!("  Annual Premium: ${:.2}", annual_premium);
    println!("  Maturity Age: {}", rates.maturity_age());
    println!();

    let engine = ProjectionEngine::new(&rates);
    let illustration = engine.illustrate(face_amount, annual_premium)?;

    println!("Projection Results ({} months):", illustration.rows.len());
    println!(
        "{:>5} {:>4} {:>4} {:>14} {:>10} {:>10} {:>14} {:>10} {:>10} {:>14}",
        "Month", "PY", "MiPY", "Value Start", "Premium", "Expense", "NAAR", "COI", "Interest", "Value End"
    );
    println!("{}", "-".repeat(112));

    for row in illustration.rows.iter().take(24) {
        println!(
            "{:>5} {:>4} {:>4} {:>14.2} {:>10.2} {:>10.2} {:>14.2} {:>10.2} {:>10.2} {:>14.2}",
            row.policy_month,
            row.policy_year,
            row.month_in_policy_year,
            row.value_start,
            row.premium,
            row.expense_charge,
            row.naar,
            row.coi_charge,
            row.interest,
            row.value_end,
        );
    }

    if illustration.rows.len() > 24 {
        println!("... ({} more months)", illustration.rows.len() - 24);
    }

    let csv_path = "illustration_output.csv";
    illustration
        .write_csv_path(Path::new(csv_path))
        .with_context(|| format!("Unable to write {}", csv_path))?;
    println!("\nFull results written to: {}", csv_path);

    let summary = illustration.summary();
    println!("\nSummary:");
    println!("  Total Months: {}", summary.total_months);
    println!("  Total Premium: ${:.2}", summary.total_premium);
    println!("  Total COI: ${:.2}", summary.total_coi);
    println!("  Total Interest: ${:.2}", summary.total_interest);
    match summary.lapse_month {
        Some(month) => println!("  Lapses In Month: {}", month),
        None => println!("  In Force To Maturity"),
    }

    println!("\nEnding Account Value: {:.2}", engine.project(face_amount, annual_premium)?);

    let solution = PremiumSolver::new(&rates).solve(face_amount)?;
    println!("Solved Premium: {:.2}", solution.premium);
    println!(
        "  ({} doublings, {} bisections, {} projections)",
        solution.bracket_doublings, solution.bisection_iterations, solution.evaluations
    );
    println!(
        "Ending Account Value At Solved Premium: {:.2}",
        engine.project(face_amount, solution.premium)?
    );

    println!("\nElapsed: {:?}", start.elapsed());
    println!("End");
    Ok(())
}
