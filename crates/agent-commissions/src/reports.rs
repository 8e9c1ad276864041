//! Report generation (CSV outputs, JSON export and console summary)
//!
//! Amounts stay unrounded in memory; every output (CSV, JSON, console) shows cents.

use anyhow::{Context, Result};
use csv::Writer;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::constants;
use crate::records::DepositType;
use crate::report::{CommissionReport, GroupTotal};

/// Generate all output files
pub fn generate_all_reports(output_dir: &Path, report: &CommissionReport) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    generate_commission_ledger(output_dir, report)?;
    generate_group_totals(output_dir, report)?;
    generate_bonus_ledger(output_dir, report)?;
    generate_agent_summary(output_dir, report)?;
    generate_json(output_dir, report)?;

    Ok(())
}

fn label(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Generate commission_ledger.csv
fn generate_commission_ledger(output_dir: &Path, report: &CommissionReport) -> Result<()> {
    let path = output_dir.join(constants::COMMISSION_LEDGER_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Date",
        "Period",
        "Agent",
        "Team",
        "Country",
        "Affiliate",
        "Source",
        "Id",
        "Type",
        "Amount_USD",
        "Sequence",
        "Cumulative_Volume_USD",
        "Rate",
        "Commission_USD",
    ])?;

    for r in &report.records {
        let d = &r.record;
        wtr.write_record([
            d.date.format("%Y-%m-%d").to_string().as_str(),
            &d.period().to_string(),
            label(&d.agent),
            label(&d.team),
            label(&d.country),
            label(&d.affiliate),
            label(&d.source),
            label(&d.id),
            d.deposit_type.code(),
            &format!("{:.2}", d.amount),
            &r.sequence_in_period.to_string(),
            &format!("{:.2}", r.cumulative_volume),
            &format!("{:.4}", r.commission_rate),
            &format!("{:.2}", r.commission_amount),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate commission_by_group.csv
fn generate_group_totals(output_dir: &Path, report: &CommissionReport) -> Result<()> {
    let path = output_dir.join(constants::COMMISSION_BY_GROUP_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Dimension", "Key", "Records", "Amount_USD", "Commission_USD"])?;

    let dimensions: [(&str, &[GroupTotal]); 5] = [
        ("agent", report.by_agent.as_slice()),
        ("country", report.by_country.as_slice()),
        ("team", report.by_team.as_slice()),
        ("affiliate", report.by_affiliate.as_slice()),
        ("date", report.by_date.as_slice()),
    ];

    for (dimension, groups) in dimensions {
        for group in groups {
            wtr.write_record([
                dimension,
                label(&group.key),
                &group.records.to_string(),
                &format!("{:.2}", group.amount),
                &format!("{:.2}", group.commission),
            ])?;
        }
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate bonus_ledger.csv
fn generate_bonus_ledger(output_dir: &Path, report: &CommissionReport) -> Result<()> {
    let path = output_dir.join(constants::BONUS_LEDGER_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Agent",
        "Year",
        "Month",
        "Week",
        "Deposits",
        "Weekly_Bonus_USD",
        "Accumulated_Bonus_USD",
    ])?;

    for entry in &report.bonus_ledger.entries {
        wtr.write_record([
            label(&entry.agent),
            &entry.year.to_string(),
            &entry.month.to_string(),
            &entry.week.to_string(),
            &entry.deposits.to_string(),
            &format!("{:.2}", entry.weekly_bonus),
            &format!("{:.2}", entry.accumulated_bonus),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate agent_summary.csv
fn generate_agent_summary(output_dir: &Path, report: &CommissionReport) -> Result<()> {
    let path = output_dir.join(constants::AGENT_SUMMARY_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Agent",
        "First_Deposits",
        "Return_Deposits",
        "Amount_USD",
        "Commission_USD",
        "Bonus_USD",
        "Total_USD",
    ])?;

    for agent in &report.agents {
        wtr.write_record([
            label(&agent.agent),
            &agent.first_deposits.to_string(),
            &agent.return_deposits.to_string(),
            &format!("{:.2}", agent.amount),
            &format!("{:.2}", agent.commission),
            &format!("{:.2}", agent.bonus),
            &format!("{:.2}", agent.commission + agent.bonus),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate commission_report.json
fn generate_json(output_dir: &Path, report: &CommissionReport) -> Result<()> {
    let path = output_dir.join(constants::REPORT_JSON_FILENAME);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  Generated: {}", path.display());

    Ok(())
}

// =============================================================================
// Console
// =============================================================================

#[derive(Tabled)]
struct AgentLine {
    #[tabled(rename = "Agent")]
    agent: String,
    #[tabled(rename = "FTD")]
    first_deposits: usize,
    #[tabled(rename = "RTN")]
    return_deposits: usize,
    #[tabled(rename = "Amount (USD)")]
    amount: String,
    #[tabled(rename = "Commission (USD)")]
    commission: String,
    #[tabled(rename = "Bonus (USD)")]
    bonus: String,
}

/// Per-agent table as printed on the console
pub fn agent_table(report: &CommissionReport) -> String {
    let lines = report.agents.iter().map(|a| AgentLine {
        agent: a.agent.clone().unwrap_or_else(|| "(none)".to_string()),
        first_deposits: a.first_deposits,
        return_deposits: a.return_deposits,
        amount: format!("{:.2}", a.amount),
        commission: format!("{:.2}", a.commission),
        bonus: format!("{:.2}", a.bonus),
    });

    Table::new(lines).with(Style::rounded()).to_string()
}

/// Deposit counts by type, one console line each
pub fn deposit_counts(report: &CommissionReport) -> String {
    [
        (DepositType::FirstDeposit, report.first_deposits),
        (DepositType::ReturnDeposit, report.return_deposits),
    ]
    .iter()
    .map(|(deposit_type, count)| format!("  {:<22}{:>12}", format!("{}s:", deposit_type), count))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Print summary to console
pub fn print_summary(report: &CommissionReport) {
    println!("\n============================================================");
    println!("                  COMMISSION SUMMARY");
    println!("============================================================\n");

    if report.is_empty() {
        println!("  No deposits match the current filters.");
        println!("\n============================================================\n");
        return;
    }

    println!("DEPOSITS");
    println!("{}", deposit_counts(report));
    println!("  Total amount:         ${:>11.2}", report.total_amount);

    println!("\nCOMMISSION");
    println!("  Total commission:     ${:>11.2}", report.total_commission);
    println!("  Effective rate:       {:>11.2}%", report.effective_rate * 100.0);

    println!(
        "\nWEEKLY BONUS ({} schedule, {:.2}/USD)",
        report.bonus_schedule, report.exchange_rate
    );
    println!("  Agents with bonus:    {:>12}", report.agent_bonuses.len());
    println!("  Total bonus:          ${:>11.2}", report.total_bonus);

    println!("\nBY AGENT");
    println!("{}", agent_table(report));

    println!("\n============================================================\n");
}
