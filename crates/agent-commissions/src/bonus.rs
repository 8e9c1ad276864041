//! Weekly deposit-count bonus
//!
//! Deposits are bucketed per agent into weeks of the month. Each week's
//! count maps to a bonus in local currency (converted to USD) or, at the
//! top tier, a flat USD amount. Weeks are then folded chronologically into
//! a running total per agent.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::records::{DepositRecord, DepositType, serialize_cents};

/// Flat USD bonus for a 15+ deposit week (current schedule only)
pub const TOP_TIER_FLAT_USD: f64 = 150.0;
pub const TOP_TIER_MIN_DEPOSITS: usize = 15;

/// Local-currency bonuses, converted with the exchange rate
pub const HIGH_TIER_LOCAL: f64 = 1500.0;
pub const MID_TIER_LOCAL: f64 = 1000.0;
pub const LOW_TIER_LOCAL: f64 = 500.0;

/// Bonus schedule variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BonusSchedule {
    /// 15+ deposits pay a flat USD amount
    #[default]
    Current,
    /// Historical schedule, tops out at the 5+ tier
    Legacy,
}

impl BonusSchedule {
    /// Bonus in USD for a week with `deposits` deposits
    pub fn weekly_bonus(&self, deposits: usize, exchange_rate: f64) -> f64 {
        match (self, deposits) {
            (BonusSchedule::Current, n) if n >= TOP_TIER_MIN_DEPOSITS => TOP_TIER_FLAT_USD,
            (_, n) if n >= 5 => HIGH_TIER_LOCAL / exchange_rate,
            (_, 4) => MID_TIER_LOCAL / exchange_rate,
            (_, 2..=3) => LOW_TIER_LOCAL / exchange_rate,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for BonusSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BonusSchedule::Current => write!(f, "current"),
            BonusSchedule::Legacy => write!(f, "legacy"),
        }
    }
}

/// Which deposits count toward the weekly bonus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BonusCounts {
    #[default]
    FirstDeposits,
    All,
}

impl BonusCounts {
    fn counts(&self, deposit_type: DepositType) -> bool {
        match self {
            BonusCounts::FirstDeposits => deposit_type == DepositType::FirstDeposit,
            BonusCounts::All => true,
        }
    }
}

/// Parameters of a bonus run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonusSettings {
    /// Local currency units per USD
    pub exchange_rate: f64,
    pub schedule: BonusSchedule,
    pub counts: BonusCounts,
}

/// 1-based week of the month, weeks starting on Monday
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first_weekday = date
        .with_day(1)
        .map_or(0, |first| first.weekday().num_days_from_monday());
    (date.day() + first_weekday - 1) / 7 + 1
}

/// One agent-week of the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusLedgerEntry {
    pub agent: Option<String>,
    pub year: i32,
    pub month: u32,
    pub week: u32,
    pub deposits: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub weekly_bonus: f64,
    /// Running total for the agent through this week
    #[serde(serialize_with = "serialize_cents")]
    pub accumulated_bonus: f64,
}

/// Per-agent bonus total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentBonus {
    pub agent: Option<String>,
    pub weeks: usize,
    pub deposits: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub total_bonus: f64,
}

/// Weekly bonus ledger, ordered by agent then chronologically
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BonusLedger {
    pub entries: Vec<BonusLedgerEntry>,
}

type WeekKey = (Option<String>, i32, u32, u32);

/// Bucket deposits into agent-weeks and fold each agent's weeks in order
pub fn build_ledger<'a>(
    records: impl IntoIterator<Item = &'a DepositRecord>,
    settings: &BonusSettings,
) -> BonusLedger {
    let mut weeks: BTreeMap<WeekKey, usize> = BTreeMap::new();
    for record in records {
        if !settings.counts.counts(record.deposit_type) {
            continue;
        }
        let key = (
            record.agent.clone(),
            record.date.year(),
            record.date.month(),
            week_of_month(record.date),
        );
        *weeks.entry(key).or_insert(0) += 1;
    }

    let mut entries = Vec::with_capacity(weeks.len());
    let mut current_agent: Option<Option<String>> = None;
    let mut accumulated = 0.0;

    for ((agent, year, month, week), deposits) in weeks {
        if current_agent.as_ref() != Some(&agent) {
            current_agent = Some(agent.clone());
            accumulated = 0.0;
        }
        let weekly_bonus = settings.schedule.weekly_bonus(deposits, settings.exchange_rate);
        accumulated += weekly_bonus;

        entries.push(BonusLedgerEntry {
            agent,
            year,
            month,
            week,
            deposits,
            weekly_bonus,
            accumulated_bonus: accumulated,
        });
    }

    BonusLedger { entries }
}

impl BonusLedger {
    /// Total per agent, in agent order
    pub fn agent_totals(&self) -> Vec<AgentBonus> {
        let mut totals: Vec<AgentBonus> = Vec::new();
        for entry in &self.entries {
            match totals.last_mut() {
                Some(last) if last.agent == entry.agent => {
                    last.weeks += 1;
                    last.deposits += entry.deposits;
                    last.total_bonus = entry.accumulated_bonus;
                }
                _ => totals.push(AgentBonus {
                    agent: entry.agent.clone(),
                    weeks: 1,
                    deposits: entry.deposits,
                    total_bonus: entry.accumulated_bonus,
                }),
            }
        }
        totals
    }

    /// Sum of all agents' bonuses
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.weekly_bonus).sum()
    }
}
