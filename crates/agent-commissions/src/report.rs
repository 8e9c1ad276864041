//! Calculation pipeline: dataset + configuration -> commission report
//!
//! Commissions are computed over the whole dataset before filtering, so a
//! narrower agent or date filter never renumbers anyone's sales. The bonus
//! ledger is built from the filtered records only.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::bonus::{self, AgentBonus, BonusLedger, BonusSchedule};
use crate::commission;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::records::{CommissionRecord, DepositType, serialize_cents};

/// Commission summed over one grouping key (null is its own bucket)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: Option<String>,
    pub records: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub amount: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub commission: f64,
}

/// Everything reported for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentSummary {
    pub agent: Option<String>,
    pub first_deposits: usize,
    pub return_deposits: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub amount: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub commission: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub bonus: f64,
}

/// Result of one calculation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommissionReport {
    pub exchange_rate: f64,
    pub bonus_schedule: BonusSchedule,
    /// Filtered enriched records in (agent, date) order
    pub records: Vec<CommissionRecord>,
    pub first_deposits: usize,
    pub return_deposits: usize,
    #[serde(serialize_with = "serialize_cents")]
    pub total_amount: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub total_commission: f64,
    /// Commission over amount; 0 when nothing was deposited
    pub effective_rate: f64,
    pub by_agent: Vec<GroupTotal>,
    pub by_country: Vec<GroupTotal>,
    pub by_team: Vec<GroupTotal>,
    pub by_affiliate: Vec<GroupTotal>,
    pub by_date: Vec<GroupTotal>,
    pub bonus_ledger: BonusLedger,
    pub agent_bonuses: Vec<AgentBonus>,
    /// Plain sum of per-agent bonuses
    #[serde(serialize_with = "serialize_cents")]
    pub total_bonus: f64,
    pub agents: Vec<AgentSummary>,
}

impl CommissionReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn group_by<F>(records: &[CommissionRecord], key: F) -> Vec<GroupTotal>
where
    F: Fn(&CommissionRecord) -> Option<String>,
{
    let mut groups: BTreeMap<Option<String>, GroupTotal> = BTreeMap::new();
    for record in records {
        let k = key(record);
        let group = groups.entry(k.clone()).or_insert_with(|| GroupTotal {
            key: k,
            ..Default::default()
        });
        group.records += 1;
        group.amount += record.record.amount;
        group.commission += record.commission_amount;
    }
    groups.into_values().collect()
}

fn summarize_agents(records: &[CommissionRecord], bonuses: &[AgentBonus]) -> Vec<AgentSummary> {
    let mut agents: BTreeMap<Option<String>, AgentSummary> = BTreeMap::new();

    for record in records {
        let agent = record.record.agent.clone();
        let summary = agents.entry(agent.clone()).or_insert_with(|| AgentSummary {
            agent,
            ..Default::default()
        });
        match record.record.deposit_type {
            DepositType::FirstDeposit => summary.first_deposits += 1,
            DepositType::ReturnDeposit => summary.return_deposits += 1,
        }
        summary.amount += record.record.amount;
        summary.commission += record.commission_amount;
    }

    for bonus in bonuses {
        if let Some(summary) = agents.get_mut(&bonus.agent) {
            summary.bonus = bonus.total_bonus;
        }
    }

    agents.into_values().collect()
}

/// Run the whole calculation for one configuration
pub fn compute(dataset: &Dataset, config: &Config) -> CommissionReport {
    let records: Vec<CommissionRecord> = commission::calculate_commissions(dataset.records())
        .into_iter()
        .filter(|r| config.period.contains(r.record.date))
        .filter(|r| config.matches_agent(r.record.agent.as_deref()))
        .collect();

    let total_amount: f64 = records.iter().map(|r| r.record.amount).sum();
    let total_commission = commission::total_commission(&records);
    let effective_rate = if total_amount > 0.0 {
        total_commission / total_amount
    } else {
        0.0
    };

    let first_deposits = records
        .iter()
        .filter(|r| r.record.deposit_type == DepositType::FirstDeposit)
        .count();

    let bonus_ledger =
        bonus::build_ledger(records.iter().map(|r| &r.record), &config.bonus_settings());
    let agent_bonuses = bonus_ledger.agent_totals();
    let total_bonus = bonus_ledger.total();

    CommissionReport {
        exchange_rate: config.exchange_rate,
        bonus_schedule: config.bonus_schedule,
        first_deposits,
        return_deposits: records.len() - first_deposits,
        total_amount,
        total_commission,
        effective_rate,
        by_agent: group_by(&records, |r| r.record.agent.clone()),
        by_country: group_by(&records, |r| r.record.country.clone()),
        by_team: group_by(&records, |r| r.record.team.clone()),
        by_affiliate: group_by(&records, |r| r.record.affiliate.clone()),
        by_date: group_by(&records, |r| Some(r.record.date.format("%Y-%m-%d").to_string())),
        agents: summarize_agents(&records, &agent_bonuses),
        bonus_ledger,
        agent_bonuses,
        total_bonus,
        records,
    }
}
