//! Progressive commission tiers
//!
//! First deposits are paid by how many sales the agent has made so far in
//! the month. Return deposits are paid by the agent's cumulative return
//! volume in the month, including the deposit being priced.

use std::collections::HashMap;

use crate::records::{CommissionRecord, DepositRecord, DepositType, Period};
use crate::sequence::assign_sequences;

/// First-deposit tiers: (lowest sequence number, rate), ascending
const FIRST_DEPOSIT_TIERS: [(u32, f64); 6] = [
    (1, 0.10),
    (4, 0.17),
    (8, 0.19),
    (13, 0.22),
    (18, 0.25),
    (22, 0.30),
];

/// Return-deposit tiers: (cumulative USD ceiling, rate), ascending
const RETURN_DEPOSIT_TIERS: [(f64, f64); 5] = [
    (25_000.0, 0.05),
    (50_000.0, 0.06),
    (75_000.0, 0.075),
    (101_000.0, 0.09),
    (151_000.0, 0.10),
];

/// Rate above the last return-deposit ceiling
const RETURN_DEPOSIT_TOP_RATE: f64 = 0.12;

/// Commission rate for the n-th first deposit of the month (0 for n < 1)
pub fn first_deposit_rate(sequence: u32) -> f64 {
    FIRST_DEPOSIT_TIERS
        .iter()
        .rev()
        .find(|(floor, _)| sequence >= *floor)
        .map_or(0.0, |(_, rate)| *rate)
}

/// Commission rate for a return deposit given the month's cumulative volume
pub fn return_deposit_rate(cumulative_usd: f64) -> f64 {
    RETURN_DEPOSIT_TIERS
        .iter()
        .find(|(ceiling, _)| cumulative_usd <= *ceiling)
        .map_or(RETURN_DEPOSIT_TOP_RATE, |(_, rate)| *rate)
}

/// Number, price and pay every record.
///
/// Output is in (agent, date) order. Running volumes are rebuilt from the
/// sorted input each call.
pub fn calculate_commissions(records: &[DepositRecord]) -> Vec<CommissionRecord> {
    let mut volume: HashMap<(Option<String>, Period), f64> = HashMap::new();

    assign_sequences(records)
        .into_iter()
        .map(|sequenced| {
            let record = sequenced.record;
            let (cumulative_volume, commission_rate) = match record.deposit_type {
                DepositType::FirstDeposit => {
                    (0.0, first_deposit_rate(sequenced.sequence_in_period))
                }
                DepositType::ReturnDeposit => {
                    let running = volume
                        .entry((record.agent.clone(), record.period()))
                        .or_insert(0.0);
                    *running += record.amount;
                    (*running, return_deposit_rate(*running))
                }
            };

            CommissionRecord {
                commission_amount: record.amount * commission_rate,
                record,
                sequence_in_period: sequenced.sequence_in_period,
                cumulative_volume,
                commission_rate,
            }
        })
        .collect()
}

/// Sum of commission amounts
pub fn total_commission(records: &[CommissionRecord]) -> f64 {
    records.iter().map(|r| r.commission_amount).sum()
}
