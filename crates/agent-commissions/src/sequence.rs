//! Per-agent, per-month sale numbering

use crate::records::{DepositRecord, Period};

/// A record paired with its 1-based position within (agent, month)
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced {
    pub record: DepositRecord,
    pub sequence_in_period: u32,
}

/// Sort by (agent, date) and number each agent's records within each month.
///
/// The sort is stable, so records sharing agent and date keep their input order.
pub fn assign_sequences(records: &[DepositRecord]) -> Vec<Sequenced> {
    let mut sorted: Vec<&DepositRecord> = records.iter().collect();
    sorted.sort_by(|a, b| (&a.agent, a.date).cmp(&(&b.agent, b.date)));

    let mut result = Vec::with_capacity(sorted.len());
    let mut current: Option<(&Option<String>, Period)> = None;
    let mut counter = 0u32;

    for record in sorted {
        let key = (&record.agent, record.period());
        if current != Some(key) {
            current = Some(key);
            counter = 0;
        }
        counter += 1;

        result.push(Sequenced {
            record: record.clone(),
            sequence_in_period: counter,
        });
    }

    result
}
