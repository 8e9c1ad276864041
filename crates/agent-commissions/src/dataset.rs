//! Immutable canonical record set and its shared handle
//!
//! A dataset is built once from raw tables and never mutated. Reloading
//! builds a new dataset and swaps it in whole, so readers holding a
//! snapshot keep a consistent view.

use std::sync::{Arc, PoisonError, RwLock};

use crate::normalizer;
use crate::records::{DepositRecord, RawTable};

/// Canonical records loaded for one run
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Arc<[DepositRecord]>,
    dropped: usize,
}

impl Dataset {
    /// Normalize every table and keep the rows with a usable date
    pub fn from_tables(tables: impl IntoIterator<Item = RawTable>) -> Self {
        let mut records = Vec::new();
        let mut dropped = 0;
        for table in tables {
            let normalized = normalizer::normalize_table(table);
            records.extend(normalized.records);
            dropped += normalized.dropped;
        }
        Self {
            records: records.into(),
            dropped,
        }
    }

    #[allow(dead_code)]
    pub fn from_records(records: Vec<DepositRecord>) -> Self {
        Self {
            records: records.into(),
            dropped: 0,
        }
    }

    pub fn records(&self) -> &[DepositRecord] {
        &self.records
    }

    /// Rows excluded for an unparseable date
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct agents with record counts, in name order (null first)
    pub fn agents(&self) -> Vec<(Option<String>, usize)> {
        let mut counts: std::collections::BTreeMap<Option<String>, usize> = Default::default();
        for record in self.records.iter() {
            *counts.entry(record.agent.clone()).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }
}

/// Current dataset shared between report requests
#[derive(Debug, Default)]
pub struct SharedDataset {
    current: RwLock<Arc<Dataset>>,
}

impl SharedDataset {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
        }
    }

    /// The dataset as of now; unaffected by later reloads
    pub fn snapshot(&self) -> Arc<Dataset> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a freshly built dataset, returning the previous one
    #[allow(dead_code)]
    pub fn replace(&self, dataset: Dataset) -> Arc<Dataset> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DepositType;

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable {
            name: "ftds_sep".to_string(),
            headers: vec!["fecha".into(), "agente".into(), "monto".into()],
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            deposit_type: Some(DepositType::FirstDeposit),
        }
    }

    #[test]
    fn test_from_tables_counts_dropped() {
        let dataset = Dataset::from_tables(vec![
            table(&[&["01/09/2025", "ana", "100"], &["??", "ana", "5"]]),
            table(&[&["2025-09-02", "bob", "1,50"]]),
        ]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dropped(), 1);
        assert_eq!(dataset.records()[1].amount, 1.5);
    }

    #[test]
    fn test_agents_listing() {
        let dataset = Dataset::from_tables(vec![table(&[
            &["01/09/2025", "bob", "1"],
            &["02/09/2025", "ana", "1"],
            &["03/09/2025", "bob", "1"],
            &["04/09/2025", "nan", "1"],
        ])]);
        assert_eq!(
            dataset.agents(),
            vec![
                (None, 1),
                (Some("Ana".to_string()), 1),
                (Some("Bob".to_string()), 2)
            ]
        );
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let dataset = Dataset::from_tables(vec![table(&[&["01/09/2025", "ana", "1"]])]);
        let shared = SharedDataset::new(dataset);
        let before = shared.snapshot();

        let previous = shared.replace(Dataset::default());
        assert_eq!(before.len(), 1);
        assert_eq!(previous.len(), 1);
        assert!(shared.snapshot().is_empty());
    }

    #[test]
    fn test_concurrent_readers_see_whole_datasets() {
        let shared = Arc::new(SharedDataset::new(Dataset::default()));
        let full = Dataset::from_tables(vec![table(&[
            &["01/09/2025", "ana", "1"],
            &["02/09/2025", "ana", "1"],
            &["03/09/2025", "ana", "1"],
        ])]);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let len = shared.snapshot().len();
                        assert!(len == 0 || len == 3);
                    }
                })
            })
            .collect();

        shared.replace(full);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.snapshot().len(), 3);
    }
}
