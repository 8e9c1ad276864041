//! Canonical deposit records and their enriched form

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// A source row keyed by its (already reconciled) column names
pub type RawRecord = BTreeMap<String, String>;

/// A source table exactly as read: header row plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Table name (file stem or database table)
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Type implied by the table name, used when rows carry no type column
    pub deposit_type: Option<DepositType>,
}

/// Deposit transaction type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositType {
    #[default]
    FirstDeposit,
    ReturnDeposit,
}

impl DepositType {
    /// Interpret a free-text type label. Unknown labels yield None.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "ftd" | "ftds" | "first" | "first_deposit" => Some(DepositType::FirstDeposit),
            "rtn" | "return" | "return_deposit" | "retention" | "redeposit" => {
                Some(DepositType::ReturnDeposit)
            }
            _ => None,
        }
    }

    /// Short code used in the master table
    pub fn code(&self) -> &'static str {
        match self {
            DepositType::FirstDeposit => "FTD",
            DepositType::ReturnDeposit => "RTN",
        }
    }
}

impl std::fmt::Display for DepositType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositType::FirstDeposit => write!(f, "First Deposit"),
            DepositType::ReturnDeposit => write!(f, "Return Deposit"),
        }
    }
}

/// Calendar month used as the reset boundary for sequences and volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Normalized deposit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub date: NaiveDate,
    pub agent: Option<String>,
    pub team: Option<String>,
    pub country: Option<String>,
    pub affiliate: Option<String>,
    pub source: Option<String>,
    pub id: Option<String>,
    /// USD, never negative
    pub amount: f64,
    pub deposit_type: DepositType,
}

impl DepositRecord {
    pub fn period(&self) -> Period {
        Period::of(self.date)
    }
}

/// Round a USD amount to cents
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serialize a USD amount rounded to cents; calculations keep full precision
pub fn serialize_cents<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_cents(*value))
}

/// Deposit record with its sequence number and commission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionRecord {
    #[serde(flatten)]
    pub record: DepositRecord,
    pub sequence_in_period: u32,
    /// Running RETURN_DEPOSIT volume for (agent, month), inclusive. Zero for first deposits.
    #[serde(serialize_with = "serialize_cents")]
    pub cumulative_volume: f64,
    pub commission_rate: f64,
    #[serde(serialize_with = "serialize_cents")]
    pub commission_amount: f64,
}

/// Column order of the master table (database and CSV preview)
pub const MASTER_COLUMNS: [&str; 10] = [
    "date",
    "id",
    "team",
    "agent",
    "country",
    "affiliate",
    "amount",
    "deposit_type",
    "month_name",
    "source",
];

/// One row of the cleaned master table
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRow {
    pub record: DepositRecord,
    /// Period tag of the source table (e.g. "Sep", "PGY")
    pub month_name: String,
}

impl MasterRow {
    /// Text values in `MASTER_COLUMNS` order; nulls are empty strings
    pub fn to_fields(&self) -> [String; 10] {
        let r = &self.record;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        [
            r.date.format("%Y-%m-%d").to_string(),
            text(&r.id),
            text(&r.team),
            text(&r.agent),
            text(&r.country),
            text(&r.affiliate),
            r.amount.to_string(),
            r.deposit_type.code().to_string(),
            self.month_name.clone(),
            text(&r.source),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_type_labels() {
        assert_eq!(DepositType::from_label("FTD"), Some(DepositType::FirstDeposit));
        assert_eq!(DepositType::from_label(" first deposit "), Some(DepositType::FirstDeposit));
        assert_eq!(DepositType::from_label("Return-Deposit"), Some(DepositType::ReturnDeposit));
        assert_eq!(DepositType::from_label("rtn"), Some(DepositType::ReturnDeposit));
        assert_eq!(DepositType::from_label("withdrawal"), None);
        assert_eq!(DepositType::default(), DepositType::FirstDeposit);
    }

    #[test]
    fn test_master_row_fields() {
        let row = MasterRow {
            record: DepositRecord {
                date: NaiveDate::from_ymd_opt(2025, 9, 3).unwrap(),
                agent: Some("Ana".to_string()),
                team: None,
                country: Some("Mexico".to_string()),
                affiliate: None,
                source: None,
                id: Some("77".to_string()),
                amount: 1234.5,
                deposit_type: DepositType::ReturnDeposit,
            },
            month_name: "Sep".to_string(),
        };
        assert_eq!(
            row.to_fields(),
            [
                "2025-09-03", "77", "", "Ana", "Mexico", "", "1234.5", "RTN", "Sep", ""
            ]
            .map(String::from)
        );
    }

    #[test]
    fn test_period_display_and_order() {
        let sep = Period::of(NaiveDate::from_ymd_opt(2025, 9, 30).unwrap());
        let oct = Period::of(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(sep.to_string(), "2025-09");
        assert!(sep < oct);
    }
}
