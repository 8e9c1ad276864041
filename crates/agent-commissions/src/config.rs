//! Configuration for the commission calculator

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::bonus::{BonusCounts, BonusSchedule, BonusSettings};
use crate::constants;
use crate::normalizer;

// =============================================================================
// File-based Configuration (config.toml)
// =============================================================================

/// Configuration loaded from config.toml. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub commission: CommissionSection,
    pub filters: FilterSection,
    pub ingest: IngestSection,
}

/// Commission and bonus parameters
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommissionSection {
    /// Local currency units per USD
    pub exchange_rate: f64,
    pub bonus_schedule: BonusSchedule,
    pub bonus_counts: BonusCounts,
}

impl Default for CommissionSection {
    fn default() -> Self {
        Self {
            exchange_rate: constants::DEFAULT_EXCHANGE_RATE,
            bonus_schedule: BonusSchedule::default(),
            bonus_counts: BonusCounts::default(),
        }
    }
}

/// Record filters
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub agents: Vec<String>,
}

/// Ingest options
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// Period tag for tables whose name has no month
    pub default_month_tag: String,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            default_month_tag: constants::DEFAULT_MONTH_TAG.to_string(),
        }
    }
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).with_context(|| {
            "Failed to parse config.toml. Check for:\n\
             - Invalid TOML syntax (missing quotes, brackets, etc.)\n\
             - Incorrect data types (exchange_rate must be a number)\n\
             - Unknown bonus_schedule (use \"current\" or \"legacy\")\n\n\
             See config.toml.example for the expected format."
        })
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Configuration problems that stop a run before any calculation
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Exchange rate must be a positive number, got {0}")]
    InvalidExchangeRate(f64),

    #[error("Invalid {field} '{value}': expected YYYY-MM-DD or DD/MM/YYYY")]
    InvalidDate { field: &'static str, value: String },

    #[error("Start date {start} is after end date {end}")]
    InvertedPeriod { start: NaiveDate, end: NaiveDate },
}

/// Command-line values that take precedence over config.toml
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub exchange_rate: Option<f64>,
    pub bonus_schedule: Option<BonusSchedule>,
    pub bonus_counts: Option<BonusCounts>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub agents: Vec<String>,
}

/// Inclusive date range; open ends match everything
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PeriodFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PeriodFilter {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Validated run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Local currency units per USD (always > 0)
    pub exchange_rate: f64,
    pub bonus_schedule: BonusSchedule,
    pub bonus_counts: BonusCounts,
    pub period: PeriodFilter,
    /// Agents to keep, in normalized form. Empty keeps everyone.
    pub agents: Vec<String>,
    pub default_month_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange_rate: constants::DEFAULT_EXCHANGE_RATE,
            bonus_schedule: BonusSchedule::default(),
            bonus_counts: BonusCounts::default(),
            period: PeriodFilter::default(),
            agents: Vec::new(),
            default_month_tag: constants::DEFAULT_MONTH_TAG.to_string(),
        }
    }
}

fn parse_filter_date(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, ConfigError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => normalizer::parse_date(v)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidDate {
                field,
                value: v.to_string(),
            }),
    }
}

impl Config {
    /// Merge file config with command-line overrides and validate
    pub fn from_file(file_config: &FileConfig, overrides: &Overrides) -> Result<Self, ConfigError> {
        let commission = &file_config.commission;
        let filters = &file_config.filters;

        let exchange_rate = overrides.exchange_rate.unwrap_or(commission.exchange_rate);
        if !exchange_rate.is_finite() || exchange_rate <= 0.0 {
            return Err(ConfigError::InvalidExchangeRate(exchange_rate));
        }

        let start = parse_filter_date(
            "start_date",
            overrides.start_date.as_deref().or(filters.start_date.as_deref()),
        )?;
        let end = parse_filter_date(
            "end_date",
            overrides.end_date.as_deref().or(filters.end_date.as_deref()),
        )?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ConfigError::InvertedPeriod { start, end });
            }
        }

        // Command-line agents replace the file list rather than extending it
        let agent_source = if overrides.agents.is_empty() {
            &filters.agents
        } else {
            &overrides.agents
        };
        let agents = agent_source
            .iter()
            .filter_map(|a| normalizer::clean_text(a))
            .collect();

        Ok(Self {
            exchange_rate,
            bonus_schedule: overrides.bonus_schedule.unwrap_or(commission.bonus_schedule),
            bonus_counts: overrides.bonus_counts.unwrap_or(commission.bonus_counts),
            period: PeriodFilter { start, end },
            agents,
            default_month_tag: file_config.ingest.default_month_tag.clone(),
        })
    }

    /// Whether a record's agent passes the agent filter
    pub fn matches_agent(&self, agent: Option<&str>) -> bool {
        if self.agents.is_empty() {
            return true;
        }
        agent.is_some_and(|a| self.agents.iter().any(|f| f.to_lowercase() == a.to_lowercase()))
    }

    pub fn bonus_settings(&self) -> BonusSettings {
        BonusSettings {
            exchange_rate: self.exchange_rate,
            schedule: self.bonus_schedule,
            counts: self.bonus_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::from_file(&FileConfig::default(), &Overrides::default()).unwrap();
        assert_eq!(config.exchange_rate, 18.19);
        assert_eq!(config.bonus_schedule, BonusSchedule::Current);
        assert_eq!(config.bonus_counts, BonusCounts::FirstDeposits);
        assert!(config.period.is_open());
        assert!(config.agents.is_empty());
        assert_eq!(config.default_month_tag, "PGY");
    }

    #[test]
    fn test_parse_full_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [commission]
            exchange_rate = 17.5
            bonus_schedule = "legacy"
            bonus_counts = "all"

            [filters]
            start_date = "2025-09-01"
            end_date = "30/11/2025"
            agents = ["maria lopez", "  "]

            [ingest]
            default_month_tag = "Q4"
            "#,
        )
        .unwrap();
        let config = Config::from_file(&file, &Overrides::default()).unwrap();
        assert_eq!(config.exchange_rate, 17.5);
        assert_eq!(config.bonus_schedule, BonusSchedule::Legacy);
        assert_eq!(config.bonus_counts, BonusCounts::All);
        assert_eq!(config.period.start, Some(date(2025, 9, 1)));
        assert_eq!(config.period.end, Some(date(2025, 11, 30)));
        assert_eq!(config.agents, vec!["Maria Lopez".to_string()]);
        assert_eq!(config.default_month_tag, "Q4");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file: FileConfig = toml::from_str("[filters]\nagents = [\"ana\"]\n").unwrap();
        let config = Config::from_file(&file, &Overrides::default()).unwrap();
        assert_eq!(config.exchange_rate, 18.19);
        assert_eq!(config.agents, vec!["Ana".to_string()]);
    }

    #[test]
    fn test_unknown_schedule_rejected() {
        let content = "[commission]\nbonus_schedule = \"weekly\"\n";
        let parsed: Result<FileConfig, _> = toml::from_str(content);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let file: FileConfig = toml::from_str(
            "[commission]\nexchange_rate = 17.0\n[filters]\nagents = [\"ana\"]\n",
        )
        .unwrap();
        let overrides = Overrides {
            exchange_rate: Some(20.0),
            bonus_schedule: Some(BonusSchedule::Legacy),
            agents: vec!["bob".to_string()],
            ..Default::default()
        };
        let config = Config::from_file(&file, &overrides).unwrap();
        assert_eq!(config.exchange_rate, 20.0);
        assert_eq!(config.bonus_schedule, BonusSchedule::Legacy);
        assert_eq!(config.agents, vec!["Bob".to_string()]);
    }

    #[test]
    fn test_invalid_exchange_rate() {
        for rate in [0.0, -18.19, f64::NAN, f64::INFINITY] {
            let overrides = Overrides {
                exchange_rate: Some(rate),
                ..Default::default()
            };
            let err = Config::from_file(&FileConfig::default(), &overrides).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidExchangeRate(_)));
        }
    }

    #[test]
    fn test_invalid_filter_dates() {
        let overrides = Overrides {
            start_date: Some("September".to_string()),
            ..Default::default()
        };
        let err = Config::from_file(&FileConfig::default(), &overrides).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidDate {
                field: "start_date",
                value: "September".to_string()
            }
        );

        let overrides = Overrides {
            start_date: Some("2025-10-01".to_string()),
            end_date: Some("2025-09-01".to_string()),
            ..Default::default()
        };
        let err = Config::from_file(&FileConfig::default(), &overrides).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvertedPeriod {
                start: date(2025, 10, 1),
                end: date(2025, 9, 1)
            }
        );
    }

    #[test]
    fn test_period_filter_inclusive() {
        let period = PeriodFilter {
            start: Some(date(2025, 9, 1)),
            end: Some(date(2025, 9, 30)),
        };
        assert!(period.contains(date(2025, 9, 1)));
        assert!(period.contains(date(2025, 9, 30)));
        assert!(!period.contains(date(2025, 8, 31)));
        assert!(!period.contains(date(2025, 10, 1)));
        assert!(PeriodFilter::default().contains(date(1999, 1, 1)));
    }

    #[test]
    fn test_matches_agent() {
        let mut config = Config::default();
        assert!(config.matches_agent(None));
        assert!(config.matches_agent(Some("Ana")));

        config.agents = vec!["Ana".to_string()];
        assert!(config.matches_agent(Some("Ana")));
        assert!(config.matches_agent(Some("ANA")));
        assert!(!config.matches_agent(Some("Bob")));
        assert!(!config.matches_agent(None));
    }
}
