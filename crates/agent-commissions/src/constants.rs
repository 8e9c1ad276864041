//! Centralized constants for the commission calculator
//!
//! Tier tables live next to the code that applies them (commission.rs, bonus.rs).
//! Run-specific settings are loaded from config.toml.

// =============================================================================
// Defaults
// =============================================================================

/// Default config file path
pub const CONFIG_FILE: &str = "config.toml";

/// Local currency units per USD used for bonus conversion
pub const DEFAULT_EXCHANGE_RATE: f64 = 18.19;

/// Period tag for source tables whose name carries no month
pub const DEFAULT_MONTH_TAG: &str = "PGY";

// =============================================================================
// File Names
// =============================================================================

/// Master table database filename (in the data directory)
pub const MASTER_DB_FILENAME: &str = "master.sqlite";

/// Master table CSV preview, also the fallback input (in the data directory)
pub const MASTER_PREVIEW_FILENAME: &str = "master_preview.csv";

/// Enriched record ledger CSV filename
pub const COMMISSION_LEDGER_FILENAME: &str = "commission_ledger.csv";

/// Grouped commission sums CSV filename
pub const COMMISSION_BY_GROUP_FILENAME: &str = "commission_by_group.csv";

/// Weekly bonus ledger CSV filename
pub const BONUS_LEDGER_FILENAME: &str = "bonus_ledger.csv";

/// Per-agent summary CSV filename
pub const AGENT_SUMMARY_FILENAME: &str = "agent_summary.csv";

/// Full report JSON filename (dashboard input)
pub const REPORT_JSON_FILENAME: &str = "commission_report.json";

// =============================================================================
// Storage
// =============================================================================

/// SQLite busy timeout (ms)
pub const DB_BUSY_TIMEOUT_MS: u64 = 5000;

/// Metadata key recording the last ingest time
pub const LAST_INGEST_KEY: &str = "last_ingest";
