//! SQLite storage for the master deposit table
//!
//! Ingest replaces the whole table; reports read it back in insertion order.
//! Values are stored as the normalized text written to the CSV preview, so
//! loading runs them through the same normalizer as any other source table.

use anyhow::{Context, Result};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;

use crate::constants::DB_BUSY_TIMEOUT_MS;
use crate::records::{MASTER_COLUMNS, MasterRow, RawTable};

/// Master table database wrapper
pub struct Store {
    pool: SqlitePool,
}

/// Row type for the deposits query
#[derive(FromRow)]
struct DepositRow {
    date: String,
    id: String,
    team: String,
    agent: String,
    country: String,
    affiliate: String,
    amount: String,
    deposit_type: String,
    month_name: String,
    source: String,
}

impl DepositRow {
    fn into_fields(self) -> Vec<String> {
        vec![
            self.date,
            self.id,
            self.team,
            self.agent,
            self.country,
            self.affiliate,
            self.amount,
            self.deposit_type,
            self.month_name,
            self.source,
        ]
    }
}

impl Store {
    /// Open or create the master database
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // SQLx requires the file to exist for SQLite
        if !path.exists() {
            std::fs::File::create(path)?;
        }

        let url = format!("sqlite:{}", path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .with_context(|| format!("Failed to open master database: {}", path.display()))?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query(&format!("PRAGMA busy_timeout={}", DB_BUSY_TIMEOUT_MS))
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    /// Private in-memory database (single connection so every query sees it)
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "
            -- Cleaned master table, one row per deposit
            CREATE TABLE IF NOT EXISTS deposits (
                row_id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                id TEXT NOT NULL DEFAULT '',
                team TEXT NOT NULL DEFAULT '',
                agent TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                affiliate TEXT NOT NULL DEFAULT '',
                amount TEXT NOT NULL,
                deposit_type TEXT NOT NULL,
                month_name TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT ''
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Deposits
    // =========================================================================

    /// Replace the master table with these rows (in a transaction for atomicity)
    pub async fn replace_deposits(&self, rows: &[MasterRow]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM deposits")
            .execute(&mut *tx)
            .await?;

        for row in rows {
            let [
                date,
                id,
                team,
                agent,
                country,
                affiliate,
                amount,
                deposit_type,
                month_name,
                source,
            ] = row.to_fields();
            sqlx::query(
                "INSERT INTO deposits
                 (date, id, team, agent, country, affiliate, amount,
                  deposit_type, month_name, source)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(date)
            .bind(id)
            .bind(team)
            .bind(agent)
            .bind(country)
            .bind(affiliate)
            .bind(amount)
            .bind(deposit_type)
            .bind(month_name)
            .bind(source)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }

    /// Load the master table as a raw table, in insertion order
    pub async fn load_master(&self) -> Result<RawTable> {
        let rows: Vec<DepositRow> = sqlx::query_as(
            "SELECT date, id, team, agent, country, affiliate, amount,
                    deposit_type, month_name, source
             FROM deposits
             ORDER BY row_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load master table")?;

        Ok(RawTable {
            name: "deposits".to_string(),
            headers: MASTER_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(DepositRow::into_fields).collect(),
            deposit_type: None,
        })
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Get metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get master table statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let (deposits, agents, first_date, last_date): (i64, i64, Option<String>, Option<String>) =
            sqlx::query_as(
                "SELECT COUNT(*), COUNT(DISTINCT NULLIF(agent, '')), MIN(date), MAX(date)
                 FROM deposits",
            )
            .fetch_one(&self.pool)
            .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT deposit_type, COUNT(*) FROM deposits
             GROUP BY deposit_type
             ORDER BY deposit_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let months: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT month_name FROM deposits ORDER BY month_name")
                .fetch_all(&self.pool)
                .await?;

        Ok(StoreStats {
            deposits: deposits as u64,
            agents: agents as u64,
            by_type: by_type.into_iter().map(|(t, n)| (t, n as u64)).collect(),
            months: months.into_iter().map(|(m,)| m).collect(),
            first_date,
            last_date,
        })
    }
}

/// Master table statistics
#[derive(Debug)]
pub struct StoreStats {
    pub deposits: u64,
    pub agents: u64,
    pub by_type: Vec<(String, u64)>,
    pub months: Vec<String>,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} deposits, {} agents", self.deposits, self.agents)?;
        for (deposit_type, count) in &self.by_type {
            write!(f, ", {} {}", count, deposit_type)?;
        }
        if let (Some(first), Some(last)) = (&self.first_date, &self.last_date) {
            write!(f, " ({} to {})", first, last)?;
        }
        Ok(())
    }
}
