//! Delimited source tables and the master CSV preview
//!
//! Source exports are one file per month and deposit type, e.g.
//! `ftds_sep_PGY_2025.csv` or `dep_oct_rtn_PGY_2025.csv`. The file name
//! supplies the deposit type and the period tag.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;
use tracing::{debug, warn};

use crate::normalizer;
use crate::records::{DepositType, MASTER_COLUMNS, MasterRow, RawTable};

/// Month tags recognized in table names
const MONTH_TAGS: [(&str, &str); 12] = [
    ("jan", "Jan"),
    ("feb", "Feb"),
    ("mar", "Mar"),
    ("apr", "Apr"),
    ("may", "May"),
    ("jun", "Jun"),
    ("jul", "Jul"),
    ("aug", "Aug"),
    ("sep", "Sep"),
    ("oct", "Oct"),
    ("nov", "Nov"),
    ("dec", "Dec"),
];

fn name_tokens(table_name: &str) -> Vec<String> {
    table_name
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Deposit type implied by a table name (`rtn` or `ftd` token)
pub fn infer_deposit_type(table_name: &str) -> Option<DepositType> {
    let tokens = name_tokens(table_name);
    if tokens.iter().any(|t| t.starts_with("rtn")) {
        Some(DepositType::ReturnDeposit)
    } else if tokens.iter().any(|t| t.starts_with("ftd")) {
        Some(DepositType::FirstDeposit)
    } else {
        None
    }
}

/// Month tag from a table name, or the default when none is present
pub fn infer_month_tag(table_name: &str, default_tag: &str) -> String {
    let tokens = name_tokens(table_name);
    MONTH_TAGS
        .iter()
        .find(|(abbr, _)| tokens.iter().any(|t| t.starts_with(abbr)))
        .map_or_else(|| default_tag.to_string(), |(_, tag)| tag.to_string())
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Pick `;` for semicolon-separated exports, `,` otherwise
fn detect_delimiter(first_line: &str) -> u8 {
    if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// Read a delimited file as a raw table: first line is the header row.
///
/// Bytes that are not UTF-8 (Windows-1252 exports) become U+FFFD instead of
/// failing the whole file.
pub fn read_table(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read source table: {}", path.display()))?;
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let first_line = content.split(|&b| b == b'\n').next().unwrap_or_default();
    let delimiter = detect_delimiter(&String::from_utf8_lossy(first_line));

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content);

    let mut lines = Vec::new();
    for result in rdr.byte_records() {
        let record = result.with_context(|| format!("Malformed row in {}", path.display()))?;
        lines.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect::<Vec<_>>(),
        );
    }

    let mut lines = lines.into_iter();
    let headers = lines.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = lines.collect();

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!(table = %name, columns = headers.len(), rows = rows.len(), "read source table");

    Ok(RawTable {
        deposit_type: infer_deposit_type(&name),
        name,
        headers,
        rows,
    })
}

/// Result of turning source tables into master rows
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub rows: Vec<MasterRow>,
    /// (table name, rows kept, rows dropped)
    pub tables: Vec<(String, usize, usize)>,
}

impl IngestSummary {
    pub fn dropped(&self) -> usize {
        self.tables.iter().map(|(_, _, dropped)| dropped).sum()
    }
}

/// Normalize source tables into master rows tagged with their period
pub fn build_master(tables: Vec<RawTable>, default_month_tag: &str) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for table in tables {
        let name = table.name.clone();
        let month_name = infer_month_tag(&name, default_month_tag);
        let normalized = normalizer::normalize_table(table);

        summary
            .tables
            .push((name, normalized.records.len(), normalized.dropped));
        summary
            .rows
            .extend(normalized.records.into_iter().map(|record| MasterRow {
                record,
                month_name: month_name.clone(),
            }));
    }

    summary
}

/// Read every file, skipping (and reporting) the ones that fail
pub fn read_tables(paths: &[impl AsRef<Path>]) -> Vec<RawTable> {
    let mut tables = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match read_table(path) {
            Ok(table) if table.rows.is_empty() && table.headers.is_empty() => {
                warn!(path = %path.display(), "skipping empty source table");
            }
            Ok(table) => tables.push(table),
            Err(e) => {
                eprintln!("    Warning: {:#}", e);
            }
        }
    }
    tables
}

/// Read the master CSV preview back as a raw table.
///
/// Every row carries its own `deposit_type`, so no type is implied by the name.
pub fn read_master_csv(path: &Path) -> Result<RawTable> {
    let table = read_table(path)?;
    Ok(RawTable {
        deposit_type: None,
        ..table
    })
}

/// Write the master CSV preview
pub fn write_master_csv(path: &Path, rows: &[MasterRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record(MASTER_COLUMNS)?;
    for row in rows {
        wtr.write_record(row.to_fields())?;
    }

    wtr.flush()?;
    Ok(())
}
