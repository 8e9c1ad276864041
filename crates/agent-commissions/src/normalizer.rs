//! Raw row normalization
//!
//! Source tables come from spreadsheets and database exports with
//! inconsistent headers, mixed date formats and locale-dependent number
//! formatting. Everything here is lenient: bad dates drop the row, bad
//! amounts become zero, blank text becomes null.

use chrono::NaiveDate;
use tracing::debug;

use crate::records::{DepositRecord, DepositType, RawRecord, RawTable};

// =============================================================================
// Column reconciliation
// =============================================================================

/// Canonical record fields a source column can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Agent,
    Team,
    Country,
    Affiliate,
    Source,
    Id,
    Amount,
    Type,
}

impl Field {
    /// Key used in reconciled raw records
    pub fn key(&self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Agent => "agent",
            Field::Team => "team",
            Field::Country => "country",
            Field::Affiliate => "affiliate",
            Field::Source => "source",
            Field::Id => "id",
            Field::Amount => "amount",
            Field::Type => "type",
        }
    }
}

/// Header spellings seen in the deposit exports, after `normalize_header`
const SYNONYMS: &[(&str, Field)] = &[
    ("date", Field::Date),
    ("fecha", Field::Date),
    ("date_ftd", Field::Date),
    ("fechadep", Field::Date),
    ("fecha_dep", Field::Date),
    ("fecha_rtn", Field::Date),
    ("agent", Field::Agent),
    ("agente", Field::Agent),
    ("agent_name", Field::Agent),
    ("team", Field::Team),
    ("equipo", Field::Team),
    ("team_name", Field::Team),
    ("leader_team", Field::Team),
    ("country", Field::Country),
    ("pais", Field::Country),
    ("país", Field::Country),
    ("country_name", Field::Country),
    // affiliate only from an explicit affiliate header
    ("affiliate", Field::Affiliate),
    ("afiliado", Field::Affiliate),
    ("source", Field::Source),
    ("origen", Field::Source),
    ("source_name", Field::Source),
    ("id", Field::Id),
    ("usuario", Field::Id),
    ("id_user", Field::Id),
    ("id_usuario", Field::Id),
    ("amount", Field::Amount),
    ("monto", Field::Amount),
    ("usd", Field::Amount),
    ("usd_total", Field::Amount),
    ("amount_country", Field::Amount),
    ("ftd_day", Field::Amount),
    ("type", Field::Type),
    ("tipo", Field::Type),
    ("deposit_type", Field::Type),
    ("transaction_type", Field::Type),
];

/// Lowercase, trim and snake-case a header
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace(' ', "_")
}

/// Resolve a source header to a canonical field
pub fn canonical_field(header: &str) -> Option<Field> {
    let normalized = normalize_header(header);
    SYNONYMS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, field)| *field)
}

fn is_date_like(header: &str) -> bool {
    let normalized = normalize_header(header);
    normalized.contains("date")
        || normalized.contains("fecha")
        || canonical_field(&normalized) == Some(Field::Date)
}

fn is_blank(cell: &str) -> bool {
    cell.trim().is_empty()
}

/// Repair the shape of a source table.
///
/// - promotes the first data row to header when the real header was read as data
/// - drops auto-generated `COL n` columns and columns with no values
/// - drops rows with no values
pub fn clean_table(mut table: RawTable) -> RawTable {
    let header_missing = !table.headers.iter().any(|h| is_date_like(h));
    let first_row_complete = table
        .rows
        .first()
        .is_some_and(|row| !row.is_empty() && row.iter().all(|c| !is_blank(c)));

    if header_missing && first_row_complete {
        debug!(table = %table.name, "promoting first row to header");
        table.headers = table.rows.remove(0);
    }

    let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();

    let keep: Vec<usize> = (0..headers.len())
        .filter(|&idx| {
            let name = &headers[idx];
            if name.starts_with("col") {
                debug!(table = %table.name, column = %name, "dropping junk column");
                return false;
            }
            table
                .rows
                .iter()
                .any(|row| row.get(idx).is_some_and(|c| !is_blank(c)))
        })
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            keep.iter()
                .map(|&idx| row.get(idx).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .filter(|row| row.iter().any(|c| !is_blank(c)))
        .collect();

    RawTable {
        headers: keep.iter().map(|&idx| headers[idx].clone()).collect(),
        rows,
        ..table
    }
}

/// Map a table's rows to raw records keyed by canonical field names.
///
/// The first column resolving to a field wins; later duplicates are ignored.
/// Rows without a type column get the table's implied type, if any.
pub fn reconcile(table: &RawTable) -> Vec<RawRecord> {
    let mut columns: Vec<(usize, Field)> = Vec::new();
    for (idx, header) in table.headers.iter().enumerate() {
        if let Some(field) = canonical_field(header) {
            if !columns.iter().any(|(_, f)| *f == field) {
                columns.push((idx, field));
            }
        }
    }

    table
        .rows
        .iter()
        .map(|row| {
            let mut record = RawRecord::new();
            for (idx, field) in &columns {
                if let Some(cell) = row.get(*idx) {
                    record.insert(field.key().to_string(), cell.clone());
                }
            }
            if let Some(deposit_type) = table.deposit_type {
                record
                    .entry(Field::Type.key().to_string())
                    .or_insert_with(|| deposit_type.code().to_string());
            }
            record
        })
        .collect()
}

// =============================================================================
// Field parsing
// =============================================================================

/// Parse a date, discarding any time of day.
///
/// Strings containing `/` are day/month/year; anything else is read as an
/// ISO date from the text before the first space. The year must have four
/// digits: `02/01/25` is not a date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let (day, year, format) = if token.contains('/') {
        (token, token.rsplit('/').next()?, "%d/%m/%Y")
    } else {
        let day = token.split('T').next().unwrap_or(token);
        (day, day.split('-').next()?, "%Y-%m-%d")
    };

    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(day, format).ok()
}

/// Parse a USD amount written with either decimal convention.
///
/// Never fails: anything unparseable is 0.0, and negatives clamp to 0.0.
pub fn parse_amount(raw: &str) -> f64 {
    let s: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if s.is_empty() {
        return 0.0;
    }

    let has_comma = s.contains(',');
    let has_dot = s.contains('.');

    let s = if has_comma && has_dot {
        // whichever separator comes last is the decimal point
        if s.rfind(',') > s.rfind('.') {
            s.replace('.', "").replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else if has_comma {
        let decimals = s.rsplit(',').next().map_or(0, str::len);
        if decimals == 2 {
            s.replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else if s.matches('.').count() > 1 {
        s.replace('.', "")
    } else {
        s
    };

    match s.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

/// Title-case like a spreadsheet PROPER(): first letter of each word upper, rest lower
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Trim and title-case a text field; "", "nan" and "none" become null
pub fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("none")
    {
        return None;
    }
    Some(title_case(trimmed))
}

// =============================================================================
// Records
// =============================================================================

/// Normalize one reconciled row. Returns None when the date is unusable.
pub fn normalize_record(raw: &RawRecord) -> Option<DepositRecord> {
    let field = |f: Field| raw.get(f.key()).map(String::as_str);
    let text = |f: Field| field(f).and_then(clean_text);

    let date = field(Field::Date).and_then(parse_date)?;

    Some(DepositRecord {
        date,
        agent: text(Field::Agent),
        team: text(Field::Team),
        country: text(Field::Country),
        affiliate: text(Field::Affiliate),
        source: text(Field::Source),
        id: text(Field::Id),
        amount: field(Field::Amount).map_or(0.0, parse_amount),
        deposit_type: field(Field::Type)
            .and_then(DepositType::from_label)
            .unwrap_or_default(),
    })
}

/// Outcome of normalizing one table
#[derive(Debug, Default)]
pub struct NormalizedTable {
    pub records: Vec<DepositRecord>,
    /// Rows dropped for an unparseable date
    pub dropped: usize,
}

/// Clean, reconcile and normalize a whole table
pub fn normalize_table(table: RawTable) -> NormalizedTable {
    let table = clean_table(table);
    let mut result = NormalizedTable::default();

    for raw in reconcile(&table) {
        match normalize_record(&raw) {
            Some(record) => result.records.push(record),
            None => {
                debug!(
                    table = %table.name,
                    date = raw.get(Field::Date.key()).map(String::as_str).unwrap_or(""),
                    "dropping row with unparseable date"
                );
                result.dropped += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            name: "test".to_string(),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            deposit_type: None,
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(parse_date("02/01/2025"), Some(expected));
        assert_eq!(parse_date("2025-01-02"), Some(expected));
        assert_eq!(parse_date("2025-01-02 13:22:11"), Some(expected));
        assert_eq!(parse_date("2025-01-02T13:22:11+02:00"), Some(expected));
        assert_eq!(parse_date("  2025-01-02  "), Some(expected));
    }

    #[test]
    fn test_parse_date_failures() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("31/02/2025"), None);
        assert_eq!(parse_date("2025-13-01"), None);
        // two-digit years are not guessed
        assert_eq!(parse_date("02/01/25"), None);
        assert_eq!(parse_date("25-01-02"), None);
        assert_eq!(parse_date("02/01/+2025"), None);
    }

    #[test]
    fn test_parse_amount_separators() {
        assert_eq!(parse_amount("1.234,56"), 1234.56);
        assert_eq!(parse_amount("1,234.56"), 1234.56);
        assert_eq!(parse_amount("1,50"), 1.5);
        assert_eq!(parse_amount("1,5"), 15.0);
        assert_eq!(parse_amount("1,234"), 1234.0);
        assert_eq!(parse_amount("1.234.567"), 1234567.0);
        assert_eq!(parse_amount("$ 2,500.00 USD"), 2500.0);
        assert_eq!(parse_amount("250"), 250.0);
        assert_eq!(parse_amount("99.5"), 99.5);
    }

    #[test]
    fn test_parse_amount_lenient() {
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("--"), 0.0);
        assert_eq!(parse_amount("-50"), 0.0);
        assert_eq!(parse_amount("1-2"), 0.0);
    }

    #[test]
    fn test_parse_amount_idempotent() {
        for raw in ["1.234,56", "1,234.56", "0,05", "17", "1.000.000", "3,14159.2", "0.1"] {
            let first = parse_amount(raw);
            let second = parse_amount(&first.to_string());
            assert_eq!(first, second, "round trip of {}", raw);
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  maria LOPEZ "), Some("Maria Lopez".to_string()));
        assert_eq!(clean_text("o'neil-smith"), Some("O'Neil-Smith".to_string()));
        assert_eq!(clean_text("NaN"), None);
        assert_eq!(clean_text("none"), None);
        assert_eq!(clean_text("   "), None);
        assert_eq!(clean_text("12345"), Some("12345".to_string()));
    }

    #[test]
    fn test_canonical_field_synonyms() {
        assert_eq!(canonical_field("Fecha"), Some(Field::Date));
        assert_eq!(canonical_field(" Fecha Dep "), Some(Field::Date));
        assert_eq!(canonical_field("AGENTE"), Some(Field::Agent));
        assert_eq!(canonical_field("monto"), Some(Field::Amount));
        assert_eq!(canonical_field("USD"), Some(Field::Amount));
        assert_eq!(canonical_field("afiliado"), Some(Field::Affiliate));
        assert_eq!(canonical_field("leader team"), Some(Field::Team));
        assert_eq!(canonical_field("comments"), None);
    }

    #[test]
    fn test_clean_table_promotes_header_row() {
        let t = table(
            &["COL 1", "COL 2", "COL 3"],
            &[
                &["Fecha", "Agente", "Monto"],
                &["01/09/2025", "ana", "100"],
            ],
        );
        let cleaned = clean_table(t);
        assert_eq!(cleaned.headers, vec!["fecha", "agente", "monto"]);
        assert_eq!(cleaned.rows.len(), 1);
    }

    #[test]
    fn test_clean_table_keeps_real_header() {
        let t = table(
            &["date", "agent", "usd"],
            &[&["2025-09-01", "ana", "100"], &["2025-09-02", "bob", "50"]],
        );
        let cleaned = clean_table(t);
        assert_eq!(cleaned.headers, vec!["date", "agent", "usd"]);
        assert_eq!(cleaned.rows.len(), 2);
    }

    #[test]
    fn test_clean_table_drops_junk_and_empty_columns() {
        let t = table(
            &["date", "agent", "col5", "notes", "usd"],
            &[
                &["2025-09-01", "ana", "x", "", "100"],
                &["", "", "", "", ""],
                &["2025-09-02", "bob", "y", "", "50"],
            ],
        );
        let cleaned = clean_table(t);
        assert_eq!(cleaned.headers, vec!["date", "agent", "usd"]);
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.rows[1], vec!["2025-09-02", "bob", "50"]);
    }

    #[test]
    fn test_reconcile_first_synonym_wins() {
        let t = table(
            &["fecha", "date", "agente", "usd", "monto"],
            &[&["2025-09-01", "2020-01-01", "ana", "10", "99"]],
        );
        let records = reconcile(&t);
        assert_eq!(records[0]["date"], "2025-09-01");
        assert_eq!(records[0]["amount"], "10");
        assert!(!records[0].contains_key("type"));
    }

    #[test]
    fn test_reconcile_applies_table_type() {
        let mut t = table(&["fecha", "agente"], &[&["2025-09-01", "ana"]]);
        t.deposit_type = Some(DepositType::ReturnDeposit);
        let records = reconcile(&t);
        assert_eq!(records[0]["type"], "RTN");

        let record = normalize_record(&records[0]).unwrap();
        assert_eq!(record.deposit_type, DepositType::ReturnDeposit);
    }

    #[test]
    fn test_normalize_record_defaults() {
        let mut raw = RawRecord::new();
        raw.insert("date".to_string(), "15/09/2025".to_string());
        raw.insert("agent".to_string(), " ana  ".to_string());
        raw.insert("amount".to_string(), "abc".to_string());
        raw.insert("team".to_string(), "nan".to_string());

        let record = normalize_record(&raw).unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2025, 9, 15).unwrap());
        assert_eq!(record.agent.as_deref(), Some("Ana"));
        assert_eq!(record.team, None);
        assert_eq!(record.country, None);
        assert_eq!(record.amount, 0.0);
        assert_eq!(record.deposit_type, DepositType::FirstDeposit);
    }

    #[test]
    fn test_normalize_table_drops_bad_dates() {
        let t = table(
            &["fecha", "agente", "monto"],
            &[
                &["01/09/2025", "ana", "100"],
                &["yesterday", "ana", "100"],
                &["", "bob", "100"],
                &["2025-09-03 08:00:00", "bob", "1.234,50"],
            ],
        );
        let normalized = normalize_table(t);
        assert_eq!(normalized.records.len(), 2);
        assert_eq!(normalized.dropped, 2);
        assert_eq!(normalized.records[1].amount, 1234.5);
    }
}
