// Primitives for reading CSV files.

use log::{debug, info};
use ordinance_stats::{RawTable, RawValue};
use snafu::prelude::*;

use crate::ords::*;

/// Reads a UTF-8 CSV document with a header row. Rows may be ragged: the
/// normalizer reports them.
pub fn parse_csv_table(bytes: &[u8], path: &str) -> OrdsResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let columns: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    debug!("parse_csv_table: {}: header: {:?}", path, columns);

    let mut table = RawTable::new(columns);
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        if line.iter().all(|s| s.trim().is_empty()) {
            debug!("parse_csv_table: skipping empty line {}", lineno);
            continue;
        }
        table.rows.push(line.iter().map(read_cell).collect());
    }
    info!("parse_csv_table: {}: {} rows", path, table.len());
    Ok(table)
}

fn looks_numeric(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
}

// Integers and decimals become numbers, everything else stays text.
fn read_cell(s: &str) -> RawValue {
    let t = s.trim();
    if t.is_empty() {
        return RawValue::Empty;
    }
    if looks_numeric(t) {
        if let Ok(i) = t.parse::<i64>() {
            return RawValue::Int(i);
        }
        if let Ok(f) = t.parse::<f64>() {
            return RawValue::Float(f);
        }
    }
    RawValue::Text(s.to_string())
}
