use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

use crate::config::*;

// Outcome of reading a council term label.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum TermParse {
    Unclassifiable,
    Ordinal(u32),
    Unparsable,
}

fn parse_term(label: &str, markers: &[String]) -> TermParse {
    let lower = label.to_lowercase();
    if markers
        .iter()
        .any(|m| !m.is_empty() && lower.contains(&m.to_lowercase()))
    {
        return TermParse::Unclassifiable;
    }
    let digits: String = label
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u32>() {
        Ok(x) => TermParse::Ordinal(x),
        Err(_) => TermParse::Unparsable,
    }
}

/// The sort key of a council term label.
///
/// Labels containing an unclassifiable marker get 0, otherwise the first run of
/// digits is the ordinal, and labels without digits get 999 so they sort last.
pub fn term_ordinal(label: &str, scheme: &TermScheme) -> u32 {
    match parse_term(label, &scheme.unclassifiable_markers) {
        TermParse::Unclassifiable => UNCLASSIFIABLE_TERM_ORDINAL,
        TermParse::Ordinal(x) => x,
        TermParse::Unparsable => UNPARSABLE_TERM_ORDINAL,
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%Y%m%d"];

// Day zero of spreadsheet serial dates.
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Reads an enactment date. `Ok(None)` for an empty cell, `Err(())` when the
/// cell has content that is not a date.
fn parse_date(value: &RawValue) -> Result<Option<NaiveDate>, ()> {
    match value {
        RawValue::Empty => Ok(None),
        RawValue::Date(d) => Ok(Some(*d)),
        RawValue::Float(f) if f.is_nan() => Ok(None),
        // 20200315-style integers.
        RawValue::Int(i) if (10_000_101..=99_991_231).contains(i) => {
            NaiveDate::parse_from_str(&i.to_string(), "%Y%m%d")
                .map(Some)
                .map_err(|_| ())
        }
        // Spreadsheet serial numbers.
        RawValue::Int(i) if *i > 0 && *i < 2_958_466 => excel_epoch()
            .map(|e| e + Duration::days(*i))
            .map(Some)
            .ok_or(()),
        // Spreadsheets hand whole numbers over as floats.
        RawValue::Float(f) if f.fract() == 0.0 && (10_000_101.0..=99_991_231.0).contains(f) => {
            parse_date(&RawValue::Int(*f as i64))
        }
        RawValue::Float(f) if *f > 0.0 && *f < 2_958_466.0 => excel_epoch()
            .map(|e| e + Duration::days(f.trunc() as i64))
            .map(Some)
            .ok_or(()),
        RawValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            for fmt in DATE_FORMATS.iter() {
                if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                    return Ok(Some(d));
                }
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|dt| Some(dt.date()))
                .map_err(|_| ())
        }
        _ => Err(()),
    }
}

fn find_required(raw: &RawTable, columns: &ColumnNames) -> OrdinanceResult<[usize; 4]> {
    let mut missing: Vec<String> = Vec::new();
    let mut found = [0usize; 4];
    for (slot, name) in columns.required().iter().enumerate() {
        match raw.column_index(name) {
            Some(idx) => found[slot] = idx,
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(found)
    } else {
        Err(OrdinanceError::MissingColumns { columns: missing })
    }
}

/// Validates the schema and turns every raw row into a [`Record`].
///
/// Fails with `MissingColumns` before looking at any row when a required
/// column is absent. Blank required fields follow `config.blank_fields`.
pub fn normalize(raw: &RawTable, config: &NormalizeConfig) -> OrdinanceResult<NormalizedTable> {
    let cols = &config.columns;
    let [prov_idx, muni_idx, field_idx, term_idx] = find_required(raw, cols)?;
    let date_idx = raw.column_index(&cols.enactment_date);
    debug!(
        "normalize: required columns at {:?}, date column at {:?}",
        [prov_idx, muni_idx, field_idx, term_idx],
        date_idx
    );

    let mut diagnostics = NormalizeDiagnostics::default();
    let mut records: Vec<Record> = Vec::with_capacity(raw.rows.len());
    let width = raw.columns.len();

    'rows: for (row_idx, row) in raw.rows.iter().enumerate() {
        if row.len() != width {
            return Err(OrdinanceError::RaggedRow {
                row: row_idx,
                expected: width,
                found: row.len(),
            });
        }

        let mut fields: Vec<String> = Vec::with_capacity(4);
        for (col_idx, col_name) in [prov_idx, muni_idx, field_idx, term_idx]
            .iter()
            .zip(cols.required().iter())
        {
            let s = row[*col_idx]
                .to_category()
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            if s.is_empty() {
                match config.blank_fields {
                    BlankFieldPolicy::Reject => {
                        return Err(OrdinanceError::EmptyRequiredField {
                            row: row_idx,
                            column: col_name.to_string(),
                        });
                    }
                    BlankFieldPolicy::Drop => {
                        warn!(
                            "normalize: row {}: dropping record with blank {:?}",
                            row_idx + 1,
                            col_name
                        );
                        diagnostics.dropped_blank_rows += 1;
                        continue 'rows;
                    }
                }
            }
            fields.push(s);
        }
        let council_term = fields.pop().unwrap_or_default();
        let subject_field = fields.pop().unwrap_or_default();
        let municipality = fields.pop().unwrap_or_default();
        let province = fields.pop().unwrap_or_default();

        let term_ordinal = match parse_term(&council_term, &config.terms.unclassifiable_markers) {
            TermParse::Unclassifiable => UNCLASSIFIABLE_TERM_ORDINAL,
            TermParse::Ordinal(x) => x,
            TermParse::Unparsable => {
                debug!(
                    "normalize: row {}: unparsable term label {:?}",
                    row_idx + 1,
                    council_term
                );
                diagnostics.unparsable_terms += 1;
                UNPARSABLE_TERM_ORDINAL
            }
        };

        let enactment_date = match date_idx.map(|i| parse_date(&row[i])) {
            None => None,
            Some(Ok(d)) => d,
            Some(Err(())) => {
                debug!(
                    "normalize: row {}: unparsable date {:?}",
                    row_idx + 1,
                    date_idx.map(|i| &row[i])
                );
                diagnostics.unparsable_dates += 1;
                None
            }
        };

        records.push(Record {
            is_top_level: municipality == province,
            province,
            municipality,
            subject_field,
            council_term,
            enactment_date,
            term_ordinal,
            source_row: row_idx,
        });
    }

    if diagnostics.unparsable_terms > 0 {
        warn!(
            "normalize: {} records have a term label without number (ordinal {})",
            diagnostics.unparsable_terms, UNPARSABLE_TERM_ORDINAL
        );
    }
    info!(
        "normalize: {} rows -> {} records ({:?})",
        raw.rows.len(),
        records.len(),
        diagnostics
    );
    Ok(NormalizedTable {
        records,
        diagnostics,
    })
}
