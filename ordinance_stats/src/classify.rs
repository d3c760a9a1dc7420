use log::{debug, info, warn};

use crate::config::*;

/// Case-folds a header and strips whitespace and punctuation, so that
/// `"Delegation flag (Y/N)"` and `"delegationflagyn"` compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Finds the column holding the delegation flag.
///
/// An exact match on the expected header wins. Otherwise the first column, in
/// schema order, whose normalized header contains one of the normalized keywords.
pub fn detect_column(schema: &[String], config: &ClassifierConfig) -> OrdinanceResult<usize> {
    if let Some(idx) = schema.iter().position(|h| *h == config.expected_header) {
        debug!("detect_column: exact match at {}", idx);
        return Ok(idx);
    }
    let keywords: Vec<String> = config
        .header_keywords
        .iter()
        .map(|k| normalize_header(k))
        .filter(|k| !k.is_empty())
        .collect();
    for (idx, header) in schema.iter().enumerate() {
        let h = normalize_header(header);
        if keywords.iter().any(|k| h.contains(k.as_str())) {
            debug!("detect_column: header {:?} matches keywords at {}", header, idx);
            return Ok(idx);
        }
    }
    Err(OrdinanceError::UnresolvedClassificationColumn {
        expected: config.expected_header.clone(),
        keywords: config.header_keywords.clone(),
    })
}

// Zero-width and other invisible characters that survive `trim`.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    )
}

pub fn normalize_token(s: &str) -> String {
    let visible: String = s
        .chars()
        .filter(|c| !is_invisible(*c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect();
    visible.trim().to_lowercase()
}

/// How a delegation value was read.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum FlagReading {
    Delegated,
    Autonomous,
    /// Empty cell, read as autonomous.
    Missing,
    /// Text in neither token set, read as autonomous. Carries the normalized token.
    Defaulted(String),
}

impl FlagReading {
    pub fn is_delegated(&self) -> bool {
        matches!(self, FlagReading::Delegated)
    }
}

/// Reads a raw delegation value. The first applicable rule wins:
/// booleans as they are, numbers are delegated when nonzero, text is looked up
/// in the token sets after normalization. Unrecognized text is autonomous.
pub fn read_flag(value: &RawValue, config: &ClassifierConfig) -> FlagReading {
    let from_bool = |b: bool| {
        if b {
            FlagReading::Delegated
        } else {
            FlagReading::Autonomous
        }
    };
    match value {
        RawValue::Empty => FlagReading::Missing,
        RawValue::Bool(b) => from_bool(*b),
        RawValue::Float(f) if f.is_nan() => FlagReading::Missing,
        RawValue::Int(i) => from_bool(*i != 0),
        RawValue::Float(f) => from_bool(*f != 0.0),
        RawValue::Text(s) => {
            let token = normalize_token(s);
            if config.true_tokens.iter().any(|t| *t == token) {
                FlagReading::Delegated
            } else if token.is_empty() {
                FlagReading::Missing
            } else if config.false_tokens.iter().any(|t| *t == token) {
                FlagReading::Autonomous
            } else {
                FlagReading::Defaulted(token)
            }
        }
        RawValue::Date(d) => FlagReading::Defaulted(d.to_string()),
    }
}

pub fn parse_flag(value: &RawValue, config: &ClassifierConfig) -> bool {
    read_flag(value, config).is_delegated()
}

/// Attaches the delegation flag to every normalized record.
///
/// `raw` must be the table `normalized` was built from: the flag of a record is
/// read from its source row.
pub fn classify(
    raw: &RawTable,
    normalized: NormalizedTable,
    config: &ClassifierConfig,
) -> OrdinanceResult<DerivedTable> {
    let col = detect_column(&raw.columns, config)?;
    let column_name = raw.columns[col].clone();
    info!("classify: reading delegation flag from column {:?}", column_name);

    let mut diagnostics = ClassificationDiagnostics::default();
    let mut records: Vec<DerivedRecord> = Vec::with_capacity(normalized.records.len());
    for record in normalized.records {
        let delegation_raw = raw
            .rows
            .get(record.source_row)
            .and_then(|row| row.get(col))
            .cloned()
            .unwrap_or(RawValue::Empty);
        let reading = read_flag(&delegation_raw, config);
        match &reading {
            FlagReading::Delegated => diagnostics.delegated += 1,
            FlagReading::Autonomous => diagnostics.autonomous += 1,
            FlagReading::Missing => {
                diagnostics.autonomous += 1;
                diagnostics.missing += 1;
            }
            FlagReading::Defaulted(token) => {
                diagnostics.autonomous += 1;
                diagnostics.defaulted += 1;
                *diagnostics
                    .defaulted_tokens
                    .entry(token.clone())
                    .or_insert(0) += 1;
            }
        }
        records.push(DerivedRecord {
            record,
            delegation_raw,
            is_delegated: reading.is_delegated(),
        });
    }

    if diagnostics.defaulted > 0 {
        warn!(
            "classify: {} values of {:?} were not recognized and count as autonomous: {:?}",
            diagnostics.defaulted, column_name, diagnostics.defaulted_tokens
        );
    }
    debug!("classify: {:?}", diagnostics);
    Ok(DerivedTable {
        records,
        delegation_column: column_name,
        normalize_diagnostics: normalized.diagnostics,
        classification_diagnostics: diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_header_wins_over_keywords() {
        let cfg = ClassifierConfig::default();
        let schema = headers(&["위임근거", "province", "delegationRaw"]);
        assert_eq!(detect_column(&schema, &cfg), Ok(2));
    }

    #[test]
    fn keyword_match_takes_first_column() {
        let cfg = ClassifierConfig::default();
        let schema = headers(&["province", "Is Delegated?", "위임 여부"]);
        assert_eq!(detect_column(&schema, &cfg), Ok(1));
        let schema = headers(&["광역", "위임_여부"]);
        assert_eq!(detect_column(&schema, &cfg), Ok(1));
    }

    #[test]
    fn injected_keywords() {
        let cfg = ClassifierConfig {
            expected_header: "flag".to_string(),
            header_keywords: vec!["Upper Mandate".to_string()],
            ..ClassifierConfig::default()
        };
        let schema = headers(&["province", "upper-mandate (y/n)"]);
        assert_eq!(detect_column(&schema, &cfg), Ok(1));
    }

    #[test]
    fn no_candidate_column() {
        let cfg = ClassifierConfig::default();
        let res = detect_column(&headers(&["province", "municipality"]), &cfg);
        assert!(matches!(
            res,
            Err(OrdinanceError::UnresolvedClassificationColumn { .. })
        ));
    }

    #[test]
    fn layered_parsing() {
        let cfg = ClassifierConfig::default();
        assert!(parse_flag(&RawValue::Bool(true), &cfg));
        assert!(!parse_flag(&RawValue::Bool(false), &cfg));
        assert!(!parse_flag(&RawValue::Empty, &cfg));
        assert!(parse_flag(&RawValue::Int(2), &cfg));
        assert!(!parse_flag(&RawValue::Int(0), &cfg));
        assert!(parse_flag(&RawValue::Float(0.5), &cfg));
        assert!(!parse_flag(&RawValue::Float(f64::NAN), &cfg));
        assert!(parse_flag(&" YES ".into(), &cfg));
        assert!(parse_flag(&"\u{200B}위임".into(), &cfg));
        assert!(parse_flag(&"O".into(), &cfg));
        assert!(!parse_flag(&"no".into(), &cfg));
    }

    #[test]
    fn unrecognized_token_defaults_to_false() {
        let cfg = ClassifierConfig::default();
        assert!(!parse_flag(&"maybe".into(), &cfg));
        assert_eq!(
            read_flag(&"Maybe ".into(), &cfg),
            FlagReading::Defaulted("maybe".to_string())
        );
        // Numbers written as text are tokens, not numbers.
        assert_eq!(
            read_flag(&"2".into(), &cfg),
            FlagReading::Defaulted("2".to_string())
        );
    }

    #[test]
    fn classify_counts_defaults() {
        let raw = RawTable {
            columns: headers(&["province", "municipality", "subjectField", "councilTerm", "위임여부"]),
            rows: ["Y", "maybe", "", "N", "maybe"]
                .iter()
                .map(|flag| {
                    vec![
                        "A".into(),
                        "B".into(),
                        "Welfare".into(),
                        "Council Term 1".into(),
                        if flag.is_empty() {
                            RawValue::Empty
                        } else {
                            (*flag).into()
                        },
                    ]
                })
                .collect(),
        };
        let normalized = crate::normalize::normalize(&raw, &NormalizeConfig::default()).unwrap();
        let t = classify(&raw, normalized, &ClassifierConfig::default()).unwrap();
        let d = &t.classification_diagnostics;
        assert_eq!(t.delegation_column, "위임여부");
        assert_eq!(d.delegated, 1);
        assert_eq!(d.autonomous, 4);
        assert_eq!(d.missing, 1);
        assert_eq!(d.defaulted, 2);
        assert_eq!(d.defaulted_tokens.get("maybe"), Some(&2));
        assert_eq!(t.records[0].delegation_kind(), DelegationKind::Delegated);
        assert_eq!(t.records[1].delegation_kind().label(), "autonomous");
    }
}
