use std::collections::BTreeSet;
use std::fs;

use chrono::NaiveDate;
use log::debug;
use ordinance_stats::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::ords::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InputSource {
    pub file_path: Option<String>,
    /// `csv` or `xlsx`. Inferred from the file extension when absent.
    pub provider: Option<String>,
    pub excel_worksheet_name: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsConfig {
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub subject_field: Option<String>,
    pub council_term: Option<String>,
    pub enactment_date: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TermsConfig {
    pub label_prefix: Option<String>,
    pub label_suffix: Option<String>,
    pub count: Option<u32>,
    pub unclassifiable_markers: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierSection {
    pub expected_header: Option<String>,
    pub header_keywords: Option<Vec<String>>,
    pub true_tokens: Option<Vec<String>>,
    pub false_tokens: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
}

/// A view, either a preset or an explicit description.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewSection {
    pub name: Option<String>,
    pub preset: Option<String>,
    pub param: Option<String>,
    /// Scope of a ranking view: `subUnits`, `topLevel` or `combined`.
    pub ranking: Option<String>,
    pub row_dimension: Option<String>,
    pub column_dimension: Option<String>,
    pub province: Option<String>,
    pub alias_inclusive: Option<bool>,
    pub subject_fields: Option<Vec<String>>,
    pub council_terms: Option<Vec<String>>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub delegation: Option<String>,
    pub entities: Option<String>,
    pub ratio_mode: Option<String>,
    pub row_order: Option<String>,
    /// Reindex the rows on the canonical council term sequence.
    pub reindex_terms: Option<bool>,
    pub fold_aliases: Option<bool>,
    pub average_row: Option<String>,
    pub total_row: Option<String>,
    pub top_n: Option<usize>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrdsConfig {
    /// `default` or `korean`: the starting point for columns, terms and aliases.
    pub profile: Option<String>,
    pub input: Option<InputSource>,
    pub columns: Option<ColumnsConfig>,
    pub terms: Option<TermsConfig>,
    pub classifier: Option<ClassifierSection>,
    /// `reject` (default) or `drop`.
    pub blank_fields: Option<String>,
    pub aliases: Option<Vec<AliasEntry>>,
    pub views: Option<Vec<ViewSection>>,
}

pub fn read_config(path: &str) -> OrdsResult<OrdsConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: OrdsConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> OrdsResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

fn replace<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

pub fn pipeline_config(config: &OrdsConfig, korean: bool) -> OrdsResult<PipelineConfig> {
    let mut res = match config.profile.as_deref() {
        None | Some("default") if !korean => PipelineConfig::default(),
        None | Some("default") | Some("korean") => PipelineConfig::korean(),
        Some(x) => whatever!("Unknown profile {:?} (expected default or korean)", x),
    };

    if let Some(c) = &config.columns {
        let cols = &mut res.normalize.columns;
        replace(&mut cols.province, &c.province);
        replace(&mut cols.municipality, &c.municipality);
        replace(&mut cols.subject_field, &c.subject_field);
        replace(&mut cols.council_term, &c.council_term);
        replace(&mut cols.enactment_date, &c.enactment_date);
    }
    if let Some(t) = &config.terms {
        let terms = &mut res.normalize.terms;
        replace(&mut terms.label_prefix, &t.label_prefix);
        replace(&mut terms.label_suffix, &t.label_suffix);
        replace(&mut terms.count, &t.count);
        replace(&mut terms.unclassifiable_markers, &t.unclassifiable_markers);
    }
    if let Some(c) = &config.classifier {
        let cl = &mut res.classifier;
        replace(&mut cl.expected_header, &c.expected_header);
        replace(&mut cl.header_keywords, &c.header_keywords);
        replace(&mut cl.true_tokens, &c.true_tokens);
        replace(&mut cl.false_tokens, &c.false_tokens);
    }
    res.normalize.blank_fields = match config.blank_fields.as_deref() {
        None | Some("reject") => BlankFieldPolicy::Reject,
        Some("drop") => BlankFieldPolicy::Drop,
        Some(x) => whatever!("Unknown blank field policy {:?} (expected reject or drop)", x),
    };
    for entry in config.aliases.iter().flatten() {
        for alias in entry.aliases.iter() {
            res.aliases = std::mem::take(&mut res.aliases).with_alias(&entry.canonical, alias);
        }
    }
    Ok(res)
}

fn parse_date(s: &str) -> OrdsResult<NaiveDate> {
    match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        Ok(d) => Ok(d),
        Err(_) => whatever!("Invalid date {:?} (expected YYYY-MM-DD)", s),
    }
}

fn read_filters(v: &ViewSection) -> OrdsResult<Filters> {
    let date_range = match (&v.date_from, &v.date_to) {
        (None, None) => None,
        (from, to) => Some(DateRange {
            from: match from {
                Some(s) => parse_date(s)?,
                None => NaiveDate::MIN,
            },
            to: match to {
                Some(s) => parse_date(s)?,
                None => NaiveDate::MAX,
            },
        }),
    };
    Ok(Filters {
        jurisdiction: v.province.as_ref().map(|p| JurisdictionFilter {
            province: p.clone(),
            alias_inclusive: v.alias_inclusive.unwrap_or(true),
        }),
        subject_fields: v
            .subject_fields
            .as_ref()
            .map(|l| l.iter().cloned().collect::<BTreeSet<String>>()),
        council_terms: v
            .council_terms
            .as_ref()
            .map(|l| l.iter().cloned().collect::<BTreeSet<String>>()),
        date_range,
        delegation: match v.delegation.as_deref() {
            None | Some("all") => DelegationFilter::All,
            Some("delegatedOnly") => DelegationFilter::DelegatedOnly,
            Some("autonomousOnly") => DelegationFilter::AutonomousOnly,
            Some(x) => whatever!("Unknown delegation filter {:?}", x),
        },
        entities: read_scope(v.entities.as_deref())?,
    })
}

fn read_scope(s: Option<&str>) -> OrdsResult<EntityScope> {
    match s {
        None | Some("combined") => Ok(EntityScope::Combined),
        Some("subUnits") => Ok(EntityScope::SubUnits),
        Some("topLevel") => Ok(EntityScope::TopLevel),
        Some(x) => whatever!("Unknown entity scope {:?}", x),
    }
}

/// Turns a view section into a view. Explicit filters are ignored for presets.
pub fn view_config(v: &ViewSection, terms: &TermScheme) -> OrdsResult<ViewConfig> {
    let mut res = if let Some(preset) = &v.preset {
        Preset::parse(preset, v.param.as_deref())
            .context(OrdinanceSnafu {})?
            .view(terms)
    } else if v.ranking.is_some() {
        let scope = read_scope(v.ranking.as_deref())?;
        ViewConfig {
            name: format!("ranking:{:?}", scope),
            kind: ViewKind::Ranking { scope },
            filters: read_filters(v)?,
            ratio_mode: RatioMode::Counts,
            top_n: None,
        }
    } else {
        let row_name = match &v.row_dimension {
            Some(x) => x.clone(),
            None => whatever!("A view needs a preset, a ranking scope or a row dimension"),
        };
        let row_dimension = Dimension::from_name(&row_name).context(OrdinanceSnafu {})?;
        let column_dimension =
            Dimension::from_name(v.column_dimension.as_deref().unwrap_or("subjectField"))
                .context(OrdinanceSnafu {})?;
        let options = CrossTabOptions {
            reindex_rows: if v.reindex_terms.unwrap_or(false) {
                Some(terms.sequence())
            } else {
                None
            },
            reindex_columns: None,
            row_order: match v.row_order.as_deref() {
                None | Some("observed") => RowOrder::Observed,
                Some("natural") => RowOrder::Natural,
                Some("descendingTotal") => RowOrder::DescendingTotal,
                Some(x) => whatever!("Unknown row order {:?}", x),
            },
            fold_aliases: v.fold_aliases.unwrap_or(false),
            top_n: None,
            average_row: v.average_row.clone(),
            total_row: v.total_row.clone(),
        };
        ViewConfig {
            name: format!("{}x{}", row_dimension.name(), column_dimension.name()),
            kind: ViewKind::CrossTab {
                row_dimension,
                column_dimension,
                options,
            },
            filters: read_filters(v)?,
            ratio_mode: match v.ratio_mode.as_deref() {
                None | Some("counts") => RatioMode::Counts,
                Some("percentage") => RatioMode::Percentage,
                Some(x) => whatever!("Unknown ratio mode {:?}", x),
            },
            top_n: None,
        }
    };
    if let Some(name) = &v.name {
        res.name = name.clone();
    }
    if v.top_n.is_some() {
        res.top_n = v.top_n;
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let js = r#"{
            "profile": "korean",
            "input": {"filePath": "ordinances.xlsx", "excelWorksheetName": "Sheet1"},
            "terms": {"count": 10},
            "classifier": {"trueTokens": ["위임", "예"]},
            "blankFields": "drop",
            "aliases": [{"canonical": "전북특별자치도", "aliases": ["전라북도"]}],
            "views": [
                {"preset": "provinceTrend", "param": "강원특별자치도"},
                {"rowDimension": "municipality", "province": "전북특별자치도",
                 "entities": "subUnits", "delegation": "delegatedOnly",
                 "dateFrom": "2018-07-01", "ratioMode": "percentage", "topN": 5},
                {"ranking": "topLevel", "name": "provinces"}
            ]
        }"#;
        let config: OrdsConfig = serde_json::from_str(js).unwrap();
        assert_eq!(
            config.input.as_ref().unwrap().excel_worksheet_name.as_deref(),
            Some("Sheet1")
        );

        let p = pipeline_config(&config, false).unwrap();
        assert_eq!(p.normalize.columns.province, "광역");
        assert_eq!(p.normalize.terms.count, 10);
        assert_eq!(p.normalize.blank_fields, BlankFieldPolicy::Drop);
        assert_eq!(p.classifier.true_tokens, vec!["위임", "예"]);
        assert_eq!(
            p.aliases.resolve_names("전북특별자치도"),
            vec!["전북특별자치도", "전라북도"]
        );
        assert_eq!(
            p.aliases.resolve_names("강원특별자치도"),
            vec!["강원특별자치도", "강원도"]
        );

        let views = config.views.unwrap();
        let trend = view_config(&views[0], &p.normalize.terms).unwrap();
        assert!(trend.name.starts_with("provinceTrend"));

        let explicit = view_config(&views[1], &p.normalize.terms).unwrap();
        assert_eq!(explicit.top_n, Some(5));
        assert_eq!(explicit.ratio_mode, RatioMode::Percentage);
        assert_eq!(explicit.filters.entities, EntityScope::SubUnits);
        assert_eq!(explicit.filters.delegation, DelegationFilter::DelegatedOnly);
        let range = explicit.filters.date_range.unwrap();
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2018, 7, 1).unwrap());
        assert_eq!(range.to, NaiveDate::MAX);

        let ranking = view_config(&views[2], &p.normalize.terms).unwrap();
        assert_eq!(ranking.name, "provinces");
        assert_eq!(
            ranking.kind,
            ViewKind::Ranking {
                scope: EntityScope::TopLevel
            }
        );
    }

    #[test]
    fn default_profile() {
        let p = pipeline_config(&OrdsConfig::default(), false).unwrap();
        assert_eq!(p, PipelineConfig::default());
        let k = pipeline_config(&OrdsConfig::default(), true).unwrap();
        assert_eq!(k, PipelineConfig::korean());
    }

    #[test]
    fn bad_options() {
        let terms = TermScheme::default();
        let bad_dim = ViewSection {
            row_dimension: Some("color".to_string()),
            ..ViewSection::default()
        };
        assert!(matches!(
            view_config(&bad_dim, &terms),
            Err(CliError::Ordinance { .. })
        ));
        assert!(view_config(&ViewSection::default(), &terms).is_err());
        let bad_date = ViewSection {
            row_dimension: Some("province".to_string()),
            date_to: Some("yesterday".to_string()),
            ..ViewSection::default()
        };
        assert!(view_config(&bad_date, &terms).is_err());
        let bad_profile = OrdsConfig {
            profile: Some("french".to_string()),
            ..OrdsConfig::default()
        };
        assert!(pipeline_config(&bad_profile, false).is_err());
    }
}
