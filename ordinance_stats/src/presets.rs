use std::collections::BTreeSet;

use crate::config::*;

const WITH_TOP_LEVEL: &str = ":withTopLevel";

/// The fixed views offered by the ordinance dashboards.
///
/// Each preset is only a [`ViewConfig`]: they all run through the same
/// cross-tab and ranking code.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Preset {
    /// Provinces by subject field, for one council term.
    TermProvinces { term: u32 },
    /// Council terms by subject field for one province and its former names,
    /// over the whole canonical term sequence.
    ProvinceTrend { province: String },
    /// Municipalities of one province by subject field.
    Municipalities {
        province: String,
        include_top_level: bool,
    },
    /// Council terms by subject field, nationwide.
    NationalTrend,
    /// Share of delegated and autonomous ordinances per province, with an average row.
    DelegationShares,
    Ranking { scope: EntityScope },
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::TermProvinces { .. } => "termProvinces",
            Preset::ProvinceTrend { .. } => "provinceTrend",
            Preset::Municipalities { .. } => "municipalities",
            Preset::NationalTrend => "nationalTrend",
            Preset::DelegationShares => "delegationShares",
            Preset::Ranking { .. } => "ranking",
        }
    }

    /// Reads a preset from its name and its single parameter, if any.
    ///
    /// `termProvinces` takes a term number, `provinceTrend` and
    /// `municipalities` a province name, `ranking` one of `subUnits`,
    /// `topLevel` or `combined` (default). A `municipalities` parameter ending
    /// in `:withTopLevel` keeps the province's own row.
    pub fn parse(name: &str, param: Option<&str>) -> OrdinanceResult<Preset> {
        let required = |what: &str| -> OrdinanceResult<String> {
            match param {
                Some(p) if !p.trim().is_empty() => Ok(p.trim().to_string()),
                _ => Err(OrdinanceError::InvalidOption {
                    message: format!("preset {} needs a {}", name, what),
                }),
            }
        };
        match name {
            "termProvinces" => {
                let p = required("council term number")?;
                let term = p.parse::<u32>().map_err(|_| OrdinanceError::InvalidOption {
                    message: format!("invalid council term number {:?}", p),
                })?;
                if term == 0 {
                    return Err(OrdinanceError::InvalidOption {
                        message: "council terms start at 1".to_string(),
                    });
                }
                Ok(Preset::TermProvinces { term })
            }
            "provinceTrend" => Ok(Preset::ProvinceTrend {
                province: required("province")?,
            }),
            "municipalities" => {
                let p = required("province")?;
                let include_top_level = p.ends_with(WITH_TOP_LEVEL);
                let province = p.trim_end_matches(WITH_TOP_LEVEL).trim().to_string();
                if province.is_empty() {
                    return Err(OrdinanceError::InvalidOption {
                        message: format!("preset {} needs a province", name),
                    });
                }
                Ok(Preset::Municipalities {
                    province,
                    include_top_level,
                })
            }
            "nationalTrend" => Ok(Preset::NationalTrend),
            "delegationShares" => Ok(Preset::DelegationShares),
            "ranking" => {
                let scope = match param.map(|p| p.trim()) {
                    None | Some("") | Some("combined") => EntityScope::Combined,
                    Some("subUnits") => EntityScope::SubUnits,
                    Some("topLevel") => EntityScope::TopLevel,
                    Some(x) => {
                        return Err(OrdinanceError::InvalidOption {
                            message: format!("unknown ranking scope {:?}", x),
                        })
                    }
                };
                Ok(Preset::Ranking { scope })
            }
            x => Err(OrdinanceError::InvalidOption {
                message: format!("unknown preset {:?}", x),
            }),
        }
    }

    /// The view this preset stands for. Term labels come from `terms`.
    pub fn view(&self, terms: &TermScheme) -> ViewConfig {
        let crosstab = |row_dimension, options| ViewKind::CrossTab {
            row_dimension,
            column_dimension: Dimension::SubjectField,
            options,
        };
        let jurisdiction = |province: &str| {
            Some(JurisdictionFilter {
                province: province.to_string(),
                alias_inclusive: true,
            })
        };

        let (name, kind, filters, ratio_mode) = match self {
            Preset::TermProvinces { term } => (
                format!("{}:{}", self.name(), term),
                crosstab(
                    Dimension::Province,
                    CrossTabOptions {
                        row_order: RowOrder::DescendingTotal,
                        ..CrossTabOptions::default()
                    },
                ),
                Filters {
                    council_terms: Some(BTreeSet::from([terms.label(*term)])),
                    ..Filters::default()
                },
                RatioMode::Counts,
            ),
            Preset::ProvinceTrend { province } => (
                format!("{}:{}", self.name(), province),
                crosstab(
                    Dimension::CouncilTerm,
                    CrossTabOptions {
                        reindex_rows: Some(terms.sequence()),
                        ..CrossTabOptions::default()
                    },
                ),
                Filters {
                    jurisdiction: jurisdiction(province),
                    ..Filters::default()
                },
                RatioMode::Counts,
            ),
            Preset::Municipalities {
                province,
                include_top_level,
            } => (
                format!("{}:{}", self.name(), province),
                crosstab(
                    Dimension::Municipality,
                    CrossTabOptions {
                        row_order: RowOrder::DescendingTotal,
                        ..CrossTabOptions::default()
                    },
                ),
                Filters {
                    jurisdiction: jurisdiction(province),
                    entities: if *include_top_level {
                        EntityScope::Combined
                    } else {
                        EntityScope::SubUnits
                    },
                    ..Filters::default()
                },
                RatioMode::Counts,
            ),
            Preset::NationalTrend => (
                self.name().to_string(),
                crosstab(
                    Dimension::CouncilTerm,
                    CrossTabOptions {
                        row_order: RowOrder::Natural,
                        ..CrossTabOptions::default()
                    },
                ),
                Filters::default(),
                RatioMode::Counts,
            ),
            Preset::DelegationShares => (
                self.name().to_string(),
                ViewKind::CrossTab {
                    row_dimension: Dimension::Province,
                    column_dimension: Dimension::Delegation,
                    options: CrossTabOptions {
                        reindex_columns: Some(vec![
                            DelegationKind::Delegated.label().to_string(),
                            DelegationKind::Autonomous.label().to_string(),
                        ]),
                        row_order: RowOrder::Natural,
                        fold_aliases: true,
                        average_row: Some("{n}-province average".to_string()),
                        ..CrossTabOptions::default()
                    },
                },
                Filters::default(),
                RatioMode::Percentage,
            ),
            Preset::Ranking { scope } => (
                format!("{}:{:?}", self.name(), scope),
                ViewKind::Ranking { scope: *scope },
                Filters::default(),
                RatioMode::Counts,
            ),
        };

        ViewConfig {
            name,
            kind,
            filters,
            ratio_mode,
            top_n: None,
        }
    }
}
