mod config;
use log::{debug, info};

pub use crate::config::*;

pub mod aliases;
pub mod builder;
pub mod cache;
pub mod classify;
pub mod crosstab;
pub mod manual;
pub mod metrics;
pub mod normalize;
pub mod presets;
pub mod ranking;

pub use crate::aliases::AliasRegistry;
pub use crate::cache::{SourceKey, TableCache};
pub use crate::crosstab::build_crosstab;
pub use crate::presets::Preset;

/// Everything needed to turn a raw table into a derived table, and to group it.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PipelineConfig {
    pub normalize: NormalizeConfig,
    pub classifier: ClassifierConfig,
    pub aliases: AliasRegistry,
}

impl PipelineConfig {
    /// Korean column headers, term labels and province aliases.
    pub fn korean() -> PipelineConfig {
        PipelineConfig {
            normalize: NormalizeConfig {
                columns: ColumnNames::korean(),
                terms: TermScheme::korean(),
                blank_fields: BlankFieldPolicy::Reject,
            },
            classifier: ClassifierConfig::default(),
            aliases: AliasRegistry::builtin(),
        }
    }
}

/// Normalizes and classifies a raw table.
///
/// Fails before producing anything if a required column or the delegation
/// column cannot be found. Non-fatal conditions are counted in the
/// diagnostics of the returned table.
pub fn ingest(raw: &RawTable, config: &PipelineConfig) -> OrdinanceResult<DerivedTable> {
    info!(
        "ingest: {} rows, {} columns",
        raw.len(),
        raw.columns.len()
    );
    let normalized = normalize::normalize(raw, &config.normalize)?;
    let table = classify::classify(raw, normalized, &config.classifier)?;
    let d = &table.classification_diagnostics;
    info!(
        "ingest: {} records ({} delegated, {} autonomous, {} unparsable terms)",
        table.len(),
        d.delegated,
        d.autonomous,
        table.normalize_diagnostics.unparsable_terms
    );
    Ok(table)
}

/// Computes one view over a derived table.
pub fn run_view(
    table: &DerivedTable,
    view: &ViewConfig,
    aliases: &AliasRegistry,
) -> OrdinanceResult<ViewOutput> {
    if view.top_n == Some(0) {
        return Err(OrdinanceError::InvalidOption {
            message: format!("view {}: top_n must be at least 1", view.name),
        });
    }
    info!("run_view: {}", view.name);
    match &view.kind {
        ViewKind::CrossTab {
            row_dimension,
            column_dimension,
            options,
        } => {
            let top_n = options.top_n.or(view.top_n);
            // Metrics run on every row: growth needs the neighbours that top_n hides.
            let full_options = CrossTabOptions {
                top_n: None,
                ..options.clone()
            };
            let full = build_crosstab(
                table,
                *row_dimension,
                *column_dimension,
                &view.filters,
                &full_options,
                aliases,
            )?;
            let mut derived = metrics::derive(&full);
            let tab = match top_n {
                None => full,
                Some(n) => {
                    let top_options = CrossTabOptions {
                        top_n: Some(n),
                        ..full_options
                    };
                    let tab = build_crosstab(
                        table,
                        *row_dimension,
                        *column_dimension,
                        &view.filters,
                        &top_options,
                        aliases,
                    )?;
                    derived.rows.retain(|r| tab.row_keys.contains(&r.key));
                    tab
                }
            };
            debug!(
                "run_view: {}: mean total growth {:.2}",
                view.name, derived.mean_total_growth
            );
            Ok(ViewOutput {
                name: view.name.clone(),
                table: crosstab_table(&tab, view.ratio_mode),
                metrics_table: Some(metrics_table(&tab, &derived)),
                crosstab: Some(tab),
                metrics: Some(derived),
                ranking: None,
            })
        }
        ViewKind::Ranking { scope } => {
            let entries =
                ranking::rank_filtered(table, *scope, &view.filters, aliases, view.top_n);
            Ok(ViewOutput {
                name: view.name.clone(),
                crosstab: None,
                metrics: None,
                table: ranking_table(&entries),
                ranking: Some(entries),
                metrics_table: None,
            })
        }
    }
}

/// The cross-tab as a rectangular table: one row per real row, then the
/// synthetic rows, with a trailing total column.
///
/// In percentage mode every row holds its shares and the total column holds
/// 100 (or 0 for an empty row).
pub fn crosstab_table(tab: &CrossTab, mode: RatioMode) -> Table {
    let mut header = vec![tab.row_dimension.name().to_string()];
    header.extend(tab.column_keys.iter().cloned());
    header.push("total".to_string());

    let shares = |values: &[f64], total: f64| -> Vec<Cell> {
        let mut cells: Vec<Cell> = values
            .iter()
            .map(|v| Cell::Number(if total > 0.0 { v / total * 100.0 } else { 0.0 }))
            .collect();
        cells.push(Cell::Number(if total > 0.0 { 100.0 } else { 0.0 }));
        cells
    };

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for ((key, counts), total) in tab
        .row_keys
        .iter()
        .zip(tab.counts.iter())
        .zip(tab.row_totals.iter())
    {
        let mut row = vec![Cell::Text(key.clone())];
        match mode {
            RatioMode::Counts => {
                row.extend(counts.iter().map(|c| Cell::Count(*c)));
                row.push(Cell::Count(*total));
            }
            RatioMode::Percentage => {
                let values: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
                row.extend(shares(&values, *total as f64));
            }
        }
        rows.push(row);
    }
    for s in tab.synthetic_rows.iter() {
        let mut row = vec![Cell::Text(s.label.clone())];
        match mode {
            RatioMode::Counts => {
                row.extend(s.values.iter().map(|v| Cell::Number(*v)));
                row.push(Cell::Number(s.total));
            }
            RatioMode::Percentage => row.extend(shares(&s.values, s.total)),
        }
        rows.push(row);
    }
    Table { header, rows }
}

/// Shares, growth and concentration of every real row.
pub fn metrics_table(tab: &CrossTab, derived: &DerivedMetrics) -> Table {
    let mut header = vec![tab.row_dimension.name().to_string(), "total".to_string()];
    header.extend(derived.column_keys.iter().map(|k| format!("{} %", k)));
    header.extend(derived.column_keys.iter().map(|k| format!("{} growth", k)));
    header.extend(
        ["average growth", "total growth", "concentration"]
            .iter()
            .map(|s| s.to_string()),
    );

    let opt = |v: Option<f64>| v.map(Cell::Number).unwrap_or(Cell::Empty);
    let rows = derived
        .rows
        .iter()
        .map(|r| {
            let mut row = vec![Cell::Text(r.key.clone()), Cell::Count(r.total)];
            row.extend(r.percentage.iter().map(|p| Cell::Number(*p)));
            match &r.growth {
                Some(g) => row.extend(g.iter().map(|v| Cell::Number(*v))),
                None => row.extend(derived.column_keys.iter().map(|_| Cell::Empty)),
            }
            row.push(opt(r.average_growth));
            row.push(opt(r.total_growth));
            row.push(Cell::Number(r.concentration));
            row
        })
        .collect();
    Table { header, rows }
}

pub fn ranking_table(entries: &[RankedEntry]) -> Table {
    Table {
        header: ["rank", "province", "municipality", "kind", "total"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rows: entries
            .iter()
            .map(|e| {
                vec![
                    Cell::Count(e.rank as u64),
                    Cell::Text(e.province.clone()),
                    Cell::Text(e.municipality.clone()),
                    Cell::Text(e.kind.label().to_string()),
                    Cell::Count(e.total),
                ]
            })
            .collect(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// A derived table from (province, municipality, field, term, delegation) rows.
    pub fn derived(rows: &[(&str, &str, &str, &str, &str)]) -> DerivedTable {
        init_logs();
        let mut raw = RawTable::new(
            [
                "province",
                "municipality",
                "subjectField",
                "councilTerm",
                "delegationRaw",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        for (p, m, f, t, d) in rows.iter() {
            raw.rows.push(
                [p, m, f, t, d]
                    .iter()
                    .map(|s| RawValue::from(**s))
                    .collect(),
            );
        }
        match ingest(&raw, &PipelineConfig::default()) {
            Ok(t) => t,
            Err(e) => panic!("test table does not ingest: {}", e),
        }
    }
}
