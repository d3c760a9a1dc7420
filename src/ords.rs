use log::{debug, info, warn};

use ordinance_stats::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::ords::config_reader::*;
use crate::ords::io_common::{simplify_file_name, InputType};

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} has no worksheet or no header row"))]
    EmptyWorksheet { path: String },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error reading CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error in the ordinance data: {source}"))]
    Ordinance { source: OrdinanceError },
    #[snafu(display("Difference detected between the computed summary and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type OrdsResult<T> = Result<T, CliError>;

fn cell_to_json(cell: &Cell) -> JSValue {
    match cell {
        Cell::Empty => JSValue::Null,
        Cell::Text(s) => json!(s),
        Cell::Count(c) => json!(c),
        Cell::Number(x) => json!(x),
    }
}

fn table_to_json(table: &Table) -> JSValue {
    let rows: Vec<JSValue> = table
        .rows
        .iter()
        .map(|row| JSValue::Array(row.iter().map(cell_to_json).collect()))
        .collect();
    json!({"header": table.header, "rows": rows})
}

fn view_to_json(view: &ViewOutput) -> JSValue {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    res.insert("name".to_string(), json!(view.name));
    res.insert("table".to_string(), table_to_json(&view.table));
    if let Some(mt) = &view.metrics_table {
        res.insert("metrics".to_string(), table_to_json(mt));
    }
    if let Some(m) = &view.metrics {
        res.insert("meanTotalGrowth".to_string(), json!(m.mean_total_growth));
        let concentration: Vec<JSValue> = metrics::rank_by_concentration(m)
            .iter()
            .map(|e| json!({"rank": e.rank, "key": e.key, "concentration": e.concentration}))
            .collect();
        res.insert("concentrationRanking".to_string(), json!(concentration));
    }
    JSValue::Object(res)
}

fn build_summary_js(source: &str, table: &DerivedTable, views: &[ViewOutput]) -> JSValue {
    let o = table.overview();
    let nd = &table.normalize_diagnostics;
    let cd = &table.classification_diagnostics;
    json!({
        "source": simplify_file_name(source),
        "overview": {
            "records": o.records,
            "provinces": o.provinces,
            "municipalities": o.municipalities,
            "topLevelRecords": o.top_level_records,
            "delegatedRecords": o.delegated_records,
        },
        "diagnostics": {
            "delegationColumn": table.delegation_column,
            "unparsableTerms": nd.unparsable_terms,
            "unparsableDates": nd.unparsable_dates,
            "droppedBlankRows": nd.dropped_blank_rows,
            "delegated": cd.delegated,
            "autonomous": cd.autonomous,
            "missingDelegation": cd.missing,
            "defaultedDelegation": cd.defaulted,
            "defaultedTokens": cd.defaulted_tokens,
        },
        "views": views.iter().map(view_to_json).collect::<Vec<JSValue>>(),
    })
}

// The input file, relative to the directory of the config file when it comes from there.
fn input_path(args: &Args, config: &OrdsConfig) -> OrdsResult<String> {
    if let Some(p) = &args.input {
        return Ok(p.clone());
    }
    let from_config = config.input.as_ref().and_then(|i| i.file_path.clone());
    match (from_config, &args.config) {
        (Some(p), Some(config_path)) => {
            let root = Path::new(config_path.as_str())
                .parent()
                .unwrap_or_else(|| Path::new(""));
            Ok(root.join(p).display().to_string())
        }
        (Some(p), None) => Ok(p),
        (None, _) => whatever!("No input file: pass --input or set input.filePath in the config"),
    }
}

fn read_raw_table(
    path: &str,
    bytes: &[u8],
    input_type: InputType,
    worksheet_name: Option<&str>,
) -> OrdsResult<RawTable> {
    info!("Attempting to read {:?} as {:?}", path, input_type);
    match input_type {
        InputType::Csv => io_csv::parse_csv_table(bytes, path),
        InputType::Xlsx => io_xlsx::read_xlsx_table(path, worksheet_name),
    }
}

fn views(args: &Args, config: &OrdsConfig, terms: &TermScheme) -> OrdsResult<Vec<ViewConfig>> {
    let mut res: Vec<ViewConfig> = if let Some(name) = &args.preset {
        vec![Preset::parse(name, args.param.as_deref())
            .context(OrdinanceSnafu {})?
            .view(terms)]
    } else if let Some(sections) = &config.views {
        sections
            .iter()
            .map(|v| view_config(v, terms))
            .collect::<OrdsResult<Vec<ViewConfig>>>()?
    } else {
        [
            Preset::NationalTrend,
            Preset::DelegationShares,
            Preset::Ranking {
                scope: EntityScope::Combined,
            },
        ]
        .iter()
        .map(|p| p.view(terms))
        .collect()
    };
    if args.top_n.is_some() {
        for v in res.iter_mut() {
            v.top_n = args.top_n;
        }
    }
    Ok(res)
}

pub fn run(args: &Args) -> OrdsResult<()> {
    let config = match &args.config {
        Some(p) => read_config(p)?,
        None => OrdsConfig::default(),
    };
    info!("config: {:?}", config);
    let pipeline = pipeline_config(&config, args.korean)?;
    let views = views(args, &config, &pipeline.normalize.terms)?;

    let path = input_path(args, &config)?;
    let source = config.input.clone().unwrap_or_default();
    let input_type = match args.input_type.as_ref().or(source.provider.as_ref()) {
        Some(name) => InputType::from_name(name)?,
        None => InputType::infer(&path),
    };
    let worksheet_name = args
        .excel_worksheet_name
        .as_ref()
        .or(source.excel_worksheet_name.as_ref());

    let bytes = fs::read(&path).context(OpeningFileSnafu { path: path.clone() })?;
    let key = SourceKey::from_bytes(&bytes);
    let raw = read_raw_table(&path, &bytes, input_type, worksheet_name.map(|s| s.as_str()))?;
    let cache = TableCache::new();
    let table = cache
        .get_or_try_insert(key, || ingest(&raw, &pipeline))
        .context(OrdinanceSnafu {})?;

    let outputs = views
        .iter()
        .map(|v| run_view(&table, v, &pipeline.aliases))
        .collect::<OrdinanceResult<Vec<ViewOutput>>>()
        .context(OrdinanceSnafu {})?;
    debug!("outputs: {:?}", outputs);

    let result_js = build_summary_js(&path, &table, &outputs);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(out_path) => {
            fs::write(out_path, &pretty_js_stats).context(WritingOutputSnafu { path: out_path })?;
            info!("Summary written to {}", out_path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        let summary_ref = read_summary(reference_path)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return ReferenceMismatchSnafu {
                path: reference_path.clone(),
            }
            .fail();
        }
    }

    Ok(())
}
