use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{debug, info, warn};
use ordinance_stats::{RawTable, RawValue};
use snafu::prelude::*;

use crate::ords::io_common::excel_serial_to_date;
use crate::ords::*;

/// Reads a worksheet of an Excel file. The first row holds the column names.
///
/// Without a worksheet name, the first worksheet of the workbook is used.
pub fn read_xlsx_table(path: &str, worksheet_name: Option<&str>) -> OrdsResult<RawTable> {
    let wrange = get_range(path, worksheet_name)?;
    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyWorksheetSnafu { path })?;
    let columns: Vec<String> = header
        .iter()
        .map(|c| {
            read_cell(c)
                .to_category()
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        })
        .collect();
    debug!("read_xlsx_table: header: {:?}", columns);

    let mut table = RawTable::new(columns);
    for row in rows {
        let cells: Vec<RawValue> = row.iter().map(read_cell).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        table.rows.push(cells);
    }
    info!("read_xlsx_table: {}: {} rows", path, table.len());
    Ok(table)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> OrdsResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyWorksheetSnafu { path })?,
    };
    wrange.context(OpeningExcelSnafu { path })
}

fn read_cell(cell: &DataType) -> RawValue {
    match cell {
        DataType::Empty => RawValue::Empty,
        DataType::String(s) => RawValue::Text(s.clone()),
        DataType::Int(i) => RawValue::Int(*i),
        DataType::Float(f) => RawValue::Float(*f),
        DataType::Bool(b) => RawValue::Bool(*b),
        DataType::DateTime(f) => match excel_serial_to_date(*f) {
            Some(d) => RawValue::Date(d),
            None => RawValue::Float(*f),
        },
        x => {
            warn!("read_cell: unreadable cell {:?}, treated as empty", x);
            RawValue::Empty
        }
    }
}
