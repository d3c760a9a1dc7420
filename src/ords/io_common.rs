use std::path::Path;

use chrono::{Duration, NaiveDate};
use snafu::prelude::*;

use crate::ords::*;

/// The file formats the loaders understand.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Csv,
    Xlsx,
}

impl InputType {
    pub fn from_name(name: &str) -> OrdsResult<InputType> {
        match name.to_lowercase().as_str() {
            "csv" => Ok(InputType::Csv),
            "xlsx" | "excel" => Ok(InputType::Xlsx),
            x => whatever!("Unknown input type {:?} (expected csv or xlsx)", x),
        }
    }

    /// Guesses the type from the file extension. Anything that is not a spreadsheet is read as CSV.
    pub fn infer(path: &str) -> InputType {
        match Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
        {
            Some(e) if e == "xlsx" || e == "xlsm" => InputType::Xlsx,
            _ => InputType::Csv,
        }
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Date of a spreadsheet serial day number. The fractional part (time of day) is ignored.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_types() {
        assert_eq!(InputType::infer("data/ordinances.XLSX"), InputType::Xlsx);
        assert_eq!(InputType::infer("data/ordinances.csv"), InputType::Csv);
        assert_eq!(InputType::infer("ordinances"), InputType::Csv);
        assert_eq!(InputType::from_name("excel").unwrap(), InputType::Xlsx);
        assert!(InputType::from_name("ods").is_err());
    }

    #[test]
    fn serial_dates() {
        assert_eq!(
            excel_serial_to_date(43466.0),
            NaiveDate::from_ymd_opt(2019, 1, 1)
        );
        assert_eq!(
            excel_serial_to_date(43466.75),
            NaiveDate::from_ymd_opt(2019, 1, 1)
        );
        assert_eq!(excel_serial_to_date(-3.0), None);
        assert_eq!(simplify_file_name("/tmp/x/ordinances.csv"), "ordinances.csv");
    }
}
