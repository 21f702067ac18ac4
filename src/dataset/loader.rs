//! Load the account dataset from a workbook sheet or a CSV file
//!
//! After reading, a fixed list of irrelevant columns is removed and the
//! grouping columns are cast to categorical. Both steps skip names that are
//! not present in the file.

use super::{format_label, Dataset};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDateTime, NaiveTime};
use log::{debug, info};
use polars::prelude::Column;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Cell text read as a missing value in both CSV and workbook input
pub const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na(text: &str) -> bool {
    NA_VALUES.contains(&text)
}

/// A single parsed input cell, before column typing
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

/// Post-load column handling
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Sheet read from workbooks; ignored for CSV
    pub sheet: String,
    pub drop_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl From<&DashboardConfig> for LoadOptions {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            sheet: config.sheet.clone(),
            drop_columns: config.drop_columns.clone(),
            categorical_columns: config.categorical_columns.clone(),
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&DashboardConfig::default())
    }
}

/// Load the dataset, choosing the reader from the file extension
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let raw = match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)?;
            read_csv(file)?
        }
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, &options.sheet)?,
        other => return Err(DashboardError::UnsupportedFormat(format!(
            "{} (extension '{}')",
            path.display(),
            other
        ))),
    };

    let dataset = finish(raw, options)?;
    info!(
        "Loaded {} rows x {} columns from {}",
        dataset.n_rows(),
        dataset.n_cols(),
        path.display()
    );
    Ok(dataset)
}

/// Load the dataset from any CSV reader
pub fn load_dataset_from_csv_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<Dataset> {
    let raw = read_csv(reader)?;
    finish(raw, options)
}

type RawColumns = Vec<(String, Vec<Cell>)>;

fn finish(raw: RawColumns, options: &LoadOptions) -> Result<Dataset> {
    let columns: Vec<Column> = raw
        .into_iter()
        .map(|(name, cells)| typed_column(&name, cells))
        .collect();
    let mut dataset = Dataset::new(columns)?;

    let dropped = dataset.drop_columns(&options.drop_columns);
    debug!("Dropped columns: {:?}", dropped);

    for name in &options.categorical_columns {
        if dataset.to_categorical(name)? {
            debug!("Cast '{}' to categorical", name);
        }
    }

    Ok(dataset)
}

/// Float64 when every non-empty cell is a number, String otherwise
fn typed_column(name: &str, cells: Vec<Cell>) -> Column {
    if cells.iter().all(|c| !matches!(c, Cell::Text(_))) {
        let values: Vec<Option<f64>> = cells
            .into_iter()
            .map(|c| match c {
                Cell::Number(v) => Some(v),
                _ => None,
            })
            .collect();
        Column::new(name.into(), values)
    } else {
        let values: Vec<Option<String>> = cells
            .into_iter()
            .map(|c| match c {
                Cell::Number(v) => Some(format_label(v)),
                Cell::Text(s) => Some(s),
                Cell::Empty => None,
            })
            .collect();
        Column::new(name.into(), values)
    }
}

/// Blank headers become `Unnamed: i`; repeats get `.1`, `.2`, ... suffixes
fn header_names(header: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::new();

    for (i, raw) in header.enumerate() {
        let trimmed = raw.trim();
        let mut name = if trimmed.is_empty() {
            format!("Unnamed: {}", i)
        } else {
            trimmed.to_string()
        };

        let mut count = seen.get(&name).copied().unwrap_or(0);
        while count > 0 {
            seen.insert(name.clone(), count + 1);
            name = format!("{}.{}", name, count);
            count = seen.get(&name).copied().unwrap_or(0);
        }
        seen.insert(name.clone(), count + 1);
        names.push(name);
    }
    names
}

fn read_workbook(path: &Path, sheet: &str) -> Result<RawColumns> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|s| s == sheet) {
        return Err(DashboardError::SheetNotFound(format!(
            "'{}' in {}",
            sheet,
            path.display()
        )));
    }

    let range = workbook.worksheet_range(sheet)?;
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| DashboardError::EmptyData(format!("sheet '{}' has no header row", sheet)))?;

    let names = header_names(header.iter().map(|d| match d {
        Data::Empty => String::new(),
        other => other.to_string(),
    }));
    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];

    for row in rows {
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(row.get(i).map(cell_from_data).unwrap_or(Cell::Empty));
        }
    }

    Ok(names.into_iter().zip(cells).collect())
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) if f.is_nan() => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) if is_na(s.trim()) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) => Cell::Text(date_text(ts)),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

/// Date cells become text; midnight timestamps print as plain dates
fn date_text(ts: NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn read_csv<R: Read>(reader: R) -> Result<RawColumns> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let names = header_names(reader.headers()?.iter().map(|h| h.to_string()));
    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];

    for record in reader.records() {
        let record = record?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).map(cell_from_text).unwrap_or(Cell::Empty));
        }
    }

    Ok(names.into_iter().zip(cells).collect())
}

fn cell_from_text(text: &str) -> Cell {
    let trimmed = text.trim();
    if is_na(trimmed) {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_nan() => Cell::Empty,
        Ok(v) => Cell::Number(v),
        Err(_) => Cell::Text(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnKind;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
    use std::io::Write;

    const SAMPLE: &str = "\
accgrpid,cluster_geo,occtype,occtype_grp,risk_load,AAL_usd,city
1,13,RES1,RES,10.0,100,Santiago
2,13,RES2,RES,20.0,300,Providencia
3,5,COM1,COM,5.0,,Valparaiso
";

    #[test]
    fn test_csv_prunes_and_categorizes() {
        let ds = load_dataset_from_csv_reader(SAMPLE.as_bytes(), &LoadOptions::default())
            .expect("Failed to load");

        assert!(!ds.has_column("accgrpid"));
        assert!(!ds.has_column("occtype"));
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.kind("cluster_geo"), Some(ColumnKind::Categorical));
        assert_eq!(ds.kind("occtype_grp"), Some(ColumnKind::Categorical));
        assert_eq!(ds.kind("risk_load"), Some(ColumnKind::Numeric));
        assert_eq!(ds.kind("city"), Some(ColumnKind::Text));

        assert_eq!(ds.values("AAL_usd").unwrap()[2], None);
        assert_eq!(ds.labels("cluster_geo").unwrap()[0].as_deref(), Some("13"));
    }

    #[test]
    fn test_absent_categorical_columns_ignored() {
        let options = LoadOptions {
            categorical_columns: vec!["year_band".to_string()],
            ..LoadOptions::default()
        };
        let ds = load_dataset_from_csv_reader(SAMPLE.as_bytes(), &options).expect("Failed to load");
        assert!(ds.categorical_columns().is_empty());
    }

    #[test]
    fn test_load_dataset_from_csv_path() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(SAMPLE.as_bytes()).expect("Failed to write");

        let ds = load_dataset(file.path(), &LoadOptions::default()).expect("Failed to load");
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_cols(), 5);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = load_dataset(Path::new("/nonexistent/base_agrup.csv"), &LoadOptions::default());
        assert!(matches!(result, Err(DashboardError::Io(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = load_dataset(Path::new("base_agrup.parquet"), &LoadOptions::default());
        assert!(matches!(result, Err(DashboardError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_date_text() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        assert_eq!(date_text(date.and_time(NaiveTime::MIN)), "2024-03-01");
        let ts = date.and_hms_opt(13, 5, 0).expect("valid time");
        assert_eq!(date_text(ts), "2024-03-01 13:05:00");
    }

    #[test]
    fn test_blank_header_named() {
        let ds = load_dataset_from_csv_reader(",risk_load\n1,2\n".as_bytes(), &LoadOptions::default())
            .expect("Failed to load");
        assert!(ds.has_column("Unnamed: 0"));
    }

    #[test]
    fn test_duplicate_headers_suffixed() {
        let csv = "risk_load,risk_load,AAL_usd,risk_load,risk_load.1\n1,2,3,4,5\n";
        let ds = load_dataset_from_csv_reader(csv.as_bytes(), &LoadOptions::default()).expect("Failed to load");
        assert_eq!(
            ds.column_names(),
            vec!["risk_load", "risk_load.1", "AAL_usd", "risk_load.2", "risk_load.1.1"]
        );
        assert_eq!(ds.numbers("risk_load.2").unwrap(), vec![4.0]);
    }

    #[test]
    fn test_na_markers_are_missing() {
        let csv = "cluster_geo,risk_load,AAL_usd\n13,10.0,100\n13,NA,300\n5,#N/A,null\n5,None,-NaN\n";
        let ds = load_dataset_from_csv_reader(csv.as_bytes(), &LoadOptions::default()).expect("Failed to load");

        assert_eq!(ds.kind("risk_load"), Some(ColumnKind::Numeric));
        assert_eq!(ds.values("risk_load").unwrap(), vec![Some(10.0), None, None, None]);
        assert_eq!(ds.values("AAL_usd").unwrap(), vec![Some(100.0), Some(300.0), None, None]);

        let aggs = crate::aggregate::aggregate_by(&ds, "cluster_geo", "risk_load", "AAL_usd")
            .expect("aggregate");
        assert_eq!(aggs[1].key, "13");
        assert_eq!(aggs[1].count, 2);
        assert_eq!(aggs[1].risk_avg, Some(10.0));
        assert_eq!(aggs[0].risk_avg, None);
    }

    #[test]
    fn test_every_na_marker_recognized() {
        for marker in NA_VALUES {
            assert_eq!(cell_from_text(marker), Cell::Empty, "{:?}", marker);
            assert_eq!(cell_from_data(&Data::String(marker.to_string())), Cell::Empty, "{:?}", marker);
        }
        assert_eq!(cell_from_text("Nantes"), Cell::Text("Nantes".to_string()));
    }

    fn write_workbook(path: &Path) {
        let mut workbook = Workbook::new();

        let notes = workbook.add_worksheet();
        notes.set_name("resumen").expect("sheet name");
        notes.write_string(0, 0, "not the data sheet").expect("write");

        let sheet = workbook.add_worksheet();
        sheet.set_name("kmeans_com_ward").expect("sheet name");
        let headers = ["accgrpid", "cluster_geo", "risk_load", "AAL_usd", "inspected", "survey_date", "city"];
        for (c, h) in headers.iter().enumerate() {
            sheet.write_string(0, c as u16, *h).expect("write header");
        }

        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let first = ExcelDateTime::from_ymd(2024, 3, 1).expect("date");
        let second = ExcelDateTime::from_ymd(2024, 3, 2).expect("date");

        sheet.write_number(1, 0, 1).expect("write");
        sheet.write_number(1, 1, 13).expect("write");
        sheet.write_number(1, 2, 10.5).expect("write");
        sheet.write_number(1, 3, 100).expect("write");
        sheet.write_boolean(1, 4, true).expect("write");
        sheet.write_datetime_with_format(1, 5, &first, &date_format).expect("write");
        sheet.write_string(1, 6, "Santiago").expect("write");

        sheet.write_number(2, 0, 2).expect("write");
        sheet.write_number(2, 1, 5).expect("write");
        sheet.write_string(2, 2, "NA").expect("write");
        sheet.write_number(2, 3, 50).expect("write");
        sheet.write_boolean(2, 4, false).expect("write");
        sheet.write_datetime_with_format(2, 5, &second, &date_format).expect("write");
        sheet.write_string(2, 6, "Valparaiso").expect("write");

        workbook.save(path).expect("Failed to save workbook");
    }

    #[test]
    fn test_load_named_workbook_sheet() {
        let file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .expect("Failed to create temp file");
        write_workbook(file.path());

        let ds = load_dataset(file.path(), &LoadOptions::default()).expect("Failed to load");
        assert_eq!(ds.n_rows(), 2);
        assert!(!ds.has_column("accgrpid"));
        assert_eq!(ds.kind("cluster_geo"), Some(ColumnKind::Categorical));
        assert_eq!(ds.categories("cluster_geo"), Some(&["5".to_string(), "13".to_string()][..]));

        // The "NA" string cell is missing, so the column stays numeric
        assert_eq!(ds.values("risk_load").unwrap(), vec![Some(10.5), None]);
        assert_eq!(ds.values("inspected").unwrap(), vec![Some(1.0), Some(0.0)]);
        assert_eq!(
            ds.labels("survey_date").unwrap(),
            vec![Some("2024-03-01".to_string()), Some("2024-03-02".to_string())]
        );
        assert_eq!(ds.kind("city"), Some(ColumnKind::Text));
    }

    #[test]
    fn test_missing_workbook_sheet() {
        let file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .expect("Failed to create temp file");
        write_workbook(file.path());

        let options = LoadOptions {
            sheet: "base".to_string(),
            ..LoadOptions::default()
        };
        let result = load_dataset(file.path(), &options);
        assert!(matches!(result, Err(DashboardError::SheetNotFound(_))));
    }

    #[test]
    fn test_error_cells_are_missing() {
        assert_eq!(cell_from_data(&Data::Error(calamine::CellErrorType::Div0)), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Number(1.0));
        assert_eq!(cell_from_data(&Data::Int(7)), Cell::Number(7.0));
    }
}
