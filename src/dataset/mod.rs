//! Account dataset held in a polars `DataFrame`, plus spreadsheet/CSV loading

pub mod loader;
pub mod describe;

pub use loader::{load_dataset, load_dataset_from_csv_reader, LoadOptions};
pub use describe::{correlation_matrix, describe, value_counts, CorrelationMatrix, DescribeRow};

use crate::error::{DashboardError, Result};
use polars::prelude::*;

/// Text shown for a missing value in tables
pub const MISSING: &str = "NaN";

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    Categorical,
}

/// Format a number used as a label: integral values print without a fraction
pub fn format_label(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

fn format_cell(x: f64) -> String {
    if x.fract() == 0.0 {
        format_label(x)
    } else {
        format!("{:.4}", x)
    }
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
    )
}

/// Column values as `f64`, with NaN read as missing
pub(crate) fn column_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Column values as group labels; numbers go through [`format_label`]
pub(crate) fn column_labels(column: &Column) -> Result<Vec<Option<String>>> {
    if is_numeric(column.dtype()) {
        return Ok(column_values(column)?
            .into_iter()
            .map(|v| v.map(format_label))
            .collect());
    }
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// The loaded table
///
/// Categorical columns are stored as their string labels; the ordered
/// category list for each one is kept alongside the frame.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    frame: DataFrame,
    categories: Vec<(String, Vec<String>)>,
}

impl Dataset {
    /// Build from equal-length columns
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        Ok(Self::from_frame(DataFrame::new(columns)?))
    }

    pub fn from_frame(frame: DataFrame) -> Self {
        Self { frame, categories: Vec::new() }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_cols(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.frame.get_column_names_str()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Look up a column; a missing column is an error
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| DashboardError::ColumnNotFound(name.to_string()))
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        let column = self.frame.column(name).ok()?;
        Some(if self.categories(name).is_some() {
            ColumnKind::Categorical
        } else if is_numeric(column.dtype()) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        })
    }

    /// Ordered categories of a categorical column
    pub fn categories(&self, name: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_slice())
    }

    /// Values of a numeric column; `None` marks a missing value
    pub fn values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.require(name)?;
        if self.kind(name) != Some(ColumnKind::Numeric) {
            return Err(DashboardError::Schema(format!("column '{}' is not numeric", name)));
        }
        column_values(column)
    }

    /// Non-missing values of a numeric column
    pub fn numbers(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.values(name)?.into_iter().flatten().collect())
    }

    /// Group labels of any column
    pub fn labels(&self, name: &str) -> Result<Vec<Option<String>>> {
        column_labels(self.require(name)?)
    }

    /// The first `n` rows as table text; missing values show as `NaN`
    pub fn preview(&self, n: usize) -> Result<Vec<Vec<String>>> {
        let head = self.frame.head(Some(n));
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(head.width());
        for column in head.get_columns() {
            let rendered = if is_numeric(column.dtype()) {
                column_values(column)?
                    .into_iter()
                    .map(|v| v.map(format_cell).unwrap_or_else(|| MISSING.to_string()))
                    .collect()
            } else {
                column_labels(column)?
                    .into_iter()
                    .map(|v| v.unwrap_or_else(|| MISSING.to_string()))
                    .collect()
            };
            cells.push(rendered);
        }

        Ok((0..head.height())
            .map(|row| cells.iter().map(|c| c[row].clone()).collect())
            .collect())
    }

    /// Remove the named columns that exist; returns the names actually removed
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut dropped = Vec::new();
        for name in names {
            if self.frame.drop_in_place(name).is_ok() {
                self.categories.retain(|(n, _)| n != name);
                dropped.push(name.clone());
            }
        }
        dropped
    }

    /// Cast a column to categorical; returns false when the column is absent
    ///
    /// Categories are the distinct non-missing values, sorted numerically for
    /// numeric sources and lexically for text.
    pub fn to_categorical(&mut self, name: &str) -> Result<bool> {
        if self.categories(name).is_some() {
            return Ok(true);
        }
        let Ok(column) = self.frame.column(name) else {
            return Ok(false);
        };

        let distinct = self
            .frame
            .clone()
            .lazy()
            .select([col(name).drop_nulls().unique().sort(SortOptions::default())])
            .collect()?;
        let categories: Vec<String> = column_labels(distinct.column(name)?)?
            .into_iter()
            .flatten()
            .collect();

        let labels = column_labels(column)?;
        self.frame.with_column(Column::new(name.into(), labels))?;
        self.categories.push((name.to_string(), categories));
        Ok(true)
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_of_kind(ColumnKind::Numeric)
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns_of_kind(ColumnKind::Categorical)
    }

    fn columns_of_kind(&self, kind: ColumnKind) -> Vec<&str> {
        self.column_names()
            .into_iter()
            .filter(|n| self.kind(n) == Some(kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new("cluster_geo".into(), &[Some(13.0), Some(5.0), Some(13.0), None]),
            Column::new("occtype".into(), &[Some("RES"), Some("COM"), None, Some("RES")]),
            Column::new("risk_load".into(), &[Some(1.5), Some(2.0), None, Some(4.0)]),
        ])
        .expect("Failed to build dataset")
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label(13.0), "13");
        assert_eq!(format_label(-2.0), "-2");
        assert_eq!(format_label(1.25), "1.25");
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = Dataset::new(vec![
            Column::new("a".into(), &[1.0]),
            Column::new("b".into(), &[1.0, 2.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_values_and_labels() {
        let ds = sample();
        assert_eq!(ds.values("risk_load").unwrap(), vec![Some(1.5), Some(2.0), None, Some(4.0)]);
        assert_eq!(ds.numbers("risk_load").unwrap(), vec![1.5, 2.0, 4.0]);
        assert_eq!(ds.labels("cluster_geo").unwrap()[0].as_deref(), Some("13"));
        assert!(matches!(ds.values("occtype"), Err(DashboardError::Schema(_))));
        assert!(matches!(ds.labels("nope"), Err(DashboardError::ColumnNotFound(_))));
    }

    #[test]
    fn test_drop_columns_ignores_absent() {
        let mut ds = sample();
        let dropped = ds.drop_columns(&["occtype".to_string(), "streetname".to_string()]);

        assert_eq!(dropped, vec!["occtype".to_string()]);
        assert!(!ds.has_column("occtype"));
        assert_eq!(ds.n_cols(), 2);
        assert_eq!(ds.n_rows(), 4);
    }

    #[test]
    fn test_numeric_to_categorical_sorted() {
        let mut ds = sample();
        assert!(ds.to_categorical("cluster_geo").unwrap());
        assert!(!ds.to_categorical("missing").unwrap());

        assert_eq!(ds.categories("cluster_geo"), Some(&["5".to_string(), "13".to_string()][..]));
        assert_eq!(
            ds.labels("cluster_geo").unwrap(),
            vec![Some("13".to_string()), Some("5".to_string()), Some("13".to_string()), None]
        );
        assert_eq!(ds.categorical_columns(), vec!["cluster_geo"]);
        assert_eq!(ds.numeric_columns(), vec!["risk_load"]);
    }

    #[test]
    fn test_text_to_categorical_keeps_values() {
        let mut ds = sample();
        ds.to_categorical("occtype").unwrap();
        assert_eq!(ds.kind("occtype"), Some(ColumnKind::Categorical));
        assert_eq!(ds.categories("occtype"), Some(&["COM".to_string(), "RES".to_string()][..]));
        assert_eq!(ds.labels("occtype").unwrap()[0].as_deref(), Some("RES"));
    }

    #[test]
    fn test_preview_marks_missing() {
        let rows = sample().preview(3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["13", "RES", "1.5000"]);
        assert_eq!(rows[2], vec!["13", "NaN", "NaN"]);
    }
}
