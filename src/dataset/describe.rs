//! Per-column descriptive statistics, value counts and correlations
//!
//! Numeric columns report count, mean, std, min, quartiles and max.
//! Text and categorical columns report count, unique, top and freq.
//! Cells that do not apply to a column kind are `None`.

use super::{ColumnKind, Dataset};
use crate::error::Result;
use polars::prelude::*;

/// One row of the transposed describe table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescribeRow {
    pub column: String,
    pub count: usize,
    pub unique: Option<usize>,
    pub top: Option<String>,
    pub freq: Option<usize>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

const NUMERIC_STATS: [&str; 8] = ["count", "mean", "std", "min", "q25", "q50", "q75", "max"];

fn stat_alias(column: &str, stat: &str) -> String {
    format!("{}::{}", column, stat)
}

fn numeric_stat_exprs(name: &str) -> Vec<Expr> {
    let x = col(name).cast(DataType::Float64);
    let exprs = [
        x.clone().count(),
        x.clone().mean(),
        x.clone().std(1),
        x.clone().min(),
        x.clone().quantile(lit(0.25), QuantileMethod::Linear),
        x.clone().quantile(lit(0.5), QuantileMethod::Linear),
        x.clone().quantile(lit(0.75), QuantileMethod::Linear),
        x.max(),
    ];
    exprs
        .into_iter()
        .zip(NUMERIC_STATS)
        .map(|(e, stat)| e.cast(DataType::Float64).alias(stat_alias(name, stat)))
        .collect()
}

/// Read a one-row aggregate result
fn scalar(frame: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(frame.column(name)?.f64()?.get(0).filter(|v| !v.is_nan()))
}

/// Describe every column, in dataset order
///
/// Numeric statistics for all numeric columns come from a single lazy query.
pub fn describe(dataset: &Dataset) -> Result<Vec<DescribeRow>> {
    let numeric = dataset.numeric_columns();
    let stats = if numeric.is_empty() {
        DataFrame::default()
    } else {
        dataset
            .frame()
            .clone()
            .lazy()
            .select(numeric.iter().flat_map(|n| numeric_stat_exprs(n)).collect::<Vec<_>>())
            .collect()?
    };

    let mut rows = Vec::with_capacity(dataset.n_cols());
    for name in dataset.column_names() {
        let row = if dataset.kind(name) == Some(ColumnKind::Numeric) {
            let get = |stat: &str| scalar(&stats, &stat_alias(name, stat));
            DescribeRow {
                column: name.to_string(),
                count: get("count")?.unwrap_or(0.0) as usize,
                mean: get("mean")?,
                std: get("std")?,
                min: get("min")?,
                q25: get("q25")?,
                q50: get("q50")?,
                q75: get("q75")?,
                max: get("max")?,
                ..Default::default()
            }
        } else {
            let counts = value_counts(dataset, name)?;
            let observed: Vec<&(String, usize)> = counts.iter().filter(|(_, n)| *n > 0).collect();
            let top = observed.first();
            DescribeRow {
                column: name.to_string(),
                count: observed.iter().map(|(_, n)| n).sum(),
                unique: Some(observed.len()),
                top: top.map(|(label, _)| label.clone()),
                freq: top.map(|(_, n)| *n),
                ..Default::default()
            }
        };
        rows.push(row);
    }
    Ok(rows)
}

/// Label frequencies sorted by count descending, ties in first-seen order
///
/// Categorical columns list unobserved categories with a zero count, as a
/// categorical value count does.
pub fn value_counts(dataset: &Dataset, name: &str) -> Result<Vec<(String, usize)>> {
    let labels = DataFrame::new(vec![Column::new("label".into(), dataset.labels(name)?)])?;
    let counted = labels
        .lazy()
        .filter(col("label").is_not_null())
        .group_by_stable([col("label")])
        .agg([len().alias("count")])
        .sort(
            ["count"],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let keys = counted.column("label")?.str()?;
    let count_column = counted.column("count")?.cast(&DataType::UInt64)?;
    let counts = count_column.u64()?;

    let mut out: Vec<(String, usize)> = keys
        .into_iter()
        .zip(counts.into_iter())
        .filter_map(|(k, n)| Some((k?.to_string(), n? as usize)))
        .collect();

    if let Some(categories) = dataset.categories(name) {
        for category in categories {
            if !out.iter().any(|(k, _)| k == category) {
                out.push((category.clone(), 0));
            }
        }
    }
    Ok(out)
}

/// Square Pearson matrix over the numeric columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// `None` where fewer than two complete pairs exist or a variance is zero
    pub values: Vec<Vec<Option<f64>>>,
}

fn pair_exprs(a: &str, b: &str, tag: &str) -> [Expr; 4] {
    let both = col(a).is_not_null().and(col(b).is_not_null());
    let x = col(a).cast(DataType::Float64).filter(both.clone());
    let y = col(b).cast(DataType::Float64).filter(both);
    let dx = x.clone() - x.clone().mean();
    let dy = y.clone() - y.mean();
    [
        x.count().cast(DataType::Float64).alias(format!("{}::n", tag)),
        (dx.clone() * dy.clone()).sum().alias(format!("{}::xy", tag)),
        (dx.clone() * dx).sum().alias(format!("{}::xx", tag)),
        (dy.clone() * dy).sum().alias(format!("{}::yy", tag)),
    ]
}

/// Pearson correlation of every numeric column pair, pairwise complete
pub fn correlation_matrix(dataset: &Dataset) -> Result<CorrelationMatrix> {
    let names: Vec<String> = dataset.numeric_columns().iter().map(|s| s.to_string()).collect();
    let n = names.len();
    if n == 0 {
        return Ok(CorrelationMatrix::default());
    }

    let mut exprs = Vec::with_capacity(n * (n + 1) * 2);
    for i in 0..n {
        for j in i..n {
            exprs.extend(pair_exprs(&names[i], &names[j], &format!("{}_{}", i, j)));
        }
    }
    let sums = dataset.frame().clone().lazy().select(exprs).collect()?;

    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let tag = format!("{}_{}", i, j);
            let get = |stat: &str| scalar(&sums, &format!("{}::{}", tag, stat));
            let r = match (get("n")?, get("xy")?, get("xx")?, get("yy")?) {
                (Some(pairs), Some(sxy), Some(sxx), Some(syy))
                    if pairs >= 2.0 && sxx > 0.0 && syy > 0.0 =>
                {
                    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
                }
                _ => None,
            };
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix { names, values })
}
