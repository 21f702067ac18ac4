//! Groupwise aggregates and the geometry left join
//!
//! Aggregates are rebuilt from the dataset on every request. The merge keeps
//! every geometry feature (zero-filled when no group matches) and reports
//! groups that found no feature instead of dropping them.

use crate::dataset::{column_labels, ColumnKind, Dataset};
use crate::error::{DashboardError, Result};
use crate::geo::{Feature, FeatureCollection};
use log::{debug, warn};
use polars::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::Write;

/// Account count and mean metrics for one group label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub key: String,
    #[serde(rename = "cuentas")]
    pub count: usize,
    pub risk_avg: Option<f64>,
    #[serde(rename = "AAL_avg")]
    pub aal_avg: Option<f64>,
}

/// Group rows by `key_column` and average the risk and AAL columns
///
/// `count` is the group size, including rows whose metrics are missing.
/// Means skip missing values. Rows with a missing key are excluded. Groups
/// come back in category order for categorical keys, numeric order for
/// numeric keys and lexical order otherwise.
pub fn aggregate_by(
    dataset: &Dataset,
    key_column: &str,
    risk_column: &str,
    aal_column: &str,
) -> Result<Vec<AggregateRecord>> {
    dataset.require(key_column)?;
    for metric in [risk_column, aal_column] {
        dataset.require(metric)?;
        if dataset.kind(metric) != Some(ColumnKind::Numeric) {
            return Err(DashboardError::Schema(format!("column '{}' is not numeric", metric)));
        }
    }

    let grouped = dataset
        .frame()
        .clone()
        .lazy()
        .filter(col(key_column).is_not_null())
        .group_by_stable([col(key_column)])
        .agg([
            len().alias("cuentas"),
            col(risk_column).cast(DataType::Float64).mean().alias("risk_avg"),
            col(aal_column).cast(DataType::Float64).mean().alias("AAL_avg"),
        ])
        .collect()?;

    let keys = column_labels(grouped.column(key_column)?)?;
    let counts = grouped.column("cuentas")?.cast(&DataType::UInt64)?;
    let risk = grouped.column("risk_avg")?.f64()?;
    let aal = grouped.column("AAL_avg")?.f64()?;

    let mut records: Vec<AggregateRecord> = keys
        .into_iter()
        .zip(counts.u64()?.into_iter())
        .zip(risk.into_iter().zip(aal.into_iter()))
        .filter_map(|((key, count), (risk_avg, aal_avg))| {
            Some(AggregateRecord {
                key: key?,
                count: count.unwrap_or(0) as usize,
                risk_avg,
                aal_avg,
            })
        })
        .collect();

    let kind = dataset.kind(key_column);
    let categories = dataset.categories(key_column);
    records.sort_by(|a, b| compare_keys(kind, categories, &a.key, &b.key));

    debug!("Aggregated {} groups by '{}'", records.len(), key_column);
    Ok(records)
}

fn compare_keys(kind: Option<ColumnKind>, categories: Option<&[String]>, a: &str, b: &str) -> Ordering {
    match (kind, categories) {
        (Some(ColumnKind::Categorical), Some(categories)) => {
            let rank = |k: &str| categories.iter().position(|c| c == k);
            rank(a).cmp(&rank(b))
        }
        (Some(ColumnKind::Numeric), _) => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        },
        _ => a.cmp(b),
    }
}

fn aggregates_frame(aggregates: &[AggregateRecord]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new("key".into(), aggregates.iter().map(|a| a.key.as_str()).collect::<Vec<_>>()),
        Column::new("cuentas".into(), aggregates.iter().map(|a| a.count as u64).collect::<Vec<_>>()),
        Column::new("risk_avg".into(), aggregates.iter().map(|a| a.risk_avg).collect::<Vec<_>>()),
        Column::new("AAL_avg".into(), aggregates.iter().map(|a| a.aal_avg).collect::<Vec<_>>()),
    ])?)
}

/// A geometry feature with its (possibly zero-filled) aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord<'a> {
    pub feature: &'a Feature,
    /// Normalized value of the join property, if the feature has one
    pub key: Option<String>,
    pub count: usize,
    pub risk_avg: f64,
    pub aal_avg: f64,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult<'a> {
    /// One row per feature, in layer order
    pub rows: Vec<MergedRecord<'a>>,
    /// Aggregates whose key matched no feature
    pub unmatched: Vec<AggregateRecord>,
}

impl MergeResult<'_> {
    pub fn matched_count(&self) -> usize {
        self.rows.iter().filter(|r| r.matched).count()
    }
}

/// Left join of geometry features onto aggregates by `id_property`
///
/// Features without a matching group get zero metrics.
pub fn merge_left<'a>(
    layer: &'a FeatureCollection,
    id_property: &str,
    aggregates: &[AggregateRecord],
) -> Result<MergeResult<'a>> {
    let feature_keys: Vec<Option<String>> = layer.features.iter().map(|f| f.key(id_property)).collect();
    let features = DataFrame::new(vec![
        Column::new("feature_idx".into(), (0..layer.len() as u32).collect::<Vec<_>>()),
        Column::new("feature_key".into(), feature_keys.clone()),
    ])?;
    let aggs = aggregates_frame(aggregates)?;

    let joined = features
        .lazy()
        .join(
            aggs.clone().lazy(),
            [col("feature_key")],
            [col("key")],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            col("cuentas").is_not_null().alias("matched"),
            col("cuentas").fill_null(lit(0)).cast(DataType::UInt64),
            col("risk_avg").fill_null(lit(0.0)),
            col("AAL_avg").fill_null(lit(0.0)),
        ])
        .sort(["feature_idx"], SortMultipleOptions::default())
        .collect()?;

    let idx = joined.column("feature_idx")?.u32()?;
    let matched = joined.column("matched")?.bool()?;
    let counts = joined.column("cuentas")?.u64()?;
    let risk = joined.column("risk_avg")?.f64()?;
    let aal = joined.column("AAL_avg")?.f64()?;

    let mut rows = Vec::with_capacity(joined.height());
    for i in 0..joined.height() {
        let Some(feature_idx) = idx.get(i).map(|v| v as usize) else { continue };
        rows.push(MergedRecord {
            feature: &layer.features[feature_idx],
            key: feature_keys[feature_idx].clone(),
            count: counts.get(i).unwrap_or(0) as usize,
            risk_avg: risk.get(i).unwrap_or(0.0),
            aal_avg: aal.get(i).unwrap_or(0.0),
            matched: matched.get(i).unwrap_or(false),
        });
    }

    let unmatched = unmatched_aggregates(aggs, &feature_keys, aggregates)?;
    if !unmatched.is_empty() {
        warn!(
            "{} group(s) matched no feature on '{}': {:?}",
            unmatched.len(),
            id_property,
            unmatched.iter().map(|a| a.key.as_str()).collect::<Vec<_>>()
        );
    }

    Ok(MergeResult { rows, unmatched })
}

/// Aggregates left without a feature after joining the distinct feature keys
fn unmatched_aggregates(
    aggs: DataFrame,
    feature_keys: &[Option<String>],
    aggregates: &[AggregateRecord],
) -> Result<Vec<AggregateRecord>> {
    let distinct: Vec<&str> = feature_keys
        .iter()
        .flatten()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let present = DataFrame::new(vec![
        Column::new("key".into(), distinct.clone()),
        Column::new("has_feature".into(), vec![true; distinct.len()]),
    ])?;

    let missing = aggs
        .lazy()
        .join(present.lazy(), [col("key")], [col("key")], JoinArgs::new(JoinType::Left))
        .filter(col("has_feature").is_null())
        .select([col("key")])
        .collect()?;
    let keys: HashSet<&str> = missing.column("key")?.str()?.into_iter().flatten().collect();

    Ok(aggregates
        .iter()
        .filter(|a| keys.contains(a.key.as_str()))
        .cloned()
        .collect())
}

/// Write aggregates as CSV with a header row
pub fn write_aggregates_csv<W: Write>(writer: W, records: &[AggregateRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}
