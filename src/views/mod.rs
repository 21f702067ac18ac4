//! Dashboard sections
//!
//! Each section derives whatever it needs from the dataset on its own and
//! returns an HTML fragment. Section-local problems (a bad selection, a
//! missing column) come back as errors so the caller can show them inline.

pub mod page;

pub use page::{alert, escape, page, AlertKind};

use crate::aggregate::{aggregate_by, merge_left, AggregateRecord, MergeResult, MergedRecord};
use crate::charts::{self, MapArea, ScatterGroup};
use crate::config::{DashboardConfig, JoinKeys};
use crate::dataset::{correlation_matrix, describe, value_counts, ColumnKind, Dataset, MISSING};
use crate::error::{DashboardError, Result};
use crate::geo::FeatureCollection;
use log::debug;
use page::{heading, metric, select, selection_form, subheading, table};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Sidebar menu entries, in menu order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Overview,
    Univariate,
    Bivariate,
    Correlation,
    RegionMap,
    CommuneMap,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Overview,
        Section::Univariate,
        Section::Bivariate,
        Section::Correlation,
        Section::RegionMap,
        Section::CommuneMap,
    ];

    /// Menu label shown in the sidebar
    pub fn label(&self) -> &'static str {
        match self {
            Section::Overview => "Visión General",
            Section::Univariate => "Univariada",
            Section::Bivariate => "Bivariada",
            Section::Correlation => "Correlación",
            Section::RegionMap => "Mapa Regiones",
            Section::CommuneMap => "Mapa Comunas RM",
        }
    }

    /// ASCII identifier used in query strings and file names
    pub fn slug(&self) -> &'static str {
        match self {
            Section::Overview => "overview",
            Section::Univariate => "univariate",
            Section::Bivariate => "bivariate",
            Section::Correlation => "correlation",
            Section::RegionMap => "regions",
            Section::CommuneMap => "communes",
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        Section::Overview
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Section {
    type Err = DashboardError;

    /// Accepts the slug or the menu label, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Section::ALL
            .into_iter()
            .find(|sec| sec.slug() == wanted || sec.label().to_lowercase() == wanted)
            .ok_or_else(|| DashboardError::UnknownSection(s.to_string()))
    }
}

/// One interaction: the chosen section plus its widget selections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewRequest {
    pub section: Section,
    /// Univariate variable
    pub variable: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
}

impl ViewRequest {
    pub fn new(section: Section) -> Self {
        Self { section, ..Default::default() }
    }

    /// Build from query parameters; blank values count as unset
    pub fn from_params<'a>(params: impl Iterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut request = ViewRequest::default();
        for (key, value) in params {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "section" => request.section = value.parse()?,
                "var" => request.variable = Some(value.to_string()),
                "x" => request.x = Some(value.to_string()),
                "y" => request.y = Some(value.to_string()),
                "color" => request.color = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(request)
    }
}

/// Pick the requested option, or the first one when nothing was requested
fn choose<'a>(requested: Option<&str>, options: &[&'a str], what: &str) -> Result<&'a str> {
    match requested {
        Some(r) => options
            .iter()
            .copied()
            .find(|o| *o == r)
            .ok_or_else(|| DashboardError::InvalidSelection(format!("{} '{}' is not available", what, r))),
        None => options
            .first()
            .copied()
            .ok_or_else(|| DashboardError::InvalidSelection(format!("no {} available", what))),
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| MISSING.to_string())
}

/// Dataset size, first rows and per-column statistics
pub fn overview(dataset: &Dataset, preview_rows: usize) -> Result<String> {
    let mut out = heading("Visión General de la Base de Datos");

    out.push_str("<div class=\"metrics\">");
    out.push_str(&metric("Observaciones", &dataset.n_rows().to_string()));
    out.push_str(&metric("Variables", &dataset.n_cols().to_string()));
    out.push_str("</div>");

    let headers: Vec<String> = dataset.column_names().iter().map(|s| s.to_string()).collect();
    out.push_str(&table(&headers, &dataset.preview(preview_rows)?));

    out.push_str("<hr>");
    out.push_str(&subheading("Estadísticas Descriptivas"));
    let stat_headers: Vec<String> = [
        "", "count", "unique", "top", "freq", "mean", "std", "min", "25%", "50%", "75%", "max",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let stat_rows: Vec<Vec<String>> = describe(dataset)?
        .into_iter()
        .map(|d| {
            vec![
                d.column,
                d.count.to_string(),
                d.unique.map(|u| u.to_string()).unwrap_or_else(|| MISSING.to_string()),
                d.top.unwrap_or_else(|| MISSING.to_string()),
                d.freq.map(|f| f.to_string()).unwrap_or_else(|| MISSING.to_string()),
                fmt_opt(d.mean),
                fmt_opt(d.std),
                fmt_opt(d.min),
                fmt_opt(d.q25),
                fmt_opt(d.q50),
                fmt_opt(d.q75),
                fmt_opt(d.max),
            ]
        })
        .collect();
    out.push_str(&table(&stat_headers, &stat_rows));
    Ok(out)
}

/// Distribution of one variable: bars for categories, histogram otherwise
pub fn univariate(dataset: &Dataset, variable: Option<&str>, bins: usize) -> Result<String> {
    let mut out = heading("Análisis Univariado");
    let names = dataset.column_names();
    let var = choose(variable, &names, "variable")?;
    out.push_str(&selection_form(
        Section::Univariate,
        &[select("var", "Seleccionar variable:", &names, var)],
    ));

    let chart = match dataset.kind(var) {
        Some(ColumnKind::Numeric) => charts::histogram_with_box(
            &format!("Histograma y Boxplot de {}", var),
            var,
            &dataset.numbers(var)?,
            bins,
        )?,
        _ => charts::bar_chart(
            &format!("Distribución de {}", var),
            var,
            &value_counts(dataset, var)?,
        )?,
    };
    out.push_str(&chart);
    Ok(out)
}

/// Scatter of two numeric variables coloured by a categorical one
pub fn bivariate(
    dataset: &Dataset,
    x: Option<&str>,
    y: Option<&str>,
    color: Option<&str>,
) -> Result<String> {
    let mut out = heading("Análisis Bivariado");
    let num_cols = dataset.numeric_columns();
    if num_cols.len() < 2 {
        out.push_str(&alert(
            AlertKind::Warning,
            "Se necesitan al menos dos variables numéricas para el análisis bivariado.",
        ));
        return Ok(out);
    }

    let x_var = choose(x, &num_cols, "X variable")?;
    let y_options: Vec<&str> = num_cols.iter().copied().filter(|c| *c != x_var).collect();
    let y_var = choose(y, &y_options, "Y variable")?;
    let cat_cols = dataset.categorical_columns();
    let color_var = if cat_cols.is_empty() {
        None
    } else {
        Some(choose(color, &cat_cols, "color variable")?)
    };

    let mut controls = vec![
        select("x", "Eje X:", &num_cols, x_var),
        select("y", "Eje Y:", &y_options, y_var),
    ];
    if let Some(c) = color_var {
        controls.push(select("color", "Color:", &cat_cols, c));
    }
    out.push_str(&selection_form(Section::Bivariate, &controls));

    let groups = scatter_groups(dataset, x_var, y_var, color_var)?;
    out.push_str(&charts::scatter_chart(
        &format!("Scatter: {} vs {}", x_var, y_var),
        x_var,
        y_var,
        color_var.unwrap_or(""),
        &groups,
    )?);
    Ok(out)
}

/// Complete (x, y) pairs split by colour label, in category order
fn scatter_groups(dataset: &Dataset, x: &str, y: &str, color: Option<&str>) -> Result<Vec<ScatterGroup>> {
    let xs = dataset.values(x)?;
    let ys = dataset.values(y)?;
    let colors = color.map(|c| dataset.labels(c)).transpose()?;

    let mut order: Vec<String> = color
        .and_then(|c| dataset.categories(c))
        .map(|c| c.to_vec())
        .unwrap_or_default();
    let mut points: HashMap<String, Vec<(f64, f64)>> = HashMap::new();

    for (row, (px, py)) in xs.into_iter().zip(ys).enumerate() {
        let (Some(px), Some(py)) = (px, py) else { continue };
        let label = match &colors {
            Some(labels) => match labels.get(row).cloned().flatten() {
                Some(l) => l,
                None => continue,
            },
            None => String::new(),
        };
        if !order.contains(&label) {
            order.push(label.clone());
        }
        points.entry(label).or_default().push((px, py));
    }

    Ok(order
        .into_iter()
        .filter_map(|label| points.remove(&label).map(|pts| ScatterGroup { label, points: pts }))
        .collect())
}

pub fn correlation(dataset: &Dataset) -> Result<String> {
    let mut out = heading("Mapa de Calor de Correlaciones");
    let matrix = correlation_matrix(dataset)?;
    if matrix.names.is_empty() {
        out.push_str(&alert(AlertKind::Warning, "No hay variables numéricas para correlacionar."));
        return Ok(out);
    }
    out.push_str(&charts::correlation_heatmap(
        "Correlación de Pearson",
        &matrix.names,
        &matrix.values,
    )?);
    Ok(out)
}

fn aggregate_table(key_header: &str, aggregates: &[AggregateRecord]) -> String {
    let headers: Vec<String> = [key_header, "cuentas", "risk_avg", "AAL_avg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = aggregates
        .iter()
        .map(|a| vec![a.key.clone(), a.count.to_string(), fmt_opt(a.risk_avg), fmt_opt(a.aal_avg)])
        .collect();
    table(&headers, &rows)
}

/// Per-feature values drawn on a map, one row per feature in layer order
fn feature_table(name_header: &str, merged: &MergeResult, name: impl Fn(&MergedRecord) -> String) -> String {
    let headers: Vec<String> = [name_header, "cuentas", "risk_avg", "AAL_avg"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = merged
        .rows
        .iter()
        .map(|row| {
            vec![
                name(row),
                row.count.to_string(),
                format!("{:.4}", row.risk_avg),
                format!("{:.4}", row.aal_avg),
            ]
        })
        .collect();
    table(&headers, &rows)
}

fn unmatched_warning(merged: &MergeResult, join: &JoinKeys) -> Option<String> {
    if merged.unmatched.is_empty() {
        return None;
    }
    let keys: Vec<&str> = merged.unmatched.iter().map(|a| a.key.as_str()).collect();
    Some(alert(
        AlertKind::Warning,
        &format!(
            "{} grupo(s) de '{}' sin geometría con '{}': {}",
            keys.len(),
            join.data_column,
            join.geo_property,
            keys.join(", ")
        ),
    ))
}

fn map_areas<'a>(merged: &MergeResult<'a>) -> Vec<MapArea<'a>> {
    merged
        .rows
        .iter()
        .map(|row| MapArea { feature: row.feature, value: row.risk_avg })
        .collect()
}

/// Region choropleth of the mean risk load per cluster
pub fn region_map(dataset: &Dataset, config: &DashboardConfig, regions: &FeatureCollection) -> Result<String> {
    let mut out = heading("Cuentas y Métricas por Región");
    let join = &config.region_join;
    let aggregates = aggregate_by(dataset, &join.data_column, &config.risk_column, &config.aal_column)?;
    let merged = merge_left(regions, &join.geo_property, &aggregates)?;
    debug!("Region merge: {} of {} features matched", merged.matched_count(), merged.rows.len());

    out.push_str(&charts::choropleth(
        "Recargo de Seguridad Promedio por Región",
        "risk_avg",
        &map_areas(&merged),
    )?);
    if let Some(w) = unmatched_warning(&merged, join) {
        out.push_str(&w);
    }
    out.push_str(&aggregate_table(&join.data_column, &aggregates));
    Ok(out)
}

/// Commune choropleth restricted to the metropolitan region
pub fn commune_map(dataset: &Dataset, config: &DashboardConfig, communes: &FeatureCollection) -> Result<String> {
    let mut out = heading("Métricas por Comuna en RM");
    let join = &config.commune_join;
    if !dataset.has_column(&join.data_column) {
        out.push_str(&alert(
            AlertKind::Error,
            &format!("Falta columna '{}' en el dataset para mapear comunas.", join.data_column),
        ));
        return Ok(out);
    }

    let rm = communes.filter_by_property(&config.region_name_property, &config.metro_region);
    if rm.is_empty() {
        out.push_str(&alert(
            AlertKind::Warning,
            &format!(
                "No hay comunas con {} = '{}' en la capa de comunas.",
                config.region_name_property, config.metro_region
            ),
        ));
        return Ok(out);
    }

    let aggregates = aggregate_by(dataset, &join.data_column, &config.risk_column, &config.aal_column)?;
    let merged = merge_left(&rm, &join.geo_property, &aggregates)?;
    debug!("Commune merge: {} of {} features matched", merged.matched_count(), merged.rows.len());

    out.push_str(&charts::choropleth(
        "Risk Load Promedio por Comuna (RM)",
        "risk_avg",
        &map_areas(&merged),
    )?);
    if let Some(w) = unmatched_warning(&merged, join) {
        out.push_str(&w);
    }
    out.push_str(&feature_table(&config.commune_name_property, &merged, |row| {
        row.feature.property_text(&config.commune_name_property)
    }));
    Ok(out)
}
