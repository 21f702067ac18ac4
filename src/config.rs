//! Dashboard configuration
//!
//! Every field has a default matching the production dataset and geodata
//! sources, so an empty JSON object `{}` is a valid config file.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Join between a dataset column and a GeoJSON feature property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinKeys {
    /// Dataset column whose labels are grouped
    pub data_column: String,
    /// Feature property compared against the group labels
    pub geo_property: String,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Spreadsheet or CSV holding one row per account
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Sheet to read when `data_path` is a workbook
    #[serde(default = "default_sheet")]
    pub sheet: String,

    /// Columns removed after loading, when present
    #[serde(default = "default_drop_columns")]
    pub drop_columns: Vec<String>,

    /// Columns cast to categorical after loading, when present
    #[serde(default = "default_categorical_columns")]
    pub categorical_columns: Vec<String>,

    /// Numeric column averaged as the risk load
    #[serde(default = "default_risk_column")]
    pub risk_column: String,

    /// Numeric column averaged as the AAL
    #[serde(default = "default_aal_column")]
    pub aal_column: String,

    /// Region boundaries (URL or local path)
    #[serde(default = "default_regions_source")]
    pub regions_source: String,

    /// Commune boundaries (URL or local path)
    #[serde(default = "default_communes_source")]
    pub communes_source: String,

    #[serde(default = "default_region_join")]
    pub region_join: JoinKeys,

    #[serde(default = "default_commune_join")]
    pub commune_join: JoinKeys,

    /// Property holding the region name on commune features
    #[serde(default = "default_region_name_property")]
    pub region_name_property: String,

    /// Region whose communes are mapped
    #[serde(default = "default_metro_region")]
    pub metro_region: String,

    /// Property holding the commune display name
    #[serde(default = "default_commune_name_property")]
    pub commune_name_property: String,

    /// Timeout for each GeoJSON fetch, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Bins used by the univariate histogram
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    /// Rows shown in the overview preview
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_data_path() -> PathBuf { PathBuf::from("base_agrup.xlsx") }
fn default_sheet() -> String { "kmeans_com_ward".to_string() }
fn default_risk_column() -> String { "risk_load".to_string() }
fn default_aal_column() -> String { "AAL_usd".to_string() }
fn default_region_name_property() -> String { "region_name".to_string() }
fn default_metro_region() -> String { "Región Metropolitana".to_string() }
fn default_commune_name_property() -> String { "comuna_name".to_string() }
fn default_fetch_timeout() -> u64 { 30 }
fn default_histogram_bins() -> usize { 30 }
fn default_preview_rows() -> usize { 10 }

fn default_drop_columns() -> Vec<String> {
    ["accgrpid", "streetname", "addrmatch", "numstories", "year_built", "region", "occtype"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_categorical_columns() -> Vec<String> {
    ["numst_group", "year_band", "cluster_geo", "occtype_grp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_regions_source() -> String {
    "https://raw.githubusercontent.com/robertoflores/chile-geodata/master/regiones.geojson".to_string()
}

fn default_communes_source() -> String {
    "https://raw.githubusercontent.com/robertoflores/chile-geodata/master/comunas.geojson".to_string()
}

fn default_region_join() -> JoinKeys {
    JoinKeys {
        data_column: "cluster_geo".to_string(),
        geo_property: "region_id".to_string(),
    }
}

fn default_commune_join() -> JoinKeys {
    JoinKeys {
        data_column: "city".to_string(),
        geo_property: "city".to_string(),
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            sheet: default_sheet(),
            drop_columns: default_drop_columns(),
            categorical_columns: default_categorical_columns(),
            risk_column: default_risk_column(),
            aal_column: default_aal_column(),
            regions_source: default_regions_source(),
            communes_source: default_communes_source(),
            region_join: default_region_join(),
            commune_join: default_commune_join(),
            region_name_property: default_region_name_property(),
            metro_region: default_metro_region(),
            commune_name_property: default_commune_name_property(),
            fetch_timeout_secs: default_fetch_timeout(),
            histogram_bins: default_histogram_bins(),
            preview_rows: default_preview_rows(),
        }
    }
}

impl DashboardConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = DashboardConfig::from_json_str("{}").expect("Failed to parse");
        let default = DashboardConfig::default();

        assert_eq!(config.data_path, default.data_path);
        assert_eq!(config.sheet, "kmeans_com_ward");
        assert_eq!(config.drop_columns.len(), 7);
        assert_eq!(config.region_join, default.region_join);
        assert_eq!(config.histogram_bins, 30);
    }

    #[test]
    fn test_partial_override() {
        let config = DashboardConfig::from_json_str(
            r#"{"sheet": "other", "commune_join": {"data_column": "comuna", "geo_property": "cod_comuna"}}"#,
        )
        .expect("Failed to parse");

        assert_eq!(config.sheet, "other");
        assert_eq!(config.commune_join.data_column, "comuna");
        assert_eq!(config.commune_join.geo_property, "cod_comuna");
        // Untouched fields keep their defaults
        assert_eq!(config.risk_column, "risk_load");
        assert_eq!(config.metro_region, "Región Metropolitana");
    }
}
