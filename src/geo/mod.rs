//! GeoJSON boundary layers (regions and communes)

pub mod loader;

pub use loader::load_layer;

use crate::dataset::format_label;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longitude/latitude, optionally followed by altitude
pub type Position = Vec<f64>;
pub type Ring = Vec<Position>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    /// Points and lines carry no area and are not drawn
    #[serde(other)]
    Unsupported,
}

impl Geometry {
    /// Polygons as lists of rings (outer ring first)
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Polygon { coordinates } => vec![coordinates.as_slice()],
            Geometry::MultiPolygon { coordinates } => coordinates.iter().map(|p| p.as_slice()).collect(),
            Geometry::Unsupported => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl Feature {
    /// Look up a property; a leading `properties.` prefix is accepted
    pub fn property(&self, name: &str) -> Option<&Value> {
        let name = name.strip_prefix("properties.").unwrap_or(name);
        self.properties.as_ref()?.get(name)
    }

    /// Property as a join key, see [`normalize_key`]
    pub fn key(&self, name: &str) -> Option<String> {
        self.property(name).and_then(normalize_key)
    }

    /// Property rendered for display; missing or null properties are empty
    pub fn property_text(&self, name: &str) -> String {
        match self.property(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => normalize_key(other).unwrap_or_else(|| other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// Geographic bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl FeatureCollection {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features whose property equals `value` after key normalization
    pub fn filter_by_property(&self, name: &str, value: &str) -> FeatureCollection {
        let wanted = value.trim();
        FeatureCollection {
            features: self
                .features
                .iter()
                .filter(|f| f.key(name).as_deref() == Some(wanted))
                .cloned()
                .collect(),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        bounds_of(self.features.iter())
    }
}

/// Bounding box over the drawable geometry of the given features
pub fn bounds_of<'a>(features: impl Iterator<Item = &'a Feature>) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;
    for feature in features {
        let Some(geometry) = &feature.geometry else { continue };
        for polygon in geometry.polygons() {
            for ring in polygon {
                for pos in ring {
                    if pos.len() < 2 {
                        continue;
                    }
                    let (lon, lat) = (pos[0], pos[1]);
                    bounds = Some(match bounds {
                        None => Bounds { min_lon: lon, min_lat: lat, max_lon: lon, max_lat: lat },
                        Some(b) => Bounds {
                            min_lon: b.min_lon.min(lon),
                            min_lat: b.min_lat.min(lat),
                            max_lon: b.max_lon.max(lon),
                            max_lat: b.max_lat.max(lat),
                        },
                    });
                }
            }
        }
    }
    bounds
}

/// Normalize a property value into a join key
///
/// Strings are trimmed and integral numbers lose their fraction, so a
/// numeric `13` property matches a `13` category label.
pub fn normalize_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => n.as_f64().map(format_label),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
