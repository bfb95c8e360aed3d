//! Defines the station descriptor as returned by the Frost `sources` endpoint.
//! Only the location and the identifiers are interpreted; every other top-level
//! field is kept so it can be substituted into archive attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A weather station (Frost "SensorSystem") and its metadata.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationDescriptor {
    /// Frost source id (e.g. "SN18700").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human readable station name (e.g. "OSLO - BLINDERN").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// WIGOS station identifier (e.g. "0-20000-0-01492"), if registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wigos_id: Option<String>,
    pub geometry: Geometry,
    /// Remaining descriptor fields, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// GeoJSON point geometry of a station.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Geometry {
    /// `[longitude, latitude]` in decimal degrees.
    pub coordinates: [f64; 2],
}

impl StationDescriptor {
    pub fn new(id: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        StationDescriptor {
            id: Some(id.into()),
            name: None,
            wigos_id: None,
            geometry: Geometry {
                coordinates: [longitude, latitude],
            },
            extra: Map::new(),
        }
    }

    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates[1]
    }

    /// Stable identity used to name output files: the WIGOS id, else the Frost id.
    pub fn identity(&self) -> Option<&str> {
        self.wigos_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    /// All scalar top-level fields rendered as text, keyed by their JSON name.
    pub fn template_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        let Ok(Value::Object(map)) = serde_json::to_value(self) else {
            return fields;
        };
        for (key, value) in map {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            fields.insert(key, text);
        }
        fields
    }
}
