//! Raw observation records as delivered by the Frost observations endpoint,
//! and the variable names derived from them.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

pub const DEFAULT_TIME_OFFSET: &str = "PT00H";
pub const DEFAULT_TIME_RESOLUTION: &str = "PT1H";

fn default_time_offset() -> String {
    DEFAULT_TIME_OFFSET.to_string()
}

fn default_time_resolution() -> String {
    DEFAULT_TIME_RESOLUTION.to_string()
}

/// Vertical level qualifying an element, e.g. 2 m above ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_type: Option<String>,
    pub value: f64,
    pub unit: String,
}

/// One measured value of one element at one reference time.
///
/// Several observations of the same element may be reported for the same
/// reference time, taken with different offsets or aggregation windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObservation {
    pub element_id: String,
    pub value: f64,
    /// Unit as reported by the provider, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    /// End of the measurement window relative to the reference time.
    #[serde(default = "default_time_offset")]
    pub time_offset: String,
    /// Length of the aggregation window.
    #[serde(default = "default_time_resolution")]
    pub time_resolution: String,
}

impl RawObservation {
    pub fn new(element_id: impl Into<String>, value: f64) -> Self {
        RawObservation {
            element_id: element_id.into(),
            value,
            unit: None,
            level: None,
            time_offset: default_time_offset(),
            time_resolution: default_time_resolution(),
        }
    }

    pub fn with_time_offset(mut self, offset: impl Into<String>) -> Self {
        self.time_offset = offset.into();
        self
    }

    pub fn with_time_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.time_resolution = resolution.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_level(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.level = Some(Level {
            level_type: None,
            value,
            unit: unit.into(),
        });
        self
    }

    /// Column name this observation belongs to: the element id, suffixed with
    /// `_<level><unit>` when a level is present (`air_temperature_2m`).
    pub fn variable_name(&self) -> VariableName {
        match &self.level {
            Some(level) => VariableName(format!(
                "{}_{}{}",
                self.element_id,
                level.value.trunc() as i64,
                level.unit
            )),
            None => VariableName(self.element_id.clone()),
        }
    }

    /// True for readings whose window ends at the reference time (`PT00H`).
    /// Compared textually, as reported by the provider.
    pub fn is_zero_offset(&self) -> bool {
        self.time_offset == DEFAULT_TIME_OFFSET
    }

    /// True for readings aggregated over the standard `PT1H` window.
    pub fn is_hourly_resolution(&self) -> bool {
        self.time_resolution == DEFAULT_TIME_RESOLUTION
    }
}

/// Stable identifier of a time-series column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableName(String);

impl VariableName {
    pub fn new(name: impl Into<String>) -> Self {
        VariableName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for VariableName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VariableName {
    fn from(value: &str) -> Self {
        VariableName(value.to_string())
    }
}

/// One record of a raw batch: a reference time and everything observed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestep {
    pub reference_time: String,
    #[serde(default)]
    pub observations: Option<Vec<RawObservation>>,
}

impl Timestep {
    pub fn new(reference_time: impl Into<String>, observations: Vec<RawObservation>) -> Self {
        Timestep {
            reference_time: reference_time.into(),
            observations: Some(observations),
        }
    }

    /// Observations of this timestep; an absent or null list is empty.
    pub fn observations(&self) -> &[RawObservation] {
        self.observations.as_deref().unwrap_or(&[])
    }
}
