//! Element metadata from the Frost `elements` endpoint, keyed by element id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// CF-convention mapping of a Frost element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfConvention {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_method: Option<String>,
}

/// Metadata record of a single element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit the provider reports values in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_convention: Option<CfConvention>,
}

impl ElementInfo {
    /// Unit values are stored in: the CF unit when a CF mapping exists,
    /// the provider unit otherwise.
    pub fn target_unit(&self) -> Option<&str> {
        match &self.cf_convention {
            Some(cf) => Some(cf.unit.as_deref().unwrap_or("1")),
            None => self.unit.as_deref(),
        }
    }

    pub fn standard_name(&self) -> Option<&str> {
        self.cf_convention
            .as_ref()
            .and_then(|cf| cf.standard_name.as_deref())
    }

    pub fn cell_method(&self) -> Option<&str> {
        self.cf_convention
            .as_ref()
            .and_then(|cf| cf.cell_method.as_deref())
    }
}

/// Read-only lookup of element metadata for one run.
#[derive(Debug, Clone, Default)]
pub struct ElementCatalog {
    elements: HashMap<String, ElementInfo>,
}

impl ElementCatalog {
    pub fn new(elements: impl IntoIterator<Item = ElementInfo>) -> Self {
        ElementCatalog {
            elements: elements
                .into_iter()
                .map(|element| (element.id.clone(), element))
                .collect(),
        }
    }

    pub fn get(&self, element_id: &str) -> Option<&ElementInfo> {
        self.elements.get(element_id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
