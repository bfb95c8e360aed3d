//! Global attribute template: a YAML list of `attribute: text` entries whose
//! `{field}` placeholders are filled in at merge time.

use crate::archive::error::ArchiveError;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_TEMPLATE: &str = include_str!("../../templates/global_attributes.yaml");

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTemplate {
    entries: Vec<(String, String)>,
}

impl AttributeTemplate {
    /// The template shipped with the crate.
    pub fn builtin() -> Result<Self, ArchiveError> {
        Self::from_yaml_str(BUILTIN_TEMPLATE)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ArchiveError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ArchiveError::TemplateRead(path.to_path_buf(), e))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ArchiveError> {
        let blank = text
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'));
        if blank {
            return Ok(AttributeTemplate {
                entries: Vec::new(),
            });
        }
        let raw: Option<Vec<BTreeMap<String, Value>>> =
            serde_yaml::from_str(text).map_err(ArchiveError::TemplateParse)?;
        let mut entries = Vec::new();
        for (key, value) in raw.unwrap_or_default().into_iter().flatten() {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(ArchiveError::TemplateValue(key)),
            };
            entries.push((key, text));
        }
        Ok(AttributeTemplate { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitutes `fields` into every entry, in template order.
    pub fn render(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<Vec<(String, String)>, ArchiveError> {
        self.entries
            .iter()
            .map(|(key, text)| Ok((key.clone(), substitute(key, text, fields)?)))
            .collect()
    }
}

fn substitute(
    attribute: &str,
    text: &str,
    fields: &BTreeMap<String, String>,
) -> Result<String, ArchiveError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if let Some(after) = tail.strip_prefix('{') {
            let end = after.find('}').ok_or_else(|| ArchiveError::TemplateField {
                attribute: attribute.to_string(),
                field: after.to_string(),
            })?;
            let field = &after[..end];
            let value = fields.get(field).ok_or_else(|| ArchiveError::TemplateField {
                attribute: attribute.to_string(),
                field: field.to_string(),
            })?;
            out.push_str(value);
            rest = &after[end + 1..];
        } else {
            // A lone closing brace is kept literally.
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}
