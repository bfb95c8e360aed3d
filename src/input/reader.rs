//! Loading of the JSON inputs of a merge run: raw observation batches,
//! the station descriptor and the element catalog.

use crate::input::error::InputError;
use crate::types::element::{ElementCatalog, ElementInfo};
use crate::types::observation::Timestep;
use crate::types::station::StationDescriptor;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let bytes =
        std::fs::read(path).map_err(|e| InputError::ReadFile(path.to_path_buf(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| InputError::JsonParse(path.to_path_buf(), e))
}

/// Reads one raw batch file. A file holding `null` yields no timesteps.
pub fn read_batch_file(path: &Path) -> Result<Vec<Timestep>, InputError> {
    let timesteps: Option<Vec<Timestep>> = read_json(path)?;
    let timesteps = timesteps.unwrap_or_default();
    debug!("Read {} timesteps from {}", timesteps.len(), path.display());
    Ok(timesteps)
}

/// Reads a station descriptor. Accepts either a single source object or the
/// list returned by the `sources` endpoint, in which case the first entry is used.
pub fn read_station_file(path: &Path) -> Result<StationDescriptor, InputError> {
    let value: Value = read_json(path)?;
    let value = match value {
        Value::Array(list) => list
            .into_iter()
            .next()
            .ok_or_else(|| InputError::EmptyStationList(path.to_path_buf()))?,
        other => other,
    };
    serde_json::from_value(value).map_err(|e| InputError::JsonParse(path.to_path_buf(), e))
}

/// Reads the element catalog (a list of element records).
pub fn read_catalog_file(path: &Path) -> Result<ElementCatalog, InputError> {
    let elements: Vec<ElementInfo> = read_json(path)?;
    debug!("Loaded {} elements from {}", elements.len(), path.display());
    Ok(ElementCatalog::new(elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_batch_file() {
        let file = json_file(
            r#"[{"referenceTime":"2020-01-01T00:00:00.000Z","sourceId":"SN18700:0",
                 "observations":[{"elementId":"air_temperature","value":5.0}]},
                {"referenceTime":"2020-01-01T01:00:00.000Z"}]"#,
        );
        let timesteps = read_batch_file(file.path()).unwrap();
        assert_eq!(timesteps.len(), 2);
        assert_eq!(timesteps[0].observations().len(), 1);
        assert!(timesteps[1].observations().is_empty());
    }

    #[test]
    fn test_read_null_batch_file() {
        let file = json_file("null");
        assert!(read_batch_file(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_batch_file(Path::new("/nonexistent/batch.json")).unwrap_err();
        assert!(matches!(err, InputError::ReadFile(..)));
    }

    #[test]
    fn test_read_station_list() {
        let file = json_file(
            r#"[{"id":"SN18700","geometry":{"coordinates":[10.72,59.9423]}}]"#,
        );
        let station = read_station_file(file.path()).unwrap();
        assert_eq!(station.id.as_deref(), Some("SN18700"));

        let empty = json_file("[]");
        assert!(matches!(
            read_station_file(empty.path()).unwrap_err(),
            InputError::EmptyStationList(_)
        ));
    }

    #[test]
    fn test_read_catalog_file() {
        let file = json_file(r#"[{"id":"air_temperature","unit":"degC"}]"#);
        let catalog = read_catalog_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
