//! MMD (Met.no Metadata Format) documents describing a station archive.

use crate::archive::error::ArchiveError;
use crate::archive::store::StationArchive;
use crate::types::reference_time::ReferenceTime;
use log::info;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Fields of an archive that end up in its MMD document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFields {
    pub station_name: String,
    pub wigos: String,
    pub latitude: f64,
    pub longitude: f64,
    /// First stored time, `None` for an archive without times.
    pub start_date: Option<ReferenceTime>,
}

pub fn read_document_fields(archive: &StationArchive) -> Result<DocumentFields, ArchiveError> {
    let text = |key: &str| {
        archive
            .attribute(key)
            .map(|value| value.to_string())
            .ok_or_else(|| ArchiveError::MissingAttribute(key.to_string()))
    };
    let scalar = |name: &str| {
        archive
            .scalar(name)
            .map(|v| v.value)
            .ok_or_else(|| ArchiveError::MissingVariable(name.to_string()))
    };

    Ok(DocumentFields {
        station_name: text("station_name")?,
        wigos: text("wigos")?,
        latitude: scalar("latitude")?,
        longitude: scalar("longitude")?,
        start_date: archive
            .times()
            .first()
            .copied()
            .and_then(ReferenceTime::from_epoch_seconds),
    })
}

pub fn render_mmd(fields: &DocumentFields, announced_location: Option<&str>) -> String {
    let start = fields
        .start_date
        .map(|t| t.to_string())
        .unwrap_or_default();
    let name = escape(&fields.station_name);
    let wigos = escape(&fields.wigos);

    let mut doc = String::new();
    // Writing to a String cannot fail.
    let _ = write!(
        doc,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<mmd:mmd xmlns:mmd="http://www.met.no/schema/mmd" xmlns:gml="http://www.opengis.net/gml">
  <mmd:metadata_identifier>no.met:{wigos}</mmd:metadata_identifier>
  <mmd:title xml:lang="en">Weather observations from {name}</mmd:title>
  <mmd:abstract xml:lang="en">Hourly surface observations from the weather station {name} (WIGOS {wigos}).</mmd:abstract>
  <mmd:metadata_status>Active</mmd:metadata_status>
  <mmd:dataset_production_status>In Work</mmd:dataset_production_status>
  <mmd:collection>NBS</mmd:collection>
  <mmd:temporal_extent>
    <mmd:start_date>{start}</mmd:start_date>
  </mmd:temporal_extent>
  <mmd:iso_topic_category>climatologyMeteorologyAtmosphere</mmd:iso_topic_category>
  <mmd:keywords vocabulary="GCMD">
    <mmd:keyword>EARTH SCIENCE &gt; ATMOSPHERE</mmd:keyword>
  </mmd:keywords>
  <mmd:operational_status>Operational</mmd:operational_status>
  <mmd:geographic_extent>
    <mmd:rectangle srsName="EPSG:4326">
      <mmd:north>{lat}</mmd:north>
      <mmd:south>{lat}</mmd:south>
      <mmd:west>{lon}</mmd:west>
      <mmd:east>{lon}</mmd:east>
    </mmd:rectangle>
  </mmd:geographic_extent>
  <mmd:platform>
    <mmd:short_name>{wigos}</mmd:short_name>
    <mmd:long_name>{name}</mmd:long_name>
  </mmd:platform>
"#,
        lat = fields.latitude,
        lon = fields.longitude,
    );
    if let Some(location) = announced_location {
        let _ = write!(
            doc,
            r#"  <mmd:data_access>
    <mmd:type>OPeNDAP</mmd:type>
    <mmd:description>Open-source Project for a Network Data Access Protocol</mmd:description>
    <mmd:resource>{}</mmd:resource>
  </mmd:data_access>
"#,
            escape(location)
        );
    }
    doc.push_str("</mmd:mmd>\n");
    doc
}

/// Renders the document of the archive at `store_path` into `<folder>/<wigos>.xml`.
pub fn write_mmd(
    folder: &Path,
    store_path: &Path,
    announced_location: Option<&str>,
) -> Result<PathBuf, ArchiveError> {
    let archive = StationArchive::open(store_path)?;
    let fields = read_document_fields(&archive)?;
    let target = folder.join(format!("{}.xml", fields.wigos));
    std::fs::write(&target, render_mmd(&fields, announced_location))
        .map_err(|e| ArchiveError::Write(target.clone(), e))?;
    info!("Wrote {}", target.display());
    Ok(target)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::store::Attributes;
    use tempfile::tempdir;

    fn fields() -> DocumentFields {
        DocumentFields {
            station_name: "A & B <station>".to_string(),
            wigos: "0-20000-0-01492".to_string(),
            latitude: 59.9423,
            longitude: 10.72,
            start_date: ReferenceTime::from_epoch_seconds(1_577_836_800.0),
        }
    }

    #[test]
    fn test_render_escapes_and_includes_fields() {
        let doc = render_mmd(&fields(), Some("https://thredds.met.no/x?a=1&b=2"));
        assert!(doc.contains("A &amp; B &lt;station&gt;"));
        assert!(doc.contains("<mmd:start_date>2020-01-01T00:00:00Z</mmd:start_date>"));
        assert!(doc.contains("<mmd:north>59.9423</mmd:north>"));
        assert!(doc.contains("<mmd:resource>https://thredds.met.no/x?a=1&amp;b=2</mmd:resource>"));
    }

    #[test]
    fn test_render_without_location_or_times() {
        let mut fields = fields();
        fields.start_date = None;
        let doc = render_mmd(&fields, None);
        assert!(doc.contains("<mmd:start_date></mmd:start_date>"));
        assert!(!doc.contains("data_access"));
    }

    #[test]
    fn test_write_mmd_names_file_after_wigos() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("s.bin");
        let mut archive = StationArchive::create(&store, false).unwrap();
        archive.create_time_dimension();
        archive.append_time(3600.0);
        archive.set_scalar("latitude", 60.0, Attributes::new());
        archive.set_scalar("longitude", 11.0, Attributes::new());
        archive.set_attribute("station_name", "OSLO");
        archive.set_attribute("wigos", "0-1-2-3");
        archive.close().unwrap();

        let written = write_mmd(dir.path(), &store, None).unwrap();
        assert_eq!(written, dir.path().join("0-1-2-3.xml"));
        let doc = std::fs::read_to_string(written).unwrap();
        assert!(doc.contains("<mmd:start_date>1970-01-01T01:00:00Z</mmd:start_date>"));
    }

    #[test]
    fn test_missing_station_name_attribute() {
        let dir = tempdir().unwrap();
        let archive = StationArchive::create(&dir.path().join("s.bin"), false).unwrap();
        assert!(matches!(
            read_document_fields(&archive),
            Err(ArchiveError::MissingAttribute(key)) if key == "station_name"
        ));
    }
}
