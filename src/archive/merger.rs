//! Reconciles a consolidated [`TimeSeries`] with a persistent [`StationArchive`].

use crate::archive::attributes::AttributeTemplate;
use crate::archive::error::ArchiveError;
use crate::archive::store::{attributes, AttributeValue, Attributes, OpenMode, StationArchive, FILL_VALUE};
use crate::consolidate::accumulator::TimeSeries;
use crate::types::element::{ElementCatalog, ElementInfo};
use crate::types::observation::VariableName;
use crate::types::reference_time::ReferenceTime;
use crate::types::station::StationDescriptor;
use crate::units::converter::UnitConverter;
use crate::units::error::UnitError;
use bon::bon;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of a successful merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub appended_times: usize,
    pub written_values: usize,
    pub created_variables: Vec<String>,
    /// Variables stored without conversion, with the reason.
    pub unit_fallbacks: Vec<(VariableName, UnitError)>,
}

/// The archive a station is written to when no output is given: `<identity>.bin`.
pub fn default_target(
    station: &StationDescriptor,
    output: Option<&Path>,
) -> Result<PathBuf, ArchiveError> {
    if let Some(output) = output {
        return Ok(output.to_path_buf());
    }
    station
        .identity()
        .map(|id| PathBuf::from(format!("{}.bin", id)))
        .ok_or(ArchiveError::MissingTarget)
}

/// Merges series for one station. Owns the unit-conversion cache of the run,
/// so one merger serves exactly one archive at a time.
pub struct SeriesMerger<'a> {
    station: &'a StationDescriptor,
    catalog: &'a ElementCatalog,
    template: AttributeTemplate,
    program_args: String,
    converter: UnitConverter,
}

#[bon]
impl<'a> SeriesMerger<'a> {
    /// Creates a merger for `station`.
    ///
    /// `template` defaults to [`AttributeTemplate::builtin`] and `program_args`
    /// to the command line of the current process.
    #[builder]
    pub fn new(
        station: &'a StationDescriptor,
        catalog: &'a ElementCatalog,
        template: Option<AttributeTemplate>,
        program_args: Option<String>,
    ) -> Result<Self, ArchiveError> {
        let template = match template {
            Some(template) => template,
            None => AttributeTemplate::builtin()?,
        };
        let program_args =
            program_args.unwrap_or_else(|| std::env::args().collect::<Vec<_>>().join(" "));
        Ok(SeriesMerger {
            station,
            catalog,
            template,
            program_args,
            converter: UnitConverter::new(),
        })
    }

    /// Writes `series` into the station archive and closes it.
    ///
    /// New reference times are appended to the time index in ascending order;
    /// times already present are reused, so merging the same series twice only
    /// rewrites values. Variables are created on first use from the element catalog.
    ///
    /// # Errors
    ///
    /// Fails with [`ArchiveError::MissingTarget`] before anything is opened when
    /// neither `output` nor a station identity is available. Open, template and
    /// write failures abort the run without touching the archive on disk.
    #[builder]
    pub fn merge(
        &mut self,
        series: &TimeSeries,
        output: Option<&Path>,
        #[builder(default)] append: bool,
        #[builder(default)] overwrite: bool,
        now: Option<DateTime<Utc>>,
    ) -> Result<MergeSummary, ArchiveError> {
        let target = default_target(self.station, output)?;
        info!("Generating {}", target.display());

        let mode = if append {
            OpenMode::Append
        } else {
            OpenMode::Create { overwrite }
        };
        let mut archive = StationArchive::open_with(&target, mode)?;
        debug!("Opened archive");

        if !append {
            archive.create_time_dimension();
            self.add_location(&mut archive);
            debug!("Added time and location");
        }

        let mut summary = MergeSummary {
            output: target,
            appended_times: 0,
            written_values: 0,
            created_variables: Vec::new(),
            unit_fallbacks: Vec::new(),
        };

        let positions = Self::update_times(&mut archive, series, &mut summary);
        debug!("Times updated, {} appended", summary.appended_times);

        let catalog = self.catalog;
        for ((_, variables), index) in series.iter().zip(positions) {
            for (name, observation) in variables {
                let element = catalog.get(&observation.element_id);
                if !archive.contains_series(name.as_str()) {
                    archive.create_series(name.as_str(), variable_attributes(name, element));
                    summary.created_variables.push(name.to_string());
                }

                let source = observation
                    .unit
                    .as_deref()
                    .or_else(|| element.and_then(|e| e.unit.as_deref()))
                    .unwrap_or("1");
                let target = element.and_then(ElementInfo::target_unit).unwrap_or(source);
                let resolved = self.converter.resolve(name, source, target);
                if resolved.fresh {
                    if let Some(reason) = resolved.conversion.fallback_reason() {
                        warn!("{} for variable {}, storing values unconverted", reason, name);
                        summary.unit_fallbacks.push((name.clone(), reason.clone()));
                    }
                }

                let value = resolved.conversion.apply(observation.value) as f32;
                archive.write_value(name.as_str(), index, value)?;
                summary.written_values += 1;
            }
        }
        debug!("Added {} values", summary.written_values);

        self.add_metadata(&mut archive, now.unwrap_or_else(Utc::now))?;
        debug!("Added metadata");

        summary.output = archive.close()?;
        info!(
            "Merged {} values ({} new times, {} new variables) into {}",
            summary.written_values,
            summary.appended_times,
            summary.created_variables.len(),
            summary.output.display()
        );
        Ok(summary)
    }
}

impl SeriesMerger<'_> {
    /// Appends unknown times and returns the archive position of every series
    /// time, in series order. The stored index is scanned once.
    fn update_times(
        archive: &mut StationArchive,
        series: &TimeSeries,
        summary: &mut MergeSummary,
    ) -> Vec<usize> {
        let mut index: HashMap<OrderedFloat<f64>, usize> = archive
            .times()
            .iter()
            .enumerate()
            .map(|(position, seconds)| (OrderedFloat(*seconds), position))
            .collect();
        let mut latest = archive.times().iter().copied().reduce(f64::max);

        let mut positions = Vec::with_capacity(series.len());
        for time in series.times() {
            let seconds = time.epoch_seconds();
            let position = match index.get(&OrderedFloat(seconds)) {
                Some(position) => *position,
                None => {
                    // Earlier times take the next free position like any other, so the
                    // index may end up unordered. Coverage is computed from min and max.
                    if latest.is_some_and(|latest| seconds < latest) {
                        warn!(
                            "Appending {} after later stored times, the time index is no longer ascending",
                            time
                        );
                    }
                    let position = archive.append_time(seconds);
                    index.insert(OrderedFloat(seconds), position);
                    latest = Some(latest.map_or(seconds, |latest| latest.max(seconds)));
                    summary.appended_times += 1;
                    position
                }
            };
            positions.push(position);
        }
        positions
    }

    fn add_location(&self, archive: &mut StationArchive) {
        archive.set_scalar(
            "latitude",
            self.station.latitude(),
            attributes([
                ("standard_name", "latitude"),
                ("long_name", "latitude"),
                ("units", "degree_north"),
            ]),
        );
        archive.set_scalar(
            "longitude",
            self.station.longitude(),
            attributes([
                ("standard_name", "longitude"),
                ("long_name", "longitude"),
                ("units", "degree_east"),
            ]),
        );
    }

    fn add_metadata(
        &self,
        archive: &mut StationArchive,
        now: DateTime<Utc>,
    ) -> Result<(), ArchiveError> {
        let mut fields = self.station.template_fields();
        fields.insert(
            "now".to_string(),
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        fields.insert("longitude".to_string(), self.station.longitude().to_string());
        fields.insert("latitude".to_string(), self.station.latitude().to_string());
        fields.insert("program_args".to_string(), self.program_args.clone());
        fields
            .entry("wigosId".to_string())
            .or_insert_with(|| "unknown".to_string());
        let fallback_name = self.station.identity().unwrap_or("unknown").to_string();
        fields.entry("name".to_string()).or_insert(fallback_name);

        let (start, end) = time_coverage(archive.times());
        fields.insert("time_start".to_string(), start);
        fields.insert("time_end".to_string(), end);

        for (key, value) in self.template.render(&fields)? {
            archive.set_attribute(&key, value);
        }
        Ok(())
    }
}

/// Earliest and latest stored time as RFC 3339 text, empty for an empty index.
fn time_coverage(times: &[f64]) -> (String, String) {
    let format = |seconds: Option<f64>| {
        seconds
            .and_then(ReferenceTime::from_epoch_seconds)
            .map(|t| t.to_string())
            .unwrap_or_default()
    };
    (
        format(times.iter().copied().reduce(f64::min)),
        format(times.iter().copied().reduce(f64::max)),
    )
}

fn variable_attributes(name: &VariableName, element: Option<&ElementInfo>) -> Attributes {
    let mut attrs = attributes([
        (
            "long_name",
            element
                .and_then(|e| e.name.as_deref())
                .unwrap_or(name.as_str()),
        ),
        ("coverage_content_type", "physicalMeasurement"),
        (
            "standard_name",
            element
                .and_then(ElementInfo::standard_name)
                .unwrap_or(name.as_str()),
        ),
        (
            "units",
            element.and_then(ElementInfo::target_unit).unwrap_or("1"),
        ),
    ]);
    if let Some(cell_method) = element.and_then(ElementInfo::cell_method) {
        attrs.insert("cell_methods".to_string(), cell_method.into());
    }
    attrs.insert(
        "_FillValue".to_string(),
        AttributeValue::Number(f64::from(FILL_VALUE)),
    );
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::accumulator::TimeSeriesAccumulator;
    use crate::types::element::CfConvention;
    use crate::types::observation::{RawObservation, Timestep};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn station() -> StationDescriptor {
        let mut station = StationDescriptor::new("SN18700", 10.72, 59.9423);
        station.name = Some("OSLO - BLINDERN".to_string());
        station.wigos_id = Some("0-20000-0-01492".to_string());
        station
    }

    fn series(timesteps: &[Timestep]) -> TimeSeries {
        let mut acc = TimeSeriesAccumulator::new();
        acc.add_batch(timesteps).unwrap();
        acc.finish().0
    }

    fn merger<'a>(
        station: &'a StationDescriptor,
        catalog: &'a ElementCatalog,
    ) -> SeriesMerger<'a> {
        SeriesMerger::builder()
            .station(station)
            .catalog(catalog)
            .program_args("frost write archive".to_string())
            .build()
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_merge_into_empty_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::default();
        let series = series(&[Timestep::new(
            "2020-01-01T00:00:00Z",
            vec![RawObservation::new("air_temperature", 5.0)],
        )]);

        let summary = merger(&station, &catalog)
            .merge()
            .series(&series)
            .output(&path)
            .now(now())
            .call()
            .unwrap();
        assert_eq!(summary.appended_times, 1);
        assert_eq!(summary.written_values, 1);
        assert_eq!(summary.created_variables, vec!["air_temperature"]);

        let archive = StationArchive::open(&path).unwrap();
        assert_eq!(archive.times(), &[1_577_836_800.0]);
        let var = archive.series("air_temperature").unwrap();
        assert_eq!(var.value_at(0), Some(5.0));
        assert_eq!(var.attribute("units"), Some(&AttributeValue::from("1")));
        assert_eq!(var.attribute("long_name"), Some(&AttributeValue::from("air_temperature")));
        assert_eq!(archive.scalar("latitude").unwrap().value, 59.9423);
        assert_eq!(archive.scalar("longitude").unwrap().value, 10.72);

        let text = |key: &str| archive.attribute(key).and_then(|a| a.as_text()).map(str::to_string);
        assert_eq!(text("station_name").as_deref(), Some("OSLO - BLINDERN"));
        assert_eq!(text("wigos").as_deref(), Some("0-20000-0-01492"));
        assert_eq!(text("time_coverage_start").as_deref(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(text("date_created").as_deref(), Some("2024-05-01T12:00:00Z"));
        assert_eq!(
            text("history").as_deref(),
            Some("2024-05-01T12:00:00Z: frost write archive")
        );
    }

    #[test]
    fn test_append_new_time_and_variable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::default();

        let first = series(&[Timestep::new(
            "2020-01-01T00:00:00Z",
            vec![RawObservation::new("air_temperature", 5.0)],
        )]);
        merger(&station, &catalog)
            .merge()
            .series(&first)
            .output(&path)
            .call()
            .unwrap();

        let second = series(&[Timestep::new(
            "2020-01-01T01:00:00Z",
            vec![RawObservation::new("wind_speed", 3.0)],
        )]);
        let summary = merger(&station, &catalog)
            .merge()
            .series(&second)
            .output(&path)
            .append(true)
            .call()
            .unwrap();
        assert_eq!(summary.appended_times, 1);

        let archive = StationArchive::open(&path).unwrap();
        assert_eq!(archive.times(), &[1_577_836_800.0, 1_577_840_400.0]);
        let temp = archive.series("air_temperature").unwrap();
        assert_eq!(temp.value_at(0), Some(5.0));
        assert_eq!(temp.value_at(1), None);
        let wind = archive.series("wind_speed").unwrap();
        assert_eq!(wind.value_at(0), None);
        assert_eq!(wind.value_at(1), Some(3.0));
        assert_eq!(
            archive.attribute("time_coverage_end").and_then(|a| a.as_text()),
            Some("2020-01-01T01:00:00Z")
        );
    }

    #[test]
    fn test_merging_twice_does_not_duplicate_times() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::default();
        let data = series(&[
            Timestep::new("2020-01-01T00:00:00Z", vec![RawObservation::new("a", 1.0)]),
            Timestep::new("2020-01-01T01:00:00Z", vec![RawObservation::new("a", 2.0)]),
        ]);

        let mut merger = merger(&station, &catalog);
        merger.merge().series(&data).output(&path).call().unwrap();
        let summary = merger
            .merge()
            .series(&data)
            .output(&path)
            .append(true)
            .call()
            .unwrap();
        assert_eq!(summary.appended_times, 0);
        assert_eq!(summary.written_values, 2);
        assert!(summary.created_variables.is_empty());

        let archive = StationArchive::open(&path).unwrap();
        assert_eq!(archive.times().len(), 2);
        assert_eq!(archive.series("a").unwrap().values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_catalog_unit_conversion() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::new([ElementInfo {
            id: "air_temperature".to_string(),
            name: Some("Air temperature".to_string()),
            unit: Some("degC".to_string()),
            cf_convention: Some(CfConvention {
                standard_name: Some("air_temperature".to_string()),
                unit: Some("K".to_string()),
                cell_method: None,
            }),
        }]);
        let data = series(&[Timestep::new(
            "2020-01-01T00:00:00Z",
            vec![RawObservation::new("air_temperature", 5.0).with_level(2.0, "m")],
        )]);

        merger(&station, &catalog)
            .merge()
            .series(&data)
            .output(&path)
            .call()
            .unwrap();

        let archive = StationArchive::open(&path).unwrap();
        let var = archive.series("air_temperature_2m").unwrap();
        let value = f64::from(var.value_at(0).unwrap());
        assert!((value - 278.15).abs() < 1e-3, "got {}", value);
        assert_eq!(var.attribute("units"), Some(&AttributeValue::from("K")));
        assert_eq!(var.attribute("long_name"), Some(&AttributeValue::from("Air temperature")));
    }

    #[test]
    fn test_inconvertible_units_pass_through_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::new([ElementInfo {
            id: "sum(precipitation_amount PT1H)".to_string(),
            name: None,
            unit: Some("mm".to_string()),
            cf_convention: Some(CfConvention {
                standard_name: Some("precipitation_amount".to_string()),
                unit: Some("kg m-2".to_string()),
                cell_method: Some("time: sum".to_string()),
            }),
        }]);
        let data = series(&[
            Timestep::new(
                "2020-01-01T00:00:00Z",
                vec![RawObservation::new("sum(precipitation_amount PT1H)", 0.4)],
            ),
            Timestep::new(
                "2020-01-01T01:00:00Z",
                vec![RawObservation::new("sum(precipitation_amount PT1H)", 1.2)],
            ),
        ]);

        let summary = merger(&station, &catalog)
            .merge()
            .series(&data)
            .output(&path)
            .call()
            .unwrap();
        assert_eq!(summary.unit_fallbacks.len(), 1);

        let archive = StationArchive::open(&path).unwrap();
        let var = archive.series("sum(precipitation_amount PT1H)").unwrap();
        assert_eq!(var.values(), &[0.4, 1.2]);
        assert_eq!(var.attribute("cell_methods"), Some(&AttributeValue::from("time: sum")));
    }

    #[test]
    fn test_missing_target_fails_before_touching_files() {
        let dir = tempdir().unwrap();
        let mut anonymous = StationDescriptor::new("x", 0.0, 0.0);
        anonymous.id = None;
        let catalog = ElementCatalog::default();
        let data = series(&[]);

        let err = merger(&anonymous, &catalog)
            .merge()
            .series(&data)
            .call()
            .unwrap_err();
        assert!(matches!(err, ArchiveError::MissingTarget));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_default_target_uses_station_identity() {
        let station = station();
        assert_eq!(
            default_target(&station, None).unwrap(),
            PathBuf::from("0-20000-0-01492.bin")
        );
        assert_eq!(
            default_target(&station, Some(Path::new("x.bin"))).unwrap(),
            PathBuf::from("x.bin")
        );
    }

    #[test]
    fn test_template_error_leaves_no_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::default();
        let data = series(&[Timestep::new(
            "2020-01-01T00:00:00Z",
            vec![RawObservation::new("a", 1.0)],
        )]);

        let mut merger = SeriesMerger::builder()
            .station(&station)
            .catalog(&catalog)
            .template(AttributeTemplate::from_yaml_str("- title: \"{nope}\"").unwrap())
            .build()
            .unwrap();
        let err = merger.merge().series(&data).output(&path).call().unwrap_err();
        assert!(matches!(err, ArchiveError::TemplateField { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_earlier_times_are_appended_and_coverage_uses_bounds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::default();
        let mut merger = merger(&station, &catalog);

        let later = series(&[Timestep::new(
            "2020-02-01T00:00:00Z",
            vec![RawObservation::new("a", 2.0)],
        )]);
        merger.merge().series(&later).output(&path).call().unwrap();
        let earlier = series(&[Timestep::new(
            "2020-01-01T00:00:00Z",
            vec![RawObservation::new("a", 1.0)],
        )]);
        merger
            .merge()
            .series(&earlier)
            .output(&path)
            .append(true)
            .call()
            .unwrap();

        let archive = StationArchive::open(&path).unwrap();
        assert_eq!(archive.times(), &[1_580_515_200.0, 1_577_836_800.0]);
        assert_eq!(archive.series("a").unwrap().values(), &[2.0, 1.0]);
        assert_eq!(
            archive.attribute("time_coverage_start").and_then(|a| a.as_text()),
            Some("2020-01-01T00:00:00Z")
        );
        assert_eq!(
            archive.attribute("time_coverage_end").and_then(|a| a.as_text()),
            Some("2020-02-01T00:00:00Z")
        );
    }

    #[test]
    fn test_create_refuses_existing_archive_unless_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let station = station();
        let catalog = ElementCatalog::default();
        let data = series(&[Timestep::new(
            "2020-01-01T00:00:00Z",
            vec![RawObservation::new("a", 1.0)],
        )]);
        let mut merger = merger(&station, &catalog);
        merger.merge().series(&data).output(&path).call().unwrap();

        let err = merger.merge().series(&data).output(&path).call().unwrap_err();
        assert!(matches!(err, ArchiveError::TargetExists(_)));
        merger
            .merge()
            .series(&data)
            .output(&path)
            .overwrite(true)
            .call()
            .unwrap();
    }
}
