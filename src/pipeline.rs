use crate::archive::attributes::AttributeTemplate;
use crate::archive::merger::{MergeSummary, SeriesMerger};
use crate::consolidate::accumulator::TimeSeriesAccumulator;
use crate::error::FrostError;
use crate::input::reader::{read_catalog_file, read_station_file};
use crate::types::element::ElementCatalog;
use bon::builder;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Reads raw batch files, consolidates them and merges the result into the
/// station archive.
///
/// Without a `catalog`, values are stored in their source units.
///
/// # Example
///
/// ```no_run
/// # use frost_archive::{write_archive, FrostError};
/// # use std::path::{Path, PathBuf};
/// # fn main() -> Result<(), FrostError> {
/// let files = vec![PathBuf::from("SN18700/2020/01.json")];
/// let summary = write_archive()
///     .station(Path::new("source.json"))
///     .catalog(Path::new("elements.json"))
///     .inputs(&files)
///     .append(true)
///     .call()?;
/// println!("{} values written to {}", summary.written_values, summary.output.display());
/// # Ok(())
/// # }
/// ```
#[builder]
pub fn write_archive(
    station: &Path,
    catalog: Option<&Path>,
    inputs: &[PathBuf],
    output: Option<&Path>,
    #[builder(default)] append: bool,
    #[builder(default)] overwrite: bool,
    template: Option<AttributeTemplate>,
    program_args: Option<String>,
) -> Result<MergeSummary, FrostError> {
    let station = read_station_file(station)?;
    let catalog = match catalog {
        Some(path) => read_catalog_file(path)?,
        None => ElementCatalog::default(),
    };

    let mut accumulator = TimeSeriesAccumulator::new();
    accumulator.add_files(inputs)?;
    let (series, report) = accumulator.finish();
    info!(
        "Read {} observations in {} timesteps from {} files",
        report.observations,
        report.timesteps,
        inputs.len()
    );
    if !report.collisions.is_empty() {
        warn!(
            "{} values were replaced by later input files",
            report.collisions.len()
        );
    }

    let mut merger = SeriesMerger::builder()
        .station(&station)
        .catalog(&catalog)
        .maybe_template(template)
        .maybe_program_args(program_args)
        .build()?;
    let summary = merger
        .merge()
        .series(&series)
        .maybe_output(output)
        .append(append)
        .overwrite(overwrite)
        .call()?;
    Ok(summary)
}
