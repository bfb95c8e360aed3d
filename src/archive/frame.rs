use crate::archive::error::ArchiveError;
use crate::archive::store::{StationArchive, TIME_VARIABLE};
use polars::prelude::*;
use std::path::Path;

/// Flattens an archive into a DataFrame: a `time` column (UTC, milliseconds)
/// followed by one nullable `f32` column per series, sorted by time.
pub fn archive_to_frame(archive: &StationArchive) -> Result<DataFrame, ArchiveError> {
    let millis: Vec<i64> = archive
        .times()
        .iter()
        .map(|seconds| (seconds * 1000.0).round() as i64)
        .collect();
    let time = Column::new(TIME_VARIABLE.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let mut columns = vec![time];
    for name in archive.series_names() {
        let Some(series) = archive.series(name) else {
            continue;
        };
        let values: Vec<Option<f32>> = (0..archive.times().len())
            .map(|index| series.value_at(index))
            .collect();
        columns.push(Column::new(name.into(), values));
    }

    let df = DataFrame::new(columns)?;
    Ok(df.sort([TIME_VARIABLE], SortMultipleOptions::default())?)
}

/// Writes the archive as a Snappy-compressed parquet file.
pub fn write_parquet(archive: &StationArchive, path: &Path) -> Result<usize, ArchiveError> {
    let mut df = archive_to_frame(archive)?;
    let file = std::fs::File::create(path)
        .map_err(|e| ArchiveError::ParquetWriteIo(path.to_path_buf(), e))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)
        .map_err(|e| ArchiveError::ParquetWritePolars(path.to_path_buf(), e))?;
    Ok(df.height())
}
