//! Month-by-month download of raw observation batches.

use crate::frost::client::FrostClient;
use crate::frost::error::FrostApiError;
use bon::builder;
use chrono::{Datelike, Months, NaiveDate};
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_ELEMENTS: [&str; 9] = [
    "air_temperature",
    "air_pressure_at_sea_level",
    "air_pressure_at_sea_level_qnh",
    "relative_humidity",
    "surface_air_pressure",
    "wind_from_direction",
    "wind_speed",
    "mean(surface_downwelling_longwave_flux_in_air PT1H)",
    "mean(surface_downwelling_shortwave_flux_in_air PT1H)",
];

/// 150 years.
pub const DEFAULT_DURATION_MONTHS: u32 = 12 * 150;

/// Half-open date range `[start, end)`, midnight UTC at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        TimeRange { start, end }
    }

    /// The Frost `referencetime` query value.
    pub fn to_query(&self) -> String {
        format!(
            "{}/{}",
            self.start.format("%Y-%m-%dT00:00:00Z"),
            self.end.format("%Y-%m-%dT00:00:00Z")
        )
    }

    /// The range `months` long ending at `until`, or at the start of the month
    /// after `today` when no end is given.
    pub fn ending_at(
        until: Option<NaiveDate>,
        months: Option<u32>,
        today: NaiveDate,
    ) -> Result<Self, FrostApiError> {
        let end = match until {
            Some(until) => until,
            None => next_month(today)?,
        };
        let months = months.unwrap_or(DEFAULT_DURATION_MONTHS);
        let start = end.checked_sub_months(Months::new(months)).ok_or_else(|| {
            FrostApiError::InvalidTimeRange(format!("{} months before {}", months, end))
        })?;
        Ok(TimeRange { start, end })
    }

    /// One-month periods covering the range, newest first. The oldest period
    /// may start before `start`.
    pub fn monthly_periods(&self) -> Vec<TimeRange> {
        let mut periods = Vec::new();
        let mut end = self.end;
        while end > self.start {
            let Some(start) = end.checked_sub_months(Months::new(1)) else {
                break;
            };
            periods.push(TimeRange { start, end });
            end = start;
        }
        periods
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, FrostApiError> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .ok_or_else(|| FrostApiError::InvalidTimeRange(date.to_string()))
}

fn next_month(date: NaiveDate) -> Result<NaiveDate, FrostApiError> {
    first_of_month(date)?
        .checked_add_months(Months::new(1))
        .ok_or_else(|| FrostApiError::InvalidTimeRange(format!("month after {}", date)))
}

/// Parses `YYYY-MM` into the first day of the following month, so that the
/// named month is the last one included.
pub fn parse_until(value: &str) -> Result<NaiveDate, FrostApiError> {
    let month = NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .map_err(|source| FrostApiError::InvalidMonth {
            value: value.to_string(),
            source,
        })?;
    next_month(month)
}

/// `<base>/<station>/<YYYY>/<MM>.json` for the month a period starts in.
pub fn batch_file_name(base: &Path, station: &str, period: &TimeRange) -> PathBuf {
    base.join(station)
        .join(format!("{:04}", period.start.year()))
        .join(format!("{:02}.json", period.start.month()))
}

fn valid_from_month(valid_from: &str) -> Option<NaiveDate> {
    let month = valid_from.get(..7)?;
    NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").ok()
}

/// Downloads raw observations of `station` into monthly batch files under
/// `output` and returns the written files, oldest first.
///
/// The range is narrowed to start no earlier than the first month any wanted
/// element is available. Months the server fails on are skipped with a warning.
#[builder]
pub async fn download_observations(
    client: &FrostClient,
    station: &str,
    elements: &[String],
    range: TimeRange,
    output: &Path,
) -> Result<Vec<PathBuf>, FrostApiError> {
    let available = client
        .get_available_time_series(station, elements, &range)
        .await?;
    let Some(lowest) = available
        .iter()
        .filter_map(|series| valid_from_month(&series.valid_from))
        .min()
    else {
        info!("No available time series for {}", station);
        return Ok(Vec::new());
    };

    let mut range = range;
    if lowest > range.start {
        range.start = lowest;
        info!("Adjusting time range to {} to match actual observations", range);
    }

    let mut element_ids: Vec<String> = available.into_iter().map(|s| s.element_id).collect();
    element_ids.sort();
    element_ids.dedup();

    let mut files = Vec::new();
    for period in range.monthly_periods() {
        info!("Downloading {} for {}", station, period);
        let data = match client.get_observations(station, &element_ids, &period).await {
            Ok(data) => data,
            Err(e @ FrostApiError::HttpStatus { .. }) => {
                warn!("Skipping {} for {}: {}", period, station, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let file_name = batch_file_name(output, station, &period);
        if let Some(parent) = file_name.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FrostApiError::CreateDir(parent.to_path_buf(), e))?;
        }
        let bytes =
            serde_json::to_vec(&data).map_err(|e| FrostApiError::Encode(file_name.clone(), e))?;
        tokio::fs::write(&file_name, bytes)
            .await
            .map_err(|e| FrostApiError::WriteFile(file_name.clone(), e))?;
        files.push(file_name);
    }
    files.reverse();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frost::client::test_server::serve;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_range_ends_next_month() {
        let range = TimeRange::ending_at(None, None, date(2024, 5, 17)).unwrap();
        assert_eq!(range.end, date(2024, 6, 1));
        assert_eq!(range.start, date(1874, 6, 1));
    }

    #[test]
    fn test_parse_until() {
        assert_eq!(parse_until("2020-12").unwrap(), date(2021, 1, 1));
        assert!(matches!(
            parse_until("2020-13"),
            Err(FrostApiError::InvalidMonth { .. })
        ));
    }

    #[test]
    fn test_monthly_periods_newest_first() {
        let range = TimeRange::new(date(2020, 1, 1), date(2020, 4, 1));
        let periods = range.monthly_periods();
        assert_eq!(
            periods,
            vec![
                TimeRange::new(date(2020, 3, 1), date(2020, 4, 1)),
                TimeRange::new(date(2020, 2, 1), date(2020, 3, 1)),
                TimeRange::new(date(2020, 1, 1), date(2020, 2, 1)),
            ]
        );
        assert!(TimeRange::new(date(2020, 1, 1), date(2020, 1, 1))
            .monthly_periods()
            .is_empty());
    }

    #[test]
    fn test_query_and_file_name() {
        let period = TimeRange::new(date(2020, 2, 1), date(2020, 3, 1));
        assert_eq!(period.to_query(), "2020-02-01T00:00:00Z/2020-03-01T00:00:00Z");
        assert_eq!(
            batch_file_name(Path::new("out"), "SN18700", &period),
            Path::new("out/SN18700/2020/02.json")
        );
    }

    #[tokio::test]
    async fn test_download_narrows_range_and_orders_files() {
        let available = r#"{"data": [
            {"sourceId": "SN18700:0", "validFrom": "2020-02-15T00:00:00.000Z", "elementId": "air_temperature"},
            {"sourceId": "SN18700:0", "validFrom": "2021-01-01T00:00:00.000Z", "elementId": "wind_speed"}
        ]}"#;
        let observations = r#"{"data": [{"referenceTime": "2020-03-01T00:00:00.000Z", "observations": []}]}"#;
        let (url, _) = serve(vec![
            (200, available.to_string()),
            (200, observations.to_string()),
        ])
        .await;
        let client = FrostClient::new(&url, "key");
        let dir = tempdir().unwrap();

        let files = download_observations()
            .client(&client)
            .station("SN18700")
            .elements(&["air_temperature".to_string()])
            .range(TimeRange::new(date(2000, 1, 1), date(2020, 4, 1)))
            .output(dir.path())
            .call()
            .await
            .unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("SN18700/2020/02.json"),
                dir.path().join("SN18700/2020/03.json"),
            ]
        );
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&files[1]).unwrap()).unwrap();
        assert_eq!(written[0]["referenceTime"], "2020-03-01T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_download_without_available_series() {
        let (url, hits) = serve(vec![(404, "{}".to_string())]).await;
        let client = FrostClient::new(&url, "key");
        let dir = tempdir().unwrap();
        let files = download_observations()
            .client(&client)
            .station("SN0")
            .elements(&["air_temperature".to_string()])
            .range(TimeRange::new(date(2020, 1, 1), date(2020, 4, 1)))
            .output(dir.path())
            .call()
            .await
            .unwrap();
        assert!(files.is_empty());
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
