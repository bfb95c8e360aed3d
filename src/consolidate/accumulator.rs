//! Builds the in-memory consolidated series from raw observation batches.

use crate::consolidate::selector::{select_timestep, UndecidableReason};
use crate::input::error::InputError;
use crate::input::reader::read_batch_file;
use crate::types::observation::{RawObservation, Timestep, VariableName};
use crate::types::reference_time::ReferenceTime;
use log::{info, warn};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

/// Selected observations keyed by reference time, then by variable name.
/// Holds at most one observation per (time, variable) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    entries: BTreeMap<ReferenceTime, BTreeMap<VariableName, RawObservation>>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an observation, returning the one it replaced, if any.
    pub fn insert(
        &mut self,
        time: ReferenceTime,
        name: VariableName,
        observation: RawObservation,
    ) -> Option<RawObservation> {
        self.entries.entry(time).or_default().insert(name, observation)
    }

    pub fn get(&self, time: &ReferenceTime, name: &str) -> Option<&RawObservation> {
        self.entries.get(time).and_then(|vars| vars.get(name))
    }

    /// Reference times in ascending order.
    pub fn times(&self) -> impl Iterator<Item = &ReferenceTime> {
        self.entries.keys()
    }

    /// Entries in ascending reference-time order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ReferenceTime, &BTreeMap<VariableName, RawObservation>)> {
        self.entries.iter()
    }

    /// Number of reference times.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stored (time, variable) values.
    pub fn value_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

/// Occurrences of one undecidable variable.
#[derive(Debug, Clone, PartialEq)]
pub struct UndecidableSummary {
    pub occurrences: usize,
    pub first_time: ReferenceTime,
    pub reason: UndecidableReason,
}

/// A (time, variable) pair that was supplied more than once.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub time: ReferenceTime,
    pub name: VariableName,
}

/// What happened while accumulating, beyond the series itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulationReport {
    pub timesteps: usize,
    pub observations: usize,
    pub undecidable: BTreeMap<VariableName, UndecidableSummary>,
    pub collisions: Vec<Collision>,
}

impl AccumulationReport {
    /// Total number of skipped (time, variable) slots.
    pub fn undecidable_slots(&self) -> usize {
        self.undecidable.values().map(|s| s.occurrences).sum()
    }
}

/// Ingests timesteps and keeps the selected observation for every
/// (reference time, variable) pair. A pair seen again overwrites the earlier value.
#[derive(Debug, Default)]
pub struct TimeSeriesAccumulator {
    series: TimeSeries,
    report: AccumulationReport,
}

impl TimeSeriesAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_timestep(&mut self, timestep: &Timestep) -> Result<(), InputError> {
        let time = ReferenceTime::parse(&timestep.reference_time)?;
        let observations = timestep.observations();
        self.report.timesteps += 1;
        self.report.observations += observations.len();

        let selection = select_timestep(observations);
        for (name, reason) in selection.undecidable {
            match self.report.undecidable.entry(name) {
                Entry::Occupied(mut e) => e.get_mut().occurrences += 1,
                Entry::Vacant(e) => {
                    e.insert(UndecidableSummary {
                        occurrences: 1,
                        first_time: time,
                        reason,
                    });
                }
            }
        }
        for (name, observation) in selection.selected {
            if self
                .series
                .insert(time, name.clone(), observation.clone())
                .is_some()
            {
                warn!("{} already exists in {}, replacing earlier value", name, time);
                self.report.collisions.push(Collision { time, name });
            }
        }
        Ok(())
    }

    pub fn add_batch(&mut self, timesteps: &[Timestep]) -> Result<(), InputError> {
        timesteps.iter().try_for_each(|ts| self.add_timestep(ts))
    }

    /// Reads and ingests batch files in the given order.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), InputError> {
        for path in paths {
            let path = path.as_ref();
            info!("Reading observations from {}", path.display());
            let timesteps = read_batch_file(path)?;
            self.add_batch(&timesteps)?;
        }
        Ok(())
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn report(&self) -> &AccumulationReport {
        &self.report
    }

    /// Consumes the accumulator. Undecidable selections are reported here as a
    /// single warning naming the alphabetically first affected variable.
    pub fn finish(self) -> (TimeSeries, AccumulationReport) {
        if let Some((name, summary)) = self.report.undecidable.iter().next() {
            warn!(
                "Failed to find suitable candidates for {} value(s) of {} variable(s), \
                 e.g. {} at {} ({})",
                self.report.undecidable_slots(),
                self.report.undecidable.len(),
                name,
                summary.first_time,
                summary.reason
            );
        }
        info!(
            "Accumulated {} values over {} reference times from {} observations",
            self.series.value_count(),
            self.series.len(),
            self.report.observations
        );
        (self.series, self.report)
    }
}
