//! Reduction of duplicate observations of one variable at one reference time
//! to a single authoritative observation.

use crate::types::observation::{RawObservation, VariableName};
use std::collections::BTreeMap;
use std::fmt;

/// Why no candidate could be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndecidableReason {
    /// None of the candidates ends at the reference time.
    NoZeroOffset,
    /// The zero-offset candidates do not contain exactly one hourly reading.
    AmbiguousResolution { hourly_candidates: usize },
}

impl fmt::Display for UndecidableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndecidableReason::NoZeroOffset => write!(f, "no zero-offset candidate"),
            UndecidableReason::AmbiguousResolution { hourly_candidates } => write!(
                f,
                "ambiguous resolution ({} hourly candidates)",
                hourly_candidates
            ),
        }
    }
}

/// Outcome of selecting among candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    Selected(&'a RawObservation),
    Undecidable(UndecidableReason),
}

impl<'a> Selection<'a> {
    pub fn selected(self) -> Option<&'a RawObservation> {
        match self {
            Selection::Selected(obs) => Some(obs),
            Selection::Undecidable(_) => None,
        }
    }
}

/// Picks one observation among candidates sharing a variable name and reference time.
///
/// A lone candidate always wins. Otherwise the zero-offset readings are kept,
/// and if several remain, the single one with a one-hour resolution is chosen.
pub fn select_observation<'a>(candidates: &[&'a RawObservation]) -> Selection<'a> {
    if let [only] = candidates {
        return Selection::Selected(only);
    }

    let zero_offset: Vec<&RawObservation> = candidates
        .iter()
        .copied()
        .filter(|obs| obs.is_zero_offset())
        .collect();
    match zero_offset.as_slice() {
        [] => return Selection::Undecidable(UndecidableReason::NoZeroOffset),
        [only] => return Selection::Selected(only),
        _ => {}
    }

    let hourly: Vec<&RawObservation> = zero_offset
        .into_iter()
        .filter(|obs| obs.is_hourly_resolution())
        .collect();
    match hourly.as_slice() {
        [only] => Selection::Selected(only),
        other => Selection::Undecidable(UndecidableReason::AmbiguousResolution {
            hourly_candidates: other.len(),
        }),
    }
}

/// Selection result for all variables of one timestep.
#[derive(Debug, Default)]
pub struct TimestepSelection<'a> {
    pub selected: Vec<(VariableName, &'a RawObservation)>,
    pub undecidable: Vec<(VariableName, UndecidableReason)>,
}

/// Groups the observations of a timestep by variable name and selects one per group.
/// Groups are visited in variable-name order.
pub fn select_timestep(observations: &[RawObservation]) -> TimestepSelection<'_> {
    let mut groups: BTreeMap<VariableName, Vec<&RawObservation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.variable_name()).or_default().push(obs);
    }

    let mut result = TimestepSelection::default();
    for (name, candidates) in groups {
        match select_observation(&candidates) {
            Selection::Selected(obs) => result.selected.push((name, obs)),
            Selection::Undecidable(reason) => result.undecidable.push((name, reason)),
        }
    }
    result
}
