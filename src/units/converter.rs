//! Per-variable unit conversion with a run-scoped cache.

use crate::types::observation::VariableName;
use crate::units::error::UnitError;
use crate::units::unit::Unit;
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// How values of one variable are converted to their stored unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    Identity,
    /// `value * scale + offset`
    Affine { scale: f64, offset: f64 },
    /// The units could not be reconciled; values are stored unchanged.
    PassThrough { reason: UnitError },
}

impl Conversion {
    /// Decides the conversion between two unit expressions.
    pub fn between(source: &str, target: &str) -> Conversion {
        if source == target {
            return Conversion::Identity;
        }
        let units = Unit::parse(source).and_then(|from| Ok((from, Unit::parse(target)?)));
        let (from, to) = match units {
            Ok(units) => units,
            Err(reason) => return Conversion::PassThrough { reason },
        };
        match from.conversion_to(&to) {
            Some((scale, offset)) if scale == 1.0 && offset == 0.0 => Conversion::Identity,
            Some((scale, offset)) => Conversion::Affine { scale, offset },
            None => Conversion::PassThrough {
                reason: UnitError::NotConvertible {
                    from: source.to_string(),
                    to: target.to_string(),
                },
            },
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Conversion::Affine { scale, offset } => value * scale + offset,
            Conversion::Identity | Conversion::PassThrough { .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<&UnitError> {
        match self {
            Conversion::PassThrough { reason } => Some(reason),
            _ => None,
        }
    }
}

/// A conversion looked up through [`UnitConverter::resolve`].
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub conversion: &'a Conversion,
    /// True when the conversion was decided by this call rather than taken from the cache.
    pub fresh: bool,
}

/// Caches one conversion per variable name for the duration of a merge run.
///
/// The cache is keyed by variable only: a variable is assumed to use the same
/// source and target unit throughout a run.
#[derive(Debug, Default)]
pub struct UnitConverter {
    cache: HashMap<VariableName, Conversion>,
}

impl UnitConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, variable: &VariableName, source: &str, target: &str) -> Resolved<'_> {
        match self.cache.entry(variable.clone()) {
            Entry::Occupied(e) => Resolved {
                conversion: e.into_mut(),
                fresh: false,
            },
            Entry::Vacant(e) => {
                let conversion = Conversion::between(source, target);
                debug!(
                    "Conversion {} -> {} for variable {}: {:?}",
                    source, target, variable, conversion
                );
                Resolved {
                    conversion: e.insert(conversion),
                    fresh: true,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
