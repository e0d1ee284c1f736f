//! State filter
//!
//! Drops the states the configuration excludes. Filtering never fails; a
//! batch where nothing survives simply comes back empty.

use lida_core::StateRecord;

use crate::{FieldRef, ResolvedConfig};

/// Per-record inclusion rules derived from a [`ResolvedConfig`]
#[derive(Clone, Copy, Debug)]
pub struct StateFilter<'a> {
    config: &'a ResolvedConfig,
}

impl<'a> StateFilter<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        StateFilter { config }
    }

    /// Check a single record against every rule
    pub fn accepts(&self, record: &StateRecord) -> bool {
        if let Some(energy_max) = self.config.energy_max {
            if !(record.energy <= energy_max) {
                return false;
            }
        }

        let required = self
            .config
            .required
            .iter()
            .all(|(field, value)| field_matches(record, *field, value));
        if !required {
            return false;
        }

        let forbidden = self
            .config
            .forbidden
            .iter()
            .any(|(field, value)| field_matches(record, *field, value));
        if forbidden {
            return false;
        }

        let discarded = self.config.resolved_positions.iter().any(|&p| match record.label(p) {
            Some(label) => self.config.discard_values.contains(label),
            None => true,
        });
        if discarded {
            return false;
        }

        self.config
            .vib_positions
            .iter()
            .all(|&p| record.label(p).is_some_and(is_vibrational_quantum))
    }

    /// Keep the records of a batch that pass every rule
    pub fn apply<'r>(&self, batch: &'r [StateRecord]) -> Vec<&'r StateRecord> {
        batch.iter().filter(|r| self.accepts(r)).collect()
    }
}

/// Whether a field of a record equals a configured value
fn field_matches(record: &StateRecord, field: FieldRef, value: &str) -> bool {
    match field {
        FieldRef::J => value.trim().parse::<f64>().is_ok_and(|j| j == record.j),
        FieldRef::Label(position) => record.label(position) == Some(value),
    }
}

/// Vibrational quanta must be non-negative integers written as plain digits
fn is_vibrational_quantum(label: &str) -> bool {
    !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit())
}
