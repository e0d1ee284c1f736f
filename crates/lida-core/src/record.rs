//! Record definitions
//!
//! Records are what the record stream adapter hands to the lumping engine:
//! one [`StateRecord`] per line of a `.states` file and one [`TransitionRecord`]
//! per line of a `.trans` file.

use std::fmt;

use crate::OriginalId;

/// A single original quantum state
#[derive(Clone, Debug, PartialEq)]
pub struct StateRecord {
    /// Index of the state in the source dataset
    pub id: OriginalId,
    /// Term energy [cm-1]
    pub energy: f64,
    /// Total degeneracy
    pub g_tot: f64,
    /// Total rotational quantum number
    pub j: f64,
    /// Radiative lifetime [s], where the dataset provides one
    pub tau: Option<f64>,
    /// Quantum labels, in the column order of the states schema
    pub labels: Vec<String>,
}

impl StateRecord {
    pub fn new(id: OriginalId, energy: f64, g_tot: f64, j: f64) -> Self {
        StateRecord {
            id,
            energy,
            g_tot,
            j,
            tau: None,
            labels: Vec::new(),
        }
    }

    /// Attach quantum labels (schema order)
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Attach an original lifetime
    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = Some(tau);
        self
    }

    /// Label at a schema column position
    #[inline]
    pub fn label(&self, position: usize) -> Option<&str> {
        self.labels.get(position).map(String::as_str)
    }
}

/// A single original radiative transition
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionRecord {
    /// Upper (initial) state
    pub i: OriginalId,
    /// Lower (final) state
    pub f: OriginalId,
    /// Einstein A coefficient [s-1]
    pub a_if: f64,
    /// Optional transition wavenumber, ignored by the lumping engine
    pub v_if: Option<f64>,
}

impl TransitionRecord {
    pub fn new(i: OriginalId, f: OriginalId, a_if: f64) -> Self {
        TransitionRecord {
            i,
            f,
            a_if,
            v_if: None,
        }
    }
}

/// Composite grouping key - the values of the resolved quanta of a state
///
/// The key has the same shape for one resolved quantum as for several.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LumpKey(Vec<String>);

impl LumpKey {
    pub fn new(values: Vec<String>) -> Self {
        LumpKey(values)
    }

    /// Build the key of a record from the schema positions of the resolved quanta
    pub fn from_record(record: &StateRecord, positions: &[usize]) -> Self {
        LumpKey(
            positions
                .iter()
                .map(|&p| record.label(p).unwrap_or_default().to_string())
                .collect(),
        )
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LumpKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        LumpKey(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for LumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0.join(","))
    }
}

impl fmt::Display for LumpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}
