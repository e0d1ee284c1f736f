//! Running lowest-J aggregate
//!
//! A composite state's energy comes only from members with the smallest J
//! ever observed for its key. Batches arrive in arbitrary order, so a later
//! batch with a lower J must throw away everything accumulated so far.

use std::cmp::Ordering;

/// Contribution of one batch to one key
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchPartial {
    /// Minimum J of the key's members within the batch
    pub j_min: f64,
    /// Sum of energies of the members with `j_min` [cm-1]
    pub energy_sum: f64,
    /// Number of members with `j_min`
    pub energy_count: u64,
    /// Sum of `g_tot` over all the key's members in the batch
    pub g_sum: f64,
}

impl BatchPartial {
    pub fn empty() -> Self {
        BatchPartial {
            j_min: f64::INFINITY,
            energy_sum: 0.0,
            energy_count: 0,
            g_sum: 0.0,
        }
    }

    /// Fold one member state into the partial
    pub fn observe(&mut self, j: f64, energy: f64, g_tot: f64) {
        self.g_sum += g_tot;
        match j.total_cmp(&self.j_min) {
            Ordering::Less => {
                self.j_min = j;
                self.energy_sum = energy;
                self.energy_count = 1;
            }
            Ordering::Equal => {
                self.energy_sum += energy;
                self.energy_count += 1;
            }
            Ordering::Greater => {}
        }
    }
}

impl Default for BatchPartial {
    fn default() -> Self {
        Self::empty()
    }
}

/// What a merge did to the running aggregate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Batch had a lower J; earlier sums were discarded
    Reseeded,
    /// Batch had the same J; sums were added
    Accumulated,
    /// Batch had a higher J; contribution dropped
    Ignored,
}

/// Running per-key aggregate with rollback on a better tie-break
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunningLump {
    /// Smallest J observed so far
    pub j_ref: f64,
    pub energy_sum: f64,
    pub energy_count: u64,
    pub g_sum: f64,
}

impl RunningLump {
    /// Seed an aggregate from the first batch that saw its key
    pub fn seed(partial: &BatchPartial) -> Self {
        RunningLump {
            j_ref: partial.j_min,
            energy_sum: partial.energy_sum,
            energy_count: partial.energy_count,
            g_sum: partial.g_sum,
        }
    }

    /// Discard accumulated sums and reseed from a partial
    pub fn reset(&mut self, partial: &BatchPartial) {
        *self = Self::seed(partial);
    }

    /// Merge a batch partial according to the lowest-J tie-break
    pub fn merge(&mut self, partial: &BatchPartial) -> MergeOutcome {
        match partial.j_min.total_cmp(&self.j_ref) {
            Ordering::Less => {
                self.reset(partial);
                MergeOutcome::Reseeded
            }
            Ordering::Equal => {
                self.energy_sum += partial.energy_sum;
                self.energy_count += partial.energy_count;
                self.g_sum += partial.g_sum;
                MergeOutcome::Accumulated
            }
            Ordering::Greater => MergeOutcome::Ignored,
        }
    }

    /// Mean energy of the reference-J members [cm-1]
    pub fn mean_energy(&self) -> f64 {
        if self.energy_count == 0 {
            return f64::NAN;
        }
        self.energy_sum / self.energy_count as f64
    }
}
