//! Transition lumping
//!
//! Two steps:
//! 1. [`TransitionLumper`] streams transition batches into pre-lumps keyed by
//!    (original initial state, composite final state), summing A coefficients.
//! 2. [`combine_prelumps`] merges the pre-lumps sharing a composite
//!    (initial, final) pair into composite transitions, weighting each
//!    pre-lump's partial lifetime by its initial state's Boltzmann weight,
//!    and keeps only pairs that decay to a lower energy.

use std::collections::BTreeMap;

use lida_core::{LidaError, LidaResult, LumpedId, OriginalId, TransitionRecord};
use tracing::{debug, info};

use crate::{StateIndex, StateTable};

/// Running totals of one pre-lump
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PreLump {
    /// Summed Einstein coefficients [s-1]
    pub a_sum: f64,
    /// Number of contributing original transitions
    pub count: u64,
}

impl PreLump {
    /// Partial lifetime of the pre-lump [s]; infinite for a zero rate
    pub fn tau(&self) -> f64 {
        if self.a_sum > 0.0 {
            1.0 / self.a_sum
        } else {
            f64::INFINITY
        }
    }
}

/// A composite transition
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeTransition {
    pub i: LumpedId,
    pub f: LumpedId,
    /// Partial lifetime [s]
    pub tau_if: f64,
    /// Number of original transitions merged into this one
    pub lump_size: u64,
}

/// Counters for the transition stage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionLumpingStats {
    pub batches: u64,
    pub received: u64,
    pub unknown_state: u64,
    pub self_transitions: u64,
    pub kept: u64,
}

/// Result for a single batch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionBatchResult {
    pub received: u64,
    pub unknown_state: u64,
    pub self_transitions: u64,
    pub kept: u64,
}

/// Pre-lumps keyed by (original initial, composite final)
pub type PreLumps = BTreeMap<(OriginalId, LumpedId), PreLump>;

/// Streaming transition pre-lump accumulator
///
/// Borrows the finished [`StateIndex`], so it can only be built once state
/// lumping is complete.
#[derive(Debug)]
pub struct TransitionLumper<'a> {
    index: &'a StateIndex,
    prelumps: PreLumps,
    stats: TransitionLumpingStats,
}

impl<'a> TransitionLumper<'a> {
    pub fn new(index: &'a StateIndex) -> Self {
        TransitionLumper {
            index,
            prelumps: BTreeMap::new(),
            stats: TransitionLumpingStats::default(),
        }
    }

    pub fn stats(&self) -> &TransitionLumpingStats {
        &self.stats
    }

    /// Map one batch onto composite states and add it to the running totals
    pub fn push_batch(&mut self, batch: &[TransitionRecord]) -> TransitionBatchResult {
        let mut result = TransitionBatchResult {
            received: batch.len() as u64,
            ..Default::default()
        };

        let mut current: BTreeMap<(OriginalId, LumpedId), PreLump> = BTreeMap::new();
        for transition in batch {
            let (Some(lumped_i), Some(lumped_f)) = (
                self.index.lumped_of(transition.i),
                self.index.lumped_of(transition.f),
            ) else {
                result.unknown_state += 1;
                continue;
            };
            if lumped_i == lumped_f {
                result.self_transitions += 1;
                continue;
            }

            let prelump = current.entry((transition.i, lumped_f)).or_default();
            prelump.a_sum += transition.a_if;
            prelump.count += 1;
            result.kept += 1;
        }

        for (key, prelump) in current {
            let running = self.prelumps.entry(key).or_default();
            running.a_sum += prelump.a_sum;
            running.count += prelump.count;
        }

        self.stats.batches += 1;
        self.stats.received += result.received;
        self.stats.unknown_state += result.unknown_state;
        self.stats.self_transitions += result.self_transitions;
        self.stats.kept += result.kept;

        debug!(
            batch = self.stats.batches,
            received = result.received,
            kept = result.kept,
            prelumps = self.prelumps.len(),
            "transition batch pre-lumped"
        );

        result
    }

    /// Finish streaming and hand over the pre-lumps
    pub fn finish(self) -> PreLumps {
        info!(
            batches = self.stats.batches,
            received = self.stats.received,
            kept = self.stats.kept,
            prelumps = self.prelumps.len(),
            "transition pre-lumping finished"
        );
        self.prelumps
    }
}

#[derive(Default)]
struct PairSums {
    weighted_tau: f64,
    weight: f64,
    plain_tau: f64,
    members: u64,
    lump_size: u64,
}

/// Combine pre-lumps into decaying composite transitions
///
/// Partial lifetimes of pre-lumps sharing a composite (initial, final) pair
/// are averaged with their initial states' Boltzmann weights. If every weight
/// in a group underflows to zero, the plain mean is used instead.
pub fn combine_prelumps(
    prelumps: &PreLumps,
    index: &StateIndex,
    states: &StateTable,
) -> LidaResult<Vec<CompositeTransition>> {
    let mut pairs: BTreeMap<(LumpedId, LumpedId), PairSums> = BTreeMap::new();

    for (&(original_i, lumped_f), prelump) in prelumps {
        let entry = index
            .entry(original_i)
            .ok_or(LidaError::UnindexedState(original_i))?;
        let tau = prelump.tau();
        let sums = pairs.entry((entry.lumped, lumped_f)).or_default();
        if entry.weight > 0.0 {
            sums.weighted_tau += tau * entry.weight;
            sums.weight += entry.weight;
        }
        sums.plain_tau += tau;
        sums.members += 1;
        sums.lump_size += prelump.count;
    }

    let mut combined = Vec::with_capacity(pairs.len());
    let mut discarded = 0u64;
    for ((i, f), sums) in pairs {
        let initial = states.get(i).ok_or(LidaError::MissingLumpedState(i))?;
        let last = states.get(f).ok_or(LidaError::MissingLumpedState(f))?;
        if !(last.energy < initial.energy) {
            discarded += 1;
            continue;
        }

        let tau_if = if sums.weight > 0.0 {
            sums.weighted_tau / sums.weight
        } else {
            sums.plain_tau / sums.members as f64
        };
        combined.push(CompositeTransition {
            i,
            f,
            tau_if,
            lump_size: sums.lump_size,
        });
    }

    info!(
        combined = combined.len(),
        non_decaying = discarded,
        "pre-lumps combined"
    );

    Ok(combined)
}
