//! State lumping accumulator
//!
//! Groups filtered states by their resolved quanta, one batch at a time.
//! Memory grows with the number of distinct keys (plus the member ids needed
//! for the index), never with the number of batches.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use lida_core::{
    boltzmann_weight, cm_to_ev, round_to, LidaResult, LumpKey, LumpedId, OriginalId, StateRecord,
    ENERGY_DECIMALS,
};
use tracing::{debug, info};

use crate::{BatchPartial, MergeOutcome, ResolvedConfig, RunningLump, StateFilter, StateIndex};

/// A composite (lumped) state
#[derive(Clone, Debug, PartialEq)]
pub struct LumpedState {
    pub id: LumpedId,
    /// Values of the resolved quanta
    pub key: LumpKey,
    /// Mean energy of the members with `j_ref` [eV], 5 decimals
    pub energy: f64,
    /// Smallest J among the members
    pub j_ref: f64,
    /// Summed degeneracy of the batches that set `j_ref` (depends on batching)
    pub g_ref: f64,
    /// Number of original member states
    pub lump_size: usize,
    /// Total radiative lifetime [s]
    pub tau: f64,
    /// Lifetime from the retained channels only [s]
    pub tau_five: f64,
    /// `tau / tau_five`
    pub renorm: f64,
}

/// Composite states table, dense and sorted by ascending energy
#[derive(Clone, Debug, Default)]
pub struct StateTable {
    resolved_names: Vec<String>,
    el_count: usize,
    states: Vec<LumpedState>,
}

impl StateTable {
    /// Get a composite state by ID
    pub fn get(&self, id: LumpedId) -> Option<&LumpedState> {
        self.states.get(id.index())
    }

    pub fn get_mut(&mut self, id: LumpedId) -> Option<&mut LumpedState> {
        self.states.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LumpedState> {
        self.states.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut LumpedState> {
        self.states.iter_mut()
    }

    /// Column names of the key values
    pub fn resolved_names(&self) -> &[String] {
        &self.resolved_names
    }

    pub fn electronic_names(&self) -> &[String] {
        &self.resolved_names[..self.el_count]
    }

    pub fn vibrational_names(&self) -> &[String] {
        &self.resolved_names[self.el_count..]
    }
}

/// Output of the state lumping stage
#[derive(Clone, Debug)]
pub struct LumpedStates {
    pub table: StateTable,
    pub index: StateIndex,
    /// Original lifetimes per composite id, when recorded
    pub original_taus: Option<Vec<Vec<Option<f64>>>>,
}

/// Counters for the state stage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateLumpingStats {
    pub batches: u64,
    pub received: u64,
    pub kept: u64,
    pub reseeded: u64,
    pub accumulated: u64,
    pub ignored: u64,
}

/// Result for a single batch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateBatchResult {
    pub received: u64,
    pub kept: u64,
    pub new_keys: u64,
    pub reseeded: u64,
    pub accumulated: u64,
    pub ignored: u64,
}

#[derive(Debug)]
struct KeyAccumulator {
    running: RunningLump,
    /// Member id -> Boltzmann weight
    members: HashMap<OriginalId, f64>,
    original_taus: Vec<Option<f64>>,
}

/// Streaming state lumping accumulator
#[derive(Debug)]
pub struct StateLumper {
    config: ResolvedConfig,
    lumps: HashMap<LumpKey, KeyAccumulator>,
    stats: StateLumpingStats,
}

impl StateLumper {
    pub fn new(config: ResolvedConfig) -> Self {
        StateLumper {
            config,
            lumps: HashMap::new(),
            stats: StateLumpingStats::default(),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn stats(&self) -> &StateLumpingStats {
        &self.stats
    }

    /// Filter one batch and merge it into the running per-key state
    pub fn push_batch(&mut self, batch: &[StateRecord]) -> StateBatchResult {
        let mut result = StateBatchResult {
            received: batch.len() as u64,
            ..Default::default()
        };

        let filter = StateFilter::new(&self.config);
        let mut groups: HashMap<LumpKey, (BatchPartial, Vec<&StateRecord>)> = HashMap::new();
        for record in batch.iter().filter(|r| filter.accepts(r)) {
            let key = LumpKey::from_record(record, self.config.resolved_positions());
            let (partial, members) = groups.entry(key).or_default();
            partial.observe(record.j, record.energy, record.g_tot);
            members.push(record);
            result.kept += 1;
        }

        let temperature = self.config.temperature;
        let record_taus = self.config.record_original_lifetimes;
        for (key, (partial, members)) in groups {
            let acc = match self.lumps.entry(key) {
                Entry::Occupied(entry) => {
                    let acc = entry.into_mut();
                    match acc.running.merge(&partial) {
                        MergeOutcome::Reseeded => result.reseeded += 1,
                        MergeOutcome::Accumulated => result.accumulated += 1,
                        MergeOutcome::Ignored => result.ignored += 1,
                    }
                    acc
                }
                Entry::Vacant(entry) => {
                    result.new_keys += 1;
                    entry.insert(KeyAccumulator {
                        running: RunningLump::seed(&partial),
                        members: HashMap::new(),
                        original_taus: Vec::new(),
                    })
                }
            };

            for record in members {
                acc.members.insert(
                    record.id,
                    boltzmann_weight(record.g_tot, record.energy, temperature),
                );
                if record_taus {
                    acc.original_taus.push(record.tau);
                }
            }
        }

        self.stats.batches += 1;
        self.stats.received += result.received;
        self.stats.kept += result.kept;
        self.stats.reseeded += result.reseeded;
        self.stats.accumulated += result.accumulated;
        self.stats.ignored += result.ignored;

        debug!(
            batch = self.stats.batches,
            received = result.received,
            kept = result.kept,
            new_keys = result.new_keys,
            reseeded = result.reseeded,
            "state batch lumped"
        );

        result
    }

    /// Finalize energies, assign dense ids and build the index
    pub fn finish(self) -> LidaResult<LumpedStates> {
        let StateLumper {
            config,
            lumps,
            stats,
        } = self;

        let mut finalized: Vec<(f64, LumpKey, KeyAccumulator)> = lumps
            .into_iter()
            .map(|(key, acc)| {
                let energy = round_to(cm_to_ev(acc.running.mean_energy()), ENERGY_DECIMALS);
                (energy, key, acc)
            })
            .collect();
        finalized.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut index = StateIndex::with_capacity(finalized.len());
        let mut states = Vec::with_capacity(finalized.len());
        let mut original_taus = config.record_original_lifetimes.then(Vec::new);

        for (position, (energy, key, acc)) in finalized.into_iter().enumerate() {
            let id = LumpedId::from_index(position)?;
            for (&original, &weight) in &acc.members {
                index.insert(original, id, weight);
            }
            if let Some(taus) = original_taus.as_mut() {
                taus.push(acc.original_taus);
            }
            states.push(LumpedState {
                id,
                key,
                energy,
                j_ref: acc.running.j_ref,
                g_ref: acc.running.g_sum,
                lump_size: acc.members.len(),
                tau: f64::INFINITY,
                tau_five: f64::INFINITY,
                renorm: 1.0,
            });
        }

        info!(
            batches = stats.batches,
            received = stats.received,
            kept = stats.kept,
            lumped = states.len(),
            "state lumping finished"
        );

        Ok(LumpedStates {
            table: StateTable {
                resolved_names: config.resolved_names().to_vec(),
                el_count: config.electronic_names().len(),
                states,
            },
            index,
            original_taus,
        })
    }
}
