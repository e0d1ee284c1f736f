//! Engine invariant checks
//!
//! Recomputes the expected partition and reference energies from a dataset
//! by brute force and checks an [`EngineRun`] against them.

use std::collections::{BTreeMap, HashMap};

use lida_core::{cm_to_ev, round_to, LumpKey, LumpedId, OriginalId, ENERGY_DECIMALS};
use lida_lump::{harmonic_lifetime, ResolvedConfig, StateFilter};

use crate::{EngineRun, SyntheticDataset};

/// A broken engine invariant
#[derive(Clone, Debug, PartialEq)]
pub enum Violation {
    /// Surviving state missing from the index
    Unassigned(OriginalId),
    /// State assigned to a composite with a different key, or filtered out but indexed
    Misassigned(OriginalId),
    /// Composite id does not match its table position
    SparseId(LumpedId),
    /// Composite energies not ascending
    EnergyOrder(LumpedId),
    /// Composite energy differs from the lowest-J mean of its members
    ReferenceEnergy {
        id: LumpedId,
        expected: f64,
        actual: f64,
    },
    /// Composite key with no table entry, or table entry with no members
    KeyMismatch(LumpKey),
    SelfTransition(LumpedId),
    /// Final state not strictly below the initial state
    NonDecaying { i: LumpedId, f: LumpedId },
    TooManyChannels { i: LumpedId, count: usize },
    /// Retained channels do not reproduce the total lifetime
    Lifetime {
        id: LumpedId,
        tau: f64,
        reconstructed: f64,
    },
}

/// Invariant check result
#[derive(Debug, Default)]
pub struct InvariantReport {
    pub violations: Vec<Violation>,
    pub states_checked: usize,
    pub channels_checked: usize,
}

impl InvariantReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Lowest J seen for a key, with the energies at that J [cm-1]
struct Reference {
    j: f64,
    energies: Vec<f64>,
}

/// Check every state and transition invariant of a run
pub fn check_run(
    dataset: &SyntheticDataset,
    config: &ResolvedConfig,
    run: &EngineRun,
) -> InvariantReport {
    let mut report = InvariantReport::default();
    check_states(dataset, config, run, &mut report);
    check_transitions(config, run, &mut report);
    report
}

fn check_states(
    dataset: &SyntheticDataset,
    config: &ResolvedConfig,
    run: &EngineRun,
    report: &mut InvariantReport,
) {
    let table = &run.lumped.table;
    let index = &run.lumped.index;

    let mut by_key: HashMap<&LumpKey, LumpedId> = HashMap::new();
    let mut previous = f64::NEG_INFINITY;
    for (position, state) in table.iter().enumerate() {
        if state.id.index() != position {
            report.violations.push(Violation::SparseId(state.id));
        }
        if state.energy < previous {
            report.violations.push(Violation::EnergyOrder(state.id));
        }
        previous = state.energy;
        by_key.insert(&state.key, state.id);
    }

    let filter = StateFilter::new(config);
    let mut references: BTreeMap<LumpKey, Reference> = BTreeMap::new();
    for record in &dataset.states {
        report.states_checked += 1;
        let assigned = index.lumped_of(record.id);
        if !filter.accepts(record) {
            if assigned.is_some() {
                report.violations.push(Violation::Misassigned(record.id));
            }
            continue;
        }

        let key = LumpKey::from_record(record, config.resolved_positions());
        match (assigned, by_key.get(&key)) {
            (None, _) => report.violations.push(Violation::Unassigned(record.id)),
            (Some(lumped), Some(&expected)) if lumped == expected => {}
            _ => report.violations.push(Violation::Misassigned(record.id)),
        }

        let reference = references.entry(key).or_insert(Reference {
            j: record.j,
            energies: Vec::new(),
        });
        if record.j < reference.j {
            reference.j = record.j;
            reference.energies.clear();
        }
        if record.j == reference.j {
            reference.energies.push(record.energy);
        }
    }

    if references.len() != table.len() {
        for state in table.iter().filter(|s| !references.contains_key(&s.key)) {
            report.violations.push(Violation::KeyMismatch(state.key.clone()));
        }
    }
    for (key, reference) in &references {
        let Some(&id) = by_key.get(key) else {
            report.violations.push(Violation::KeyMismatch(key.clone()));
            continue;
        };
        let mean = reference.energies.iter().sum::<f64>() / reference.energies.len() as f64;
        let expected = round_to(cm_to_ev(mean), ENERGY_DECIMALS);
        let actual = table.get(id).map_or(f64::NAN, |s| s.energy);
        // one unit of the last decimal for differing summation order
        if !((expected - actual).abs() <= 1.5e-5) {
            report.violations.push(Violation::ReferenceEnergy {
                id,
                expected,
                actual,
            });
        }
    }
}

fn check_transitions(config: &ResolvedConfig, run: &EngineRun, report: &mut InvariantReport) {
    let table = &run.lumped.table;

    let mut outgoing: BTreeMap<LumpedId, Vec<f64>> = BTreeMap::new();
    for channel in &run.transitions {
        report.channels_checked += 1;
        if channel.i == channel.f {
            report.violations.push(Violation::SelfTransition(channel.i));
        }
        let decays = match (table.get(channel.i), table.get(channel.f)) {
            (Some(initial), Some(last)) => last.energy < initial.energy,
            _ => false,
        };
        if !decays {
            report.violations.push(Violation::NonDecaying {
                i: channel.i,
                f: channel.f,
            });
        }
        outgoing.entry(channel.i).or_default().push(channel.tau_if);
    }

    for state in table.iter() {
        let taus = outgoing.get(&state.id).map(Vec::as_slice).unwrap_or_default();
        if taus.len() > config.top_channels {
            report.violations.push(Violation::TooManyChannels {
                i: state.id,
                count: taus.len(),
            });
        }

        let reconstructed = harmonic_lifetime(taus.iter().copied());
        let matches = if state.tau.is_finite() {
            (reconstructed - state.tau).abs() <= 1e-9 * state.tau
        } else {
            reconstructed.is_infinite()
        };
        if !matches {
            report.violations.push(Violation::Lifetime {
                id: state.id,
                tau: state.tau,
                reconstructed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{run_engine, BatchSizes, DatasetConfig};

    #[test]
    fn test_default_dataset_is_valid() {
        let dataset = SyntheticDataset::generate(DatasetConfig::default());
        let config = dataset.resolved_config().unwrap();
        let run = run_engine(&dataset, &config, BatchSizes::new(17, 29)).unwrap();

        let report = check_run(&dataset, &config, &run);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.states_checked, dataset.states.len());
        assert!(report.channels_checked > 0);
    }

    #[test]
    fn test_detects_dropped_channels() {
        let dataset = SyntheticDataset::generate(DatasetConfig::light());
        let config = dataset.resolved_config().unwrap();
        let mut run = run_engine(&dataset, &config, BatchSizes::whole(&dataset)).unwrap();

        run.transitions.clear();
        let report = check_run(&dataset, &config, &run);
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::Lifetime { .. })));
    }
}
