//! In-memory engine harness
//!
//! Drives the lumping engine over a [`SyntheticDataset`] with arbitrary
//! batch sizes, without touching the filesystem.

use lida_core::LidaResult;
use lida_lump::{
    combine_prelumps, synthesize_lifetimes, CompositeTransition, LumpedStates, ResolvedConfig,
    StateLumper, TransitionLumper,
};

use crate::SyntheticDataset;

/// Batch sizes for one engine run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSizes {
    pub states: usize,
    pub transitions: usize,
}

impl BatchSizes {
    pub fn new(states: usize, transitions: usize) -> Self {
        BatchSizes {
            states: states.max(1),
            transitions: transitions.max(1),
        }
    }

    /// Everything in a single batch
    pub fn whole(dataset: &SyntheticDataset) -> Self {
        Self::new(dataset.states.len(), dataset.transitions.len())
    }
}

/// Output of a complete engine run
#[derive(Debug)]
pub struct EngineRun {
    pub lumped: LumpedStates,
    /// Retained, renormalized channels
    pub transitions: Vec<CompositeTransition>,
}

/// Run state lumping, transition lumping and lifetime synthesis
pub fn run_engine(
    dataset: &SyntheticDataset,
    config: &ResolvedConfig,
    sizes: BatchSizes,
) -> LidaResult<EngineRun> {
    let mut lumper = StateLumper::new(config.clone());
    for batch in dataset.states.chunks(sizes.states) {
        lumper.push_batch(batch);
    }
    let mut lumped = lumper.finish()?;

    let prelumps = {
        let mut lumper = TransitionLumper::new(&lumped.index);
        for batch in dataset.transitions.chunks(sizes.transitions) {
            lumper.push_batch(batch);
        }
        lumper.finish()
    };

    let combined = combine_prelumps(&prelumps, &lumped.index, &lumped.table)?;
    let transitions = synthesize_lifetimes(
        &mut lumped.table,
        combined,
        config.top_channels,
        config.channel_ranking,
    )?;

    Ok(EngineRun {
        lumped,
        transitions,
    })
}

fn close(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= tolerance * a.abs().max(b.abs())
}

impl EngineRun {
    /// First difference from another run, if any
    ///
    /// Energies may differ by one unit of the last written decimal and
    /// lifetimes by summation rounding.
    pub fn divergence(&self, other: &EngineRun) -> Option<String> {
        let (ours, theirs) = (&self.lumped.table, &other.lumped.table);
        if ours.len() != theirs.len() {
            return Some(format!("{} vs {} composite states", ours.len(), theirs.len()));
        }
        for (a, b) in ours.iter().zip(theirs.iter()) {
            if a.key != b.key || a.lump_size != b.lump_size || a.j_ref != b.j_ref {
                return Some(format!("composite state {} differs: {:?} vs {:?}", a.id, a, b));
            }
            if (a.energy - b.energy).abs() > 1.5e-5 {
                return Some(format!("energy of {}: {} vs {}", a.id, a.energy, b.energy));
            }
            if !close(a.tau, b.tau, 1e-9) || !close(a.renorm, b.renorm, 1e-9) {
                return Some(format!("lifetime of {}: {} vs {}", a.id, a.tau, b.tau));
            }
        }

        if self.transitions.len() != other.transitions.len() {
            return Some(format!(
                "{} vs {} retained channels",
                self.transitions.len(),
                other.transitions.len()
            ));
        }
        for (a, b) in self.transitions.iter().zip(&other.transitions) {
            if (a.i, a.f, a.lump_size) != (b.i, b.f, b.lump_size) || !close(a.tau_if, b.tau_if, 1e-9)
            {
                return Some(format!("channel differs: {:?} vs {:?}", a, b));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatasetConfig;

    #[test]
    fn test_run_engine_light() {
        let dataset = SyntheticDataset::generate(DatasetConfig::light());
        let config = dataset.resolved_config().unwrap();
        let run = run_engine(&dataset, &config, BatchSizes::new(5, 7)).unwrap();

        // one manifold, three vibrational levels
        assert_eq!(run.lumped.table.len(), 3);
        assert!(!run.transitions.is_empty());
    }

    #[test]
    fn test_divergence_of_identical_runs() {
        let dataset = SyntheticDataset::generate(DatasetConfig::default());
        let config = dataset.resolved_config().unwrap();
        let a = run_engine(&dataset, &config, BatchSizes::whole(&dataset)).unwrap();
        let b = run_engine(&dataset, &config, BatchSizes::whole(&dataset)).unwrap();
        assert_eq!(a.divergence(&b), None);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        assert_eq!(BatchSizes::new(0, 0), BatchSizes::new(1, 1));
    }
}
