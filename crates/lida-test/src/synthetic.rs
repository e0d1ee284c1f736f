//! Synthetic ExoMol-like datasets
//!
//! Generates diatomic-looking state and transition lists from a seed:
//! electronic manifolds offset in energy, vibrational ladders inside each,
//! rotational levels split by e/f parity. Records come out shuffled so that
//! batches see keys and J values in arbitrary order.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lida_core::{LidaResult, OriginalId, StateRecord, TransitionRecord};
use lida_lump::{LumpingConfig, ResolvedConfig, StatesSchema};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Header of every generated `.states` table
pub const SYNTHETIC_HEADER: [&str; 7] = ["i", "E", "g_tot", "J", "State", "v", "e/f"];

/// Electronic manifolds: label and term energy [cm-1]
const ELECTRONIC_STATES: [(&str, f64); 4] = [
    ("X1Sigma+", 0.0),
    ("a3Pi", 6_000.0),
    ("A1Pi", 12_500.0),
    ("b3Sigma+", 19_000.0),
];

const OMEGA_E: f64 = 1_500.0;
const OMEGA_E_XE: f64 = 12.0;
const ROTATIONAL_B: f64 = 1.9;

const MOL_SLUG: &str = "CO";
const ISO_SLUG: &str = "12C-16O";
const DATASET_NAME: &str = "Synth";

/// Generator configuration
#[derive(Clone, Debug)]
pub struct DatasetConfig {
    /// Number of electronic manifolds (at most 4)
    pub electronic_states: usize,
    /// Vibrational levels per manifold
    pub vib_levels: u32,
    /// Highest rotational level
    pub j_max: u32,
    /// Outgoing transitions drawn per state
    pub transitions_per_state: usize,
    /// Probability of a `*` vibrational label
    pub discard_prob: f64,
    /// Probability of a transition to a state that does not exist
    pub unknown_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            electronic_states: 2,
            vib_levels: 4,
            j_max: 5,
            transitions_per_state: 3,
            discard_prob: 0.05,
            unknown_prob: 0.02,
            seed: 42,
        }
    }
}

impl DatasetConfig {
    /// Tiny dataset for quick tests
    pub fn light() -> Self {
        DatasetConfig {
            electronic_states: 1,
            vib_levels: 3,
            j_max: 3,
            transitions_per_state: 2,
            discard_prob: 0.05,
            unknown_prob: 0.0,
            seed: 42,
        }
    }

    /// Benchmark-sized dataset
    pub fn heavy() -> Self {
        DatasetConfig {
            electronic_states: 4,
            vib_levels: 20,
            j_max: 40,
            transitions_per_state: 8,
            discard_prob: 0.01,
            unknown_prob: 0.01,
            seed: 42,
        }
    }

    /// Number of states the configuration generates
    pub fn state_count(&self) -> usize {
        self.electronic_states.min(ELECTRONIC_STATES.len())
            * self.vib_levels as usize
            * (self.j_max as usize + 1)
            * 2
    }
}

/// A generated dataset, records in streaming order
#[derive(Clone, Debug)]
pub struct SyntheticDataset {
    pub config: DatasetConfig,
    pub states: Vec<StateRecord>,
    pub transitions: Vec<TransitionRecord>,
}

impl SyntheticDataset {
    pub fn generate(config: DatasetConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut states = Vec::with_capacity(config.state_count());

        let mut next_id = 1u64;
        for &(label, term) in ELECTRONIC_STATES.iter().take(config.electronic_states) {
            for v in 0..config.vib_levels {
                let v_f = v as f64;
                let vib = OMEGA_E * v_f - OMEGA_E_XE * v_f * v_f;
                for j in 0..=config.j_max {
                    let j_f = j as f64;
                    for parity in ["e", "f"] {
                        let splitting = if parity == "f" { 0.01 * j_f } else { 0.0 };
                        let energy = term
                            + vib
                            + ROTATIONAL_B * j_f * (j_f + 1.0)
                            + splitting
                            + rng.gen_range(-0.5..0.5);
                        let v_label = if rng.gen::<f64>() < config.discard_prob {
                            "*".to_string()
                        } else {
                            v.to_string()
                        };
                        states.push(
                            StateRecord::new(
                                OriginalId::new(next_id),
                                energy,
                                2.0 * (2.0 * j_f + 1.0),
                                j_f,
                            )
                            .with_labels([label.to_string(), v_label, parity.to_string()]),
                        );
                        next_id += 1;
                    }
                }
            }
        }

        let mut transitions = Vec::with_capacity(states.len() * config.transitions_per_state);
        for upper in &states {
            for _ in 0..config.transitions_per_state {
                let f = if rng.gen::<f64>() < config.unknown_prob {
                    OriginalId::new(next_id + rng.gen_range(0..100))
                } else {
                    states[rng.gen_range(0..states.len())].id
                };
                let a_if = 10f64.powf(rng.gen_range(-3.0..3.0));
                transitions.push(TransitionRecord::new(upper.id, f, a_if));
            }
        }

        states.shuffle(&mut rng);
        transitions.shuffle(&mut rng);

        SyntheticDataset {
            config,
            states,
            transitions,
        }
    }

    pub fn schema(&self) -> LidaResult<StatesSchema> {
        StatesSchema::from_header(SYNTHETIC_HEADER)
    }

    /// Electronic state and vibrational level resolved
    pub fn lumping_config(&self) -> LumpingConfig {
        LumpingConfig::new(["State"], ["v"])
    }

    pub fn resolved_config(&self) -> LidaResult<ResolvedConfig> {
        self.lumping_config().validate(&self.schema()?)
    }

    /// Write the dataset as `<data_dir>/CO/12C-16O/Synth/12C-16O__Synth.{states,trans}`
    ///
    /// Returns the dataset directory.
    pub fn write_exomol(&self, data_dir: &Path) -> io::Result<PathBuf> {
        let dir = data_dir.join(MOL_SLUG).join(ISO_SLUG).join(DATASET_NAME);
        fs::create_dir_all(&dir)?;
        let stem = format!("{ISO_SLUG}__{DATASET_NAME}");

        let mut states = String::new();
        for state in &self.states {
            let _ = writeln!(
                states,
                "{:>8} {:>14.6} {:>6} {:>5} {}",
                state.id,
                state.energy,
                state.g_tot,
                state.j,
                state.labels.join(" ")
            );
        }
        fs::write(dir.join(format!("{stem}.states")), states)?;

        let mut trans = String::new();
        for t in &self.transitions {
            let _ = writeln!(trans, "{:>12} {:>12} {:.4e}", t.i, t.f, t.a_if);
        }
        fs::write(dir.join(format!("{stem}.trans")), trans)?;

        Ok(dir)
    }

    /// Molecule inputs document describing the written dataset
    pub fn inputs_json(&self, formula: &str) -> String {
        let header = SYNTHETIC_HEADER
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"{{
  "{formula}": {{
    "mol_slug": "{MOL_SLUG}",
    "iso_slug": "{ISO_SLUG}",
    "dataset_name": "{DATASET_NAME}",
    "states_header": [{header}],
    "resolve_el": ["State"],
    "resolve_vib": ["v"]
  }}
}}"#
        )
    }
}
