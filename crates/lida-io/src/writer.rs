//! LIDA output writer
//!
//! One output directory per molecule formula, written in full to a staging
//! directory first:
//! - `meta_data.json`
//! - `states_data.csv`
//! - `states_electronic_raw.csv` / `states_vibrational.csv`
//! - `states_composite_map.json`
//! - `states_original_tau.json` (optional)
//! - `transitions_data.csv`

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use lida_core::{LidaError, LidaResult, LumpedId};
use lida_lump::{CompositeTransition, StateIndex, StateTable};
use serde::Serialize;
use tracing::{debug, warn};

use crate::MoleculeInput;

pub const META_DATA_FILE: &str = "meta_data.json";
pub const STATES_DATA_FILE: &str = "states_data.csv";
pub const STATES_ELECTRONIC_RAW_FILE: &str = "states_electronic_raw.csv";
pub const STATES_ELECTRONIC_FILE: &str = "states_electronic.csv";
pub const STATES_VIBRATIONAL_FILE: &str = "states_vibrational.csv";
pub const COMPOSITE_MAP_FILE: &str = "states_composite_map.json";
pub const ORIGINAL_TAU_FILE: &str = "states_original_tau.json";
pub const TRANSITIONS_DATA_FILE: &str = "transitions_data.csv";

pub(crate) fn csv_error(err: csv::Error) -> LidaError {
    LidaError::Io(io::Error::from(err))
}

#[derive(Serialize)]
struct Metadata<'a> {
    formula: &'a str,
    input: &'a MoleculeInput,
    processed_on: String,
}

#[derive(Serialize)]
struct StateRow {
    i: u32,
    tau: f64,
    #[serde(rename = "E")]
    energy: f64,
}

#[derive(Serialize)]
struct TransitionRow {
    i: u32,
    f: u32,
    tau_if: f64,
}

/// Suffix of the staging directory a run writes into before it is committed
pub const STAGING_SUFFIX: &str = ".partial";

/// Writer of the per-molecule output files
///
/// Files are written to `<formula>.partial/` and only moved to `<formula>/`
/// by [`OutputWriter::commit`].
#[derive(Debug)]
pub struct OutputWriter {
    formula: String,
    target: PathBuf,
    staging: PathBuf,
}

impl OutputWriter {
    /// Prepare the staging directory for `<output_root>/<formula>/`, which
    /// must be absent or empty. A stale staging directory is removed.
    pub fn create(output_root: &Path, formula: &str) -> LidaResult<Self> {
        let target = output_root.join(formula);
        if target.exists() && fs::read_dir(&target)?.next().is_some() {
            return Err(LidaError::OutputExists(target));
        }
        let staging = output_root.join(format!("{formula}{STAGING_SUFFIX}"));
        if staging.exists() {
            warn!(dir = %staging.display(), "removing stale staging directory");
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        Ok(OutputWriter {
            formula: formula.to_string(),
            target,
            staging,
        })
    }

    /// Directory the files are written to until commit
    pub fn dir(&self) -> &Path {
        &self.staging
    }

    /// Move the finished outputs into the final directory
    pub fn commit(self) -> LidaResult<PathBuf> {
        if self.target.exists() {
            // only an empty directory can be here, `create` checked
            fs::remove_dir(&self.target)?;
        }
        fs::rename(&self.staging, &self.target)?;
        debug!(dir = %self.target.display(), "outputs committed");
        Ok(self.target)
    }

    /// Remove everything written so far
    pub fn discard(self) -> LidaResult<()> {
        fs::remove_dir_all(&self.staging)?;
        debug!(dir = %self.staging.display(), "outputs discarded");
        Ok(())
    }

    fn create_file(&self, name: &str) -> LidaResult<BufWriter<File>> {
        Ok(BufWriter::new(File::create(self.dir().join(name))?))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> LidaResult<()> {
        let mut writer = self.create_file(name)?;
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        debug!(file = name, "written");
        Ok(())
    }

    fn csv_writer(&self, name: &str) -> LidaResult<csv::Writer<BufWriter<File>>> {
        Ok(csv::Writer::from_writer(self.create_file(name)?))
    }

    /// Raw input and processing timestamp
    pub fn write_metadata(&self, input: &MoleculeInput) -> LidaResult<()> {
        let metadata = Metadata {
            formula: &self.formula,
            input,
            processed_on: Local::now().to_rfc3339(),
        };
        self.write_json(META_DATA_FILE, &metadata)
    }

    /// `i,tau,E` per composite state
    pub fn write_states_data(&self, states: &StateTable) -> LidaResult<()> {
        let mut writer = self.csv_writer(STATES_DATA_FILE)?;
        for state in states.iter() {
            writer
                .serialize(StateRow {
                    i: state.id.get(),
                    tau: state.tau,
                    energy: state.energy,
                })
                .map_err(csv_error)?;
        }
        writer.flush()?;
        debug!(file = STATES_DATA_FILE, rows = states.len(), "written");
        Ok(())
    }

    /// Resolved electronic and vibrational quanta, one table each where resolved
    pub fn write_states_quanta(&self, states: &StateTable) -> LidaResult<()> {
        let el_count = states.electronic_names().len();
        let tables = [
            (STATES_ELECTRONIC_RAW_FILE, states.electronic_names(), 0..el_count),
            (
                STATES_VIBRATIONAL_FILE,
                states.vibrational_names(),
                el_count..states.resolved_names().len(),
            ),
        ];
        for (name, columns, range) in tables {
            if columns.is_empty() {
                continue;
            }
            let mut writer = self.csv_writer(name)?;
            writer
                .write_record(std::iter::once("i").chain(columns.iter().map(String::as_str)))
                .map_err(csv_error)?;
            for state in states.iter() {
                let id = state.id.to_string();
                let values = &state.key.values()[range.clone()];
                writer
                    .write_record(std::iter::once(id.as_str()).chain(values.iter().map(String::as_str)))
                    .map_err(csv_error)?;
            }
            writer.flush()?;
            debug!(file = name, rows = states.len(), "written");
        }
        Ok(())
    }

    /// Composite id -> sorted original ids
    pub fn write_composite_map(&self, index: &StateIndex) -> LidaResult<()> {
        let map: BTreeMap<u32, Vec<u64>> = index
            .iter_lumped()
            .map(|(id, members)| (id.get(), members.iter().map(|m| m.get()).collect()))
            .collect();
        self.write_json(COMPOSITE_MAP_FILE, &map)
    }

    /// Composite id -> original lifetimes of its members (`null` where unknown)
    pub fn write_original_taus(&self, taus: &[Vec<Option<f64>>]) -> LidaResult<()> {
        let map: BTreeMap<u32, &Vec<Option<f64>>> = (0..).zip(taus).collect();
        self.write_json(ORIGINAL_TAU_FILE, &map)
    }

    /// `i,f,tau_if` per retained composite transition
    pub fn write_transitions(&self, transitions: &[CompositeTransition]) -> LidaResult<()> {
        let mut writer = self.csv_writer(TRANSITIONS_DATA_FILE)?;
        for transition in transitions {
            writer
                .serialize(TransitionRow {
                    i: transition.i.get(),
                    f: transition.f.get(),
                    tau_if: transition.tau_if,
                })
                .map_err(csv_error)?;
        }
        writer.flush()?;
        debug!(file = TRANSITIONS_DATA_FILE, rows = transitions.len(), "written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lida_core::{ev_to_cm, OriginalId, StateRecord};
    use lida_lump::{LumpedStates, LumpingConfig, StateLumper, StatesSchema};

    fn lumped() -> LumpedStates {
        let schema = StatesSchema::from_header(["i", "E", "g_tot", "J", "State", "v"]).unwrap();
        let config = LumpingConfig::new(["State"], ["v"]).validate(&schema).unwrap();
        let mut lumper = StateLumper::new(config);
        lumper.push_batch(&[
            StateRecord::new(OriginalId::new(7), 0.0, 1.0, 0.0).with_labels(["X1Sigma+", "0"]),
            StateRecord::new(OriginalId::new(3), 1.0, 3.0, 1.0).with_labels(["X1Sigma+", "0"]),
            StateRecord::new(OriginalId::new(9), ev_to_cm(0.25), 1.0, 0.0)
                .with_labels(["X1Sigma+", "1"]),
        ]);
        lumper.finish().unwrap()
    }

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn test_refuses_non_empty_output() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("CO")).unwrap();
        OutputWriter::create(root.path(), "CO").unwrap();

        fs::write(root.path().join("CO/states_data.csv"), "").unwrap();
        let err = OutputWriter::create(root.path(), "CO").unwrap_err();
        assert!(matches!(err, LidaError::OutputExists(_)));
    }

    #[test]
    fn test_nothing_visible_until_commit() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("CO")).unwrap();
        let writer = OutputWriter::create(root.path(), "CO").unwrap();
        writer.write_states_data(&lumped().table).unwrap();
        assert!(!root.path().join("CO").join(STATES_DATA_FILE).exists());

        let dir = writer.commit().unwrap();
        assert_eq!(dir, root.path().join("CO"));
        assert!(dir.join(STATES_DATA_FILE).is_file());
        assert!(!root.path().join("CO.partial").exists());
    }

    #[test]
    fn test_discard_and_stale_staging() {
        let root = tempfile::tempdir().unwrap();
        let writer = OutputWriter::create(root.path(), "CO").unwrap();
        writer.write_states_data(&lumped().table).unwrap();
        writer.discard().unwrap();
        assert!(!root.path().join("CO.partial").exists());
        assert!(!root.path().join("CO").exists());

        // left behind by a killed run
        fs::create_dir_all(root.path().join("CO.partial")).unwrap();
        fs::write(root.path().join("CO.partial").join(META_DATA_FILE), "{}").unwrap();
        let writer = OutputWriter::create(root.path(), "CO").unwrap();
        assert!(!writer.dir().join(META_DATA_FILE).exists());
    }

    #[test]
    fn test_state_tables() {
        let root = tempfile::tempdir().unwrap();
        let writer = OutputWriter::create(root.path(), "CO").unwrap();
        let lumped = lumped();

        writer.write_states_data(&lumped.table).unwrap();
        writer.write_states_quanta(&lumped.table).unwrap();
        writer.write_composite_map(&lumped.index).unwrap();

        assert_eq!(read(writer.dir(), STATES_DATA_FILE), "i,tau,E\n0,inf,0.0\n1,inf,0.25\n");
        assert_eq!(
            read(writer.dir(), STATES_ELECTRONIC_RAW_FILE),
            "i,State\n0,X1Sigma+\n1,X1Sigma+\n"
        );
        assert_eq!(read(writer.dir(), STATES_VIBRATIONAL_FILE), "i,v\n0,0\n1,1\n");

        let map: BTreeMap<String, Vec<u64>> =
            serde_json::from_str(&read(writer.dir(), COMPOSITE_MAP_FILE)).unwrap();
        assert_eq!(map["0"], vec![3, 7]);
        assert_eq!(map["1"], vec![9]);
    }

    #[test]
    fn test_transitions_and_metadata() {
        let root = tempfile::tempdir().unwrap();
        let writer = OutputWriter::create(root.path(), "CO").unwrap();
        writer
            .write_transitions(&[CompositeTransition {
                i: LumpedId::new(1),
                f: LumpedId::ZERO,
                tau_if: 0.5,
                lump_size: 2,
            }])
            .unwrap();
        assert_eq!(read(writer.dir(), TRANSITIONS_DATA_FILE), "i,f,tau_if\n1,0,0.5\n");

        let input = MoleculeInput {
            mol_slug: Some("CO".into()),
            ..Default::default()
        };
        writer.write_metadata(&input).unwrap();
        let meta: serde_json::Value =
            serde_json::from_str(&read(writer.dir(), META_DATA_FILE)).unwrap();
        assert_eq!(meta["formula"], "CO");
        assert_eq!(meta["input"]["mol_slug"], "CO");
        assert!(meta["processed_on"].is_string());

        writer.write_original_taus(&[vec![Some(1.0), None]]).unwrap();
        let taus: serde_json::Value =
            serde_json::from_str(&read(writer.dir(), ORIGINAL_TAU_FILE)).unwrap();
        assert_eq!(taus["0"], serde_json::json!([1.0, null]));
    }
}
