use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use lida_core::LidaError;
use lida_io::{
    ElectronicMapping, MoleculeInputs, PostProcessOutcome, META_DATA_FILE, STATES_DATA_FILE,
    STATES_ELECTRONIC_FILE, TRANSITIONS_DATA_FILE,
};
use lida_runtime::{postprocess_molecule, process_molecule, DatasetProcessor, ProcessorConfig};

use crate::{check_run, run_engine, BatchSizes, DatasetConfig, EngineRun, SyntheticDataset};

fn setup(root: &Path, dataset: &SyntheticDataset) -> (MoleculeInputs, ProcessorConfig) {
    dataset.write_exomol(&root.join("data")).unwrap();
    let inputs = MoleculeInputs::from_json(&dataset.inputs_json("CO")).unwrap();
    let config =
        ProcessorConfig::new(root.join("data"), root.join("output")).with_chunk_sizes(13, 31);
    (inputs, config)
}

#[test]
fn test_files_match_in_memory_engine() {
    let root = tempfile::tempdir().unwrap();
    let dataset = SyntheticDataset::generate(DatasetConfig::default());
    let (inputs, config) = setup(root.path(), &dataset);

    let mut processor = DatasetProcessor::new("CO", inputs.get("CO").unwrap(), &config).unwrap();
    processor.lump_states().unwrap();
    let transitions = processor.lump_transitions().unwrap().to_vec();
    let run = EngineRun {
        lumped: processor.lumped_states().unwrap().clone(),
        transitions,
    };

    let resolved = dataset.resolved_config().unwrap();
    let report = check_run(&dataset, &resolved, &run);
    assert!(report.is_valid(), "{:?}", report.violations);

    let in_memory = run_engine(&dataset, &resolved, BatchSizes::whole(&dataset)).unwrap();
    assert_eq!(run.lumped.table.len(), in_memory.lumped.table.len());
    assert_eq!(run.transitions.len(), in_memory.transitions.len());
    for (a, b) in run.lumped.table.iter().zip(in_memory.lumped.table.iter()) {
        assert_eq!(a.key, b.key);
        assert_eq!(a.lump_size, b.lump_size);
    }
}

#[test]
fn test_process_and_postprocess() {
    let root = tempfile::tempdir().unwrap();
    let dataset = SyntheticDataset::generate(DatasetConfig::default());
    let (inputs, config) = setup(root.path(), &dataset);

    let stats = process_molecule("CO", &inputs, &config, None).unwrap();
    assert_eq!(stats.states_received, dataset.states.len() as u64);
    assert_eq!(stats.transitions_received, dataset.transitions.len() as u64);

    let out = root.path().join("output/CO");
    let states = fs::read_to_string(out.join(STATES_DATA_FILE)).unwrap();
    assert_eq!(states.lines().count(), stats.composite_states + 1);
    let transitions = fs::read_to_string(out.join(TRANSITIONS_DATA_FILE)).unwrap();
    assert_eq!(transitions.lines().count(), stats.composite_transitions + 1);

    let outcome = postprocess_molecule("CO", &config, &ElectronicMapping::new()).unwrap();
    assert_eq!(
        outcome,
        PostProcessOutcome::Written {
            states: stats.composite_states,
            distinct: 2,
        }
    );
    let electronic = fs::read_to_string(out.join(STATES_ELECTRONIC_FILE)).unwrap();
    assert!(electronic.contains("X(1SIGMA+)"));
    assert!(electronic.contains("a(3PI)"));
}

#[test]
fn test_failed_transitions_leave_no_outputs() {
    let root = tempfile::tempdir().unwrap();
    let dataset = SyntheticDataset::generate(DatasetConfig::light());
    let (inputs, config) = setup(root.path(), &dataset);

    let dataset_dir = dataset.write_exomol(&root.path().join("data")).unwrap();
    let trans = fs::read_dir(&dataset_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| path.extension().is_some_and(|ext| ext == "trans"))
        .unwrap();
    let mut file = OpenOptions::new().append(true).open(&trans).unwrap();
    writeln!(file, "2 x 1.0").unwrap();
    drop(file);

    let err = process_molecule("CO", &inputs, &config, None).unwrap_err();
    assert!(matches!(err, LidaError::InvalidRecord { .. }), "{err}");

    let output = root.path().join("output");
    assert!(!output.join("CO").join(META_DATA_FILE).exists());
    assert!(!output.join("CO").join(STATES_DATA_FILE).exists());
    assert!(!output.join("CO.partial").exists());
    let err = postprocess_molecule("CO", &config, &ElectronicMapping::new()).unwrap_err();
    assert!(matches!(err, LidaError::PostProcess(_)));

    // the repaired dataset lumps into the same output directory
    dataset.write_exomol(&root.path().join("data")).unwrap();
    let stats = process_molecule("CO", &inputs, &config, None).unwrap();
    let states = fs::read_to_string(output.join("CO").join(STATES_DATA_FILE)).unwrap();
    assert_eq!(states.lines().count(), stats.composite_states + 1);
}
