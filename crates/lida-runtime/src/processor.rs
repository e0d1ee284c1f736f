//! Dataset processor - the two-stage lumping pipeline for one molecule
//!
//! Stages are strictly ordered:
//! 1. Lump states (stream the `.states` file, build the composite states and
//!    the state index)
//! 2. Lump transitions (stream the `.trans` files against the finished index,
//!    combine pre-lumps, synthesize lifetimes)
//!
//! [`DatasetProcessor::process`] runs both and persists the outputs.

use std::time::{Duration, Instant};

use lida_core::{LidaError, LidaResult};
use lida_io::{
    DatasetFiles, ElectronicMapping, ElectronicPostProcessor, MoleculeInput, MoleculeInputs,
    OutputWriter, PostProcessOutcome, StatesReader, TransReader,
};
use lida_lump::{
    combine_prelumps, synthesize_lifetimes, CompositeTransition, LumpedStates, ResolvedConfig,
    StateLumper, StatesSchema, TransitionLumper,
};
use tracing::{error, info, info_span, warn};

use crate::ProcessorConfig;

/// Counters of one processed dataset
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessingStats {
    pub states_received: u64,
    pub states_kept: u64,
    pub composite_states: usize,
    pub transitions_received: u64,
    pub transitions_kept: u64,
    pub prelumps: usize,
    pub composite_transitions: usize,
    pub states_duration: Duration,
    pub transitions_duration: Duration,
}

/// Processor of a single molecule's dataset
pub struct DatasetProcessor {
    formula: String,
    input: MoleculeInput,
    files: DatasetFiles,
    schema: StatesSchema,
    lumping: ResolvedConfig,
    config: ProcessorConfig,
    lumped: Option<LumpedStates>,
    transitions: Option<Vec<CompositeTransition>>,
    stats: ProcessingStats,
}

impl DatasetProcessor {
    /// Validate the input against its dataset; nothing is streamed yet
    pub fn new(formula: &str, input: &MoleculeInput, config: &ProcessorConfig) -> LidaResult<Self> {
        config.validate()?;
        let (schema, lumping) = input.validate(config.apply(input.lumping_config()?))?;
        let files = DatasetFiles::locate(&config.data_dir, input)?;
        files.check_columns(&schema)?;

        Ok(DatasetProcessor {
            formula: formula.to_string(),
            input: input.clone(),
            files,
            schema,
            lumping,
            config: config.clone(),
            lumped: None,
            transitions: None,
            stats: ProcessingStats::default(),
        })
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn files(&self) -> &DatasetFiles {
        &self.files
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Composite states, once lumped
    pub fn lumped_states(&self) -> Option<&LumpedStates> {
        self.lumped.as_ref()
    }

    /// Retained composite transitions, once lumped
    pub fn transitions(&self) -> Option<&[CompositeTransition]> {
        self.transitions.as_deref()
    }

    /// Stage 1: stream the states into composite states
    pub fn lump_states(&mut self) -> LidaResult<&LumpedStates> {
        if self.lumped.is_some() {
            return Err(LidaError::StageOrder("states are already lumped"));
        }
        let _span = info_span!("lump_states", formula = %self.formula).entered();
        let start = Instant::now();

        let reader =
            StatesReader::open(&self.files.states, &self.schema, self.config.states_chunk_size)?;
        let mut lumper = StateLumper::new(self.lumping.clone());
        for batch in reader {
            lumper.push_batch(&batch?);
        }
        let stats = lumper.stats().clone();
        let lumped = lumper.finish()?;

        if lumped.table.is_empty() {
            warn!(formula = %self.formula, "no states survived the filters");
        }
        self.stats.states_received = stats.received;
        self.stats.states_kept = stats.kept;
        self.stats.composite_states = lumped.table.len();
        self.stats.states_duration = start.elapsed();

        Ok(&*self.lumped.insert(lumped))
    }

    /// Stage 2: stream the transitions into composite transitions and lifetimes
    pub fn lump_transitions(&mut self) -> LidaResult<&[CompositeTransition]> {
        if self.transitions.is_some() {
            return Err(LidaError::StageOrder("transitions are already lumped"));
        }
        let Some(lumped) = self.lumped.as_mut() else {
            return Err(LidaError::StageOrder("states must be lumped before transitions"));
        };
        let _span = info_span!("lump_transitions", formula = %self.formula).entered();
        let start = Instant::now();

        let reader = TransReader::open(&self.files.trans, self.config.trans_chunk_size)?;
        let mut lumper = TransitionLumper::new(&lumped.index);
        for batch in reader {
            lumper.push_batch(&batch?);
        }
        let stats = lumper.stats().clone();
        let prelumps = lumper.finish();

        let combined = combine_prelumps(&prelumps, &lumped.index, &lumped.table)?;
        let retained = synthesize_lifetimes(
            &mut lumped.table,
            combined,
            self.lumping.top_channels,
            self.lumping.channel_ranking,
        )?;

        self.stats.transitions_received = stats.received;
        self.stats.transitions_kept = stats.kept;
        self.stats.prelumps = prelumps.len();
        self.stats.composite_transitions = retained.len();
        self.stats.transitions_duration = start.elapsed();

        Ok(self.transitions.insert(retained).as_slice())
    }

    fn write_states(&self, writer: &OutputWriter) -> LidaResult<()> {
        let lumped = self
            .lumped
            .as_ref()
            .ok_or(LidaError::StageOrder("states must be lumped before writing"))?;
        writer.write_states_quanta(&lumped.table)?;
        writer.write_composite_map(&lumped.index)?;
        if let Some(taus) = &lumped.original_taus {
            writer.write_original_taus(taus)?;
        }
        writer.write_states_data(&lumped.table)
    }

    fn run_stages(&mut self, writer: &OutputWriter) -> LidaResult<()> {
        self.lump_states()?;
        let transitions = self.lump_transitions()?.to_vec();

        writer.write_metadata(&self.input)?;
        self.write_states(writer)?;
        writer.write_transitions(&transitions)
    }

    /// Run both stages and write every output file
    ///
    /// The output directory is checked before any lumping starts. Outputs go
    /// to a staging directory that is moved into place once every file is
    /// written, and removed if any stage fails.
    pub fn process(&mut self) -> LidaResult<ProcessingStats> {
        let writer = OutputWriter::create(&self.config.output_dir, &self.formula)?;

        if let Err(err) = self.run_stages(&writer) {
            if let Err(cleanup) = writer.discard() {
                warn!(formula = %self.formula, "could not remove partial outputs: {}", cleanup);
            }
            return Err(err);
        }
        let dir = writer.commit()?;

        let elapsed = self.stats.states_duration + self.stats.transitions_duration;
        info!(
            formula = %self.formula,
            states = self.stats.composite_states,
            transitions = self.stats.composite_transitions,
            elapsed_ms = elapsed.as_millis() as u64,
            output = %dir.display(),
            "dataset processed"
        );
        Ok(self.stats.clone())
    }
}

/// Molecules to run on: one formula, or `all`
pub fn select_formulas<'a>(
    available: impl Iterator<Item = &'a str>,
    selection: &str,
) -> Vec<String> {
    if selection.eq_ignore_ascii_case("all") {
        available.map(str::to_string).collect()
    } else {
        vec![selection.to_string()]
    }
}

/// Process one molecule, optionally post-processing its electronic labels
pub fn process_molecule(
    formula: &str,
    inputs: &MoleculeInputs,
    config: &ProcessorConfig,
    postprocess: Option<&ElectronicMapping>,
) -> LidaResult<ProcessingStats> {
    let _span = info_span!("molecule", formula).entered();
    let input = inputs.get(formula)?;
    let mut processor = DatasetProcessor::new(formula, input, config)?;
    let stats = processor.process()?;
    if let Some(mapping) = postprocess {
        postprocess_molecule(formula, config, mapping)?;
    }
    Ok(stats)
}

pub fn postprocess_molecule(
    formula: &str,
    config: &ProcessorConfig,
    mapping: &ElectronicMapping,
) -> LidaResult<PostProcessOutcome> {
    ElectronicPostProcessor::new(&config.output_dir, formula, mapping)?.run()
}

/// Run `task` for every formula; failures are logged and counted, never fatal
pub fn run_each<T, F>(formulas: &[String], mut task: F) -> usize
where
    F: FnMut(&str) -> LidaResult<T>,
{
    let mut failed = 0;
    for formula in formulas {
        if let Err(err) = task(formula) {
            failed += 1;
            match err {
                LidaError::OutputExists(_) => warn!(formula = %formula, "{}, skipping", err),
                _ if err.is_internal() => error!(formula = %formula, "internal error: {}", err),
                _ => error!(formula = %formula, "aborted: {}", err),
            }
        }
    }
    failed
}
