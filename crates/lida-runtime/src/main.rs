//! exomol2lida CLI
//!
//! # Commands
//!
//! - `process <inputs.json> <formula|all>`: lump an ExoMol dataset into LIDA tables
//! - `postprocess <formula|all>`: convert raw electronic labels into term symbols

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use lida_core::LidaResult;
use lida_io::{load_mapping, ElectronicMapping, MoleculeInputs, META_DATA_FILE, STAGING_SUFFIX};
use lida_lump::ChannelRanking;
use lida_runtime::{
    init_tracing, postprocess_molecule, process_molecule, run_each, select_formulas,
    ProcessorConfig, STATES_CHUNK_SIZE, TRANS_CHUNK_SIZE,
};
use tracing::{error, info};

/// Lump ExoMol line lists into LIDA composite states and transitions
#[derive(Parser)]
#[command(name = "exomol2lida")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Ranking {
    /// Keep the longest partial lifetimes
    LongestLived,
    /// Keep the shortest partial lifetimes
    Dominant,
}

impl From<Ranking> for ChannelRanking {
    fn from(ranking: Ranking) -> Self {
        match ranking {
            Ranking::LongestLived => ChannelRanking::LongestLived,
            Ranking::Dominant => ChannelRanking::Dominant,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lump states and transitions of one molecule, or of all of them
    Process {
        /// Molecule inputs file (JSON)
        inputs: PathBuf,
        /// Molecule formula, or `all`
        formula: String,
        /// Also write the original lifetimes of each composite state
        #[arg(long)]
        include_tau: bool,
        /// Post-process the electronic labels after processing
        #[arg(long)]
        postprocess: bool,
        /// Electronic label overrides (JSON), used with --postprocess
        #[arg(long)]
        mapping: Option<PathBuf>,
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
        /// States per batch
        #[arg(long, default_value_t = STATES_CHUNK_SIZE)]
        states_chunk: usize,
        /// Transitions per batch
        #[arg(long, default_value_t = TRANS_CHUNK_SIZE)]
        trans_chunk: usize,
        /// Outgoing channels kept per composite state
        #[arg(long, default_value_t = 5)]
        top_channels: usize,
        #[arg(long, value_enum, default_value_t = Ranking::LongestLived)]
        ranking: Ranking,
    },
    /// Convert raw electronic labels of processed molecules into term symbols
    Postprocess {
        /// Molecule formula, or `all`
        formula: String,
        /// Electronic label overrides (JSON)
        #[arg(long)]
        mapping: Option<PathBuf>,
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
}

fn load_overrides(path: Option<&Path>) -> LidaResult<ElectronicMapping> {
    path.map(load_mapping).transpose().map(Option::unwrap_or_default)
}

/// Formulas with a processed output directory
fn processed_formulas(output_dir: &Path) -> LidaResult<Vec<String>> {
    let mut formulas = Vec::new();
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.join(META_DATA_FILE).is_file() {
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) if !name.ends_with(STAGING_SUFFIX) => formulas.push(name.to_string()),
                _ => {}
            }
        }
    }
    formulas.sort();
    Ok(formulas)
}

fn run(command: Commands) -> LidaResult<usize> {
    match command {
        Commands::Process {
            inputs,
            formula,
            include_tau,
            postprocess,
            mapping: mapping_path,
            data_dir,
            output_dir,
            states_chunk,
            trans_chunk,
            top_channels,
            ranking,
        } => {
            let inputs = MoleculeInputs::load(&inputs)?;
            let config = ProcessorConfig {
                top_channels,
                channel_ranking: ranking.into(),
                ..ProcessorConfig::new(data_dir, output_dir)
                    .with_chunk_sizes(states_chunk, trans_chunk)
                    .with_original_lifetimes(include_tau)
            };
            config.validate()?;
            let mapping = if postprocess {
                Some(load_overrides(mapping_path.as_deref())?)
            } else {
                None
            };

            let formulas = select_formulas(inputs.formulas(), &formula);
            info!(molecules = formulas.len(), "processing");
            Ok(run_each(&formulas, |formula| {
                process_molecule(formula, &inputs, &config, mapping.as_ref())
            }))
        }
        Commands::Postprocess {
            formula,
            mapping: mapping_path,
            output_dir,
        } => {
            let mapping = load_overrides(mapping_path.as_deref())?;
            let config = ProcessorConfig {
                output_dir,
                ..Default::default()
            };
            let formulas = if formula.eq_ignore_ascii_case("all") {
                processed_formulas(&config.output_dir)?
            } else {
                vec![formula]
            };
            Ok(run_each(&formulas, |formula| {
                postprocess_molecule(formula, &config, &mapping)
            }))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!(failed, "some molecules failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
