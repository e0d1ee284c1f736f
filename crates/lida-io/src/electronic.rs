//! Electronic state post-processing
//!
//! Turns the raw electronic labels of `states_electronic_raw.csv` into
//! molecular term symbols and writes them to `states_electronic.csv`
//! (`i,State`). Labels of the common ExoMol shape (`X1Sigma+`, `a3Pi`,
//! `Ap1Pi`) are converted directly; anything else needs an entry in the
//! per-molecule override map.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lida_core::{LidaError, LidaResult};
use tracing::{info, warn};

use crate::writer::{
    csv_error, META_DATA_FILE, STATES_ELECTRONIC_FILE, STATES_ELECTRONIC_RAW_FILE,
};

const LAMBDAS: [&str; 4] = ["SIGMA", "PI", "DELTA", "PHI"];

/// Separator joining multi-column raw labels into an override key
pub const KEY_SEPARATOR: &str = ",";

/// Overrides per molecule formula: raw label -> term symbol
pub type ElectronicMapping = BTreeMap<String, BTreeMap<String, String>>;

pub fn load_mapping(path: &Path) -> LidaResult<ElectronicMapping> {
    if !path.is_file() {
        return Err(LidaError::MissingInput(path.to_path_buf()));
    }
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

fn strip_lambda(rest: &str) -> Option<(&'static str, &str)> {
    LAMBDAS.iter().find_map(|lambda| {
        let title = format!("{}{}", &lambda[..1], lambda[1..].to_lowercase());
        rest.strip_prefix(*lambda)
            .or_else(|| rest.strip_prefix(title.as_str()))
            .map(|tail| (*lambda, tail))
    })
}

/// Convert a raw ExoMol label such as `X4Sigma+` or `Ap1Pi`
///
/// ```
/// use lida_io::parse_term_symbol;
/// assert_eq!(parse_term_symbol("X4Sigma+").as_deref(), Some("X(4SIGMA+)"));
/// assert_eq!(parse_term_symbol("Ap1Pi").as_deref(), Some("A'(1PI)"));
/// assert_eq!(parse_term_symbol("foo"), None);
/// ```
pub fn parse_term_symbol(raw: &str) -> Option<String> {
    let mut chars = raw.chars();
    let label = chars.next().filter(char::is_ascii_alphabetic)?;
    let mut rest = chars.as_str();

    let mut prime = false;
    if let Some(tail) = rest.strip_prefix('p') {
        if tail.starts_with(|c: char| c.is_ascii_digit()) {
            prime = true;
            rest = tail;
        }
    }

    let spin = rest.chars().next().filter(char::is_ascii_digit)?;
    let (lambda, reflection) = strip_lambda(&rest[1..])?;
    if !matches!(reflection, "" | "+" | "-") {
        return None;
    }

    let prime = if prime { "'" } else { "" };
    Some(format!("{label}{prime}({spin}{lambda}{reflection})"))
}

/// Shape check for term symbols such as `X(2SIGMA+)`, `A'(1PI)`, `B"(3DELTAg)`
pub fn is_term_symbol(symbol: &str) -> bool {
    let Some((label, term)) = symbol.split_once('(') else {
        return false;
    };
    let Some(term) = term.strip_suffix(')') else {
        return false;
    };
    let label = label.trim_end_matches(['\'', '"']);
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let digits = term.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }
    let Some(tail) = LAMBDAS.iter().find_map(|l| term[digits..].strip_prefix(*l)) else {
        return false;
    };
    let tail = tail.trim_end_matches(['g', 'u']);
    matches!(tail, "" | "+" | "-")
}

/// Outcome of post-processing one molecule
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostProcessOutcome {
    /// No electronic quanta were resolved
    Skipped,
    Written { states: usize, distinct: usize },
}

/// Electronic label post-processor for one processed molecule
#[derive(Debug)]
pub struct ElectronicPostProcessor {
    formula: String,
    dir: PathBuf,
    overrides: BTreeMap<String, String>,
}

impl ElectronicPostProcessor {
    pub fn new(
        output_root: &Path,
        formula: &str,
        mapping: &ElectronicMapping,
    ) -> LidaResult<Self> {
        let dir = output_root.join(formula);
        if !dir.join(META_DATA_FILE).is_file() {
            return Err(LidaError::PostProcess(format!(
                "{formula} has no processed output in {}",
                dir.display()
            )));
        }
        Ok(ElectronicPostProcessor {
            formula: formula.to_string(),
            dir,
            overrides: mapping.get(formula).cloned().unwrap_or_default(),
        })
    }

    fn convert(&self, raw: &[String]) -> Option<String> {
        let key = raw.join(KEY_SEPARATOR);
        match self.overrides.get(&key) {
            Some(symbol) => Some(symbol.clone()),
            None if raw.len() == 1 => parse_term_symbol(&raw[0]),
            None => None,
        }
        .filter(|symbol| is_term_symbol(symbol))
    }

    pub fn run(&self) -> LidaResult<PostProcessOutcome> {
        let raw_path = self.dir.join(STATES_ELECTRONIC_RAW_FILE);
        if !raw_path.is_file() {
            info!(formula = %self.formula, "no electronic states resolved, nothing to post-process");
            return Ok(PostProcessOutcome::Skipped);
        }
        let out_path = self.dir.join(STATES_ELECTRONIC_FILE);
        if out_path.exists() {
            return Err(LidaError::PostProcess(format!(
                "{} already post-processed, {} exists",
                self.formula,
                out_path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(&raw_path).map_err(csv_error)?;
        let mut rows: Vec<(String, Vec<String>)> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            let mut fields = record.iter().map(str::to_string);
            let id = fields.next().unwrap_or_default();
            rows.push((id, fields.collect()));
        }

        let distinct: BTreeSet<&Vec<String>> = rows.iter().map(|(_, raw)| raw).collect();
        let mut symbols: BTreeMap<&Vec<String>, String> = BTreeMap::new();
        let mut failed = Vec::new();
        for raw in &distinct {
            match self.convert(raw) {
                Some(symbol) => {
                    symbols.insert(*raw, symbol);
                }
                None => failed.push(raw.join(KEY_SEPARATOR)),
            }
        }
        if !failed.is_empty() {
            warn!(
                formula = %self.formula,
                failed = failed.len(),
                "unconvertible electronic states"
            );
            return Err(LidaError::PostProcess(format!(
                "add term symbols for {} under the following keys: {:?}",
                self.formula, failed
            )));
        }

        let mut writer = csv::Writer::from_path(&out_path).map_err(csv_error)?;
        writer.write_record(["i", "State"]).map_err(csv_error)?;
        for (id, raw) in &rows {
            let symbol = symbols.get(raw).map(String::as_str).unwrap_or_default();
            writer.write_record([id.as_str(), symbol]).map_err(csv_error)?;
        }
        writer.flush()?;

        info!(
            formula = %self.formula,
            states = rows.len(),
            distinct = distinct.len(),
            "electronic states post-processed"
        );
        Ok(PostProcessOutcome::Written {
            states: rows.len(),
            distinct: distinct.len(),
        })
    }
}
