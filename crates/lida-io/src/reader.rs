//! Record stream adapter
//!
//! Chunked readers over whitespace-separated `.states` and `.trans` tables.
//! Both are iterators of record batches; a batch never exceeds the chunk
//! size and only the last one may be shorter. Memory held by a reader is one
//! batch.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use lida_core::{LidaError, LidaResult, OriginalId, StateRecord, TransitionRecord};
use lida_lump::StatesSchema;

fn field<T: FromStr>(value: &str, name: &str, source: &str, line: u64) -> LidaResult<T> {
    value.parse().map_err(|_| LidaError::InvalidRecord {
        line,
        reason: format!("{source}: cannot parse {name} from {value:?}"),
    })
}

/// Column positions of a `.states` table
#[derive(Clone, Debug)]
struct StatesLayout {
    width: usize,
    tau: Option<usize>,
    labels: Vec<usize>,
}

impl StatesLayout {
    fn new(schema: &StatesSchema) -> Self {
        let header = schema.header();
        let tau = header.iter().position(|c| c == "tau");
        let labels = (4..header.len()).filter(|&p| Some(p) != tau).collect();
        StatesLayout {
            width: header.len(),
            tau,
            labels,
        }
    }

    fn parse(&self, text: &str, source: &str, line: u64) -> LidaResult<StateRecord> {
        let columns: Vec<&str> = text.split_whitespace().collect();
        if columns.len() != self.width {
            return Err(LidaError::InvalidRecord {
                line,
                reason: format!(
                    "{source}: {} columns, expected {}",
                    columns.len(),
                    self.width
                ),
            });
        }

        let id = OriginalId::new(field(columns[0], "i", source, line)?);
        let energy = field(columns[1], "E", source, line)?;
        let g_tot = field(columns[2], "g_tot", source, line)?;
        let j = field(columns[3], "J", source, line)?;

        let mut record = StateRecord::new(id, energy, g_tot, j)
            .with_labels(self.labels.iter().map(|&p| columns[p]));
        // unparseable lifetimes are treated as unknown
        record.tau = self.tau.and_then(|p| columns[p].parse().ok());
        Ok(record)
    }
}

/// Chunked reader of a `.states` table
pub struct StatesReader<R> {
    lines: Lines<R>,
    source: String,
    line: u64,
    chunk_size: usize,
    layout: StatesLayout,
    done: bool,
}

impl StatesReader<BufReader<File>> {
    pub fn open(path: &Path, schema: &StatesSchema, chunk_size: usize) -> LidaResult<Self> {
        if !path.is_file() {
            return Err(LidaError::MissingInput(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(Self::new(reader, schema, chunk_size).with_source(path.display().to_string()))
    }
}

impl<R: BufRead> StatesReader<R> {
    pub fn new(reader: R, schema: &StatesSchema, chunk_size: usize) -> Self {
        StatesReader {
            lines: reader.lines(),
            source: "states".into(),
            line: 0,
            chunk_size: chunk_size.max(1),
            layout: StatesLayout::new(schema),
            done: false,
        }
    }

    /// Name used in error messages
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

impl<R: BufRead> Iterator for StatesReader<R> {
    type Item = LidaResult<Vec<StateRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.chunk_size.min(1 << 16));
        while batch.len() < self.chunk_size {
            let Some(text) = self.lines.next() else {
                self.done = true;
                break;
            };
            self.line += 1;
            let parsed = text.map_err(LidaError::from).and_then(|text| {
                if text.trim().is_empty() {
                    Ok(None)
                } else {
                    self.layout.parse(&text, &self.source, self.line).map(Some)
                }
            });
            match parsed {
                Ok(Some(record)) => batch.push(record),
                Ok(None) => {}
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}

fn parse_transition(text: &str, source: &str, line: u64) -> LidaResult<TransitionRecord> {
    let columns: Vec<&str> = text.split_whitespace().collect();
    if !(3..=4).contains(&columns.len()) {
        return Err(LidaError::InvalidRecord {
            line,
            reason: format!("{source}: {} columns, expected 3 or 4", columns.len()),
        });
    }
    let i = OriginalId::new(field(columns[0], "i", source, line)?);
    let f = OriginalId::new(field(columns[1], "f", source, line)?);
    let mut record = TransitionRecord::new(i, f, field(columns[2], "A_if", source, line)?);
    if let Some(v) = columns.get(3) {
        record.v_if = Some(field(v, "v_if", source, line)?);
    }
    Ok(record)
}

/// Chunked reader over a sequence of `.trans` tables
///
/// Batches run across file boundaries.
pub struct TransReader<R> {
    sources: std::vec::IntoIter<(String, R)>,
    current: Option<(String, Lines<R>)>,
    line: u64,
    chunk_size: usize,
    done: bool,
}

impl TransReader<BufReader<File>> {
    pub fn open(paths: &[PathBuf], chunk_size: usize) -> LidaResult<Self> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.is_file() {
                return Err(LidaError::MissingInput(path.clone()));
            }
            sources.push((path.display().to_string(), BufReader::new(File::open(path)?)));
        }
        Ok(Self::new(sources, chunk_size))
    }
}

impl<R: BufRead> TransReader<R> {
    /// Build from named readers, read in order
    pub fn new(sources: Vec<(String, R)>, chunk_size: usize) -> Self {
        TransReader {
            sources: sources.into_iter(),
            current: None,
            line: 0,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<LidaResult<(String, u64, String)>> {
        loop {
            if self.current.is_none() {
                let (name, reader) = self.sources.next()?;
                self.current = Some((name, reader.lines()));
                self.line = 0;
            }
            let (name, lines) = self.current.as_mut()?;
            match lines.next() {
                Some(Ok(text)) => {
                    self.line += 1;
                    return Some(Ok((name.clone(), self.line, text)));
                }
                Some(Err(err)) => return Some(Err(err.into())),
                None => self.current = None,
            }
        }
    }
}

impl<R: BufRead> Iterator for TransReader<R> {
    type Item = LidaResult<Vec<TransitionRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.chunk_size.min(1 << 16));
        while batch.len() < self.chunk_size {
            let (source, line, text) = match self.next_line() {
                Some(Ok(next)) => next,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    break;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            match parse_transition(&text, &source, line) {
                Ok(record) => batch.push(record),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}
