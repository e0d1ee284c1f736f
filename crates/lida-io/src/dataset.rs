//! Dataset file discovery
//!
//! ExoMol datasets live at `<data>/<mol_slug>/<iso_slug>/<dataset_name>/`,
//! with one `<iso_slug>__<dataset_name>.states` file and one or more
//! `<iso_slug>__<dataset_name>*.trans` files.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use lida_core::{LidaError, LidaResult};
use lida_lump::StatesSchema;
use tracing::debug;

use crate::MoleculeInput;

/// Files of one dataset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetFiles {
    pub root: PathBuf,
    pub states: PathBuf,
    /// Sorted by file name
    pub trans: Vec<PathBuf>,
}

fn existing_dir(path: PathBuf) -> LidaResult<PathBuf> {
    if path.is_dir() {
        Ok(path)
    } else {
        Err(LidaError::MissingInput(path))
    }
}

impl DatasetFiles {
    pub fn locate(data_dir: &Path, input: &MoleculeInput) -> LidaResult<Self> {
        let mol_root = existing_dir(data_dir.join(input.mol_slug()?))?;
        let iso_root = existing_dir(mol_root.join(input.iso_slug()?))?;
        let root = existing_dir(iso_root.join(input.dataset_name()?))?;
        let stem = input.file_stem()?;

        let states = root.join(format!("{stem}.states"));
        if !states.is_file() {
            let compressed = root.join(format!("{stem}.states.bz2"));
            if compressed.is_file() {
                return Err(LidaError::InvalidConfig(format!(
                    "{} is compressed, decompress the dataset first",
                    compressed.display()
                )));
            }
            return Err(LidaError::MissingInput(states));
        }

        let mut trans = Vec::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&stem) && n.ends_with(".trans"));
            if matches && path.is_file() {
                trans.push(path);
            }
        }
        if trans.is_empty() {
            return Err(LidaError::MissingInput(root.join(format!("{stem}*.trans"))));
        }
        trans.sort();

        debug!(root = %root.display(), trans_files = trans.len(), "dataset located");
        Ok(DatasetFiles {
            root,
            states,
            trans,
        })
    }

    /// Check the first lines of the files against the expected column counts
    pub fn check_columns(&self, schema: &StatesSchema) -> LidaResult<()> {
        let states_columns = count_columns(&self.states)?;
        if states_columns != schema.header().len() {
            return Err(LidaError::UnexpectedStatesHeader(format!(
                "{} has {} columns, the header names {}",
                self.states.display(),
                states_columns,
                schema.header().len()
            )));
        }

        if let Some(first) = self.trans.first() {
            let trans_columns = count_columns(first)?;
            if !(3..=4).contains(&trans_columns) {
                return Err(LidaError::InvalidConfig(format!(
                    "{} has {} columns, 3 or 4 expected",
                    first.display(),
                    trans_columns
                )));
            }
        }
        Ok(())
    }
}

/// Number of whitespace-separated columns on the first non-empty line
pub fn count_columns(path: &Path) -> LidaResult<usize> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let columns = line.split_whitespace().count();
        if columns > 0 {
            return Ok(columns);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn input() -> MoleculeInput {
        MoleculeInput {
            mol_slug: Some("CO".into()),
            iso_slug: Some("12C-16O".into()),
            dataset_name: Some("Li2015".into()),
            states_header: Some(vec!["i".into(), "E".into(), "g_tot".into(), "J".into(), "v".into()]),
            resolve_vib: vec!["v".into()],
            ..Default::default()
        }
    }

    fn dataset(data: &Path) -> PathBuf {
        let root = data.join("CO/12C-16O/Li2015");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("12C-16O__Li2015.states"), "1 0.0 1 0 0\n2 2143.2 1 0 1\n").unwrap();
        fs::write(root.join("12C-16O__Li2015__02000-04000.trans"), "2 1 3.3e+01\n").unwrap();
        fs::write(root.join("12C-16O__Li2015__00000-02000.trans"), "2 1 3.3e+01 2143.2\n").unwrap();
        fs::write(root.join("12C-16O__Li2015.def"), "").unwrap();
        root
    }

    #[test]
    fn test_locate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dataset(dir.path());

        let files = DatasetFiles::locate(dir.path(), &input()).unwrap();
        assert_eq!(files.root, root);
        assert_eq!(files.states, root.join("12C-16O__Li2015.states"));
        let names: Vec<_> = files
            .trans
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "12C-16O__Li2015__00000-02000.trans",
                "12C-16O__Li2015__02000-04000.trans"
            ]
        );

        let schema = input().schema().unwrap();
        files.check_columns(&schema).unwrap();
        assert_eq!(count_columns(&files.trans[0]).unwrap(), 4);
    }

    #[test]
    fn test_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetFiles::locate(dir.path(), &input()).unwrap_err();
        assert!(matches!(err, LidaError::MissingInput(p) if p == dir.path().join("CO")));
    }

    #[test]
    fn test_column_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        dataset(dir.path());
        let files = DatasetFiles::locate(dir.path(), &input()).unwrap();

        let schema = StatesSchema::from_header(["i", "E", "g_tot", "J", "v", "e/f"]).unwrap();
        let err = files.check_columns(&schema).unwrap_err();
        assert!(matches!(err, LidaError::UnexpectedStatesHeader(_)));
    }
}
