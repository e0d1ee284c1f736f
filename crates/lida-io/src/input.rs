//! Molecule inputs
//!
//! The molecule inputs file is a JSON object keyed by molecule formula (the
//! LIDA identifier, which need not match the ExoMol slugs):
//!
//! ```json
//! {
//!   "CO": {
//!     "mol_slug": "CO",
//!     "iso_slug": "12C-16O",
//!     "dataset_name": "Li2015",
//!     "states_header": ["i", "E", "g_tot", "J", "tau", "v"],
//!     "resolve_vib": ["v"],
//!     "energy_max": 5.0
//!   }
//! }
//! ```
//!
//! `energy_max` is given in eV, as a number or a numeric string.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lida_core::{ev_to_cm, LidaError, LidaResult};
use lida_lump::{LumpingConfig, ResolvedConfig, StatesSchema};
use serde::{Deserialize, Serialize};

/// Energy ceiling as written in the inputs file [eV]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnergyLimit {
    Number(f64),
    Text(String),
}

impl EnergyLimit {
    /// Value in eV
    pub fn ev(&self) -> LidaResult<f64> {
        match self {
            EnergyLimit::Number(value) => Ok(*value),
            EnergyLimit::Text(text) => text.trim().parse().map_err(|_| {
                LidaError::InvalidConfig(format!("energy_max {:?} is not a number", text))
            }),
        }
    }
}

/// Input attributes of a single molecule
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoleculeInput {
    pub mol_slug: Option<String>,
    pub iso_slug: Option<String>,
    pub dataset_name: Option<String>,
    /// Full `.states` column list
    pub states_header: Option<Vec<String>>,
    #[serde(default)]
    pub resolve_el: Vec<String>,
    #[serde(default)]
    pub resolve_vib: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_max: Option<EnergyLimit>,
    #[serde(default)]
    pub only_with: BTreeMap<String, String>,
    #[serde(default)]
    pub only_without: BTreeMap<String, String>,
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> LidaResult<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(LidaError::MissingAttribute(name)),
    }
}

impl MoleculeInput {
    pub fn mol_slug(&self) -> LidaResult<&str> {
        required(&self.mol_slug, "mol_slug")
    }

    pub fn iso_slug(&self) -> LidaResult<&str> {
        required(&self.iso_slug, "iso_slug")
    }

    pub fn dataset_name(&self) -> LidaResult<&str> {
        required(&self.dataset_name, "dataset_name")
    }

    /// Common stem of the dataset file names: `<iso_slug>__<dataset_name>`
    pub fn file_stem(&self) -> LidaResult<String> {
        Ok(format!("{}__{}", self.iso_slug()?, self.dataset_name()?))
    }

    /// Energy ceiling converted to cm-1
    pub fn energy_max_cm(&self) -> LidaResult<Option<f64>> {
        self.energy_max
            .as_ref()
            .map(|limit| limit.ev().map(ev_to_cm))
            .transpose()
    }

    /// States schema from the declared header
    pub fn schema(&self) -> LidaResult<StatesSchema> {
        let header = self
            .states_header
            .as_ref()
            .ok_or(LidaError::MissingAttribute("states_header"))?;
        StatesSchema::from_header(header.iter().cloned())
    }

    /// Lumping configuration named by this input (not yet validated)
    pub fn lumping_config(&self) -> LidaResult<LumpingConfig> {
        let mut config = LumpingConfig::new(self.resolve_el.clone(), self.resolve_vib.clone());
        if let Some(energy_max) = self.energy_max_cm()? {
            config = config.with_energy_max(energy_max);
        }
        config.only_with = self.only_with.clone();
        config.only_without = self.only_without.clone();
        Ok(config)
    }

    /// Run every input check and return the schema with the engine config
    ///
    /// Nothing touches the filesystem here.
    pub fn validate(&self, config: LumpingConfig) -> LidaResult<(StatesSchema, ResolvedConfig)> {
        self.mol_slug()?;
        self.iso_slug()?;
        self.dataset_name()?;
        if self.resolve_el.is_empty() && self.resolve_vib.is_empty() {
            return Err(LidaError::MissingResolvedQuanta);
        }
        let schema = self.schema()?;
        let resolved = config.validate(&schema)?;
        Ok((schema, resolved))
    }
}

/// All molecule inputs of an inputs file, keyed by formula
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoleculeInputs(BTreeMap<String, MoleculeInput>);

impl MoleculeInputs {
    pub fn load(path: impl AsRef<Path>) -> LidaResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LidaError::MissingInput(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json(json: &str) -> LidaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, formula: &str) -> LidaResult<&MoleculeInput> {
        self.0
            .get(formula)
            .ok_or_else(|| LidaError::InvalidConfig(format!("no input for molecule {:?}", formula)))
    }

    /// Formulas, sorted
    pub fn formulas(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MoleculeInput)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUTS: &str = r#"{
        "CO": {
            "mol_slug": "CO",
            "iso_slug": "12C-16O",
            "dataset_name": "Li2015",
            "states_header": ["i", "E", "g_tot", "J", "tau", "v"],
            "resolve_vib": ["v"],
            "energy_max": "2.5"
        },
        "HCN": {
            "mol_slug": "HCN",
            "iso_slug": "1H-12C-14N",
            "dataset_name": "Harris",
            "states_header": ["i", "E", "g_tot", "J", "iso", "v1", "v2"],
            "resolve_vib": ["v1", "v2"],
            "only_with": {"iso": "0"}
        }
    }"#;

    fn input(formula: &str) -> MoleculeInput {
        MoleculeInputs::from_json(INPUTS).unwrap().get(formula).unwrap().clone()
    }

    #[test]
    fn test_load_inputs() {
        let inputs = MoleculeInputs::from_json(INPUTS).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs.formulas().collect::<Vec<_>>(), vec!["CO", "HCN"]);

        let co = inputs.get("CO").unwrap();
        assert_eq!(co.file_stem().unwrap(), "12C-16O__Li2015");
        let e = co.energy_max_cm().unwrap().unwrap();
        assert!((e - 2.5 * lida_core::EV_IN_CM).abs() < 1e-9);
        assert!(inputs.get("NO").is_err());
    }

    #[test]
    fn test_validate_ok() {
        let hcn = input("HCN");
        let (schema, config) = hcn.validate(hcn.lumping_config().unwrap()).unwrap();
        assert_eq!(schema.labels(), &["iso", "v1", "v2"]);
        assert_eq!(config.vibrational_names(), &["v1", "v2"]);
    }

    #[test]
    fn test_missing_attributes() {
        let mut co = input("CO");
        co.dataset_name = None;
        let err = co.validate(co.lumping_config().unwrap()).unwrap_err();
        assert!(matches!(err, LidaError::MissingAttribute("dataset_name")));

        let mut co = input("CO");
        co.states_header = None;
        let err = co.validate(co.lumping_config().unwrap()).unwrap_err();
        assert!(matches!(err, LidaError::MissingAttribute("states_header")));

        let mut co = input("CO");
        co.resolve_vib.clear();
        let err = co.validate(co.lumping_config().unwrap()).unwrap_err();
        assert!(matches!(err, LidaError::MissingResolvedQuanta));
    }

    #[test]
    fn test_isomers_must_be_fixed() {
        let mut hcn = input("HCN");
        hcn.only_with.clear();
        let err = hcn.validate(hcn.lumping_config().unwrap()).unwrap_err();
        assert!(matches!(err, LidaError::UnresolvedIsomers(_)));
        assert!(err.is_config());
    }

    #[test]
    fn test_bad_energy_and_unknown_keys() {
        let mut co = input("CO");
        co.energy_max = Some(EnergyLimit::Text("lots".into()));
        assert!(matches!(co.lumping_config(), Err(LidaError::InvalidConfig(_))));

        let err = MoleculeInputs::from_json(r#"{"CO": {"mol_slug": "CO", "resolve": []}}"#)
            .unwrap_err();
        assert!(matches!(err, LidaError::Json(_)));
    }
}
