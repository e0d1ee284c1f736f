//! Lumping configuration and states schema
//!
//! A [`LumpingConfig`] names fields; a [`StatesSchema`] says where those
//! fields live in a state record. [`LumpingConfig::validate`] checks one
//! against the other and produces the [`ResolvedConfig`] the engine runs on.
//! All checks happen here, before any record is streamed.

use std::collections::{BTreeMap, BTreeSet};

use lida_core::{LidaError, LidaResult, DEFAULT_TEMPERATURE};

/// Leading columns every states header must start with
pub const CORE_COLUMNS: [&str; 4] = ["i", "E", "g_tot", "J"];

/// Columns that can never be resolved quanta
pub const RESERVED_COLUMNS: [&str; 6] = ["i", "E", "g_tot", "J", "tau", "g_J"];

/// Label column holding the isomer tag, where a dataset has one
pub const ISOMER_COLUMN: &str = "iso";

/// Column layout of a `.states` table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatesSchema {
    header: Vec<String>,
    /// Names of the label columns, in record label order
    labels: Vec<String>,
    has_tau: bool,
}

impl StatesSchema {
    /// Build a schema from the full `.states` header
    ///
    /// Columns other than `i`, `E`, `g_tot`, `J` and `tau` become labels.
    pub fn from_header<I, S>(header: I) -> LidaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header: Vec<String> = header.into_iter().map(Into::into).collect();
        if header.len() < CORE_COLUMNS.len()
            || header.iter().zip(CORE_COLUMNS).any(|(h, c)| h != c)
        {
            return Err(LidaError::UnexpectedStatesHeader(format!(
                "expected {:?} as leading columns, got {:?}",
                CORE_COLUMNS, header
            )));
        }

        let mut seen = BTreeSet::new();
        for column in &header {
            if !seen.insert(column.as_str()) {
                return Err(LidaError::UnexpectedStatesHeader(format!(
                    "duplicate column {:?}",
                    column
                )));
            }
        }

        let has_tau = header.iter().any(|c| c == "tau");
        let labels = header[CORE_COLUMNS.len()..]
            .iter()
            .filter(|c| c.as_str() != "tau")
            .cloned()
            .collect();

        Ok(StatesSchema {
            header,
            labels,
            has_tau,
        })
    }

    /// Full header, core columns included
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Names of the label columns
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Whether the states carry an original lifetime column
    pub fn has_tau(&self) -> bool {
        self.has_tau
    }

    /// Position of a label column within a record's labels
    pub fn label_position(&self, name: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == name)
    }

    /// Label columns that may be resolved (excludes reserved names)
    pub fn quanta(&self) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .map(String::as_str)
            .filter(|l| !RESERVED_COLUMNS.contains(l))
    }
}

/// Which outgoing channels of a composite state are retained in the output
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChannelRanking {
    /// Channels with the largest partial lifetimes
    #[default]
    LongestLived,
    /// Channels with the smallest partial lifetimes (largest decay rates)
    Dominant,
}

/// Lumping configuration, by field name
#[derive(Clone, Debug)]
pub struct LumpingConfig {
    /// Resolved electronic quanta
    pub resolve_el: Vec<String>,
    /// Resolved vibrational quanta (must be non-negative integers)
    pub resolve_vib: Vec<String>,
    /// Energy ceiling [cm-1]
    pub energy_max: Option<f64>,
    /// Only keep states with these field values
    pub only_with: BTreeMap<String, String>,
    /// Drop states with these field values
    pub only_without: BTreeMap<String, String>,
    /// Placeholder values a resolved quantum must not take
    pub discard_values: BTreeSet<String>,
    /// Temperature of the Boltzmann weights [K]
    pub temperature: f64,
    /// Outgoing channels kept per composite state
    pub top_channels: usize,
    pub channel_ranking: ChannelRanking,
    /// Collect original lifetimes per composite state, where available
    pub record_original_lifetimes: bool,
}

impl Default for LumpingConfig {
    fn default() -> Self {
        LumpingConfig {
            resolve_el: Vec::new(),
            resolve_vib: Vec::new(),
            energy_max: None,
            only_with: BTreeMap::new(),
            only_without: BTreeMap::new(),
            discard_values: ["*".to_string()].into_iter().collect(),
            temperature: DEFAULT_TEMPERATURE,
            top_channels: 5,
            channel_ranking: ChannelRanking::default(),
            record_original_lifetimes: false,
        }
    }
}

impl LumpingConfig {
    pub fn new<E, V, S>(resolve_el: E, resolve_vib: V) -> Self
    where
        E: IntoIterator<Item = S>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LumpingConfig {
            resolve_el: resolve_el.into_iter().map(Into::into).collect(),
            resolve_vib: resolve_vib.into_iter().map(Into::into).collect(),
            ..LumpingConfig::default()
        }
    }

    pub fn with_energy_max(mut self, energy_max_cm: f64) -> Self {
        self.energy_max = Some(energy_max_cm);
        self
    }

    pub fn with_only_with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.only_with.insert(field.into(), value.into());
        self
    }

    pub fn with_only_without(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.only_without.insert(field.into(), value.into());
        self
    }

    pub fn with_top_channels(mut self, top_channels: usize) -> Self {
        self.top_channels = top_channels;
        self
    }

    pub fn with_channel_ranking(mut self, ranking: ChannelRanking) -> Self {
        self.channel_ranking = ranking;
        self
    }

    pub fn with_original_lifetimes(mut self, record: bool) -> Self {
        self.record_original_lifetimes = record;
        self
    }

    /// All resolved quanta: electronic first, then vibrational
    pub fn resolved_quanta(&self) -> impl Iterator<Item = &String> {
        self.resolve_el.iter().chain(self.resolve_vib.iter())
    }

    /// Validate against a states schema
    pub fn validate(&self, schema: &StatesSchema) -> LidaResult<ResolvedConfig> {
        if self.resolve_el.is_empty() && self.resolve_vib.is_empty() {
            return Err(LidaError::MissingResolvedQuanta);
        }
        if let Some(common) = self.resolve_el.iter().find(|f| self.resolve_vib.contains(f)) {
            return Err(LidaError::OverlappingResolvedQuanta(common.clone()));
        }

        let quanta: BTreeSet<&str> = schema.quanta().collect();
        let mut resolved_positions = Vec::new();
        let mut seen = BTreeSet::new();
        for field in self.resolved_quanta() {
            if RESERVED_COLUMNS.contains(&field.as_str()) {
                return Err(LidaError::ReservedField(field.clone()));
            }
            if !seen.insert(field.as_str()) {
                return Err(LidaError::InvalidConfig(format!(
                    "resolved quantum {:?} listed twice",
                    field
                )));
            }
            match schema.label_position(field) {
                Some(position) if quanta.contains(field.as_str()) => {
                    resolved_positions.push(position)
                }
                _ => return Err(LidaError::UnknownField(field.clone())),
            }
        }
        let vib_positions = resolved_positions[self.resolve_el.len()..].to_vec();

        let required = self
            .only_with
            .iter()
            .map(|(field, value)| Ok((Self::field_ref(schema, &quanta, field)?, value.clone())))
            .collect::<LidaResult<Vec<_>>>()?;
        let forbidden = self
            .only_without
            .iter()
            .map(|(field, value)| Ok((Self::field_ref(schema, &quanta, field)?, value.clone())))
            .collect::<LidaResult<Vec<_>>>()?;

        if quanta.contains(ISOMER_COLUMN)
            && !self.only_with.contains_key(ISOMER_COLUMN)
            && !seen.contains(ISOMER_COLUMN)
        {
            return Err(LidaError::UnresolvedIsomers(ISOMER_COLUMN.to_string()));
        }

        if let Some(energy_max) = self.energy_max {
            if energy_max.is_nan() {
                return Err(LidaError::InvalidConfig("energy_max is NaN".into()));
            }
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(LidaError::InvalidConfig(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        if self.top_channels == 0 {
            return Err(LidaError::InvalidConfig(
                "at least one channel per state must be retained".into(),
            ));
        }

        Ok(ResolvedConfig {
            resolved_names: self.resolved_quanta().cloned().collect(),
            el_count: self.resolve_el.len(),
            resolved_positions,
            vib_positions,
            required,
            forbidden,
            discard_values: self.discard_values.clone(),
            energy_max: self.energy_max,
            temperature: self.temperature,
            top_channels: self.top_channels,
            channel_ranking: self.channel_ranking,
            record_original_lifetimes: self.record_original_lifetimes && schema.has_tau(),
        })
    }

    fn field_ref(schema: &StatesSchema, quanta: &BTreeSet<&str>, field: &str) -> LidaResult<FieldRef> {
        if field == "J" {
            return Ok(FieldRef::J);
        }
        match schema.label_position(field) {
            Some(position) if quanta.contains(field) => Ok(FieldRef::Label(position)),
            _ => Err(LidaError::UnknownField(field.to_string())),
        }
    }
}

/// A field a filter constraint applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRef {
    /// Rotational quantum number, compared numerically
    J,
    /// Label column at a record position
    Label(usize),
}

/// Lumping configuration resolved against a schema
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    resolved_names: Vec<String>,
    el_count: usize,
    pub(crate) resolved_positions: Vec<usize>,
    pub(crate) vib_positions: Vec<usize>,
    pub(crate) required: Vec<(FieldRef, String)>,
    pub(crate) forbidden: Vec<(FieldRef, String)>,
    pub(crate) discard_values: BTreeSet<String>,
    pub(crate) energy_max: Option<f64>,
    pub temperature: f64,
    pub top_channels: usize,
    pub channel_ranking: ChannelRanking,
    pub record_original_lifetimes: bool,
}

impl ResolvedConfig {
    /// Names of the resolved quanta, in key order
    pub fn resolved_names(&self) -> &[String] {
        &self.resolved_names
    }

    /// Names of the resolved electronic quanta
    pub fn electronic_names(&self) -> &[String] {
        &self.resolved_names[..self.el_count]
    }

    /// Names of the resolved vibrational quanta
    pub fn vibrational_names(&self) -> &[String] {
        &self.resolved_names[self.el_count..]
    }

    /// Record label positions forming the lump key
    pub fn resolved_positions(&self) -> &[usize] {
        &self.resolved_positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> StatesSchema {
        StatesSchema::from_header([
            "i", "E", "g_tot", "J", "tau", "+/-", "e/f", "State", "v", "Lambda",
        ])
        .unwrap()
    }

    #[test]
    fn test_schema_labels() {
        let schema = schema();
        assert!(schema.has_tau());
        assert_eq!(schema.labels(), &["+/-", "e/f", "State", "v", "Lambda"]);
        assert_eq!(schema.label_position("State"), Some(2));
        assert_eq!(schema.label_position("tau"), None);
    }

    #[test]
    fn test_schema_rejects_bad_header() {
        let err = StatesSchema::from_header(["i", "g_tot", "E", "J"]).unwrap_err();
        assert!(matches!(err, LidaError::UnexpectedStatesHeader(_)));
        let err = StatesSchema::from_header(["i", "E"]).unwrap_err();
        assert!(matches!(err, LidaError::UnexpectedStatesHeader(_)));
        let err = StatesSchema::from_header(["i", "E", "g_tot", "J", "v", "v"]).unwrap_err();
        assert!(matches!(err, LidaError::UnexpectedStatesHeader(_)));
    }

    #[test]
    fn test_validate_positions() {
        let config = LumpingConfig::new(["State"], ["v"]).with_only_without("State", "0");
        let resolved = config.validate(&schema()).unwrap();
        assert_eq!(resolved.resolved_positions(), &[2, 3]);
        assert_eq!(resolved.vib_positions, vec![3]);
        assert_eq!(resolved.electronic_names(), &["State"]);
        assert_eq!(resolved.vibrational_names(), &["v"]);
        assert_eq!(resolved.forbidden, vec![(FieldRef::Label(2), "0".to_string())]);
    }

    #[test]
    fn test_validate_requires_resolved_quanta() {
        let config = LumpingConfig::new(Vec::<String>::new(), Vec::new());
        assert!(matches!(
            config.validate(&schema()),
            Err(LidaError::MissingResolvedQuanta)
        ));
    }

    #[test]
    fn test_validate_overlap() {
        let config = LumpingConfig::new(["v"], ["v"]);
        assert!(matches!(
            config.validate(&schema()),
            Err(LidaError::OverlappingResolvedQuanta(f)) if f == "v"
        ));
    }

    #[test]
    fn test_validate_reserved_and_unknown() {
        let config = LumpingConfig::new(["J"], Vec::<&str>::new());
        assert!(matches!(config.validate(&schema()), Err(LidaError::ReservedField(_))));

        let config = LumpingConfig::new(["Omega"], Vec::<&str>::new());
        assert!(matches!(config.validate(&schema()), Err(LidaError::UnknownField(_))));

        let config = LumpingConfig::new(["State"], Vec::<&str>::new()).with_only_with("iso", "1");
        assert!(matches!(config.validate(&schema()), Err(LidaError::UnknownField(_))));
    }

    #[test]
    fn test_validate_only_with_j() {
        let config = LumpingConfig::new(["State"], Vec::<&str>::new()).with_only_with("J", "0");
        let resolved = config.validate(&schema()).unwrap();
        assert_eq!(resolved.required, vec![(FieldRef::J, "0".to_string())]);
    }

    #[test]
    fn test_validate_isomers() {
        let schema = StatesSchema::from_header(["i", "E", "g_tot", "J", "iso", "v1"]).unwrap();
        let config = LumpingConfig::new(Vec::<&str>::new(), ["v1"]);
        assert!(matches!(
            config.validate(&schema),
            Err(LidaError::UnresolvedIsomers(_))
        ));
        assert!(config.clone().with_only_with("iso", "1").validate(&schema).is_ok());
        assert!(LumpingConfig::new(["iso"], ["v1"]).validate(&schema).is_ok());
    }

    #[test]
    fn test_validate_numeric_settings() {
        let mut config = LumpingConfig::new(["State"], ["v"]);
        config.temperature = 0.0;
        assert!(matches!(config.validate(&schema()), Err(LidaError::InvalidConfig(_))));

        let config = LumpingConfig::new(["State"], ["v"]).with_top_channels(0);
        assert!(matches!(config.validate(&schema()), Err(LidaError::InvalidConfig(_))));
    }

    #[test]
    fn test_original_lifetimes_need_tau_column() {
        let no_tau = StatesSchema::from_header(["i", "E", "g_tot", "J", "v"]).unwrap();
        let config = LumpingConfig::new(Vec::<&str>::new(), ["v"]).with_original_lifetimes(true);
        assert!(!config.validate(&no_tau).unwrap().record_original_lifetimes);
        let config = LumpingConfig::new(["State"], ["v"]).with_original_lifetimes(true);
        assert!(config.validate(&schema()).unwrap().record_original_lifetimes);
    }
}
