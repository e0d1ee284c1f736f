//! Processor configuration

use std::path::PathBuf;

use lida_core::{LidaError, LidaResult};
use lida_lump::{ChannelRanking, LumpingConfig};

/// Default `.states` batch size, roughly 1 GB of memory
pub const STATES_CHUNK_SIZE: usize = 1_000_000;

/// Default `.trans` batch size, roughly 1 GB of memory
pub const TRANS_CHUNK_SIZE: usize = 10_000_000;

/// Dataset processing configuration
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Root of the ExoMol data tree
    pub data_dir: PathBuf,
    /// Root of the per-molecule output directories
    pub output_dir: PathBuf,
    pub states_chunk_size: usize,
    pub trans_chunk_size: usize,
    /// Also write the original lifetimes per composite state
    pub include_original_lifetimes: bool,
    /// Outgoing channels kept per composite state
    pub top_channels: usize,
    pub channel_ranking: ChannelRanking,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            states_chunk_size: STATES_CHUNK_SIZE,
            trans_chunk_size: TRANS_CHUNK_SIZE,
            include_original_lifetimes: false,
            top_channels: 5,
            channel_ranking: ChannelRanking::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        ProcessorConfig {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_chunk_sizes(mut self, states: usize, trans: usize) -> Self {
        self.states_chunk_size = states;
        self.trans_chunk_size = trans;
        self
    }

    pub fn with_original_lifetimes(mut self, include: bool) -> Self {
        self.include_original_lifetimes = include;
        self
    }

    pub fn validate(&self) -> LidaResult<()> {
        if self.states_chunk_size == 0 || self.trans_chunk_size == 0 {
            return Err(LidaError::InvalidConfig("chunk sizes must be positive".into()));
        }
        if self.top_channels == 0 {
            return Err(LidaError::InvalidConfig("top_channels must be at least 1".into()));
        }
        Ok(())
    }

    /// Apply the processing options to a molecule's lumping config
    pub fn apply(&self, config: LumpingConfig) -> LumpingConfig {
        config
            .with_top_channels(self.top_channels)
            .with_channel_ranking(self.channel_ranking)
            .with_original_lifetimes(self.include_original_lifetimes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.states_chunk_size, 1_000_000);
        assert_eq!(config.trans_chunk_size, 10_000_000);
        assert!(!config.include_original_lifetimes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_chunks() {
        let config = ProcessorConfig::default().with_chunk_sizes(0, 10);
        assert!(matches!(config.validate(), Err(LidaError::InvalidConfig(_))));
    }

    #[test]
    fn test_apply() {
        let config = ProcessorConfig::default().with_original_lifetimes(true);
        let lumping = config.apply(LumpingConfig::new(["State"], ["v"]));
        assert!(lumping.record_original_lifetimes);
        assert_eq!(lumping.top_channels, 5);
    }
}
