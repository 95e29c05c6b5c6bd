//! Player configuration
//!
//! Settings a host passes to containers when building a mixer. Stored as JSON
//! and validated explicitly after loading.

use crate::version::{ChipTopology, ChipVersion};
use crate::{OplError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Highest accepted output sample rate in Hz
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Playback settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Chip to emulate
    pub version: ChipVersion,
    /// Force a topology instead of the one the song asks for
    pub topology: Option<ChipTopology>,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Restart from the beginning at the end of the song
    pub looping: bool,
    /// Frames rendered per audio block
    pub block_frames: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            version: ChipVersion::default(),
            topology: None,
            sample_rate: 44_100,
            looping: false,
            block_frames: 1024,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)
            .map_err(|e| OplError::ConfigError(format!("invalid player config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| OplError::ConfigError(format!("cannot serialize player config: {}", e)))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(OplError::ConfigError(format!(
                "sample rate {} outside 1..={}",
                self.sample_rate, MAX_SAMPLE_RATE
            )));
        }
        if self.block_frames == 0 {
            return Err(OplError::ConfigError(
                "block size must be at least one frame".to_string(),
            ));
        }
        Ok(())
    }

    /// Topology to use for a song that asks for `requested`
    pub fn topology_for(&self, requested: ChipTopology) -> ChipTopology {
        self.topology.unwrap_or(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.version, ChipVersion::Ymf262);
    }

    #[test]
    fn test_json_round_trip() {
        let config = PlayerConfig {
            version: ChipVersion::Ym3812,
            topology: Some(ChipTopology::DualOpl2),
            sample_rate: 48_000,
            looping: true,
            block_frames: 512,
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("\"ym3812\""));
        assert!(json.contains("\"dual_opl2\""));
        assert_eq!(PlayerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = PlayerConfig::from_json(r#"{ "sample_rate": 22050 }"#).unwrap();
        assert_eq!(config.sample_rate, 22_050);
        assert_eq!(config.block_frames, 1024);
        assert_eq!(config.topology, None);
    }

    #[test]
    fn test_invalid_sample_rates_rejected() {
        for rate in [0, 192_001] {
            let json = format!(r#"{{ "sample_rate": {} }}"#, rate);
            assert!(matches!(
                PlayerConfig::from_json(&json),
                Err(OplError::ConfigError(_))
            ));
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(PlayerConfig::from_json("{ not json").is_err());
        assert!(PlayerConfig::from_json(r#"{ "version": "sid" }"#).is_err());
    }

    #[test]
    fn test_topology_override() {
        let mut config = PlayerConfig::default();
        assert_eq!(config.topology_for(ChipTopology::Opl3), ChipTopology::Opl3);
        config.topology = Some(ChipTopology::Opl2);
        assert_eq!(config.topology_for(ChipTopology::Opl3), ChipTopology::Opl2);
    }
}
