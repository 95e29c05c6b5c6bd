//! Chip identity: emulated hardware revision and register topology
//!
//! Both enumerations are closed. Their declaration order is part of the public
//! contract: it drives [`version_names`] and [`ChipTopology::value_of`].

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Emulated chip revision
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChipVersion {
    /// Yamaha YM3526 (OPL): sine waveform only
    Ym3526 = 0,
    /// Yamaha YM3812 (OPL2): four selectable waveforms
    Ym3812 = 1,
    /// Yamaha YMF262 (OPL3): 18 channels, stereo, 4-op voices
    #[default]
    Ymf262 = 2,
}

impl ChipVersion {
    /// All versions in declaration order
    pub const ALL: [ChipVersion; 3] = [
        ChipVersion::Ym3526,
        ChipVersion::Ym3812,
        ChipVersion::Ymf262,
    ];

    /// Human-readable label used for selection lists
    pub fn label(&self) -> &'static str {
        match self {
            ChipVersion::Ym3526 => "YM3526 (OPL)",
            ChipVersion::Ym3812 => "YM3812 (OPL2)",
            ChipVersion::Ymf262 => "YMF262 (OPL3)",
        }
    }

    /// Short chip name, e.g. `"ym3812"`
    pub fn as_str(&self) -> &'static str {
        match self {
            ChipVersion::Ym3526 => "ym3526",
            ChipVersion::Ym3812 => "ym3812",
            ChipVersion::Ymf262 => "ymf262",
        }
    }

    /// Parse a chip name (`ym3526`/`opl`, `ym3812`/`opl2`, `ymf262`/`opl3`)
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "ym3526" | "opl" => Some(ChipVersion::Ym3526),
            "ym3812" | "opl2" => Some(ChipVersion::Ym3812),
            "ymf262" | "opl3" => Some(ChipVersion::Ymf262),
            _ => None,
        }
    }

    /// Look up a version by declaration index
    pub fn value_of(index: i32) -> Option<Self> {
        Self::from_i32(index)
    }
}

impl fmt::Display for ChipVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Labels of every chip version, in declaration order
pub fn version_names() -> Vec<&'static str> {
    ChipVersion::ALL.iter().map(ChipVersion::label).collect()
}

/// Physical arrangement of the emulated chips
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    FromPrimitive,
    ToPrimitive,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChipTopology {
    /// One chip, one 256-register bank
    #[default]
    Opl2 = 0,
    /// Two independent chips, one per stereo side
    DualOpl2 = 1,
    /// One chip with the extended 512-register set
    Opl3 = 2,
}

impl ChipTopology {
    /// All topologies in declaration order
    pub const ALL: [ChipTopology; 3] = [
        ChipTopology::Opl2,
        ChipTopology::DualOpl2,
        ChipTopology::Opl3,
    ];

    /// Look up a topology by declaration index.
    ///
    /// Returns `None` for indices outside `[0, 3)`.
    pub fn value_of(index: i32) -> Option<Self> {
        Self::from_i32(index)
    }

    /// Number of physical chip instances the topology implies for OPL2-class chips
    pub fn chip_count(&self) -> usize {
        match self {
            ChipTopology::Opl2 => 1,
            ChipTopology::DualOpl2 | ChipTopology::Opl3 => 2,
        }
    }

    /// Short name, e.g. `"dual_opl2"`
    pub fn as_str(&self) -> &'static str {
        match self {
            ChipTopology::Opl2 => "opl2",
            ChipTopology::DualOpl2 => "dual_opl2",
            ChipTopology::Opl3 => "opl3",
        }
    }

    /// Parse a topology name
    pub fn from_name(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "opl2" | "single" => Some(ChipTopology::Opl2),
            "dual_opl2" | "dual" => Some(ChipTopology::DualOpl2),
            "opl3" => Some(ChipTopology::Opl3),
            _ => None,
        }
    }
}

impl fmt::Display for ChipTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
