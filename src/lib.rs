//! OPL FM synthesis chip emulation
//!
//! Emulation of the Yamaha OPL family of FM sound chips (YM3526 "OPL",
//! YM3812 "OPL2" and YMF262 "OPL3") behind a single device contract, plus the
//! container and mixer glue needed to play register captures and probe Ogg
//! streams inside a modular player.
//!
//! # Features
//! - Closed chip-version enumeration with an emulator factory
//! - Two implementation families: YM3526/YM3812 and YMF262
//! - Single, dual-OPL2 and OPL3 register write paths
//! - 2-op and 4-op FM voices, rhythm mode, tremolo/vibrato LFO, 8 waveforms
//! - Thread-safe device sharing between a sequencer and an audio thread
//! - DOSBox Raw OPL (DRO v0.1 / v2.0) playback and Ogg/Vorbis metadata probing
//! - WAV export of any mixer
//!
//! # Crate feature flags
//! - `ogg-decode` (opt-in): Vorbis PCM decoding for the Ogg container (enables optional `rodio` dep)
//!
//! # Quick start
//! ## Core emulator only
//! ```no_run
//! use ymf262::{create_instance, ChipTopology, ChipVersion};
//!
//! let mut chip = create_instance(ChipVersion::Ym3812, 44_100, ChipTopology::Opl2).unwrap();
//! chip.write_opl2(0x20, 0x01); // Modulator: multiple 1
//! chip.write_opl2(0x23, 0x01); // Carrier: multiple 1
//! chip.write_opl2(0x43, 0x00); // Carrier: full volume
//! chip.write_opl2(0x63, 0xF0); // Carrier: fastest attack
//! chip.write_opl2(0xA0, 0x41); // F-number low
//! chip.write_opl2(0xB0, 0x32); // Key on, block 4
//!
//! let mut frames = vec![0.0f32; 2 * 512];
//! chip.read(&mut frames);
//! ```
//!
//! ## Play a DRO capture
//! ```no_run
//! use ymf262::container::{ContainerRegistry, MultimediaContainer};
//! use ymf262::config::PlayerConfig;
//! use std::path::Path;
//!
//! let registry = ContainerRegistry::with_defaults();
//! let path = Path::new("song.dro");
//! let container = registry.for_path(path).unwrap().get_instance(path).unwrap();
//! let mut mixer = container.create_mixer(&PlayerConfig::default()).unwrap();
//! mixer.play();
//! let audio = mixer.generate_samples(2 * 882);
//! ```

#![warn(missing_docs)]

pub mod backend; // Device contract
pub mod config; // Player configuration
pub mod container; // Multimedia containers (Ogg, DRO)
pub mod devices; // Concrete chip families
pub mod export; // WAV rendering
pub mod factory; // Version -> device dispatch
pub mod mixer; // Playback mixers
pub mod opl; // FM synthesis engine
pub mod shared; // Cross-thread device sharing
pub mod version; // Chip identity enums

/// Error types for OPL emulation and container operations
#[derive(thiserror::Error, Debug)]
pub enum OplError {
    /// Error while parsing a file format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error writing an audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Operation not available in this build or for this container
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for OplError {
    /// Converts a String into `OplError::Other`.
    ///
    /// Prefer the specific variants (`ParseError`, `ConfigError`, ...) where the
    /// failure has a known category.
    fn from(msg: String) -> Self {
        OplError::Other(msg)
    }
}

impl From<&str> for OplError {
    /// Converts a string slice into `OplError::Other`.
    fn from(msg: &str) -> Self {
        OplError::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, OplError>;

// Public API exports
pub use backend::EmulationDevice;
pub use config::PlayerConfig;
pub use container::{AudioMetadata, ContainerRegistry, MultimediaContainer};
pub use devices::{FmOplDevice, Opl3Device};
pub use factory::create_instance;
pub use mixer::{Mixer, PlaybackState};
pub use shared::{RegisterWrite, SharedDevice};
pub use version::{version_names, ChipTopology, ChipVersion};
