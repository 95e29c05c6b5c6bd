//! Multimedia containers
//!
//! A container recognises a file type, probes its metadata and builds a
//! [`Mixer`] for it. Hosts keep one prototype per format in a
//! [`ContainerRegistry`] and call [`MultimediaContainer::get_instance`] to bind
//! a concrete file.

mod dro;
mod ogg;

pub use dro::{parse_dro, DroContainer, DroSong, DroVersion};
pub use ogg::{probe_ogg, probe_ogg_file, OggContainer, OggStreamInfo};

use crate::config::PlayerConfig;
use crate::mixer::Mixer;
use crate::{OplError, Result};
use log::debug;
use std::path::{Path, PathBuf};

/// Display name and duration of a song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioMetadata {
    /// Human readable name
    pub name: String,
    /// Length in milliseconds, -1 when unknown
    pub duration_ms: i64,
}

impl AudioMetadata {
    /// Metadata known from the path alone
    pub fn from_path(path: &Path) -> Self {
        Self {
            name: default_name(path),
            duration_ms: -1,
        }
    }

    /// Whether the duration is known
    pub fn has_duration(&self) -> bool {
        self.duration_ms >= 0
    }
}

/// File name of `path`, or the whole path when it has none
pub fn default_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A file format the player can open
pub trait MultimediaContainer: Send {
    /// Format name
    fn name(&self) -> &'static str;

    /// Lowercase extensions handled, without the dot
    fn file_extensions(&self) -> &'static [&'static str];

    /// Check the extension of `path` (case-insensitive)
    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.file_extensions().iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Open `path` and return an instance bound to it
    fn get_instance(&self, path: &Path) -> Result<Box<dyn MultimediaContainer>>;

    /// File this instance is bound to
    fn file_path(&self) -> Option<&Path>;

    /// Metadata read when the instance was opened
    fn metadata(&self) -> Option<&AudioMetadata>;

    /// Read metadata from `path`
    fn probe(&self, path: &Path) -> Result<AudioMetadata>;

    /// Best-effort metadata; falls back to [`AudioMetadata::from_path`]
    fn song_info(&self, path: &Path) -> AudioMetadata {
        self.probe(path).unwrap_or_else(|e| {
            debug!("{}: no metadata for {}: {}", self.name(), path.display(), e);
            AudioMetadata::from_path(path)
        })
    }

    /// Build a mixer for the bound file
    fn create_mixer(&self, config: &PlayerConfig) -> Result<Box<dyn Mixer>>;
}

/// Set of known container prototypes
pub struct ContainerRegistry {
    containers: Vec<Box<dyn MultimediaContainer>>,
}

impl ContainerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
        }
    }

    /// Registry with every built-in container
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(DroContainer::default()));
        registry.register(Box::new(OggContainer::default()));
        registry
    }

    /// Add a container prototype
    pub fn register(&mut self, container: Box<dyn MultimediaContainer>) {
        self.containers.push(container);
    }

    /// Registered prototypes in registration order
    pub fn containers(&self) -> impl Iterator<Item = &dyn MultimediaContainer> {
        self.containers.iter().map(|c| c.as_ref())
    }

    /// First container able to handle `path`
    pub fn for_path(&self, path: &Path) -> Option<&dyn MultimediaContainer> {
        self.containers().find(|c| c.can_handle(path))
    }

    /// Open `path` with the matching container
    pub fn open(&self, path: &Path) -> Result<Box<dyn MultimediaContainer>> {
        match self.for_path(path) {
            Some(container) => container.get_instance(path),
            None => Err(OplError::Unsupported(format!(
                "no container for {}",
                path.display()
            ))),
        }
    }

    /// Metadata for `path`; never fails
    pub fn song_info(&self, path: &Path) -> AudioMetadata {
        match self.for_path(path) {
            Some(container) => container.song_info(path),
            None => AudioMetadata::from_path(path),
        }
    }
}

impl Default for ContainerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Convert a nom failure on `what` into a parse error
pub(crate) fn nom_error(what: &str, err: nom::Err<nom::error::Error<&[u8]>>) -> OplError {
    let detail = match err {
        nom::Err::Incomplete(_) => "unexpected end of data".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            format!("{:?} with {} bytes left", e.code, e.input.len())
        }
    };
    OplError::ParseError(format!("{}: {}", what, detail))
}

/// Path plus metadata of an opened file
#[derive(Debug, Clone)]
pub(crate) struct BoundFile {
    pub path: PathBuf,
    pub metadata: AudioMetadata,
}
