//! Offline rendering of a mixer to audio files
//!
//! # Example
//!
//! ```no_run
//! use ymf262::config::PlayerConfig;
//! use ymf262::container::ContainerRegistry;
//! use ymf262::export::{export_to_wav_with_config, ExportConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let container = ContainerRegistry::with_defaults().open(Path::new("song.dro"))?;
//! let mut mixer = container.create_mixer(&PlayerConfig::default())?;
//!
//! let config = ExportConfig::stereo().normalize(true).fade_out(2.0);
//! export_to_wav_with_config(mixer.as_mut(), "song.wav", config)?;
//! # Ok(())
//! # }
//! ```

mod wav;

pub use wav::*;

/// Export configuration options
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Number of audio channels (1 = mono downmix, 2 = stereo)
    pub channels: u16,
    /// Whether to normalize audio to prevent clipping
    pub normalize: bool,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
    /// Stop rendering after this many seconds (required for endless songs)
    pub max_duration: Option<f32>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            normalize: true,
            fade_out_duration: 0.0,
            max_duration: None,
        }
    }
}

impl ExportConfig {
    /// Create config for stereo export
    pub fn stereo() -> Self {
        Self::default()
    }

    /// Create config for mono export
    pub fn mono() -> Self {
        Self {
            channels: 1,
            ..Default::default()
        }
    }

    /// Enable normalization to prevent clipping
    pub fn normalize(mut self, enable: bool) -> Self {
        self.normalize = enable;
        self
    }

    /// Add fade out at the end
    pub fn fade_out(mut self, duration_seconds: f32) -> Self {
        self.fade_out_duration = duration_seconds;
        self
    }

    /// Limit the rendered length
    pub fn max_duration(mut self, seconds: f32) -> Self {
        self.max_duration = Some(seconds);
        self
    }
}

/// Scale samples down so the peak sits at 0.95
fn normalize_samples(samples: &mut [f32]) {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    if peak > 0.95 {
        let scale = 0.95 / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Fade the last `fade_duration` seconds of interleaved audio to silence
fn apply_fade_out(samples: &mut [f32], channels: usize, fade_duration: f32, sample_rate: u32) {
    if fade_duration <= 0.0 || samples.is_empty() || channels == 0 {
        return;
    }

    let fade_frames = (fade_duration * sample_rate as f32) as usize;
    let total_frames = samples.len() / channels;
    let start_fade = total_frames.saturating_sub(fade_frames);
    let span = (total_frames - start_fade).max(1) as f32;

    for (i, frame) in samples.chunks_mut(channels).enumerate().skip(start_fade) {
        let fade_factor = 1.0 - (i - start_fade) as f32 / span;
        frame.iter_mut().for_each(|s| *s *= fade_factor);
    }
}

/// Average each interleaved stereo pair into one sample
fn stereo_to_mono(stereo: &[f32]) -> Vec<f32> {
    stereo
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]) * 0.5)
        .collect()
}
