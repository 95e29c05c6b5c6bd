//! WAV file export functionality

use super::{apply_fade_out, normalize_samples, stereo_to_mono, ExportConfig};
use crate::mixer::Mixer;
use crate::{OplError, Result};
use log::{debug, info};
use std::path::Path;

/// Frames rendered per mixer call
const RENDER_CHUNK_FRAMES: usize = 4096;

/// What was written by an export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSummary {
    /// Frames written
    pub frames: u64,
    /// Sample rate of the file
    pub sample_rate: u32,
    /// Channels in the file
    pub channels: u16,
    /// Peak absolute sample value before normalization
    pub peak: f32,
}

/// Export a mixer to a stereo WAV file with default settings
pub fn export_to_wav<P: AsRef<Path>>(mixer: &mut dyn Mixer, output_path: P) -> Result<ExportSummary> {
    export_to_wav_with_config(mixer, output_path, ExportConfig::default())
}

/// Export a mixer to a WAV file
///
/// The mixer is rewound and played from the start. Rendering ends at the song
/// length or at `config.max_duration`, whichever comes first; a song without a
/// known length needs `max_duration`.
///
/// # Arguments
///
/// * `mixer` - Mixer to render
/// * `output_path` - Path where the WAV file will be written
/// * `config` - Export configuration (channels, normalization, fade, length)
pub fn export_to_wav_with_config<P: AsRef<Path>>(
    mixer: &mut dyn Mixer,
    output_path: P,
    config: ExportConfig,
) -> Result<ExportSummary> {
    if config.channels != 1 && config.channels != 2 {
        return Err(OplError::ConfigError(format!(
            "cannot export {} channels",
            config.channels
        )));
    }

    let sample_rate = mixer.sample_rate();
    let limit = config
        .max_duration
        .map(|seconds| (seconds.max(0.0) * sample_rate as f32) as u64);
    let frames = match (mixer.length_frames(), limit) {
        (Some(length), Some(limit)) => length.min(limit),
        (Some(length), None) => length,
        (None, Some(limit)) => limit,
        (None, None) => {
            return Err(OplError::ConfigError(
                "song length unknown, set a maximum duration".to_string(),
            ))
        }
    };

    info!(
        "Rendering {} frames ({:.1}s)...",
        frames,
        frames as f32 / sample_rate as f32
    );
    let mut samples = render_frames(mixer, frames);
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    if config.normalize {
        debug!("Normalizing audio (peak {:.3})", peak);
        normalize_samples(&mut samples);
    }

    if config.fade_out_duration > 0.0 {
        debug!("Applying {:.1}s fade out", config.fade_out_duration);
        apply_fade_out(&mut samples, 2, config.fade_out_duration, sample_rate);
    }

    let final_samples = if config.channels == 1 {
        stereo_to_mono(&samples)
    } else {
        samples
    };

    info!("Writing WAV file to {}", output_path.as_ref().display());
    write_wav_file(
        output_path.as_ref(),
        &final_samples,
        sample_rate,
        config.channels,
    )?;

    Ok(ExportSummary {
        frames,
        sample_rate,
        channels: config.channels,
        peak,
    })
}

/// Rewind, play and render `frames` interleaved stereo frames
pub fn render_frames(mixer: &mut dyn Mixer, frames: u64) -> Vec<f32> {
    mixer.stop();
    mixer.play();

    let total = frames as usize * 2;
    let mut samples = vec![0.0f32; total];
    for chunk in samples.chunks_mut(RENDER_CHUNK_FRAMES * 2) {
        mixer.generate_samples_into(chunk);
        if !mixer.is_playing() {
            break;
        }
    }
    samples
}

/// Write samples to WAV file
fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| OplError::AudioFileError(format!("Failed to create WAV file: {}", e)))?;

    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| OplError::AudioFileError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| OplError::AudioFileError(format!("Failed to finalize WAV file: {}", e)))?;

    Ok(())
}
