//! Mixer for decoded Ogg/Vorbis PCM

use super::{Mixer, PlaybackState};
use crate::{OplError, Result};
use log::debug;
use rodio::source::UniformSourceIterator;
use rodio::{Decoder, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Plays a fully decoded Vorbis stream
///
/// The whole file is decoded up front and resampled to the requested rate and
/// two channels.
pub struct OggMixer {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    looping: bool,
    state: PlaybackState,
}

impl OggMixer {
    /// Decode `path` at `sample_rate`
    pub fn open(path: &Path, sample_rate: u32, looping: bool) -> Result<Self> {
        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| OplError::ParseError(format!("cannot decode {}: {}", path.display(), e)))?;
        debug!(
            "Decoding {} ({} ch, {} Hz) to {} Hz stereo",
            path.display(),
            decoder.channels(),
            decoder.sample_rate(),
            sample_rate
        );
        let samples: Vec<f32> = UniformSourceIterator::<_, f32>::new(decoder, 2, sample_rate).collect();
        Ok(Self::from_samples(samples, sample_rate, looping))
    }

    /// Wrap already decoded interleaved stereo samples
    pub fn from_samples(mut samples: Vec<f32>, sample_rate: u32, looping: bool) -> Self {
        samples.truncate(samples.len() & !1);
        Self {
            samples,
            sample_rate,
            position: 0,
            looping,
            state: PlaybackState::Stopped,
        }
    }

    fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

impl Mixer for OggMixer {
    fn play(&mut self) {
        if self.state == PlaybackState::Stopped && self.position >= self.frames() {
            self.position = 0;
        }
        self.state = PlaybackState::Playing;
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.position = 0;
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn generate_samples_into(&mut self, buffer: &mut [f32]) {
        let total = buffer.len() / 2;
        let mut done = 0;

        while self.state == PlaybackState::Playing && done < total {
            if self.position >= self.frames() {
                if self.looping && self.frames() > 0 {
                    self.position = 0;
                    continue;
                }
                self.state = PlaybackState::Stopped;
                break;
            }
            let chunk = (self.frames() - self.position).min(total - done);
            buffer[done * 2..(done + chunk) * 2]
                .copy_from_slice(&self.samples[self.position * 2..(self.position + chunk) * 2]);
            done += chunk;
            self.position += chunk;
        }

        buffer[done * 2..].fill(0.0);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn length_frames(&self) -> Option<u64> {
        Some(self.frames() as u64)
    }

    fn position_frames(&self) -> u64 {
        self.position as u64
    }
}
