//! Playback mixers
//!
//! A mixer turns an opened container into a stream of interleaved stereo
//! samples with play / pause / stop control.
//!
//! # Example
//!
//! ```ignore
//! use ymf262::{Mixer, PlaybackState};
//!
//! fn drain(mixer: &mut dyn Mixer) {
//!     mixer.play();
//!     let mut buffer = vec![0.0; 2 * 1024];
//!     while mixer.state() == PlaybackState::Playing {
//!         mixer.generate_samples_into(&mut buffer);
//!         // ... send buffer to audio device
//!     }
//! }
//! ```

mod opl_mixer;
#[cfg(feature = "ogg-decode")]
mod ogg_mixer;

pub use opl_mixer::{OplMixer, TimedWrite};
#[cfg(feature = "ogg-decode")]
pub use ogg_mixer::OggMixer;

/// Playback state of a mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Stopped (at the beginning or the end)
    #[default]
    Stopped,
    /// Producing audio
    Playing,
    /// Holding position
    Paused,
}

/// Object-safe playback interface
pub trait Mixer: Send {
    /// Start or resume playback.
    fn play(&mut self);

    /// Pause playback (keeps position).
    fn pause(&mut self);

    /// Stop playback and rewind.
    fn stop(&mut self);

    /// Current playback state.
    fn state(&self) -> PlaybackState;

    /// Check if currently playing.
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Fill `buffer` with interleaved stereo samples.
    ///
    /// Silence is written while stopped or paused, and for the part of the
    /// buffer past the end of a non-looping song.
    fn generate_samples_into(&mut self, buffer: &mut [f32]);

    /// Generate `count` interleaved samples into a new buffer.
    fn generate_samples(&mut self, count: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; count];
        self.generate_samples_into(&mut buffer);
        buffer
    }

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Interleaved channel count.
    fn channel_count(&self) -> usize {
        2
    }

    /// Song length in frames, if known.
    fn length_frames(&self) -> Option<u64>;

    /// Frames played since the start.
    fn position_frames(&self) -> u64;

    /// Song length in milliseconds, -1 if unknown.
    fn duration_ms(&self) -> i64 {
        match self.length_frames() {
            Some(frames) if self.sample_rate() > 0 => {
                (frames * 1000 / self.sample_rate() as u64) as i64
            }
            _ => -1,
        }
    }

    /// Playback position as a fraction (0.0 to 1.0).
    fn playback_position(&self) -> f32 {
        match self.length_frames() {
            Some(length) if length > 0 => {
                (self.position_frames() as f64 / length as f64).min(1.0) as f32
            }
            _ => 0.0,
        }
    }
}
