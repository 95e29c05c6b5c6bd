//! Mixer driving an emulation device from a timed register stream

use super::{Mixer, PlaybackState};
use crate::backend::EmulationDevice;
use crate::shared::RegisterWrite;
use log::debug;

/// A register write scheduled at a point in the song
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedWrite {
    /// Milliseconds from the start of the song
    pub at_ms: u64,
    /// The write to perform
    pub write: RegisterWrite,
}

/// Plays a list of [`TimedWrite`]s through an [`EmulationDevice`]
///
/// Every write whose time has been reached is applied before the device
/// renders; rendering then runs up to the next scheduled write, so writes land
/// on exact sample positions regardless of the caller's buffer size.
pub struct OplMixer {
    device: Box<dyn EmulationDevice>,
    events: Vec<TimedWrite>,
    next_event: usize,
    position: u64,
    length: u64,
    looping: bool,
    state: PlaybackState,
}

impl OplMixer {
    /// Create a stopped mixer
    ///
    /// # Arguments
    ///
    /// * `device` - Freshly created device that receives the writes
    /// * `events` - Writes in any order; they are sorted by time (stable)
    /// * `length_ms` - Declared song length; the last write extends it if later
    /// * `looping` - Restart at the end instead of stopping
    pub fn new(
        device: Box<dyn EmulationDevice>,
        mut events: Vec<TimedWrite>,
        length_ms: u64,
        looping: bool,
    ) -> Self {
        events.sort_by_key(|event| event.at_ms);
        let rate = device.sample_rate();
        let last_event = events.last().map(|e| ms_to_frames(e.at_ms, rate)).unwrap_or(0);
        let length = ms_to_frames(length_ms, rate).max(last_event);
        debug!(
            "OPL mixer: {} writes, {} frames at {} Hz",
            events.len(),
            length,
            rate
        );
        Self {
            device,
            events,
            next_event: 0,
            position: 0,
            length,
            looping,
            state: PlaybackState::Stopped,
        }
    }

    /// Enable or disable looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// The device being driven
    pub fn device(&self) -> &dyn EmulationDevice {
        self.device.as_ref()
    }

    fn rewind(&mut self) {
        self.device.reset_opl();
        self.next_event = 0;
        self.position = 0;
    }

    fn apply_due_events(&mut self) {
        let rate = self.device.sample_rate();
        while let Some(event) = self.events.get(self.next_event).copied() {
            if ms_to_frames(event.at_ms, rate) > self.position {
                break;
            }
            event.write.apply(self.device.as_mut());
            self.next_event += 1;
        }
    }

    fn next_event_frame(&self) -> u64 {
        let rate = self.device.sample_rate();
        self.events
            .get(self.next_event)
            .map(|e| ms_to_frames(e.at_ms, rate))
            .unwrap_or(self.length)
            .min(self.length)
    }
}

fn ms_to_frames(ms: u64, sample_rate: u32) -> u64 {
    ms * sample_rate as u64 / 1000
}

impl Mixer for OplMixer {
    fn play(&mut self) {
        if self.state == PlaybackState::Stopped && self.position >= self.length {
            self.rewind();
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
        self.rewind();
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn generate_samples_into(&mut self, buffer: &mut [f32]) {
        let total = buffer.len() / 2;
        let mut done = 0;

        while self.state == PlaybackState::Playing && done < total {
            self.apply_due_events();

            if self.position >= self.length {
                if self.looping && self.length > 0 {
                    self.rewind();
                    continue;
                }
                self.state = PlaybackState::Stopped;
                break;
            }

            let chunk = (self.next_event_frame() - self.position).min((total - done) as u64) as usize;
            self.device.read(&mut buffer[done * 2..(done + chunk) * 2]);
            done += chunk;
            self.position += chunk as u64;
        }

        buffer[done * 2..].fill(0.0);
    }

    fn sample_rate(&self) -> u32 {
        self.device.sample_rate()
    }

    fn length_frames(&self) -> Option<u64> {
        Some(self.length)
    }

    fn position_frames(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::create_instance;
    use crate::version::{ChipTopology, ChipVersion};

    const RATE: u32 = 10_000;

    fn opl2(at_ms: u64, register: u8, value: u8) -> TimedWrite {
        TimedWrite {
            at_ms,
            write: RegisterWrite::Opl2 { register, value },
        }
    }

    fn note_song() -> Vec<TimedWrite> {
        vec![
            opl2(0, 0x23, 0x21),
            opl2(0, 0x63, 0xF0),
            opl2(0, 0x83, 0x0F),
            opl2(0, 0xA0, 0x41),
            opl2(100, 0xB0, 0x32),
            opl2(200, 0xB0, 0x12),
        ]
    }

    fn mixer(looping: bool) -> OplMixer {
        let device = create_instance(ChipVersion::Ym3812, RATE, ChipTopology::Opl2).unwrap();
        OplMixer::new(device, note_song(), 300, looping)
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).sum()
    }

    #[test]
    fn test_silent_until_played() {
        let mut mixer = mixer(false);
        let samples = mixer.generate_samples(2_000);
        assert_eq!(energy(&samples), 0.0);
        assert_eq!(mixer.position_frames(), 0);
    }

    #[test]
    fn test_writes_land_on_schedule() {
        let mut mixer = mixer(false);
        mixer.play();
        // 0-100 ms: nothing keyed
        let before = mixer.generate_samples(2 * 1_000);
        assert_eq!(energy(&before), 0.0);
        // 100-200 ms: note sounding
        let during = mixer.generate_samples(2 * 1_000);
        assert!(energy(&during) > 0.0);
        assert_eq!(mixer.position_frames(), 2_000);
    }

    #[test]
    fn test_stops_at_end() {
        let mut mixer = mixer(false);
        mixer.play();
        let samples = mixer.generate_samples(2 * 4_000);
        assert_eq!(mixer.state(), PlaybackState::Stopped);
        assert_eq!(mixer.position_frames(), 3_000);
        assert!(samples[2 * 3_000..].iter().all(|&s| s == 0.0));
        assert_eq!(mixer.duration_ms(), 300);
    }

    #[test]
    fn test_loops_back_to_start() {
        let mut mixer = mixer(true);
        mixer.play();
        mixer.generate_samples(2 * 3_500);
        assert_eq!(mixer.state(), PlaybackState::Playing);
        assert_eq!(mixer.position_frames(), 500);
    }

    #[test]
    fn test_pause_and_stop() {
        let mut mixer = mixer(false);
        mixer.play();
        mixer.generate_samples(2 * 1_500);
        mixer.pause();
        assert_eq!(mixer.state(), PlaybackState::Paused);
        assert_eq!(energy(&mixer.generate_samples(512)), 0.0);
        assert_eq!(mixer.position_frames(), 1_500);
        mixer.stop();
        assert_eq!(mixer.position_frames(), 0);
        assert!((mixer.playback_position() - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_play_after_end_restarts() {
        let mut mixer = mixer(false);
        mixer.play();
        mixer.generate_samples(2 * 4_000);
        mixer.play();
        assert_eq!(mixer.position_frames(), 0);
        assert!(mixer.is_playing());
    }
}
