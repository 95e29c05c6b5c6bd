//! Tremolo and vibrato low-frequency oscillator shared by all channels of a chip

use super::tables::{
    tremolo_value, OPL_RATE, TREMOLO_SHIFT, TREMOLO_STEPS, VIBRATO_PATTERN, VIBRATO_SHIFT,
};

/// Global LFO state
#[derive(Debug, Clone)]
pub struct Lfo {
    /// Native samples elapsed, 16.16 fixed point
    counter: u64,
    /// Native samples per output sample, 16.16 fixed point
    add: u64,
    /// Current tremolo attenuation in envelope steps
    pub tremolo: i32,
    /// Current vibrato pattern step (-2..=2)
    pub vibrato_step: i32,
    /// 14 cent vibrato instead of 7 cent
    pub deep_vibrato: bool,
    /// 4.8 dB tremolo instead of 1 dB
    pub deep_tremolo: bool,
}

impl Lfo {
    /// Create an LFO for the given output sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            counter: 0,
            add: (OPL_RATE / sample_rate as f64 * 65536.0) as u64,
            tremolo: 0,
            vibrato_step: 0,
            deep_vibrato: false,
            deep_tremolo: false,
        }
    }

    /// Advance by one output sample
    #[inline]
    pub fn advance(&mut self) {
        self.counter = self.counter.wrapping_add(self.add);
        let native = self.counter >> 16;

        let tremolo = tremolo_value((native >> TREMOLO_SHIFT) % TREMOLO_STEPS);
        self.tremolo = if self.deep_tremolo { tremolo } else { tremolo >> 2 };
        self.vibrato_step = VIBRATO_PATTERN[((native >> VIBRATO_SHIFT) & 7) as usize];
    }

    /// F-number after applying the current vibrato offset
    #[inline]
    pub fn vibrato_fnum(&self, fnum: u16) -> u16 {
        let mut range = (fnum >> 7) as i32;
        if !self.deep_vibrato {
            range >>= 1;
        }
        (fnum as i32 + range * self.vibrato_step / 2).clamp(0, 1023) as u16
    }
}
