//! Lookup tables shared by every OPL chip instance
//!
//! Waveforms and the attenuation curve are built once on first use and then
//! shared read-only between all chips.

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Native sample rate of the chips (14.31818 MHz / 288)
pub const OPL_RATE: f64 = 14_318_180.0 / 288.0;

/// Bits of phase used to index a waveform
pub const WAVE_BITS: u32 = 10;
/// Entries per waveform table
pub const WAVE_LEN: usize = 1 << WAVE_BITS;
/// Mask applied to wave indices
pub const WAVE_MASK: usize = WAVE_LEN - 1;
/// Shift from the 32-bit phase accumulator to a wave index
pub const WAVE_SHIFT: u32 = 32 - WAVE_BITS;
/// Peak amplitude of every waveform
pub const WAVE_AMPLITUDE: f64 = 4095.0;
/// Number of selectable waveforms (YMF262)
pub const WAVEFORM_COUNT: usize = 8;

/// Maximum envelope attenuation (0.1875 dB units)
pub const ENV_MAX: i32 = 511;
/// Attenuation at which an operator is considered silent
pub const ENV_LIMIT: i32 = 384;

/// Frequency multiplier per MULT value, doubled so that MULT=0 means x0.5
pub const FREQ_MULTIPLIER: [u32; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

const KSL_CREATE: [u8; 16] = [64, 32, 24, 19, 16, 12, 11, 10, 8, 6, 5, 4, 3, 2, 1, 0];

/// Right shift applied to the key scale level base for KSL register values 0-3
pub const KSL_SHIFT: [u32; 4] = [31, 1, 2, 0];

/// Vibrato offset pattern, one step every 1024 native samples
pub const VIBRATO_PATTERN: [i32; 8] = [0, 1, 2, 1, 0, -1, -2, -1];
/// log2 of native samples per vibrato step
pub const VIBRATO_SHIFT: u32 = 10;

/// Steps in one tremolo period (3.7 Hz)
pub const TREMOLO_STEPS: u64 = 52;
/// log2 of native samples per tremolo step
pub const TREMOLO_SHIFT: u32 = 8;

/// Tremolo attenuation for a position in the triangle, 0..=25 units
#[inline]
pub fn tremolo_value(position: u64) -> i32 {
    let position = (position % TREMOLO_STEPS) as i32;
    if position < (TREMOLO_STEPS / 2) as i32 {
        position
    } else {
        TREMOLO_STEPS as i32 - 1 - position
    }
}

/// Precomputed tables
pub struct Tables {
    /// Waveform samples, indexed `[waveform][phase]`
    pub waves: [[i16; WAVE_LEN]; WAVEFORM_COUNT],
    /// Linear gain (16.16) for each attenuation step below [`ENV_LIMIT`]
    pub attenuation: [u32; ENV_LIMIT as usize],
    /// Key scale level base, indexed by `(block << 4) | (fnum >> 6)`
    pub key_scale: [u8; 128],
}

impl Tables {
    fn build() -> Self {
        let mut waves = [[0i16; WAVE_LEN]; WAVEFORM_COUNT];
        let half = WAVE_LEN / 2;
        let quarter = WAVE_LEN / 4;

        for i in 0..WAVE_LEN {
            let sine = (2.0 * PI * i as f64 / WAVE_LEN as f64).sin();
            let double = (4.0 * PI * i as f64 / WAVE_LEN as f64).sin();
            let first_half = i < half;

            let sine = to_sample(sine);
            let double = to_sample(double);

            waves[0][i] = sine;
            waves[1][i] = if first_half { sine } else { 0 };
            waves[2][i] = sine.abs();
            waves[3][i] = if (i / quarter) % 2 == 0 { sine.abs() } else { 0 };
            waves[4][i] = if first_half { double } else { 0 };
            waves[5][i] = if first_half { double.abs() } else { 0 };
            waves[6][i] = if first_half {
                WAVE_AMPLITUDE as i16
            } else {
                -(WAVE_AMPLITUDE as i16)
            };
        }

        // Log-saw: attenuation rises linearly across each half cycle
        for i in 0..half {
            let level = to_sample((-(i as f64) / 64.0).exp2());
            waves[7][i] = level;
            waves[7][WAVE_LEN - 1 - i] = -level;
        }

        let mut attenuation = [0u32; ENV_LIMIT as usize];
        for (step, gain) in attenuation.iter_mut().enumerate() {
            *gain = ((-(step as f64) / 32.0).exp2() * 65536.0).round() as u32;
        }

        let mut key_scale = [0u8; 128];
        for octave in 0..8 {
            for (i, create) in KSL_CREATE.iter().enumerate() {
                let value = (octave * 8 - *create as i32).max(0);
                key_scale[(octave as usize) * 16 + i] = (value * 4) as u8;
            }
        }

        Self {
            waves,
            attenuation,
            key_scale,
        }
    }
}

fn to_sample(value: f64) -> i16 {
    (value * WAVE_AMPLITUDE).round() as i16
}

/// Shared tables, built on first access
pub fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(Tables::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_quadrants() {
        let t = tables();
        assert_eq!(t.waves[0][0], 0);
        assert_eq!(t.waves[0][WAVE_LEN / 4], 4095);
        assert_eq!(t.waves[0][3 * WAVE_LEN / 4], -4095);
    }

    #[test]
    fn test_half_and_pulse_sines_are_non_negative_or_zero() {
        let t = tables();
        assert!(t.waves[1][WAVE_LEN / 2..].iter().all(|&s| s == 0));
        assert!(t.waves[2].iter().all(|&s| s >= 0));
        assert!(t.waves[3][WAVE_LEN / 4..WAVE_LEN / 2].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_attenuation_halves_every_32_steps() {
        let t = tables();
        assert_eq!(t.attenuation[0], 65536);
        assert_eq!(t.attenuation[32], 32768);
        assert_eq!(t.attenuation[64], 16384);
    }

    #[test]
    fn test_key_scale_grows_with_octave() {
        let t = tables();
        assert_eq!(t.key_scale[0], 0);
        assert_eq!(t.key_scale[7 * 16 + 15], 56 * 4);
        assert!(t.key_scale[5 * 16 + 8] > t.key_scale[3 * 16 + 8]);
    }

    #[test]
    fn test_tremolo_triangle() {
        assert_eq!(tremolo_value(0), 0);
        assert_eq!(tremolo_value(25), 25);
        assert_eq!(tremolo_value(26), 25);
        assert_eq!(tremolo_value(51), 0);
        assert_eq!(tremolo_value(52), 0);
    }
}
