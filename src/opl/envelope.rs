//! ADSR envelope generator
//!
//! Levels are attenuation in 0.1875 dB steps (0 = loudest, [`ENV_MAX`] =
//! silent) held in 16.16 fixed point so slow rates keep their fraction at
//! any output sample rate.

use super::tables::ENV_MAX;

const FRACTION_BITS: u32 = 16;
const LEVEL_MAX: i32 = ENV_MAX << FRACTION_BITS;

/// Envelope phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeState {
    /// Fully attenuated, key released
    #[default]
    Off,
    /// Exponential rise towards full volume
    Attack,
    /// Linear fall towards the sustain level
    Decay,
    /// Holding (or releasing, for percussive voices) at the sustain level
    Sustain,
    /// Linear fall towards silence after key off
    Release,
}

/// Per-operator envelope generator
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    state: EnvelopeState,
    level: i32,
    attack_rate: u8,
    decay_rate: u8,
    release_rate: u8,
    sustain_level: i32,
    sustain_hold: bool,
    key_scale_rate: bool,
    key_code: u8,
    attack_add: i32,
    attack_instant: bool,
    decay_add: i32,
    release_add: i32,
    rate_scale: f64,
}

impl EnvelopeGenerator {
    /// Create a generator for a chip running `rate_scale` native samples per output sample
    pub fn new(rate_scale: f64) -> Self {
        Self {
            state: EnvelopeState::Off,
            level: LEVEL_MAX,
            attack_rate: 0,
            decay_rate: 0,
            release_rate: 0,
            sustain_level: 0,
            sustain_hold: false,
            key_scale_rate: false,
            key_code: 0,
            attack_add: 0,
            attack_instant: false,
            decay_add: 0,
            release_add: 0,
            rate_scale,
        }
    }

    /// Current phase
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current attenuation in whole steps
    #[inline]
    pub fn level(&self) -> i32 {
        self.level >> FRACTION_BITS
    }

    /// Set attack and decay rates (4 bits each)
    pub fn set_attack_decay(&mut self, attack: u8, decay: u8) {
        self.attack_rate = attack & 0x0F;
        self.decay_rate = decay & 0x0F;
        self.update_rates();
    }

    /// Set sustain level and release rate (4 bits each)
    pub fn set_sustain_release(&mut self, sustain: u8, release: u8) {
        let mut sl = (sustain & 0x0F) as i32;
        // SL=15 maps to the bottom of the range (93 dB)
        sl |= (sl + 1) & 0x10;
        self.sustain_level = (sl << 4) << FRACTION_BITS;
        self.release_rate = release & 0x0F;
        self.update_rates();
    }

    /// Select sustained (true) or percussive (false) envelope
    pub fn set_sustain_hold(&mut self, hold: bool) {
        self.sustain_hold = hold;
    }

    /// Enable full key scaling of rates
    pub fn set_key_scale_rate(&mut self, enabled: bool) {
        if self.key_scale_rate != enabled {
            self.key_scale_rate = enabled;
            self.update_rates();
        }
    }

    /// Set the channel key code `(block << 1) | note bit`
    pub fn set_key_code(&mut self, key_code: u8) {
        if self.key_code != key_code {
            self.key_code = key_code;
            self.update_rates();
        }
    }

    /// Begin the attack phase
    pub fn key_on(&mut self) {
        self.state = EnvelopeState::Attack;
        if self.attack_instant {
            self.level = 0;
            self.state = EnvelopeState::Decay;
        }
    }

    /// Begin the release phase
    pub fn key_off(&mut self) {
        if self.state != EnvelopeState::Off {
            self.state = EnvelopeState::Release;
        }
    }

    /// Step one output sample and return the attenuation
    #[inline]
    pub fn advance(&mut self) -> i32 {
        match self.state {
            EnvelopeState::Off => {}
            EnvelopeState::Attack => {
                if self.attack_instant {
                    self.level = 0;
                } else if self.attack_add > 0 {
                    let one = 1i64 << FRACTION_BITS;
                    let delta =
                        ((self.level as i64 + one) * self.attack_add as i64) >> (FRACTION_BITS + 3);
                    // A zero step would leave the level stuck just above the top
                    self.level -= (delta as i32).max(1);
                }
                if self.level <= 0 {
                    self.level = 0;
                    self.state = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                self.level += self.decay_add;
                if self.level >= self.sustain_level {
                    self.level = self.sustain_level;
                    self.state = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => {
                if !self.sustain_hold {
                    self.release_step();
                }
            }
            EnvelopeState::Release => self.release_step(),
        }
        self.level()
    }

    fn release_step(&mut self) {
        self.level += self.release_add;
        if self.level >= LEVEL_MAX {
            self.level = LEVEL_MAX;
            self.state = EnvelopeState::Off;
        }
    }

    fn update_rates(&mut self) {
        let offset = if self.key_scale_rate {
            self.key_code
        } else {
            self.key_code >> 2
        };
        let attack = effective_rate(self.attack_rate, offset);
        self.attack_instant = attack.map_or(false, |rate| rate >= 60);
        self.attack_add = self.increment(attack);
        self.decay_add = self.increment(effective_rate(self.decay_rate, offset));
        self.release_add = self.increment(effective_rate(self.release_rate, offset));
    }

    fn increment(&self, rate: Option<u8>) -> i32 {
        let Some(rate) = rate else {
            return 0;
        };
        let base = ((4 + (rate & 3) as u64) << (rate >> 2)) * 2;
        (base as f64 * self.rate_scale).min(LEVEL_MAX as f64) as i32
    }
}

fn effective_rate(rate: u8, offset: u8) -> Option<u8> {
    (rate != 0).then(|| (rate * 4 + offset).min(63))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opl::tables::OPL_RATE;

    fn generator() -> EnvelopeGenerator {
        EnvelopeGenerator::new(1.0)
    }

    #[test]
    fn test_starts_silent() {
        let mut env = generator();
        assert_eq!(env.state(), EnvelopeState::Off);
        assert_eq!(env.advance(), ENV_MAX);
    }

    #[test]
    fn test_fast_attack_is_instant() {
        let mut env = generator();
        env.set_attack_decay(15, 0);
        env.key_on();
        assert_eq!(env.level(), 0);
        env.advance();
        assert_eq!(env.state(), EnvelopeState::Sustain);
    }

    #[test]
    fn test_attack_zero_never_rises() {
        let mut env = generator();
        env.key_on();
        for _ in 0..10_000 {
            env.advance();
        }
        assert_eq!(env.level(), ENV_MAX);
    }

    #[test]
    fn test_slow_attack_reaches_decay() {
        let mut env = generator();
        env.set_attack_decay(10, 0);
        env.key_on();
        let mut steps = 0;
        while env.state() == EnvelopeState::Attack && steps < 1_000_000 {
            env.advance();
            steps += 1;
        }
        assert_eq!(env.state(), EnvelopeState::Decay);
        assert!(steps > 1);
    }

    #[test]
    fn test_decay_stops_at_sustain_level() {
        let mut env = generator();
        env.set_attack_decay(15, 12);
        env.set_sustain_release(4, 0);
        env.set_sustain_hold(true);
        env.key_on();
        for _ in 0..100_000 {
            env.advance();
        }
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert_eq!(env.level(), 4 << 4);
    }

    #[test]
    fn test_release_reaches_off() {
        let mut env = generator();
        env.set_attack_decay(15, 0);
        env.set_sustain_release(0, 15);
        env.set_sustain_hold(true);
        env.key_on();
        env.advance();
        env.key_off();
        for _ in 0..1_000 {
            env.advance();
        }
        assert_eq!(env.state(), EnvelopeState::Off);
        assert_eq!(env.level(), ENV_MAX);
    }

    #[test]
    fn test_sustain_level_fifteen_is_bottom() {
        let mut env = generator();
        env.set_attack_decay(15, 15);
        env.set_sustain_release(15, 0);
        env.set_sustain_hold(true);
        env.key_on();
        for _ in 0..10_000 {
            env.advance();
        }
        assert_eq!(env.level(), 31 << 4);
    }

    #[test]
    fn test_slow_attack_completes_at_high_output_rate() {
        // 192 kHz output: the exponential step falls below one fraction unit near the top
        let mut env = EnvelopeGenerator::new(OPL_RATE / 192_000.0);
        env.set_attack_decay(1, 4);
        env.set_sustain_release(8, 0);
        env.set_sustain_hold(true);
        env.key_on();
        for _ in 0..192_000 * 60 {
            env.advance();
            if env.state() != EnvelopeState::Attack {
                break;
            }
        }
        assert_ne!(env.state(), EnvelopeState::Attack);
        assert_eq!(env.level(), 0);
    }
}
