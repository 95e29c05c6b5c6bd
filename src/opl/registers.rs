//! OPL register map
//!
//! Decodes a raw register address (bank-relative, 0x00-0xFF) into the group
//! it belongs to, resolving operator slots and channel numbers.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Operator characteristic bits (registers 0x20-0x35)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OperatorFlags: u8 {
        /// Amplitude modulation (tremolo)
        const TREMOLO = 0x80;
        /// Frequency modulation (vibrato)
        const VIBRATO = 0x40;
        /// Hold the sustain level while the key is down
        const SUSTAIN = 0x20;
        /// Key scale rate
        const KEY_SCALE_RATE = 0x10;
    }
}

bitflags! {
    /// Depth and percussion control (register 0xBD)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RhythmFlags: u8 {
        /// Hi-hat key on
        const HI_HAT = 0x01;
        /// Top cymbal key on
        const CYMBAL = 0x02;
        /// Tom-tom key on
        const TOM_TOM = 0x04;
        /// Snare drum key on
        const SNARE = 0x08;
        /// Bass drum key on
        const BASS_DRUM = 0x10;
        /// Percussion mode enable
        const RHYTHM = 0x20;
        /// 14 cent vibrato depth (7 cent when clear)
        const DEEP_VIBRATO = 0x40;
        /// 4.8 dB tremolo depth (1 dB when clear)
        const DEEP_TREMOLO = 0x80;
    }
}

/// Waveform select enable bit in register 0x01
pub const WAVE_SELECT_ENABLE: u8 = 0x20;
/// Note select bit in register 0x08
pub const NOTE_SELECT: u8 = 0x40;
/// Key on bit in registers 0xB0-0xB8
pub const KEY_ON: u8 = 0x20;
/// OPL3 mode bit in register 0x105
pub const OPL3_ENABLE: u8 = 0x01;
/// Left output enable in registers 0xC0-0xC8 (OPL3 mode)
pub const PAN_LEFT: u8 = 0x10;
/// Right output enable in registers 0xC0-0xC8 (OPL3 mode)
pub const PAN_RIGHT: u8 = 0x20;

/// Register groups of one 256-byte bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterGroup {
    /// 0x01: test / waveform select enable
    Test,
    /// 0x02-0x04: timers (not emulated)
    Timer,
    /// 0x04 in the high bank: 4-op connection select
    FourOpSelect,
    /// 0x05 in the high bank: OPL3 mode
    NewMode,
    /// 0x08: CSM / note select
    NoteSelect,
    /// 0x20-0x35: AM / VIB / EGT / KSR / MULT
    Characteristic(OperatorSlot),
    /// 0x40-0x55: key scale level / total level
    Level(OperatorSlot),
    /// 0x60-0x75: attack rate / decay rate
    AttackDecay(OperatorSlot),
    /// 0x80-0x95: sustain level / release rate
    SustainRelease(OperatorSlot),
    /// 0xA0-0xA8: F-number low bits
    FrequencyLow(u8),
    /// 0xB0-0xB8: key on / block / F-number high bits
    KeyBlock(u8),
    /// 0xBD: tremolo and vibrato depth, rhythm
    Rhythm,
    /// 0xC0-0xC8: output / feedback / connection
    Connection(u8),
    /// 0xE0-0xF5: waveform select
    Waveform(OperatorSlot),
    /// Address with no function
    Unused,
}

/// Operator position within a bank: channel 0-8 and operator 0 (modulator) or 1 (carrier)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSlot {
    /// Channel within the bank
    pub channel: u8,
    /// 0 = modulator, 1 = carrier
    pub operator: u8,
}

impl OperatorSlot {
    /// Map the low five address bits to a slot
    ///
    /// Offsets 0x06, 0x07, 0x0E, 0x0F and 0x16+ have no operator.
    pub fn from_offset(offset: u8) -> Option<Self> {
        let group = offset / 8;
        let index = offset % 8;
        if group > 2 || index >= 6 {
            return None;
        }
        Some(Self {
            channel: group * 3 + index % 3,
            operator: index / 3,
        })
    }
}

impl RegisterGroup {
    /// Decode a bank-relative address
    ///
    /// `high_bank` selects the 0x100 array, where 0x04 and 0x05 have their
    /// OPL3-only meaning.
    pub fn decode(register: u8, high_bank: bool) -> Self {
        let slot = |base: u8| OperatorSlot::from_offset(register - base);
        let channel = |base: u8| {
            let ch = register - base;
            (ch < 9).then_some(ch)
        };

        let group = match register {
            0x01 if !high_bank => Some(RegisterGroup::Test),
            0x02..=0x04 if !high_bank => Some(RegisterGroup::Timer),
            0x04 => Some(RegisterGroup::FourOpSelect),
            0x05 if high_bank => Some(RegisterGroup::NewMode),
            0x08 if !high_bank => Some(RegisterGroup::NoteSelect),
            0x20..=0x35 => slot(0x20).map(RegisterGroup::Characteristic),
            0x40..=0x55 => slot(0x40).map(RegisterGroup::Level),
            0x60..=0x75 => slot(0x60).map(RegisterGroup::AttackDecay),
            0x80..=0x95 => slot(0x80).map(RegisterGroup::SustainRelease),
            0xA0..=0xA8 => channel(0xA0).map(RegisterGroup::FrequencyLow),
            0xBD if !high_bank => Some(RegisterGroup::Rhythm),
            0xB0..=0xB8 => channel(0xB0).map(RegisterGroup::KeyBlock),
            0xC0..=0xC8 => channel(0xC0).map(RegisterGroup::Connection),
            0xE0..=0xF5 => slot(0xE0).map(RegisterGroup::Waveform),
            _ => None,
        };
        group.unwrap_or(RegisterGroup::Unused)
    }
}

impl fmt::Display for RegisterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterGroup::Test => write!(f, "Test / wave select"),
            RegisterGroup::Timer => write!(f, "Timer"),
            RegisterGroup::FourOpSelect => write!(f, "4-op select"),
            RegisterGroup::NewMode => write!(f, "OPL3 mode"),
            RegisterGroup::NoteSelect => write!(f, "Note select"),
            RegisterGroup::Characteristic(s) => {
                write!(f, "Ch{} op{} AM/VIB/EGT/KSR/MULT", s.channel, s.operator)
            }
            RegisterGroup::Level(s) => write!(f, "Ch{} op{} KSL/TL", s.channel, s.operator),
            RegisterGroup::AttackDecay(s) => write!(f, "Ch{} op{} AR/DR", s.channel, s.operator),
            RegisterGroup::SustainRelease(s) => {
                write!(f, "Ch{} op{} SL/RR", s.channel, s.operator)
            }
            RegisterGroup::FrequencyLow(ch) => write!(f, "Ch{} F-number low", ch),
            RegisterGroup::KeyBlock(ch) => write!(f, "Ch{} key/block/F-number high", ch),
            RegisterGroup::Rhythm => write!(f, "Depth / rhythm"),
            RegisterGroup::Connection(ch) => write!(f, "Ch{} pan/feedback/connection", ch),
            RegisterGroup::Waveform(s) => write!(f, "Ch{} op{} waveform", s.channel, s.operator),
            RegisterGroup::Unused => write!(f, "Unused"),
        }
    }
}
