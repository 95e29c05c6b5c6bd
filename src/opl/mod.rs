//! FM synthesis engine
//!
//! A compact integer model of the OPL family: table-driven waveforms, 9-bit
//! attenuation envelopes, a shared tremolo/vibrato LFO and the 2-op, 4-op
//! and rhythm connection modes. It follows the chips' behavior closely but is
//! not cycle exact.
//!
//! The engine is driven through [`OplChip`]; the other modules are its parts.

pub mod channel;
pub mod chip;
pub mod envelope;
pub mod lfo;
pub mod operator;
pub mod registers;
pub mod tables;

pub use chip::{OplChip, BANK_CHANNELS, MAX_CHANNELS};
pub use registers::{OperatorFlags, RegisterGroup, RhythmFlags};
pub use tables::OPL_RATE;
