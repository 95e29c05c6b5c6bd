//! Concrete emulation device families
//!
//! - [`FmOplDevice`]: YM3526 and YM3812, one or two chips
//! - [`Opl3Device`]: YMF262

mod fmopl;
mod opl3;

pub use fmopl::FmOplDevice;
pub use opl3::Opl3Device;

/// Convert a raw chip sum to a normalized sample
#[inline]
pub(crate) fn to_output(sample: i32) -> f32 {
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as f32 / 32768.0
}
