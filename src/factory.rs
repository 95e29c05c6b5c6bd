//! Emulator factory
//!
//! Maps a [`ChipVersion`] onto its implementation family. YM3526 and YM3812
//! share [`FmOplDevice`]; YMF262 uses [`Opl3Device`].

use crate::backend::EmulationDevice;
use crate::devices::{FmOplDevice, Opl3Device};
use crate::version::{ChipTopology, ChipVersion};
use crate::{OplError, Result};
use log::debug;

/// Create an emulation device for the requested chip
///
/// The returned device reports exactly `version`, `sample_rate` and
/// `topology`. Dispatch on the version cannot fail; the only error is a zero
/// sample rate.
///
/// # Example
///
/// ```
/// use ymf262::{create_instance, ChipTopology, ChipVersion};
///
/// let device = create_instance(ChipVersion::Ymf262, 48_000, ChipTopology::Opl3).unwrap();
/// assert_eq!(device.version(), ChipVersion::Ymf262);
/// assert_eq!(device.sample_rate(), 48_000);
/// ```
pub fn create_instance(
    version: ChipVersion,
    sample_rate: u32,
    topology: ChipTopology,
) -> Result<Box<dyn EmulationDevice>> {
    if sample_rate == 0 {
        return Err(OplError::ConfigError(
            "sample rate must be greater than zero".to_string(),
        ));
    }

    debug!(
        "Creating {} emulator ({}, {} Hz)",
        version, topology, sample_rate
    );

    let device: Box<dyn EmulationDevice> = match version {
        ChipVersion::Ym3526 | ChipVersion::Ym3812 => {
            Box::new(FmOplDevice::new(version, sample_rate, topology))
        }
        ChipVersion::Ymf262 => Box::new(Opl3Device::new(sample_rate, topology)),
    };
    Ok(device)
}
