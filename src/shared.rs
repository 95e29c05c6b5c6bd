//! Sharing one device between a register writer and an audio reader
//!
//! The sequencer thread pushes [`RegisterWrite`]s while the audio thread pulls
//! sample blocks. Both go through one `parking_lot` mutex; a batch of writes is
//! applied under a single lock so a block is never rendered from a half
//! updated register set.

use crate::backend::EmulationDevice;
use parking_lot::Mutex;
use std::sync::Arc;

/// One register write, tagged with the write path it uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    /// Single-chip path
    Opl2 {
        /// Register address
        register: u8,
        /// Register value
        value: u8,
    },
    /// Dual-chip path
    DualOpl2 {
        /// Physical chip (0 or 1)
        bank: u8,
        /// Register address
        register: u8,
        /// Register value
        value: u8,
    },
    /// Extended register-set path
    Opl3 {
        /// Register bank (0 = 0x000, 1 = 0x100)
        base: u8,
        /// Register address
        register: u8,
        /// Register value
        value: u8,
    },
}

impl RegisterWrite {
    /// Send this write to a device
    #[inline]
    pub fn apply(&self, device: &mut dyn EmulationDevice) {
        match *self {
            RegisterWrite::Opl2 { register, value } => device.write_opl2(register, value),
            RegisterWrite::DualOpl2 {
                bank,
                register,
                value,
            } => device.write_dual_opl2(bank, register, value),
            RegisterWrite::Opl3 {
                base,
                register,
                value,
            } => device.write_opl3(base, register, value),
        }
    }

    /// Chip or bank selector (0 for the single-chip path)
    pub fn bank(&self) -> u8 {
        match *self {
            RegisterWrite::Opl2 { .. } => 0,
            RegisterWrite::DualOpl2 { bank, .. } => bank,
            RegisterWrite::Opl3 { base, .. } => base,
        }
    }

    /// Register address
    pub fn register(&self) -> u8 {
        match *self {
            RegisterWrite::Opl2 { register, .. }
            | RegisterWrite::DualOpl2 { register, .. }
            | RegisterWrite::Opl3 { register, .. } => register,
        }
    }

    /// Register value
    pub fn value(&self) -> u8 {
        match *self {
            RegisterWrite::Opl2 { value, .. }
            | RegisterWrite::DualOpl2 { value, .. }
            | RegisterWrite::Opl3 { value, .. } => value,
        }
    }
}

/// Cloneable handle to a device shared across threads
#[derive(Clone)]
pub struct SharedDevice {
    inner: Arc<Mutex<Box<dyn EmulationDevice>>>,
}

impl SharedDevice {
    /// Wrap a device
    pub fn new(device: Box<dyn EmulationDevice>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Apply one write
    pub fn write(&self, write: RegisterWrite) {
        write.apply(self.inner.lock().as_mut());
    }

    /// Apply a batch of writes atomically with respect to [`read`](Self::read)
    pub fn write_batch(&self, writes: &[RegisterWrite]) {
        let mut device = self.inner.lock();
        for write in writes {
            write.apply(device.as_mut());
        }
    }

    /// Render the next block of interleaved stereo samples
    pub fn read(&self, buffer: &mut [f32]) {
        self.inner.lock().read(buffer);
    }

    /// Restore the power-on state
    pub fn reset(&self) {
        self.inner.lock().reset_opl();
    }

    /// Run a closure with exclusive access to the device
    pub fn with_device<R>(&self, f: impl FnOnce(&mut dyn EmulationDevice) -> R) -> R {
        let mut device = self.inner.lock();
        f(device.as_mut())
    }
}

impl std::fmt::Debug for SharedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let device = self.inner.lock();
        f.debug_struct("SharedDevice")
            .field("version", &device.version())
            .field("topology", &device.topology())
            .field("sample_rate", &device.sample_rate())
            .finish()
    }
}
