//! Channel register state and operator connection modes

use super::registers::{KEY_ON, PAN_LEFT, PAN_RIGHT};

/// How a 2-op channel's operators are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// Modulator feeds carrier
    Fm,
    /// Modulator and carrier summed
    Additive,
}

/// How the four operators of a paired channel are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FourOpConnection {
    /// op0 -> op1 -> op2 -> op3
    FmFm,
    /// op0 + (op1 -> op2 -> op3)
    AmFm,
    /// (op0 -> op1) + (op2 -> op3)
    FmAm,
    /// op0 + (op1 -> op2) + op3
    AmAm,
}

impl FourOpConnection {
    /// Decode from the CNT bits of the primary and secondary channel
    pub fn from_cnt(primary: bool, secondary: bool) -> Self {
        match (primary, secondary) {
            (false, false) => FourOpConnection::FmFm,
            (true, false) => FourOpConnection::AmFm,
            (false, true) => FourOpConnection::FmAm,
            (true, true) => FourOpConnection::AmAm,
        }
    }
}

/// Register state of one channel (0xA0 / 0xB0 / 0xC0 groups)
#[derive(Debug, Clone, Default)]
pub struct Channel {
    fnum: u16,
    block: u8,
    key_on: bool,
    reg_c0: u8,
    /// Last two modulator outputs, for feedback
    pub(crate) feedback_history: [i32; 2],
}

impl Channel {
    /// Register 0xA0+n; returns true if the pitch changed
    pub fn write_frequency_low(&mut self, value: u8) -> bool {
        let fnum = (self.fnum & 0x300) | value as u16;
        let changed = fnum != self.fnum;
        self.fnum = fnum;
        changed
    }

    /// Register 0xB0+n; returns the new key state if it toggled
    pub fn write_key_block(&mut self, value: u8) -> Option<bool> {
        self.fnum = (self.fnum & 0xFF) | (((value & 0x03) as u16) << 8);
        self.block = (value >> 2) & 0x07;
        let key_on = value & KEY_ON != 0;
        if key_on != self.key_on {
            self.key_on = key_on;
            Some(key_on)
        } else {
            None
        }
    }

    /// Register 0xC0+n
    pub fn write_connection(&mut self, value: u8) {
        self.reg_c0 = value;
    }

    /// Raw 0xC0 value
    pub fn connection_register(&self) -> u8 {
        self.reg_c0
    }

    /// 10-bit F-number
    pub fn fnum(&self) -> u16 {
        self.fnum
    }

    /// 3-bit block (octave)
    pub fn block(&self) -> u8 {
        self.block
    }

    /// Key code used for rate scaling
    pub fn key_code(&self, note_select: bool) -> u8 {
        let bit = if note_select {
            (self.fnum >> 8) & 1
        } else {
            (self.fnum >> 9) & 1
        };
        (self.block << 1) | bit as u8
    }

    /// CNT bit: additive connection
    pub fn additive(&self) -> bool {
        self.reg_c0 & 0x01 != 0
    }

    /// Two-operator connection
    pub fn connection(&self) -> Connection {
        if self.additive() {
            Connection::Additive
        } else {
            Connection::Fm
        }
    }

    /// Modulator self-feedback amount for the current history
    #[inline]
    pub fn feedback(&self) -> i32 {
        let fb = (self.reg_c0 >> 1) & 0x07;
        if fb == 0 {
            return 0;
        }
        (self.feedback_history[0] + self.feedback_history[1]) >> (9 - fb)
    }

    /// Push a new modulator output into the feedback history
    #[inline]
    pub fn push_feedback(&mut self, output: i32) {
        self.feedback_history[0] = self.feedback_history[1];
        self.feedback_history[1] = output;
    }

    /// Output enables; both sides are always on outside OPL3 mode
    pub fn panning(&self, opl3_mode: bool) -> (bool, bool) {
        if !opl3_mode {
            return (true, true);
        }
        (self.reg_c0 & PAN_LEFT != 0, self.reg_c0 & PAN_RIGHT != 0)
    }

    /// Copy pitch from a primary channel of a 4-op pair
    pub fn follow(&mut self, primary: &Channel) {
        self.fnum = primary.fnum;
        self.block = primary.block;
    }
}
