use std::fmt;

/// A two-byte CHIP-8 instruction word, stored big-endian in memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    pub fn from_bytes(high: u8, low: u8) -> Self {
        Self((high as u16) << 8 | low as u16)
    }

    /// top nibble, selects the handler
    pub fn family(self) -> usize {
        ((self.0 & 0xF000) >> 12) as usize
    }

    /// register index in bits 8-11
    pub fn x(self) -> usize {
        ((self.0 & 0xF00) >> 8) as usize
    }

    /// register index in bits 4-7
    pub fn y(self) -> usize {
        ((self.0 & 0xF0) >> 4) as usize
    }

    pub fn n(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    pub fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn nnn(self) -> u16 {
        self.0 & 0xFFF
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}
