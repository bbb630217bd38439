//! A CHIP-8 virtual machine.
//!
//! [`Chip8`] owns all machine state and runs one instruction per
//! [`Chip8::cycle`]. The [`host`] module has the window-independent pieces a
//! front end needs: tick scheduling and the keypad layout.

pub mod chip8;
pub mod host;

pub use crate::chip8::{Chip8, Error};
