use super::opcode::Opcode;
use thiserror::Error;

/// Conditions reported by the interpreter.
///
/// Only `ProgramTooLarge` rejects an operation. The others come out of
/// `Chip8::cycle` after the offending instruction has been skipped, so the
/// machine can keep running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("program is too large ({size} bytes), maximum is {max} bytes")]
    ProgramTooLarge { size: usize, max: usize },

    #[error("invalid opcode {opcode} at {pc:#05X}")]
    InvalidOpcode { opcode: Opcode, pc: u16 },

    #[error("return with an empty call stack at {pc:#05X}")]
    StackUnderflow { pc: u16 },

    #[error("call stack overflow at {pc:#05X}")]
    StackOverflow { pc: u16 },
}
