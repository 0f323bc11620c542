//! The error taxonomy shared by every CUSS component.
//!
//! Each failure carries its own typed fields rather than a formatted
//! message, with a `Display` impl rendering the equivalent text.

use thiserror::Error;

/// Result alias used throughout the CUSS workspace.
pub type CuResult<T> = Result<T, CuError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CuError {
    #[error("address out of bounds (addr={addr:#010x})")]
    BadAddress { addr: u32 },

    #[error("bad register (r{index})")]
    BadRegister { index: u8 },

    #[error("unaligned program counter (pc={pc:#010x})")]
    UnalignedPc { pc: u32 },

    #[error("bad instruction (op0={op0:#04x})")]
    BadInstruction { op0: u8 },

    #[error("bad instruction (op0={op0:#04x}, op1={op1:#04x})")]
    BadRTypeInstruction { op0: u8, op1: u8 },

    #[error("division by zero (pc={pc:#010x})")]
    DivideByZero { pc: u32 },

    #[error("truncated section header ({got} < {want} bytes)")]
    TruncatedSectionHeader { got: usize, want: usize },

    #[error("truncated section data at base={base:#010x} ({got} < {want} bytes)")]
    TruncatedSectionData { base: u32, got: usize, want: usize },

    #[error(
        "section out of bounds (base={base:#010x} + length={length:#010x} > {mem_size:#010x})"
    )]
    OutOfBoundsSection {
        base: u32,
        length: u32,
        mem_size: u32,
    },

    #[error("i/o error: {message}")]
    Io { message: String },

    #[error("breakpoint table full")]
    BreakpointTableFull,

    #[error("breakpoint not found (addr={addr:#010x})")]
    BreakpointNotFound { addr: u32 },

    #[error("bad CPU state transition: {message}")]
    BadState { message: String },
}

impl From<std::io::Error> for CuError {
    fn from(err: std::io::Error) -> Self {
        CuError::Io {
            message: err.to_string(),
        }
    }
}
