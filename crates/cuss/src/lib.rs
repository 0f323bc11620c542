//! CUSS — the Completely Useless System Simulator for the CUP 32-bit RISC core.
//!
//! This crate implements the CPU state, instruction decoder/disassembler,
//! operation dispatch table, and the Executor/Monitor concurrency glue. The
//! flat physical memory and image loader live in [`cuss_mem`].

pub mod cli;
pub mod concurrency;
pub mod cpu;
pub mod decode;
pub mod flags;
pub mod monitor;
pub mod ops;

pub use concurrency::{Machine, SharedState};
pub use cpu::{Cpu, CpuState};
pub use monitor::{run_monitor, MonitorIo, StdIo};
pub use ops::{execute_one, OpTable};
