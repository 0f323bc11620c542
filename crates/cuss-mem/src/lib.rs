//! Flat physical memory for the CUP core: little-endian byte/half-word/word
//! access over a 1 MiB address space, and the section-based memory-image
//! loader.

mod error;
mod memory;
mod word;

pub use error::{CuError, CuResult};
pub use memory::{Memory, MEM_SIZE};
pub use word::Word;
