//! [`MathCache`](crate::application::repos::MathCache) adapters.
//!
//! The render pipeline treats storage as an external key-value store. These
//! adapters back the command-line tool: an in-memory LRU for one-off runs and
//! a directory of JSON entries that persists across runs.

mod file;
mod memory;

pub use file::FileMathCache;
pub use memory::MemoryMathCache;
