//! Wire-line batching for replies that enumerate channel state.

pub mod modes;
pub mod names;

pub use modes::{ModeChange, ModeLineBatcher};
pub use names::{names_lines, NamesEntry, NamesOptions};
