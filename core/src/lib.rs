//! Client engine for the Cloak privacy rollup: wallet stores, note
//! selection, join-split assembly and chain sync.

pub mod chain;
pub mod engine;
pub mod joinsplit;
pub mod note_picker;
pub mod storage;
pub mod sync;

pub use engine::{CoreEngine, InitAction, InitState};

#[cfg(test)]
mod tests;
