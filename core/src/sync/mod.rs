//! Folding settled rollups into local wallet state.

pub mod processor;
pub mod service;

pub use processor::{BlockOutcome, BlockProcessor};
pub use service::RollupSync;
