//! Fungen Processing Core
//!
//! Turns a raw per-frame inference signal into timed position actions:
//! - **Denoise:** windowed frequency-domain low-pass
//! - **Smooth:** moving average
//! - **Extrema:** topographic prominence with a ratio/absolute dual threshold
//! - **Merge:** collapse extrema closer than the merge threshold
//! - **Slope:** rate-of-change limits on the action sequence
//! - **Recommend:** propose options from signal statistics
//!
//! This crate is pure computation: no I/O, no retained state between calls.
//! Identical input and options always produce identical output.

pub mod denoise;
pub mod extrema;
pub mod merge;
pub mod pipeline;
pub mod recommend;
pub mod slope;
pub mod smooth;
mod stats;

pub use pipeline::{process, PostProcessor, ProcessingError};
pub use recommend::recommend;
