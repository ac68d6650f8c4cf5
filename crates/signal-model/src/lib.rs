//! Fungen Signal Model
//!
//! Defines the core data contracts shared by the pipeline, cache and queue:
//! - **RawSignal:** per-frame inference output, immutable once built
//! - **PostprocessOptions:** tunable pipeline parameters and their domain table
//! - **Funscript:** ordered timed position actions plus provenance metadata
//! - **Recommendation:** suggested option values with a readable rationale
//!
//! Positions are always on the `[0, 100]` scale and timestamps are in
//! milliseconds from the start of the video.

pub mod funscript;
pub mod model;
pub mod options;
pub mod recommendation;
pub mod signal;

pub use funscript::*;
pub use model::*;
pub use options::*;
pub use recommendation::*;
pub use signal::*;
