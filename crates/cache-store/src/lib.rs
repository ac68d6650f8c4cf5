//! Fungen Cache
//!
//! Content-addressed storage for the two persisted artifacts of a job:
//! the raw inference signal (a tabular text file) and the funscript.
//! A [`Fingerprint`] identifies a (source video, model) pair; the
//! [`CacheStore`] maps it to artifact paths, reads cached signals back and
//! writes new artifacts atomically.

pub mod error;
pub mod fingerprint;
pub mod store;
pub mod tabular;

pub use error::CacheError;
pub use fingerprint::Fingerprint;
pub use store::{CacheStore, CachedSignal};
