//! fMP4 remuxing: ISO BMFF box generation, silent-frame tables, and the
//! stateful per-track remuxer (spec.md §4.3, §4.4).

pub mod mp4box;
pub mod remuxer;
pub mod silence;

pub use remuxer::{Remuxer, RemuxerConfig};
