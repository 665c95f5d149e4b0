//! Stash-buffered streaming I/O controller (spec.md §4.1).

pub mod controller;
pub mod loader;
pub mod stash;

pub use controller::{ArrivalOutcome, DataSink, IoController, StashConfig};
pub use loader::{ByteRange, ParamSeekHandler, RangeSeekHandler, SeekHandler, SeekRequest};
