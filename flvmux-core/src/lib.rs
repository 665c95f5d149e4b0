//! # flvmux-core
//!
//! The core of an FLV-to-fragmented-MP4 transmuxing pipeline: a stash-buffered
//! streaming I/O controller, an FLV tag demuxer (AAC/MP3/AVC), an ISO BMFF
//! box generator, and a stateful fMP4 remuxer that corrects timestamps across
//! discontinuities and fills AAC gaps. No networking, no decoding, no
//! containers besides FLV.
//!
//! [`Transmuxer`] wires the three subsystems behind one open/seek/pause/
//! resume/close control surface; callers that only need one subsystem (a
//! box generator, say) can reach it through the `demux`/`remux`/`io` modules
//! directly.

pub mod config;
pub mod demux;
pub mod error;
pub mod events;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod remux;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{RemuxConfig, SeekType};
pub use demux::audio::UaProfile;
pub use error::{DemuxError, FlvMuxError, RemuxError, Result, TransportError};
pub use events::{ErrorEvent, PipelineEvent};
pub use pipeline::Transmuxer;
