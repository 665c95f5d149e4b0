//! FLV demuxer: header probe, tag record parsing, AMF metadata, and the
//! AAC/MP3/AVC bitstream helpers (spec.md §4.2 "FLV Demuxer").

pub mod amf;
pub mod audio;
pub mod flv;
pub mod sps;
pub mod video;

pub use flv::{DemuxResult, FlvDemuxer, ProbeResult};
