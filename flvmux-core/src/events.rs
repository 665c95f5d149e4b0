//! Core → consumer events (spec.md §6).

use crate::error::FlvMuxError;
use crate::index::SyncPoint;
use crate::types::{MediaInfo, TrackType};

/// One `ftyp`+`moov` initialization segment, emitted once per track.
#[derive(Debug, Clone)]
pub struct InitSegment {
    pub track_type: TrackType,
    pub data: Vec<u8>,
    pub codec: String,
    pub container: &'static str,
    pub media_duration: u32,
}

/// Summary info attached to a `MediaSegment`, built from the segment's
/// first/last sample and its sync points (spec.md §4.4 "Segment emission").
#[derive(Debug, Clone)]
pub struct MediaSegmentInfoSummary {
    pub begin_dts: i64,
    pub end_dts: i64,
    pub begin_pts: i64,
    pub end_pts: i64,
    pub original_begin_dts: i64,
    pub original_end_dts: i64,
    pub sync_points: Vec<SyncPoint>,
}

/// One `moof`+`mdat` media segment.
#[derive(Debug, Clone)]
pub struct MediaSegment {
    pub track_type: TrackType,
    pub data: Vec<u8>,
    pub sample_count: u32,
    pub info: MediaSegmentInfoSummary,
    pub timestamp_offset: Option<u32>,
}

/// `PipelineStatistics` (SPEC_FULL.md §3 "`Statistics` event payload"):
/// the fields a real consumer would plot, populated by the I/O controller
/// (bytes/speed) and the remuxer (sample counts/buffer depth) respectively.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStatistics {
    pub total_bytes_loaded: u64,
    pub current_speed_kbps: f64,
    pub audio_sample_count: u64,
    pub video_sample_count: u64,
    pub stash_buffer_depth: usize,
}

/// Error event payload (spec.md §6: `Error(kind, detail, info)`).
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub kind: &'static str,
    pub detail: String,
}

impl From<&FlvMuxError> for ErrorEvent {
    fn from(err: &FlvMuxError) -> Self {
        Self { kind: err.kind(), detail: err.to_string() }
    }
}

/// Everything the core can emit to a consumer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    MediaInfo(MediaInfo),
    InitSegment(InitSegment),
    MediaSegment(MediaSegment),
    LoadingComplete,
    RecoveredEarlyEof,
    Statistics(PipelineStatistics),
    /// Fired before acting on a non-keyframe-aligned seek when
    /// `accurate_seek` is not set (SPEC_FULL.md §3).
    RecommendSeekpoint(u32),
    Error(ErrorEvent),
}
