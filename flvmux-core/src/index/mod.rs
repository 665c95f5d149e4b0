//! Seek indices: the IDR sample list and the per-track media-segment-info
//! list (spec.md §3, §4.5).

pub mod idr;
pub mod segment_info;

pub use idr::{IdrSampleInfo, IdrSampleList};
pub use segment_info::{MediaSegmentInfo, MediaSegmentInfoList, SampleInfo, SyncPoint};
