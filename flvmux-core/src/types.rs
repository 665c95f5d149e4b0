//! Shared data model: tracks, samples, track metadata, and the one-shot
//! `MediaInfo` bundle. See spec.md §3.

use std::collections::VecDeque;

/// Per-sample flags used both in the `sdtp` box and `trun`'s per-sample
/// flags field (spec.md §4.3). `depends_on == 2` marks an I-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFlags {
    pub is_leading: u8,
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
    pub is_non_sync: u8,
}

impl SampleFlags {
    /// Flags for a video keyframe / any audio sample.
    pub fn sync() -> Self {
        Self {
            is_leading: 0,
            depends_on: 2,
            is_depended_on: 0,
            has_redundancy: 0,
            is_non_sync: 0,
        }
    }

    /// Flags for a non-keyframe video sample.
    pub fn non_sync() -> Self {
        Self {
            is_leading: 0,
            depends_on: 1,
            is_depended_on: 0,
            has_redundancy: 0,
            is_non_sync: 1,
        }
    }

    /// Byte encoding used by the `sdtp` box: `(isLeading<<6)|(dependsOn<<4)|(isDependedOn<<2)|hasRedundancy`.
    pub fn sdtp_byte(&self) -> u8 {
        (self.is_leading << 6) | (self.depends_on << 4) | (self.is_depended_on << 2) | self.has_redundancy
    }
}

/// A single length-prefixed NAL unit, as carried inside a video sample.
/// `data` already includes the `naluLengthSize`-byte big-endian length
/// header per the AVCDecoderConfigurationRecord.
#[derive(Debug, Clone)]
pub struct NaluRecord {
    pub nalu_type: u8,
    pub data: Vec<u8>,
}

/// One decodable unit of audio (spec.md §3 "Sample (audio)").
#[derive(Debug, Clone)]
pub struct AudioSample {
    pub dts: i64,
    pub pts: i64,
    pub duration: u32,
    pub size: u32,
    pub original_dts: i64,
    pub unit: Vec<u8>,
    pub flags: SampleFlags,
}

impl AudioSample {
    pub fn new(dts: i64, unit: Vec<u8>) -> Self {
        let size = unit.len() as u32;
        Self {
            dts,
            pts: dts,
            duration: 0,
            size,
            original_dts: dts,
            unit,
            flags: SampleFlags::sync(),
        }
    }
}

/// One decodable unit of video (spec.md §3 "Sample (video)").
#[derive(Debug, Clone)]
pub struct VideoSample {
    pub dts: i64,
    pub pts: i64,
    pub cts: i32,
    pub duration: u32,
    pub size: u32,
    pub is_keyframe: bool,
    pub original_dts: i64,
    pub units: Vec<NaluRecord>,
    pub flags: SampleFlags,
    pub file_position: Option<u64>,
}

impl VideoSample {
    pub fn new(dts: i64, cts: i32, is_keyframe: bool, units: Vec<NaluRecord>) -> Self {
        let size = units.iter().map(|u| u.data.len() as u32).sum();
        Self {
            dts,
            pts: dts + cts as i64,
            cts,
            duration: 0,
            size,
            is_keyframe,
            original_dts: dts,
            units,
            flags: if is_keyframe {
                SampleFlags::sync()
            } else {
                SampleFlags::non_sync()
            },
            file_position: None,
        }
    }
}

/// Track identifiers used throughout the pipeline (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video = 1,
    Audio = 2,
}

/// A mutable batch container for one track, drained on each remux pass.
#[derive(Debug, Default)]
pub struct SampleBatch<S> {
    pub sequence_number: u32,
    pub samples: VecDeque<S>,
    pub length: u64,
}

impl<S> SampleBatch<S> {
    pub fn new() -> Self {
        Self {
            sequence_number: 0,
            samples: VecDeque::new(),
            length: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.length = 0;
    }
}

/// Audio codec carried by the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// `mp4a.40.N`, N is the AAC object type (2 = LC, 5 = HE, 29 = HE-v2).
    Aac { object_type: u8 },
    Mp3,
}

impl AudioCodec {
    pub fn codec_mime(&self) -> String {
        match self {
            AudioCodec::Aac { object_type } => format!("mp4a.40.{object_type}"),
            AudioCodec::Mp3 => "mp3".to_string(),
        }
    }
}

/// Track metadata for audio (spec.md §3 "Track metadata (audio)").
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channel_count: u8,
    /// Raw `AudioSpecificConfig` bytes (empty for MP3).
    pub config: Vec<u8>,
    pub ref_sample_duration: f64,
    pub duration: u32,
}

impl AudioMetadata {
    pub fn compute_ref_sample_duration(codec: AudioCodec, timescale: u32, sample_rate: u32) -> f64 {
        let samples_per_frame = match codec {
            AudioCodec::Aac { .. } => 1024.0,
            AudioCodec::Mp3 => 1152.0,
        };
        samples_per_frame * timescale as f64 / sample_rate as f64
    }
}

/// Track metadata for video (spec.md §3 "Track metadata (video)").
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    /// Raw AVCDecoderConfigurationRecord bytes (the `avcC` payload).
    pub avcc: Vec<u8>,
    pub codec_mime: String,
    pub profile: String,
    pub level: String,
    pub coded_width: u32,
    pub coded_height: u32,
    pub present_width: u32,
    pub present_height: u32,
    pub frame_rate_fixed: bool,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub ref_sample_duration: f64,
    pub duration: u32,
}

impl VideoMetadata {
    pub fn compute_ref_sample_duration(timescale: u32, fps_num: u32, fps_den: u32) -> f64 {
        timescale as f64 * fps_den as f64 / fps_num as f64
    }
}

/// Keyframe index entries, parallel arrays as in spec.md §3 "MediaInfo".
#[derive(Debug, Clone, Default)]
pub struct KeyframesIndex {
    pub times: Vec<u32>,
    pub file_positions: Vec<u64>,
}

impl KeyframesIndex {
    pub fn push(&mut self, time_ms: u32, file_position: u64) {
        self.times.push(time_ms);
        self.file_positions.push(file_position);
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Binary search for the nearest keyframe at or before `ms` (spec.md §4.5).
    pub fn nearest(&self, ms: u32) -> Option<NearestKeyframe> {
        if self.times.is_empty() {
            return None;
        }
        let idx = match self.times.binary_search(&ms) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        Some(NearestKeyframe {
            index: idx,
            milliseconds: self.times[idx],
            file_position: self.file_positions[idx],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearestKeyframe {
    pub index: usize,
    pub milliseconds: u32,
    pub file_position: u64,
}

/// Aggregated, read-only bundle emitted exactly once per session
/// (spec.md §3 "MediaInfo").
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub mime_type: Option<String>,
    pub duration: Option<u32>,
    pub has_audio: bool,
    pub has_video: bool,
    pub audio: Option<AudioMetadata>,
    pub video: Option<VideoMetadata>,
    pub keyframes: KeyframesIndex,
}

impl MediaInfo {
    pub fn new(has_audio: bool, has_video: bool) -> Self {
        Self {
            mime_type: None,
            duration: None,
            has_audio,
            has_video,
            audio: None,
            video: None,
            keyframes: KeyframesIndex::default(),
        }
    }

    /// True once every field required by `has_audio`/`has_video` is
    /// populated. `duration` is not required here: a live session's
    /// `onMetaData` may never carry one, and that must not hold back
    /// `MediaInfo` forever (spec.md §3, §5 ordering guarantee).
    pub fn is_complete(&self) -> bool {
        if self.has_audio && self.audio.is_none() {
            return false;
        }
        if self.has_video && self.video.is_none() {
            return false;
        }
        true
    }

    pub fn finalize_mime(&mut self) {
        let mut codecs = Vec::new();
        if let Some(v) = &self.video {
            codecs.push(v.codec_mime.clone());
        }
        if let Some(a) = &self.audio {
            codecs.push(a.codec.codec_mime());
        }
        self.mime_type = Some(format!(r#"video/x-flv; codecs="{}""#, codecs.join(",")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdtp_byte_matches_spec_encoding() {
        let f = SampleFlags::non_sync();
        assert_eq!(f.sdtp_byte(), (0 << 6) | (1 << 4) | (0 << 2) | 0);
        let f = SampleFlags::sync();
        assert_eq!(f.sdtp_byte(), (0 << 6) | (2 << 4) | (0 << 2) | 0);
    }

    #[test]
    fn keyframes_index_nearest_before() {
        let mut idx = KeyframesIndex::default();
        idx.push(0, 9);
        idx.push(2000, 50_000);
        idx.push(4000, 100_000);
        idx.push(6000, 150_000);

        let n = idx.nearest(3000).unwrap();
        assert_eq!(n.index, 1);
        assert_eq!(n.milliseconds, 2000);
        assert_eq!(n.file_position, 50_000);
    }

    #[test]
    fn media_info_completeness() {
        let mut mi = MediaInfo::new(true, true);
        assert!(!mi.is_complete());
        mi.duration = Some(1000);
        assert!(!mi.is_complete());
        mi.video = Some(VideoMetadata {
            avcc: vec![],
            codec_mime: "avc1.42001f".into(),
            profile: "baseline".into(),
            level: "3.1".into(),
            coded_width: 640,
            coded_height: 360,
            present_width: 640,
            present_height: 360,
            frame_rate_fixed: true,
            frame_rate_num: 25,
            frame_rate_den: 1,
            ref_sample_duration: 40.0,
            duration: 1000,
        });
        assert!(!mi.is_complete());
        mi.audio = Some(AudioMetadata {
            codec: AudioCodec::Aac { object_type: 5 },
            sample_rate: 44100,
            channel_count: 2,
            config: vec![0x13, 0x90],
            ref_sample_duration: 23.2,
            duration: 1000,
        });
        assert!(mi.is_complete());
    }
}
