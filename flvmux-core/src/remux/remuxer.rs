//! fMP4 remuxer: DTS correction, duration interpolation, silent-frame gap
//! fill, IDR forcing, and segment emission (spec.md §4.4).

use std::collections::VecDeque;

use tracing::debug;

use super::mp4box::{self, TrunSample};
use super::silence;
use crate::index::{IdrSampleInfo, IdrSampleList, MediaSegmentInfoList, SampleInfo};
use crate::types::{AudioCodec, AudioMetadata, AudioSample, SampleBatch, SampleFlags, TrackType, VideoMetadata, VideoSample};
use crate::events::{MediaSegment, MediaSegmentInfoSummary};

/// Workaround flags the remuxer needs (spec.md §9 "Platform workarounds");
/// the rest of `RemuxConfig` lives in `crate::config`.
#[derive(Debug, Clone, Copy)]
pub struct RemuxerConfig {
    pub fix_audio_timestamp_gap: bool,
    pub force_idr_on_first_sample: bool,
    pub seek_start_silent_padding: bool,
    pub is_live: bool,
}

impl Default for RemuxerConfig {
    fn default() -> Self {
        Self {
            fix_audio_timestamp_gap: false,
            force_idr_on_first_sample: false,
            seek_start_silent_padding: false,
            is_live: false,
        }
    }
}

#[derive(Default)]
struct AudioTrackState {
    next_dts: Option<i64>,
    last_known_duration: Option<u32>,
    stashed: Option<AudioSample>,
    sequence_number: u32,
    segment_info_list: MediaSegmentInfoList,
    pending_seek_offset: bool,
}

#[derive(Default)]
struct VideoTrackState {
    next_dts: Option<i64>,
    last_known_duration: Option<u32>,
    stashed: Option<VideoSample>,
    sequence_number: u32,
    segment_info_list: MediaSegmentInfoList,
    idr_samples: IdrSampleList,
}

/// Corrects DTS/PTS across discontinuities, interpolates sample durations,
/// applies the AAC silent-frame/IDR-forcing workarounds, and emits
/// `moof`+`mdat` media segments (spec.md §4.4).
pub struct Remuxer {
    dts_base: Option<i64>,
    config: RemuxerConfig,
    audio: AudioTrackState,
    video: VideoTrackState,
}

fn compute_correction(next_dts: Option<i64>, segment_list: &MediaSegmentInfoList, first_sample_original_dts: i64) -> i64 {
    if let Some(next) = next_dts {
        return first_sample_original_dts - next;
    }
    match segment_list.find_segment_before(first_sample_original_dts) {
        None => 0,
        Some(seg) => {
            let last = seg.last_sample;
            let mut distance = first_sample_original_dts - (last.original_dts + last.duration as i64);
            if distance.abs() <= 3 {
                distance = 0;
            }
            let expected_dts = last.dts + last.duration as i64 + distance;
            first_sample_original_dts - expected_dts
        }
    }
}

impl Remuxer {
    pub fn new(config: RemuxerConfig) -> Self {
        Self { dts_base: None, config, audio: AudioTrackState::default(), video: VideoTrackState::default() }
    }

    /// Video keyframes recorded so far, in arrival order (spec.md §3
    /// `IDRSampleList`). Appended to as each video batch is remuxed; a
    /// backward jump (seek/replay) resets the list from that point, per
    /// [`IdrSampleList::append_array`].
    pub fn idr_samples(&self) -> &[IdrSampleInfo] {
        self.video.idr_samples.as_slice()
    }

    /// Clears stashed samples and segment-info lists for both tracks
    /// (spec.md §4.5 "On player-level seek"); `dts_base` is left intact,
    /// as translating *future* originalDts values by the session-wide base
    /// remains correct after a seek.
    pub fn seek(&mut self) {
        self.audio.stashed = None;
        self.audio.next_dts = None;
        self.audio.segment_info_list.clear();
        self.audio.pending_seek_offset = true;
        self.video.stashed = None;
        self.video.next_dts = None;
        self.video.segment_info_list.clear();
    }

    /// `flushStashedSamples`: reinject each track's stashed trailing sample
    /// as a one-sample forced batch (spec.md §4.4).
    pub fn flush_stashed_samples(
        &mut self,
        audio_meta: Option<&AudioMetadata>,
        video_meta: Option<&VideoMetadata>,
    ) -> (Option<MediaSegment>, Option<MediaSegment>) {
        let mut empty_audio = SampleBatch::new();
        let mut empty_video = SampleBatch::new();
        let audio_seg = if self.audio.stashed.is_some() {
            audio_meta.and_then(|m| self.remux_audio(m, &mut empty_audio, true, None))
        } else {
            None
        };
        let video_seg = if self.video.stashed.is_some() {
            video_meta.and_then(|m| self.remux_video(m, &mut empty_video, true))
        } else {
            None
        };
        (audio_seg, video_seg)
    }

    /// Top-level entry: sets `dtsBase` from the first batch after `open`,
    /// then remuxes each track in turn (video first, so the audio
    /// seek-start-padding rule can see the video segment's `beginDts`).
    pub fn remux(
        &mut self,
        audio_meta: Option<&AudioMetadata>,
        audio_batch: &mut SampleBatch<AudioSample>,
        video_meta: Option<&VideoMetadata>,
        video_batch: &mut SampleBatch<VideoSample>,
        force: bool,
    ) -> (Option<MediaSegment>, Option<MediaSegment>) {
        if self.dts_base.is_none() {
            let a = audio_batch.samples.front().map(|s| s.original_dts);
            let v = video_batch.samples.front().map(|s| s.original_dts);
            self.dts_base = match (a, v) {
                (Some(a), Some(v)) => Some(a.min(v)),
                (Some(a), None) => Some(a),
                (None, Some(v)) => Some(v),
                (None, None) => None,
            };
        }

        let video_seg = video_meta.and_then(|m| self.remux_video(m, video_batch, force));
        let video_begin_dts = video_seg.as_ref().map(|s| s.info.begin_dts);
        let audio_seg = audio_meta.and_then(|m| self.remux_audio(m, audio_batch, force, video_begin_dts));
        (audio_seg, video_seg)
    }

    fn remux_audio(
        &mut self,
        meta: &AudioMetadata,
        batch: &mut SampleBatch<AudioSample>,
        force: bool,
        video_begin_dts: Option<i64>,
    ) -> Option<MediaSegment> {
        let dts_base = self.dts_base?;
        let mut combined: VecDeque<AudioSample> = VecDeque::new();
        if let Some(tail) = self.audio.stashed.take() {
            combined.push_back(tail);
        }
        combined.extend(batch.samples.drain(..));
        batch.clear();

        if combined.len() < 2 && !force {
            self.audio.stashed = combined.pop_front();
            return None;
        }
        if combined.is_empty() {
            return None;
        }

        // Correct the whole combined run (stash included) in one pass: a
        // single constant offset derived from its first sample keeps every
        // sample's relative spacing intact.
        let first_adjusted = combined[0].original_dts - dts_base;
        let correction = compute_correction(self.audio.next_dts, &self.audio.segment_info_list, first_adjusted);
        for s in combined.iter_mut() {
            let adjusted = s.original_dts - dts_base;
            s.dts = adjusted - correction;
            s.pts = s.dts;
        }

        let ref_dur = meta.ref_sample_duration;
        let len = combined.len();
        let mut ready: Vec<AudioSample> = Vec::with_capacity(len);
        for (i, mut s) in combined.into_iter().enumerate() {
            if i + 1 < len {
                // duration filled in on the next pass once we know next.dts
                ready.push(s);
            } else if force {
                s.duration = self.audio.last_known_duration.unwrap_or(ref_dur.floor() as u32);
                ready.push(s);
            } else {
                self.audio.stashed = Some(s);
            }
        }
        // second pass: now that `ready` holds every sample but the last
        // that will be emitted, fill in durations from dts deltas.
        for i in 0..ready.len().saturating_sub(1) {
            let next_dts = ready[i + 1].dts;
            ready[i].duration = (next_dts - ready[i].dts) as u32;
        }
        if let (Some(stash), Some(last)) = (&self.audio.stashed, ready.last_mut()) {
            last.duration = (stash.dts - last.dts) as u32;
        }
        if ready.is_empty() {
            return None;
        }

        if self.config.seek_start_silent_padding && self.audio.pending_seek_offset {
            if let (Some(video_begin), AudioCodec::Aac { .. }) = (video_begin_dts, meta.codec) {
                if ready[0].dts > video_begin {
                    let mut silence_sample = ready[0].clone();
                    silence_sample.dts = video_begin;
                    silence_sample.pts = video_begin;
                    silence_sample.duration = (ready[0].dts - video_begin) as u32;
                    silence_sample.unit = silence::silent_frame_for(meta.channel_count, &ready[0].unit).to_vec();
                    silence_sample.size = silence_sample.unit.len() as u32;
                    ready.insert(0, silence_sample);
                }
            }
        }

        if self.config.fix_audio_timestamp_gap {
            if let AudioCodec::Aac { .. } = meta.codec {
                apply_silent_gap_fill(&mut ready, ref_dur, meta.channel_count);
            }
        }

        let is_mp3 = matches!(meta.codec, AudioCodec::Mp3);
        let timestamp_offset = if is_mp3 && self.audio.pending_seek_offset { Some(ready[0].dts as u32) } else { None };
        self.audio.pending_seek_offset = false;

        let sample_count = ready.len() as u32;
        let first = ready.first().unwrap().clone();
        let last = ready.last().unwrap().clone();
        let sync_points: Vec<SampleInfo> = ready
            .iter()
            .map(|s| SampleInfo { dts: s.dts, pts: s.pts, original_dts: s.original_dts, duration: s.duration })
            .collect();

        let data = if is_mp3 {
            let mut payload = Vec::new();
            for s in &ready {
                payload.extend_from_slice(&s.unit);
            }
            payload
        } else {
            let trun_samples: Vec<TrunSample> = ready
                .iter()
                .map(|s| TrunSample {
                    duration: s.duration,
                    size: s.size,
                    flags: s.flags,
                    composition_time_offset: 0,
                })
                .collect();
            let moof = mp4box::moof(TrackType::Audio as u32, self.audio.sequence_number + 1, first.dts as u32, &trun_samples);
            let mut payload = Vec::new();
            for s in &ready {
                payload.extend_from_slice(&s.unit);
            }
            let mdat = mp4box::mdat(&payload);
            let mut out = Vec::with_capacity(moof.len() + mdat.len());
            out.extend_from_slice(&moof);
            out.extend_from_slice(&mdat);
            out
        };

        self.audio.sequence_number += 1;
        self.audio.next_dts = Some(last.dts + last.duration as i64);
        self.audio.last_known_duration = Some(last.duration);

        let info = MediaSegmentInfoSummary {
            begin_dts: first.dts,
            end_dts: last.dts + last.duration as i64,
            begin_pts: first.pts,
            end_pts: last.pts + last.duration as i64,
            original_begin_dts: first.original_dts,
            original_end_dts: last.original_dts,
            sync_points: sync_points.clone(),
        };

        if !self.config.is_live {
            self.audio.segment_info_list.insert(crate::index::MediaSegmentInfo {
                begin_dts: info.begin_dts,
                end_dts: info.end_dts,
                begin_pts: info.begin_pts,
                end_pts: info.end_pts,
                original_begin_dts: info.original_begin_dts,
                original_end_dts: info.original_end_dts,
                first_sample: SampleInfo { dts: first.dts, pts: first.pts, original_dts: first.original_dts, duration: first.duration },
                last_sample: SampleInfo { dts: last.dts, pts: last.pts, original_dts: last.original_dts, duration: last.duration },
                sync_points,
            });
        }

        Some(MediaSegment {
            track_type: TrackType::Audio,
            data,
            sample_count,
            info,
            timestamp_offset,
        })
    }

    fn remux_video(&mut self, meta: &VideoMetadata, batch: &mut SampleBatch<VideoSample>, force: bool) -> Option<MediaSegment> {
        let dts_base = self.dts_base?;
        let mut combined: VecDeque<VideoSample> = VecDeque::new();
        if let Some(tail) = self.video.stashed.take() {
            combined.push_back(tail);
        }
        combined.extend(batch.samples.drain(..));
        batch.clear();

        if combined.len() < 2 && !force {
            self.video.stashed = combined.pop_front();
            return None;
        }
        if combined.is_empty() {
            return None;
        }

        let first_adjusted = combined[0].original_dts - dts_base;
        let correction = compute_correction(self.video.next_dts, &self.video.segment_info_list, first_adjusted);
        for s in combined.iter_mut() {
            let adjusted = s.original_dts - dts_base;
            s.dts = adjusted - correction;
            s.pts = s.dts + s.cts as i64;
        }

        let ref_dur = meta.ref_sample_duration;
        let len = combined.len();
        let mut ready: Vec<VideoSample> = Vec::with_capacity(len);
        for (i, mut s) in combined.into_iter().enumerate() {
            if i + 1 < len {
                ready.push(s);
            } else if force {
                s.duration = self.video.last_known_duration.unwrap_or(ref_dur.floor() as u32);
                ready.push(s);
            } else {
                self.video.stashed = Some(s);
            }
        }
        for i in 0..ready.len().saturating_sub(1) {
            let next_dts = ready[i + 1].dts;
            ready[i].duration = (next_dts - ready[i].dts) as u32;
        }
        if let (Some(stash), Some(last)) = (&self.video.stashed, ready.last_mut()) {
            last.duration = (stash.dts - last.dts) as u32;
        }
        if ready.is_empty() {
            return None;
        }

        if self.config.force_idr_on_first_sample {
            ready[0].flags = SampleFlags::sync();
            ready[0].is_keyframe = true;
        }

        let sample_count = ready.len() as u32;
        let first = ready.first().unwrap().clone();
        let last = ready.last().unwrap().clone();
        let sync_points: Vec<SampleInfo> = ready
            .iter()
            .filter(|s| s.is_keyframe)
            .map(|s| SampleInfo { dts: s.dts, pts: s.pts, original_dts: s.original_dts, duration: s.duration })
            .collect();

        let idr_batch: Vec<IdrSampleInfo> = ready
            .iter()
            .filter(|s| s.is_keyframe)
            .map(|s| IdrSampleInfo { original_dts: s.original_dts, file_position: s.file_position })
            .collect();
        self.video.idr_samples.append_array(&idr_batch);

        let trun_samples: Vec<TrunSample> = ready
            .iter()
            .map(|s| TrunSample { duration: s.duration, size: s.size, flags: s.flags, composition_time_offset: s.cts })
            .collect();
        let moof = mp4box::moof(TrackType::Video as u32, self.video.sequence_number + 1, first.dts as u32, &trun_samples);
        let mut payload = Vec::new();
        for s in &ready {
            for unit in &s.units {
                payload.extend_from_slice(&unit.data);
            }
        }
        let mdat = mp4box::mdat(&payload);
        let mut data = Vec::with_capacity(moof.len() + mdat.len());
        data.extend_from_slice(&moof);
        data.extend_from_slice(&mdat);

        self.video.sequence_number += 1;
        self.video.next_dts = Some(last.dts + last.duration as i64);
        self.video.last_known_duration = Some(last.duration);

        let info = MediaSegmentInfoSummary {
            begin_dts: first.dts,
            end_dts: last.dts + last.duration as i64,
            begin_pts: first.pts,
            end_pts: last.pts + last.duration as i64,
            original_begin_dts: first.original_dts,
            original_end_dts: last.original_dts,
            sync_points: sync_points.clone(),
        };

        if !self.config.is_live {
            self.video.segment_info_list.insert(crate::index::MediaSegmentInfo {
                begin_dts: info.begin_dts,
                end_dts: info.end_dts,
                begin_pts: info.begin_pts,
                end_pts: info.end_pts,
                original_begin_dts: info.original_begin_dts,
                original_end_dts: info.original_end_dts,
                first_sample: SampleInfo { dts: first.dts, pts: first.pts, original_dts: first.original_dts, duration: first.duration },
                last_sample: SampleInfo { dts: last.dts, pts: last.pts, original_dts: last.original_dts, duration: last.duration },
                sync_points,
            });
        }

        debug!(sample_count, begin_dts = info.begin_dts, "emitted video media segment");

        Some(MediaSegment { track_type: TrackType::Video, data, sample_count, info, timestamp_offset: None })
    }
}

/// Insert silent AAC frames wherever a gap exceeds `1.5·refSampleDuration`
/// (spec.md §4.4 "Audio silent-frame gap fill").
fn apply_silent_gap_fill(ready: &mut Vec<AudioSample>, ref_dur: f64, channel_count: u8) {
    let mut i = 0;
    while i < ready.len() {
        let duration = ready[i].duration as f64;
        if duration > 1.5 * ref_dur && i + 1 < ready.len() {
            let next_dts = ready[i + 1].dts;
            // the offending sample keeps only one reference-duration's
            // worth; the rest of the gap is filled by inserted frames.
            ready[i].duration = ref_dur.floor() as u32;
            let start_dts = ready[i].dts + ready[i].duration as i64;
            let gap = (next_dts - start_dts) as f64;
            let count = (gap / ref_dur).ceil().max(1.0) as usize;
            let mut inserted = Vec::with_capacity(count);
            let mut cursor = start_dts;
            for n in 0..count {
                let mut silence_sample = ready[i].clone();
                silence_sample.unit = silence::silent_frame_for(channel_count, &ready[i].unit).to_vec();
                silence_sample.size = silence_sample.unit.len() as u32;
                silence_sample.dts = cursor;
                silence_sample.pts = cursor;
                silence_sample.original_dts = ready[i].original_dts;
                let is_last = n + 1 == count;
                silence_sample.duration = if is_last {
                    (next_dts - cursor) as u32
                } else {
                    ref_dur.floor() as u32
                };
                cursor += silence_sample.duration as i64;
                inserted.push(silence_sample);
            }
            let insert_at = i + 1;
            for (offset, s) in inserted.into_iter().enumerate() {
                ready.insert(insert_at + offset, s);
            }
            i += count;
        }
        i += 1;
    }
}
