//! FLV container state machine: header probe, tag record framing, and
//! dispatch to the AMF/audio/video parsers (spec.md §4.2).

use tracing::{debug, warn};

use super::audio::{self, UaProfile};
use super::video::{self, AvcDecoderConfig};
use super::amf::{self, AmfValue};
use crate::error::DemuxError;
use crate::types::{
    AudioCodec, AudioMetadata, AudioSample, MediaInfo, SampleBatch, VideoMetadata, VideoSample,
};

const FLV_SIGNATURE: [u8; 3] = [0x46, 0x4c, 0x56]; // "FLV"

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub has_audio: bool,
    pub has_video: bool,
    pub header_length: u32,
}

/// Probe the first bytes of a stream for the 9-byte FLV header. Returns
/// `Ok(None)` if not enough bytes have arrived yet (spec.md §8:
/// "`parseChunks` invoked with a single-byte chunk returns 0 consumed").
pub fn probe(data: &[u8]) -> Result<Option<ProbeResult>, DemuxError> {
    if data.len() < 9 {
        return Ok(None);
    }
    if data[0..3] != FLV_SIGNATURE {
        return Err(DemuxError::FormatError("missing FLV signature".into()));
    }
    let flags = data[4];
    let header_length = u32::from_be_bytes([data[5], data[6], data[7], data[8]]);
    Ok(Some(ProbeResult {
        has_audio: flags & 0x04 != 0,
        has_video: flags & 0x01 != 0,
        header_length: header_length.max(9),
    }))
}

#[derive(Debug, Clone, Copy)]
enum State {
    NeedHeader,
    NeedPrevTagSize0,
    NeedTagHeader,
    NeedTagBody { tag_type: u8, data_size: u32, timestamp: i64 },
}

/// Outcome of one [`FlvDemuxer::parse_chunks`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemuxResult {
    pub consumed: usize,
    /// True exactly once, the call on which `MediaInfo` becomes complete.
    pub media_info_ready: bool,
    /// True when the consumer should drain `audio_track`/`video_track`
    /// (spec.md §4.2 "Emit policy").
    pub samples_available: bool,
}

/// Stateful FLV parser. Produces per-track metadata and timestamped samples
/// into two in-memory queues (spec.md §2 item 3, §4.2).
pub struct FlvDemuxer {
    state: State,
    media_info: MediaInfo,
    media_info_emitted: bool,
    audio_metadata_dispatched: bool,
    video_metadata_dispatched: bool,
    audio_track: SampleBatch<AudioSample>,
    video_track: SampleBatch<VideoSample>,
    avc_config: Option<AvcDecoderConfig>,
    ua_profile: UaProfile,
    timescale: u32,
}

impl FlvDemuxer {
    pub fn new(has_audio: bool, has_video: bool, ua_profile: UaProfile) -> Self {
        Self {
            state: State::NeedHeader,
            media_info: MediaInfo::new(has_audio, has_video),
            media_info_emitted: false,
            audio_metadata_dispatched: false,
            video_metadata_dispatched: false,
            audio_track: SampleBatch::new(),
            video_track: SampleBatch::new(),
            avc_config: None,
            ua_profile,
            timescale: 1000,
        }
    }

    pub fn media_info(&self) -> &MediaInfo {
        &self.media_info
    }

    pub fn audio_track(&mut self) -> &mut SampleBatch<AudioSample> {
        &mut self.audio_track
    }

    pub fn video_track(&mut self) -> &mut SampleBatch<VideoSample> {
        &mut self.video_track
    }

    /// Both track queues at once, for callers (the top-level pipeline) that
    /// need to drain them into the remuxer in a single call.
    pub fn tracks_mut(&mut self) -> (&mut SampleBatch<AudioSample>, &mut SampleBatch<VideoSample>) {
        (&mut self.audio_track, &mut self.video_track)
    }

    /// Parse as much of `data` as forms complete records, starting at
    /// absolute stream offset `abs_offset`. Returns the number of leading
    /// bytes consumed; the caller (I/O controller) retains the remainder
    /// per the stash protocol (spec.md §2 "Stash protocol").
    pub fn parse_chunks(&mut self, data: &[u8], abs_offset: u64) -> Result<DemuxResult, DemuxError> {
        let mut pos = 0usize;

        loop {
            match self.state {
                State::NeedHeader => match probe(&data[pos..])? {
                    None => break,
                    Some(header) => {
                        if !self.media_info.has_audio && !self.media_info.has_video {
                            // No prior declaration (e.g. no AMF hint yet); trust the header flags.
                            self.media_info.has_audio = header.has_audio;
                            self.media_info.has_video = header.has_video;
                        }
                        pos += header.header_length as usize;
                        self.state = State::NeedPrevTagSize0;
                    }
                },
                State::NeedPrevTagSize0 => {
                    if data.len() - pos < 4 {
                        break;
                    }
                    pos += 4;
                    self.state = State::NeedTagHeader;
                }
                State::NeedTagHeader => {
                    if data.len() - pos < 11 {
                        break;
                    }
                    let tag_type = data[pos];
                    let data_size = u24_be(&data[pos + 1..pos + 4]);
                    let ts_lo = u24_be(&data[pos + 4..pos + 7]) as i64;
                    let ts_ext = data[pos + 7] as i64;
                    let timestamp = ts_lo | (ts_ext << 24);
                    let stream_id = u24_be(&data[pos + 8..pos + 11]);
                    if stream_id != 0 {
                        return Err(DemuxError::FormatError(format!("tag streamID must be 0, got {stream_id}")));
                    }
                    pos += 11;
                    self.state = State::NeedTagBody { tag_type, data_size, timestamp };
                }
                State::NeedTagBody { tag_type, data_size, timestamp } => {
                    let needed = data_size as usize + 4;
                    if data.len() - pos < needed {
                        break;
                    }
                    let body = &data[pos..pos + data_size as usize];
                    let tag_abs_offset = abs_offset + pos as u64;

                    match tag_type {
                        8 => self.handle_audio_tag(body, timestamp)?,
                        9 => self.handle_video_tag(body, timestamp, tag_abs_offset)?,
                        18 => self.handle_script_tag(body),
                        other => debug!(tag_type = other, "skipping unknown FLV tag type"),
                    }

                    pos += needed;
                    self.state = State::NeedTagHeader;
                }
            }
        }

        let media_info_ready = !self.media_info_emitted && self.media_info.is_complete();
        if media_info_ready {
            self.media_info.finalize_mime();
            self.media_info_emitted = true;
        }

        let audio_ready = !self.media_info.has_audio || self.audio_metadata_dispatched;
        let video_ready = !self.media_info.has_video || self.video_metadata_dispatched;
        let samples_available =
            audio_ready && video_ready && (!self.audio_track.is_empty() || !self.video_track.is_empty());

        Ok(DemuxResult { consumed: pos, media_info_ready, samples_available })
    }

    fn handle_audio_tag(&mut self, body: &[u8], timestamp: i64) -> Result<(), DemuxError> {
        if body.is_empty() {
            return Ok(());
        }
        let format = body[0] >> 4;
        match format {
            10 => self.handle_aac_tag(body, timestamp),
            2 => self.handle_mp3_tag(body, timestamp),
            other => Err(DemuxError::CodecUnsupported(format!("audio format id {other}"))),
        }
    }

    fn handle_aac_tag(&mut self, body: &[u8], timestamp: i64) -> Result<(), DemuxError> {
        if body.len() < 2 {
            return Ok(());
        }
        let packet_type = body[1];
        let payload = &body[2..];
        match packet_type {
            0 => {
                let (cfg, config_blob) = audio::parse_audio_specific_config(payload, self.ua_profile)?;
                let ref_dur = AudioMetadata::compute_ref_sample_duration(
                    AudioCodec::Aac { object_type: cfg.object_type },
                    self.timescale,
                    cfg.sampling_frequency,
                );
                self.media_info.audio = Some(AudioMetadata {
                    codec: AudioCodec::Aac { object_type: cfg.object_type },
                    sample_rate: cfg.sampling_frequency,
                    channel_count: if cfg.channel_config == 0 { 1 } else { cfg.channel_config },
                    config: config_blob,
                    ref_sample_duration: ref_dur,
                    duration: 0,
                });
                self.audio_metadata_dispatched = true;
            }
            1 => {
                self.audio_track.samples.push_back(AudioSample::new(timestamp, payload.to_vec()));
                self.audio_track.length += payload.len() as u64;
            }
            other => debug!(packet_type = other, "skipping unknown AACPacketType"),
        }
        Ok(())
    }

    fn handle_mp3_tag(&mut self, body: &[u8], timestamp: i64) -> Result<(), DemuxError> {
        let payload = &body[1..];
        if let Ok(info) = audio::parse_mp3_frame_header(payload) {
            if self.media_info.audio.is_none() {
                let ref_dur = AudioMetadata::compute_ref_sample_duration(AudioCodec::Mp3, self.timescale, info.sample_rate);
                self.media_info.audio = Some(AudioMetadata {
                    codec: AudioCodec::Mp3,
                    sample_rate: info.sample_rate,
                    channel_count: info.channel_count,
                    config: Vec::new(),
                    ref_sample_duration: ref_dur,
                    duration: 0,
                });
                self.audio_metadata_dispatched = true;
            }
        } else {
            warn!("malformed MP3 frame header, queuing sample without metadata refresh");
        }
        self.audio_track.samples.push_back(AudioSample::new(timestamp, payload.to_vec()));
        self.audio_track.length += payload.len() as u64;
        Ok(())
    }

    fn handle_video_tag(&mut self, body: &[u8], timestamp: i64, abs_offset: u64) -> Result<(), DemuxError> {
        if body.len() < 2 {
            return Ok(());
        }
        let frame_type = body[0] >> 4;
        let codec_id = body[0] & 0x0f;
        if codec_id != 7 {
            return Err(DemuxError::CodecUnsupported(format!("video codec id {codec_id}")));
        }
        let packet_type = body[1];
        match packet_type {
            0 => {
                let cfg = video::parse_avc_decoder_config(&body[5..])?;
                let (fps_num, fps_den, fixed) = video::resolve_frame_rate(&cfg.sps);
                let ref_dur = VideoMetadata::compute_ref_sample_duration(self.timescale, fps_num, fps_den);
                self.media_info.video = Some(VideoMetadata {
                    avcc: cfg.raw.clone(),
                    codec_mime: cfg.sps.codec_mime(),
                    profile: cfg.sps.profile_string().to_string(),
                    level: cfg.sps.level_string(),
                    coded_width: cfg.sps.codec_width,
                    coded_height: cfg.sps.codec_height,
                    present_width: cfg.sps.present_width,
                    present_height: cfg.sps.present_height,
                    frame_rate_fixed: fixed,
                    frame_rate_num: fps_num,
                    frame_rate_den: fps_den,
                    ref_sample_duration: ref_dur,
                    duration: 0,
                });
                self.video_metadata_dispatched = true;
                self.avc_config = Some(cfg);
            }
            1 => {
                let Some(cfg) = &self.avc_config else {
                    warn!("video NALU tag arrived before avcC, dropping");
                    return Ok(());
                };
                if body.len() < 5 {
                    return Ok(());
                }
                let cts_raw = u24_be(&body[2..5]);
                let cts = video::decode_composition_time(cts_raw);
                let payload = &body[5..];
                match video::split_nalus(payload, cfg.nalu_length_size) {
                    Ok(units) => {
                        let is_keyframe = frame_type == 1;
                        let mut sample = VideoSample::new(timestamp, cts, is_keyframe, units);
                        sample.file_position = Some(abs_offset);
                        self.video_track.length += sample.size as u64;
                        self.video_track.samples.push_back(sample);
                    }
                    Err(e) => warn!(error = %e, "aborting malformed video sample, skipping tag"),
                }
            }
            2 => debug!("end-of-sequence video tag"),
            other => debug!(packet_type = other, "skipping unknown AVCPacketType"),
        }
        Ok(())
    }

    fn handle_script_tag(&mut self, body: &[u8]) {
        let Ok((name, value)) = amf::parse_script_data(body) else {
            warn!("malformed AMF script tag, ignoring");
            return;
        };
        if name != "onMetaData" {
            return;
        }
        self.apply_on_metadata(&value);
    }

    fn apply_on_metadata(&mut self, value: &AmfValue) {
        if let Some(duration_s) = value.get("duration").and_then(AmfValue::as_f64) {
            self.media_info.duration = Some((duration_s * 1000.0).round() as u32);
        }
        if let Some(has_audio) = value.get("hasAudio").and_then(AmfValue::as_bool) {
            if !self.audio_metadata_dispatched {
                self.media_info.has_audio = has_audio;
            }
        }
        if let Some(has_video) = value.get("hasVideo").and_then(AmfValue::as_bool) {
            if !self.video_metadata_dispatched {
                self.media_info.has_video = has_video;
            }
        }
        // audiodatarate/videodatarate/width/height/framerate are advisory
        // only; authoritative values come from the ASC/SPS. Surface them
        // at debug level rather than storing them (spec.md §9 "Dynamic
        // typing of AMF script data").
        if let Some(w) = value.get("width").and_then(AmfValue::as_f64) {
            debug!(width = w, "onMetaData advisory width");
        }
        if let Some(h) = value.get("height").and_then(AmfValue::as_f64) {
            debug!(height = h, "onMetaData advisory height");
        }

        if let Some(keyframes) = value.get("keyframes") {
            self.apply_keyframes(keyframes);
        }
    }

    /// `onMetaData.keyframes` is `{times: [...], filepositions: [...]}`.
    /// Entry 0 actually describes the AVC sequence header and is stripped
    /// (spec.md §4.1).
    fn apply_keyframes(&mut self, keyframes: &AmfValue) {
        let (Some(AmfValue::StrictArray(times)), Some(AmfValue::StrictArray(positions))) =
            (keyframes.get("times"), keyframes.get("filepositions"))
        else {
            return;
        };
        self.media_info.keyframes = Default::default();
        for (t, p) in times.iter().zip(positions.iter()).skip(1) {
            let (Some(t), Some(p)) = (t.as_f64(), p.as_f64()) else { continue };
            self.media_info.keyframes.push((t * 1000.0).round() as u32, p as u64);
        }
    }
}

fn u24_be(b: &[u8]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32
}
