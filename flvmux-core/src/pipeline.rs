//! Top-level control surface: wires the stash-buffered I/O controller, the
//! FLV demuxer, and the fMP4 remuxer behind one open/seek/pause/resume/close
//! API (spec.md §6 "External Interfaces").

use tracing::warn;

use crate::config::{RemuxConfig, SeekType};
use crate::demux::audio::UaProfile;
use crate::demux::{DemuxResult, FlvDemuxer};
use crate::error::{DemuxError, FlvMuxError, Result, TransportError};
use crate::events::{ErrorEvent, InitSegment, PipelineEvent, PipelineStatistics};
use crate::io::{
    DataSink, IoController, ParamSeekHandler, RangeSeekHandler, SeekHandler, SeekRequest,
    StashConfig,
};
use crate::remux::{mp4box, Remuxer, RemuxerConfig};
use crate::types::TrackType;

/// Adapts [`FlvDemuxer`] to the I/O controller's [`DataSink`] contract,
/// latching the flags `parse_chunks` reports until [`Transmuxer`] drains them.
struct DemuxerSink {
    demuxer: FlvDemuxer,
    media_info_ready: bool,
    samples_available: bool,
    error: Option<DemuxError>,
}

impl DemuxerSink {
    fn new(has_audio: bool, has_video: bool, ua_profile: UaProfile) -> Self {
        Self {
            demuxer: FlvDemuxer::new(has_audio, has_video, ua_profile),
            media_info_ready: false,
            samples_available: false,
            error: None,
        }
    }
}

impl DataSink for DemuxerSink {
    fn on_data_arrival(&mut self, chunk: &[u8], abs_offset: u64) -> usize {
        match self.demuxer.parse_chunks(chunk, abs_offset) {
            Ok(DemuxResult { consumed, media_info_ready, samples_available }) => {
                self.media_info_ready |= media_info_ready;
                self.samples_available |= samples_available;
                consumed
            }
            Err(e) => {
                warn!(error = %e, "demux error, discarding remainder of this arrival");
                self.error = Some(e);
                chunk.len()
            }
        }
    }
}

fn build_seek_handler(config: &RemuxConfig) -> Box<dyn SeekHandler> {
    match config.seek_type {
        SeekType::Range => Box::new(RangeSeekHandler),
        SeekType::Param => {
            Box::new(ParamSeekHandler::new(config.seek_param_start.clone(), config.seek_param_end.clone()))
        }
        // A consumer-supplied handler replaces this via `Transmuxer::with_seek_handler`;
        // `range` is the sane fallback until one is installed.
        SeekType::Custom => Box::new(RangeSeekHandler),
    }
}

/// Drives the stash-buffered loader, the FLV demuxer, and the fMP4 remuxer
/// together. One instance corresponds to one open media session (spec.md §5
/// "single logical worker").
pub struct Transmuxer {
    controller: IoController<DemuxerSink>,
    remuxer: Remuxer,
    config: RemuxConfig,
    base_url: String,
    media_info_emitted: bool,
    audio_init_emitted: bool,
    video_init_emitted: bool,
    audio_sample_count: u64,
    video_sample_count: u64,
}

impl Transmuxer {
    pub fn new(config: RemuxConfig, has_audio: bool, has_video: bool, ua_profile: UaProfile) -> Self {
        Self::with_seek_handler(config, has_audio, has_video, ua_profile, None)
    }

    /// As [`Transmuxer::new`], but installs a consumer-supplied
    /// [`SeekHandler`] for `seek_type == SeekType::Custom` instead of
    /// falling back to `range` (spec.md §4.1 "a custom handler may be
    /// injected").
    pub fn with_seek_handler(
        config: RemuxConfig,
        has_audio: bool,
        has_video: bool,
        ua_profile: UaProfile,
        custom_handler: Option<Box<dyn SeekHandler>>,
    ) -> Self {
        let seek_handler = match (config.seek_type, custom_handler) {
            (SeekType::Custom, Some(handler)) => handler,
            _ => build_seek_handler(&config),
        };
        let stash_config = StashConfig {
            enable_stash_buffer: config.enable_stash_buffer,
            stash_initial_size: (config.stash_initial_size > 0).then_some(config.stash_initial_size),
            is_live: config.is_live,
        };
        let sink = DemuxerSink::new(has_audio, has_video, ua_profile);
        let remuxer_config = RemuxerConfig {
            fix_audio_timestamp_gap: config.fix_audio_timestamp_gap,
            force_idr_on_first_sample: true,
            seek_start_silent_padding: true,
            is_live: config.is_live,
        };
        Self {
            controller: IoController::new(stash_config, seek_handler, sink),
            remuxer: Remuxer::new(remuxer_config),
            config,
            base_url: String::new(),
            media_info_emitted: false,
            audio_init_emitted: false,
            video_init_emitted: false,
            audio_sample_count: 0,
            video_sample_count: 0,
        }
    }

    /// A snapshot for the consumer-facing `Statistics` event
    /// (SPEC_FULL.md §3), combining the loader's byte/speed counters with
    /// the demuxer's running sample counts.
    pub fn statistics(&self) -> PipelineStatistics {
        PipelineStatistics {
            total_bytes_loaded: self.controller.total_received(),
            current_speed_kbps: self.controller.current_speed(),
            audio_sample_count: self.audio_sample_count,
            video_sample_count: self.video_sample_count,
            stash_buffer_depth: self.controller.stash_depth(),
        }
    }

    /// spec.md §6 "`open(url, from?)`".
    pub fn open(&mut self, base_url: &str, from: Option<u64>) -> SeekRequest {
        self.base_url = base_url.to_string();
        self.controller.open(from, base_url)
    }

    /// spec.md §6 "`close()`": idempotent, safe to call more than once.
    pub fn close(&mut self) {
        self.controller.abort();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn resume(&mut self) -> SeekRequest {
        self.controller.resume(&self.base_url)
    }

    /// spec.md §4.5 "On player-level seek": look up the nearest keyframe,
    /// recommend it first when `accurate_seek` is not set (SPEC_FULL.md §3),
    /// then reset the remuxer and issue the byte-range request.
    pub fn seek(&mut self, ms: u32) -> (Vec<PipelineEvent>, Option<SeekRequest>) {
        let mut events = Vec::new();
        let Some(nearest) = self.controller.sink_mut().demuxer.media_info().keyframes.nearest(ms) else {
            return (events, None);
        };
        if !self.config.accurate_seek && nearest.milliseconds != ms {
            events.push(PipelineEvent::RecommendSeekpoint(nearest.milliseconds));
        }
        self.remuxer.seek();
        let req = self.controller.seek(nearest.file_position, &self.base_url);
        (events, Some(req))
    }

    /// Records the transport's declared content length, used by `EarlyEof`
    /// recovery to decide whether any bytes remain to fetch.
    pub fn on_content_length_known(&mut self, len: u64) {
        self.controller.on_content_length_known(len);
    }

    pub fn on_error(&mut self, err: TransportError) -> Result<Option<SeekRequest>> {
        self.controller.on_error(err, &self.base_url)
    }

    /// spec.md §4.1 "Control flow on chunk arrival": feed the loader chunk
    /// through the stash, then drain any resulting samples through the
    /// remuxer, returning every event raised along the way.
    pub fn push_data(
        &mut self,
        chunk: &[u8],
        abs_offset: u64,
        total_received: u64,
        elapsed_ms: f64,
    ) -> Result<Vec<PipelineEvent>> {
        let outcome = self.controller.on_data_arrival(chunk, abs_offset, total_received, elapsed_ms)?;
        let mut events = Vec::new();
        if outcome.recovered_early_eof {
            events.push(PipelineEvent::RecoveredEarlyEof);
        }
        let fatal = self.drain_media_info(&mut events);
        if !fatal {
            self.drain_samples(&mut events);
        }
        Ok(events)
    }

    /// spec.md §4.1 "`_flushStashBuffer`" plus the remuxer's stashed-sample
    /// flush, both driven on end-of-stream/seek/close.
    pub fn flush(&mut self, drop_unconsumed: bool) -> Vec<PipelineEvent> {
        self.controller.flush_stash_buffer(drop_unconsumed);
        let mut events = Vec::new();
        self.drain_samples(&mut events);

        let sink = self.controller.sink_mut();
        let media_info = sink.demuxer.media_info().clone();
        let (audio_seg, video_seg) =
            self.remuxer.flush_stashed_samples(media_info.audio.as_ref(), media_info.video.as_ref());
        if let Some(seg) = video_seg {
            events.push(PipelineEvent::MediaSegment(seg));
        }
        if let Some(seg) = audio_seg {
            events.push(PipelineEvent::MediaSegment(seg));
        }
        events
    }

    /// Drains the sink's pending `MediaInfo` readiness flag, or, on a fatal
    /// demux error, releases buffers and reports it as a final `Error`
    /// event rather than unwinding (spec.md §7 "the core ... emits a final
    /// `Error` event"). Returns `true` once a fatal error has been reported,
    /// so `push_data` knows not to attempt draining samples afterward.
    fn drain_media_info(&mut self, events: &mut Vec<PipelineEvent>) -> bool {
        if let Some(err) = self.controller.sink_mut().error.take() {
            let err: FlvMuxError = err.into();
            events.push(PipelineEvent::Error(ErrorEvent::from(&err)));
            let (audio_track, video_track) = self.controller.sink_mut().demuxer.tracks_mut();
            audio_track.clear();
            video_track.clear();
            self.close();
            return true;
        }
        let sink = self.controller.sink_mut();
        if sink.media_info_ready && !self.media_info_emitted {
            self.media_info_emitted = true;
            events.push(PipelineEvent::MediaInfo(sink.demuxer.media_info().clone()));
        }
        sink.media_info_ready = false;
        false
    }

    /// Emits per-track `InitSegment`s as soon as each track's metadata is
    /// parsed, independent of whether any sample tag has arrived yet, then
    /// drains whatever the remuxer is willing to emit. `remux` tolerates
    /// empty/undersized batches (spec.md §8 "Empty audio or video batches do
    /// not emit segments"), so it is safe to call on every arrival rather
    /// than gating it on `samples_available`.
    fn drain_samples(&mut self, events: &mut Vec<PipelineEvent>) {
        let sink = self.controller.sink_mut();
        sink.samples_available = false;

        let media_info = sink.demuxer.media_info().clone();
        let duration = media_info.duration.unwrap_or(0);

        if let Some(meta) = &media_info.video {
            if !self.video_init_emitted {
                self.video_init_emitted = true;
                events.push(PipelineEvent::InitSegment(InitSegment {
                    track_type: TrackType::Video,
                    data: mp4box::generate_init_segment(1, TrackType::Video, duration, None, Some(meta)),
                    codec: meta.codec_mime.clone(),
                    container: "video/mp4",
                    media_duration: duration,
                }));
            }
        }
        if let Some(meta) = &media_info.audio {
            if !self.audio_init_emitted {
                self.audio_init_emitted = true;
                events.push(PipelineEvent::InitSegment(InitSegment {
                    track_type: TrackType::Audio,
                    data: mp4box::generate_init_segment(2, TrackType::Audio, duration, Some(meta), None),
                    codec: meta.codec.codec_mime(),
                    container: "audio/mp4",
                    media_duration: duration,
                }));
            }
        }

        let (audio_track, video_track) = sink.demuxer.tracks_mut();
        let (audio_seg, video_seg) = self.remuxer.remux(
            media_info.audio.as_ref(),
            audio_track,
            media_info.video.as_ref(),
            video_track,
            false,
        );
        if let Some(seg) = video_seg {
            self.video_sample_count += seg.sample_count as u64;
            events.push(PipelineEvent::MediaSegment(seg));
        }
        if let Some(seg) = audio_seg {
            self.audio_sample_count += seg.sample_count as u64;
            events.push(PipelineEvent::MediaSegment(seg));
        }
    }
}
