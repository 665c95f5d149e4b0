//! Stash-buffered I/O controller (spec.md §4.1).

use tracing::{debug, trace};

use super::loader::{ByteRange, SeekHandler, SeekRequest};
use super::stash::{compute_stash_size, StashBuffer};
use crate::error::{FlvMuxError, Result, TransportError};

/// Declares how many leading bytes of the presented slice were absorbed
/// (spec.md §4.1 "Stash protocol"). Implemented by the FLV demuxer.
pub trait DataSink {
    fn on_data_arrival(&mut self, chunk: &[u8], abs_offset: u64) -> usize;
}

#[derive(Debug, Clone)]
pub struct StashConfig {
    pub enable_stash_buffer: bool,
    pub stash_initial_size: Option<usize>,
    pub is_live: bool,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self { enable_stash_buffer: true, stash_initial_size: None, is_live: false }
    }
}

/// Result of feeding one chunk to the controller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrivalOutcome {
    /// True exactly once: the arrival that completed early-EOF recovery
    /// (spec.md §4.1 "EarlyEof recovery").
    pub recovered_early_eof: bool,
}

pub struct IoController<S: DataSink> {
    config: StashConfig,
    seek_handler: Box<dyn SeekHandler>,
    sink: S,
    stash: StashBuffer,
    stash_size: usize,
    total_length: Option<u64>,
    current_range: ByteRange,
    paused: bool,
    resume_offset: Option<u64>,
    recovering_early_eof: bool,
    speed_kbps: f64,
    total_received: u64,
}

impl<S: DataSink> IoController<S> {
    pub fn new(config: StashConfig, seek_handler: Box<dyn SeekHandler>, sink: S) -> Self {
        let stash_size = config.stash_initial_size.unwrap_or_else(|| compute_stash_size(384.0, config.is_live));
        Self {
            config,
            seek_handler,
            sink,
            stash: StashBuffer::new(),
            stash_size,
            total_length: None,
            current_range: ByteRange::from_start(0),
            paused: false,
            resume_offset: None,
            recovering_early_eof: false,
            speed_kbps: 0.0,
            total_received: 0,
        }
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn current_speed(&self) -> f64 {
        self.speed_kbps
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Bytes currently held in the stash, not yet consumed by the sink
    /// (SPEC_FULL.md §3 "`Statistics` event payload").
    pub fn stash_depth(&self) -> usize {
        self.stash.len()
    }

    pub fn needs_stash_buffer(&self) -> bool {
        self.config.enable_stash_buffer
    }

    /// spec.md §4.1 "open(from?)".
    pub fn open(&mut self, from: Option<u64>, base_url: &str) -> SeekRequest {
        let range = match from {
            Some(f) => ByteRange::from_start(f),
            None => ByteRange::from_start(0),
        };
        self.stash.reset_at(range.from);
        let req = self.seek_handler.build(range, base_url);
        self.current_range = req.range;
        req
    }

    /// spec.md §4.1 "abort()".
    pub fn abort(&mut self) {
        self.paused = false;
        self.resume_offset = None;
        self.recovering_early_eof = false;
    }

    /// spec.md §4.1 "pause()".
    pub fn pause(&mut self) {
        let resume_at = if !self.stash.is_empty() {
            self.stash.stash_byte_start + self.stash.len() as u64
        } else {
            self.current_range.to.map(|t| t + 1).unwrap_or(self.total_received)
        };
        self.resume_offset = Some(resume_at);
        self.stash.reset_at(resume_at);
        self.paused = true;
    }

    /// spec.md §4.1 "resume()": internal-seek to the recorded resume
    /// offset, dropping_unconsumed = false.
    pub fn resume(&mut self, base_url: &str) -> SeekRequest {
        let from = self.resume_offset.take().unwrap_or(self.current_range.from);
        self.paused = false;
        let req = self.seek_handler.build(ByteRange::from_start(from), base_url);
        self.current_range = req.range;
        req
    }

    /// spec.md §4.1 "seek(bytes)": internal-seek, dropping_unconsumed = true.
    pub fn seek(&mut self, bytes: u64, base_url: &str) -> SeekRequest {
        self.stash.reset_at(bytes);
        let req = self.seek_handler.build(ByteRange::from_start(bytes), base_url);
        self.current_range = req.range;
        req
    }

    pub fn on_content_length_known(&mut self, len: u64) {
        self.total_length = Some(len);
    }

    fn update_speed(&mut self, chunk_len: usize, elapsed_ms: f64) {
        if elapsed_ms <= 0.0 {
            return;
        }
        let instantaneous_kbps = (chunk_len as f64 / 1024.0) / (elapsed_ms / 1000.0);
        // Simple exponential smoothing; no claim of matching any particular
        // reference implementation's windowing, only the ladder contract.
        self.speed_kbps = if self.speed_kbps == 0.0 {
            instantaneous_kbps
        } else {
            0.5 * self.speed_kbps + 0.5 * instantaneous_kbps
        };
        self.stash_size = compute_stash_size(self.speed_kbps, self.config.is_live);
        self.stash.ensure_capacity(self.stash_size);
    }

    /// Feed one chunk (spec.md §4.1 "Control flow on chunk arrival").
    pub fn on_data_arrival(
        &mut self,
        chunk: &[u8],
        abs_offset: u64,
        total_received: u64,
        elapsed_ms: f64,
    ) -> Result<ArrivalOutcome> {
        self.total_received = total_received;
        self.update_speed(chunk.len(), elapsed_ms);

        if !self.config.enable_stash_buffer {
            self.dispatch_combined(chunk, abs_offset);
        } else if self.stash.len() + chunk.len() <= self.stash_size {
            if self.stash.is_empty() {
                self.stash.reset_at(abs_offset);
            }
            self.stash.append(chunk);
            trace!(stash_len = self.stash.len(), "deferring delivery, stash not yet full");
        } else if self.stash.is_empty() {
            self.dispatch_combined(chunk, abs_offset);
        } else {
            self.dispatch_stash_then(chunk);
        }

        let outcome = ArrivalOutcome { recovered_early_eof: self.recovering_early_eof };
        if self.recovering_early_eof {
            self.recovering_early_eof = false;
            debug!("early-EOF recovery completed on this arrival");
        }
        Ok(outcome)
    }

    fn dispatch_combined(&mut self, chunk: &[u8], abs_offset: u64) {
        if self.stash.is_empty() {
            let consumed = self.sink.on_data_arrival(chunk, abs_offset);
            self.stash.reset_at(abs_offset + consumed as u64);
            self.stash.append(&chunk[consumed..]);
        } else {
            let base_abs = self.stash.stash_byte_start;
            let mut buf = self.stash.as_slice().to_vec();
            buf.extend_from_slice(chunk);
            let consumed = self.sink.on_data_arrival(&buf, base_abs);
            self.stash.reset_at(base_abs + consumed as u64);
            self.stash.append(&buf[consumed..]);
        }
        self.stash.ensure_capacity(self.stash_size);
    }

    fn dispatch_stash_then(&mut self, chunk: &[u8]) {
        self.dispatch_combined(chunk, self.stash.stash_byte_start);
    }

    /// Flush whatever remains in the stash (spec.md §4.1
    /// `_flushStashBuffer`), called at seek/completion/error.
    pub fn flush_stash_buffer(&mut self, drop_unconsumed: bool) {
        if self.stash.is_empty() {
            return;
        }
        let base_abs = self.stash.stash_byte_start;
        let data = self.stash.as_slice().to_vec();
        let consumed = self.sink.on_data_arrival(&data, base_abs);
        if drop_unconsumed {
            self.stash.reset_at(base_abs + data.len() as u64);
        } else {
            self.stash.reset_at(base_abs + consumed as u64);
            self.stash.append(&data[consumed..]);
        }
    }

    /// spec.md §4.1 "EarlyEof recovery". Returns `Some(request)` to
    /// reissue internally, or escalates via `Err`.
    pub fn on_error(&mut self, err: TransportError, base_url: &str) -> Result<Option<SeekRequest>> {
        match err {
            TransportError::EarlyEof => {
                if self.config.is_live {
                    return Err(FlvMuxError::Transport(TransportError::UnrecoverableEarlyEof(
                        "stream is live, cannot recover EarlyEof".into(),
                    )));
                }
                let Some(total) = self.total_length else {
                    return Err(FlvMuxError::Transport(TransportError::UnrecoverableEarlyEof(
                        "total length unknown".into(),
                    )));
                };
                let next_from = self.current_range.to.map(|t| t + 1).unwrap_or(self.total_received);
                if next_from >= total {
                    return Err(FlvMuxError::Transport(TransportError::UnrecoverableEarlyEof(
                        "no further bytes to recover".into(),
                    )));
                }
                self.recovering_early_eof = true;
                let req = self.seek_handler.build(ByteRange::from_start(next_from), base_url);
                self.current_range = req.range;
                Ok(Some(req))
            }
            other => Err(FlvMuxError::Transport(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::loader::RangeSeekHandler;

    struct CollectingSink {
        received: Vec<u8>,
    }

    impl DataSink for CollectingSink {
        fn on_data_arrival(&mut self, chunk: &[u8], _abs_offset: u64) -> usize {
            self.received.extend_from_slice(chunk);
            chunk.len()
        }
    }

    fn controller(enable_stash: bool) -> IoController<CollectingSink> {
        IoController::new(
            StashConfig { enable_stash_buffer: enable_stash, stash_initial_size: Some(16), is_live: false },
            Box::new(RangeSeekHandler),
            CollectingSink { received: Vec::new() },
        )
    }

    #[test]
    fn disabled_stash_passes_chunks_straight_through() {
        let mut c = controller(false);
        c.on_data_arrival(b"hello", 0, 5, 10.0).unwrap();
        assert_eq!(c.sink_mut().received, b"hello");
    }

    #[test]
    fn enabled_stash_defers_small_chunks() {
        let mut c = controller(true);
        c.on_data_arrival(b"hi", 0, 2, 10.0).unwrap();
        assert!(c.sink_mut().received.is_empty());
    }

    #[test]
    fn early_eof_recovery_computes_next_range() {
        let mut c = controller(true);
        c.on_content_length_known(1_000_000);
        c.current_range = ByteRange { from: 0, to: Some(399_999) };
        c.total_received = 400_000;
        let req = c.on_error(TransportError::EarlyEof, "https://x/y.flv").unwrap().unwrap();
        assert_eq!(req.range.from, 400_000);
    }

    #[test]
    fn early_eof_escalates_when_no_bytes_remain() {
        let mut c = controller(true);
        c.on_content_length_known(500);
        c.current_range = ByteRange { from: 0, to: Some(499) };
        c.total_received = 500;
        let err = c.on_error(TransportError::EarlyEof, "https://x/y.flv").unwrap_err();
        assert!(matches!(err, FlvMuxError::Transport(TransportError::UnrecoverableEarlyEof(_))));
    }

    #[test]
    fn pause_then_resume_round_trips_offset() {
        let mut c = controller(true);
        c.on_data_arrival(b"0123456789012345678901234", 0, 25, 10.0).unwrap();
        c.pause();
        let req = c.resume("https://x/y.flv");
        assert_eq!(req.range.from, c.current_range.from);
    }
}
