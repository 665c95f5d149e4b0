//! Error taxonomy for the transmuxing pipeline.
//!
//! Mirrors the four-way split in spec.md §7: transport errors surface from
//! the I/O controller (and are partly self-healing), demux errors from the
//! FLV parser, remux errors are programmer-error-grade and fatal, and
//! media-source errors are propagated as-is from the consumer.

use thiserror::Error;

/// Top-level error type returned by the pipeline.
#[derive(Error, Debug)]
pub enum FlvMuxError {
    /// Errors originating in the loader / I/O controller.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Errors raised while parsing the FLV tag stream.
    #[error("demux error: {0}")]
    Demux(#[from] DemuxError),

    /// Programmer-error-grade failures in the remuxer; always fatal.
    #[error("remux error: {0}")]
    Remux(#[from] RemuxError),

    /// Opaque error propagated from the media-source attachment layer.
    #[error("media source error: {0}")]
    MediaSource(String),
}

/// Transport-layer error taxonomy (spec.md §7).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connecting to source timed out")]
    ConnectingTimeout,

    #[error("invalid HTTP status code: {0}")]
    HttpStatusCodeInvalid(u16),

    /// Recoverable: the I/O controller retries internally when the total
    /// length is known. Only escalates to `UnrecoverableEarlyEof` if the
    /// retry itself fails.
    #[error("connection closed before the expected range was delivered")]
    EarlyEof,

    #[error("early EOF recovery failed: {0}")]
    UnrecoverableEarlyEof(String),

    #[error("loader exception: {0}")]
    Exception(String),
}

/// FLV demux error taxonomy (spec.md §4.2, §7).
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("malformed FLV structure: {0}")]
    FormatError(String),

    #[error("unsupported codec: {0}")]
    CodecUnsupported(String),

    #[error("internal demuxer error: {0}")]
    Internal(String),
}

/// Remux error taxonomy (spec.md §7). These indicate the remuxer was handed
/// state it should never see (e.g. an out-of-order batch); always fatal.
#[derive(Error, Debug)]
pub enum RemuxError {
    #[error("illegal remuxer state: {0}")]
    IllegalState(String),
}

impl FlvMuxError {
    /// Stable tag identifying which taxonomy entry (spec.md §7) this error
    /// is, used when surfacing it as a `PipelineEvent::Error`.
    pub fn kind(&self) -> &'static str {
        match self {
            FlvMuxError::Transport(t) => match t {
                TransportError::ConnectingTimeout => "ConnectingTimeout",
                TransportError::HttpStatusCodeInvalid(_) => "HttpStatusCodeInvalid",
                TransportError::EarlyEof => "EarlyEof",
                TransportError::UnrecoverableEarlyEof(_) => "UnrecoverableEarlyEof",
                TransportError::Exception(_) => "Exception",
            },
            FlvMuxError::Demux(d) => match d {
                DemuxError::FormatError(_) => "FormatError",
                DemuxError::CodecUnsupported(_) => "CodecUnsupported",
                DemuxError::Internal(_) => "InternalError",
            },
            FlvMuxError::Remux(_) => "IllegalState",
            FlvMuxError::MediaSource(_) => "MediaSource",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlvMuxError>;
