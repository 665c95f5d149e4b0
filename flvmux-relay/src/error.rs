//! `flvmux-relay`'s own error type, for concerns `flvmux-core` doesn't
//! know about: process args, config files, and the transport it drives.
//! Mirrors the split the teacher makes between `hls-vod-lib::HlsError`
//! (library-domain errors) and `hls-vod-server::error::ServerError`
//! (binary-domain errors).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("pipeline error: {0}")]
    Pipeline(#[from] flvmux_core::FlvMuxError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid source URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
