//! WebSocket transport, grounded in
//! `jellyfin-hls-proxy/src/handler/websocket.rs`'s `connect_async` usage —
//! here unidirectional: binary frames in, `Transmuxer::push_data` out,
//! since this relay only consumes a media feed rather than proxying one.

use flvmux_core::PipelineEvent;
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::Result;

pub struct WsLoader;

impl WsLoader {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(
        &self,
        transmuxer: &mut flvmux_core::Transmuxer,
        url: &str,
        mut on_event: impl FnMut(PipelineEvent),
    ) -> Result<()> {
        let (ws_stream, _response) = connect_async(url).await?;
        info!(url, "websocket connection established");
        let (_, mut read) = ws_stream.split();

        let mut abs_offset = 0u64;
        let mut total_received = 0u64;
        let started = std::time::Instant::now();

        while let Some(msg) = read.next().await {
            let msg = msg?;
            let bytes = match msg {
                Message::Binary(b) => b,
                Message::Close(frame) => {
                    debug!(?frame, "websocket closed by peer");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_) => continue,
            };
            total_received += bytes.len() as u64;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let events = transmuxer.push_data(&bytes, abs_offset, total_received, elapsed_ms)?;
            abs_offset += bytes.len() as u64;
            for event in events {
                on_event(event);
            }
        }

        let flush_events = transmuxer.flush(false);
        for event in flush_events {
            on_event(event);
        }
        on_event(PipelineEvent::LoadingComplete);
        if abs_offset == 0 {
            warn!("websocket stream closed without delivering any data");
        }
        Ok(())
    }
}

impl Default for WsLoader {
    fn default() -> Self {
        Self::new()
    }
}
