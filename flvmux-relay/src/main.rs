//! CLI relay that plugs a real transport (HTTP range requests or
//! WebSocket) into `flvmux-core`'s pipeline and drives it end-to-end,
//! the way a media-source consumer would.

mod config;
mod error;
mod loader;

use clap::Parser;
use flvmux_core::events::PipelineEvent;
use flvmux_core::Transmuxer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CliArgs;
use crate::error::Result;
use crate::loader::{HttpLoader, WsLoader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(&args.log_level);

    tracing::info!(url = %args.url, "flvmux-relay starting");
    let parsed = url::Url::parse(&args.url)?;
    let is_websocket = matches!(parsed.scheme(), "ws" | "wss");

    let remux_config = args.remux_config();
    let mut transmuxer = Transmuxer::new(remux_config, true, true, args.ua_profile.into());
    let req = transmuxer.open(&args.url, Some(args.from));

    if is_websocket {
        let loader = WsLoader::new();
        loader.run(&mut transmuxer, &args.url, log_event).await?;
    } else {
        let loader = HttpLoader::new();
        loader.run(&mut transmuxer, req, log_event).await?;
    }

    Ok(())
}

/// Logs each pipeline event at a level matching its severity; a richer
/// consumer would fan these out to a real media source instead.
fn log_event(event: PipelineEvent) {
    match event {
        PipelineEvent::MediaInfo(info) => {
            tracing::info!(mime_type = ?info.mime_type, duration = ?info.duration, "media info");
        }
        PipelineEvent::InitSegment(seg) => {
            tracing::info!(container = seg.container, codec = %seg.codec, bytes = seg.data.len(), "init segment");
        }
        PipelineEvent::MediaSegment(seg) => {
            tracing::debug!(track = ?seg.track_type, samples = seg.sample_count, bytes = seg.data.len(), "media segment");
        }
        PipelineEvent::LoadingComplete => tracing::info!("loading complete"),
        PipelineEvent::RecoveredEarlyEof => tracing::warn!("recovered from early EOF"),
        PipelineEvent::Statistics(stats) => tracing::debug!(?stats, "statistics"),
        PipelineEvent::RecommendSeekpoint(ms) => tracing::info!(ms, "recommend seekpoint"),
        PipelineEvent::Error(err) => tracing::error!(kind = err.kind, detail = %err.detail, "pipeline error"),
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("flvmux_relay={level}").into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
