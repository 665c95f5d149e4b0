//! Real transports plugged into `flvmux_core`'s loader contract
//! (SPEC_FULL.md §3 "Loader reconnection backoff", "WebSocket transport
//! loader"). `flvmux-core` only specifies what a loader must do; the two
//! submodules here are the "external collaborator" spec.md treats at an
//! interface level.

pub mod http;
pub mod ws;

pub use http::HttpLoader;
pub use ws::WsLoader;
