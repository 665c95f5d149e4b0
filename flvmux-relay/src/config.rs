//! Command-line configuration (spec.md §6 `mediaDataSource`/`config`),
//! grounded in `jellyfin-hls-proxy/src/config.rs`'s `clap::Parser` struct.

use std::path::PathBuf;

use clap::Parser;
use flvmux_core::{RemuxConfig, UaProfile};
use tracing::warn;

#[derive(Parser, Debug, Clone)]
#[command(name = "flvmux-relay")]
#[command(author, version, about = "Drive flvmux-core against a live FLV URL", long_about = None)]
pub struct CliArgs {
    /// Source URL: `http(s)://...` for range requests, `ws(s)://...` for
    /// a WebSocket transport.
    pub url: String,

    /// Byte offset to start from.
    #[arg(long, default_value_t = 0)]
    pub from: u64,

    /// Declares the stream never ends (disables `isLive=false`'s
    /// early-EOF recovery assumptions).
    #[arg(long)]
    pub live: bool,

    /// Path to a TOML file overriding `RemuxConfig` defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// UA shim profile applied to AAC/IDR/timestamp-gap workarounds.
    #[arg(long, value_enum, default_value_t = UaProfileArg::Other)]
    pub ua_profile: UaProfileArg,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum UaProfileArg {
    Firefox,
    Android,
    Other,
}

impl From<UaProfileArg> for UaProfile {
    fn from(value: UaProfileArg) -> Self {
        match value {
            UaProfileArg::Firefox => UaProfile::Firefox,
            UaProfileArg::Android => UaProfile::Android,
            UaProfileArg::Other => UaProfile::Other,
        }
    }
}

impl CliArgs {
    /// Load `RemuxConfig` from `--config` if given, falling back to
    /// defaults with a warning on any read/parse failure — the same
    /// load-or-default pattern `hls-vod-server/src/main.rs` uses for its
    /// own config file.
    pub fn remux_config(&self) -> RemuxConfig {
        let Some(path) = &self.config else {
            return RemuxConfig { is_live: self.live, ..Default::default() };
        };
        match RemuxConfig::from_file(&path.to_string_lossy()) {
            Ok(mut config) => {
                config.is_live = config.is_live || self.live;
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config file, using defaults");
                RemuxConfig { is_live: self.live, ..Default::default() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::CliArgs;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["flvmux-relay", "https://example.test/stream.flv"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let cli = args(&["--live"]);
        let config = cli.remux_config();
        assert!(config.is_live);
    }

    #[test]
    fn loads_overrides_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "accurate_seek = true\nseek_type = \"param\"").unwrap();
        let cli = args(&["--config", file.path().to_str().unwrap()]);
        let config = cli.remux_config();
        assert!(config.accurate_seek);
    }

    #[test]
    fn unreadable_config_path_warns_and_falls_back() {
        let cli = args(&["--config", "/nonexistent/path/does-not-exist.toml"]);
        let config = cli.remux_config();
        assert!(!config.accurate_seek);
    }
}
