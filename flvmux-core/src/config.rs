//! Pipeline configuration (spec.md §6, SPEC_FULL.md §2).

use serde::{Deserialize, Serialize};

/// How a seek is turned into a loader request (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekType {
    Range,
    Param,
    Custom,
}

impl Default for SeekType {
    fn default() -> Self {
        SeekType::Range
    }
}

/// Every tunable named across spec.md §4 and §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemuxConfig {
    /// Enable the growable stash buffer (spec.md §4.1). Disabling it passes
    /// every loader chunk straight through to the demuxer.
    pub enable_stash_buffer: bool,

    /// Initial stash size in bytes; `0` lets the controller derive one from
    /// the ladder on first use.
    pub stash_initial_size: usize,

    /// Live stream vs. VOD: controls the ladder snap-to-size multiplier.
    pub is_live: bool,

    /// Defer issuing the first loader request until `open()`'s caller
    /// explicitly resumes (spec.md §4.1 "lazy load").
    pub lazy_load: bool,

    /// Maximum bytes to buffer before pausing the loader when
    /// `lazy_load` is set, mirroring flv.js's `lazyLoadMaxDuration`-style
    /// but expressed in bytes (spec.md §9 leaves the unit to the
    /// implementation since there is no decode clock here).
    pub lazy_load_max_bytes: u64,

    pub seek_type: SeekType,
    pub seek_param_start: String,
    pub seek_param_end: String,

    /// First range request starts at byte 0 instead of the seek offset,
    /// trading a redundant prefix fetch for CDN cache hits (spec.md §4.1).
    pub range_load_zero_start: bool,

    /// Demand exact seek accuracy: suppress `RecommendSeekpoint` and seek
    /// to the requested ms even when it isn't keyframe-aligned.
    pub accurate_seek: bool,

    /// Insert silent AAC frames across gaps larger than
    /// `1.5 * refSampleDuration` (spec.md §4.4).
    pub fix_audio_timestamp_gap: bool,

    /// Hold off issuing the first loader request until the consumer's
    /// source-open callback fires (spec.md §4.1).
    pub defer_load_after_source_open: bool,

    /// If the loader's transport reports a redirected URL, use it for
    /// subsequent range requests instead of the original (spec.md §9).
    pub reuse_redirected_url: bool,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            enable_stash_buffer: true,
            stash_initial_size: 0,
            is_live: false,
            lazy_load: false,
            lazy_load_max_bytes: 3 * 1024 * 1024,
            seek_type: SeekType::Range,
            seek_param_start: "bstart".to_string(),
            seek_param_end: "bend".to_string(),
            range_load_zero_start: false,
            accurate_seek: false,
            fix_audio_timestamp_gap: false,
            defer_load_after_source_open: false,
            reuse_redirected_url: false,
        }
    }
}

impl RemuxConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: RemuxConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = RemuxConfig::default();
        assert!(config.enable_stash_buffer);
        assert!(!config.is_live);
        assert_eq!(config.seek_type, SeekType::Range);
        assert_eq!(config.seek_param_start, "bstart");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = RemuxConfig { is_live: true, accurate_seek: true, ..Default::default() };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: RemuxConfig = toml::from_str(&text).unwrap();
        assert!(parsed.is_live);
        assert!(parsed.accurate_seek);
    }
}
