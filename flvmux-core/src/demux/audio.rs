//! Audio tag parsing: AAC `AudioSpecificConfig` decode with the user-agent
//! promotion shims, and MP3 frame header tables (spec.md §4.2 "Audio tag").

use crate::error::DemuxError;

/// Which runtime's AAC quirks to emulate when deciding LC vs HE-AAC.
/// Defaults to [`UaProfile::Other`] — the baseline rule from the source,
/// not itself a workaround. Firefox/Android are the platform workarounds
/// and must be requested explicitly (spec.md §9 "Platform workarounds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UaProfile {
    Firefox,
    Android,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AacAudioSpecificConfig {
    pub object_type: u8,
    pub sampling_index: u8,
    pub sampling_frequency: u32,
    pub channel_config: u8,
    /// Present when the promoted `object_type == 5` (HE-AAC SBR): the
    /// extension sampling rate index and the underlying core object type,
    /// both carried in the 4-byte config blob (spec.md §4.2).
    pub extension: Option<(u8, u8)>,
}

const AAC_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

fn sample_rate_for_index(idx: u8) -> Result<u32, DemuxError> {
    AAC_SAMPLE_RATES
        .get(idx as usize)
        .copied()
        .ok_or_else(|| DemuxError::FormatError(format!("AAC: invalid sampling frequency index {idx}")))
}

/// Decode a raw `AudioSpecificConfig` and apply the UA promotion shim,
/// returning the (possibly promoted) object type plus a canonical config
/// blob ready to embed in an `esds` box: 2 bytes for LC-AAC, 4 bytes for
/// HE-AAC carrying the SBR extension fields (spec.md §4.2, §3).
pub fn parse_audio_specific_config(data: &[u8], ua: UaProfile) -> Result<(AacAudioSpecificConfig, Vec<u8>), DemuxError> {
    if data.len() < 2 {
        return Err(DemuxError::FormatError("AAC: AudioSpecificConfig too short".into()));
    }
    let original_object_type = data[0] >> 3;
    let sampling_index = ((data[0] & 0x07) << 1) | (data[1] >> 7);
    let channel_config = (data[1] >> 3) & 0x0f;

    let sampling_frequency = sample_rate_for_index(sampling_index)?;

    // Explicit SBR signaling carries the core decoder's object type and its
    // own sampling rate right after channelConfig (ISO/IEC 14496-3 §1.6.6.1).
    let bitstream_extension = if original_object_type == 5 && data.len() >= 3 {
        let ext_sampling_index = ((data[1] & 0x07) << 1) | (data[2] >> 7);
        let ext_object_type = (data[2] >> 2) & 0x1f;
        Some((ext_sampling_index, ext_object_type))
    } else {
        None
    };

    let object_type = promote_object_type(original_object_type, sampling_index, channel_config, ua);

    // Implicit promotion (LC shim'd up to HE-AAC) has no extension fields
    // in the source bitstream; synthesize the usual LC-core/same-rate pair.
    let extension = (object_type == 5).then(|| bitstream_extension.unwrap_or((sampling_index, 2)));

    let config = AacAudioSpecificConfig {
        object_type,
        sampling_index,
        sampling_frequency,
        channel_config,
        extension,
    };

    Ok((config, encode_audio_specific_config(&config)))
}

/// spec.md §4.2: "Firefox uses HE-AAC (type 5) for sampling index ≥ 6 else
/// LC-AAC; Android always LC-AAC; others HE-AAC except mono LC-AAC."
fn promote_object_type(_original: u8, sampling_index: u8, channel_config: u8, ua: UaProfile) -> u8 {
    match ua {
        UaProfile::Firefox => {
            if sampling_index >= 6 {
                5
            } else {
                2
            }
        }
        UaProfile::Android => 2,
        UaProfile::Other => {
            if channel_config == 1 {
                2
            } else {
                5
            }
        }
    }
}

/// Encode a canonical `AudioSpecificConfig`: 2 bytes
/// (`objectType:5, samplingIndex:4, channelConfig:4, frameLengthFlag:1,
/// dependsOnCoreCoder:1, extensionFlag:1`) for LC-AAC, or 4 bytes adding the
/// SBR extension's sampling index and core object type for HE-AAC.
fn encode_audio_specific_config(cfg: &AacAudioSpecificConfig) -> Vec<u8> {
    let byte0 = (cfg.object_type << 3) | (cfg.sampling_index >> 1);
    let Some((ext_index, ext_object_type)) = cfg.extension else {
        let byte1 = ((cfg.sampling_index & 0x01) << 7) | (cfg.channel_config << 3);
        return vec![byte0, byte1];
    };
    let byte1 = ((cfg.sampling_index & 0x01) << 7) | (cfg.channel_config << 3) | (ext_index >> 1);
    let byte2 = ((ext_index & 0x01) << 7) | (ext_object_type << 2);
    vec![byte0, byte1, byte2, 0]
}

/// MPEG audio (MP3) frame header fields needed for track metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3FrameInfo {
    pub sample_rate: u32,
    pub channel_count: u8,
    pub bit_rate: u32,
}

// Index: [mpeg_version][layer] -> bitrate table (kbps), 0 = "free", 15 = invalid.
const BITRATE_TABLE_V1_L1: [u32; 16] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0];
const BITRATE_TABLE_V1_L2: [u32; 16] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0];
const BITRATE_TABLE_V1_L3: [u32; 16] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0];
const BITRATE_TABLE_V2_L1: [u32; 16] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0];
const BITRATE_TABLE_V2_L23: [u32; 16] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0];

const SAMPLE_RATE_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATE_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATE_V25: [u32; 3] = [11025, 12000, 8000];

/// Parse a 4-byte MPEG audio frame header (spec.md §4.2).
pub fn parse_mp3_frame_header(data: &[u8]) -> Result<Mp3FrameInfo, DemuxError> {
    if data.len() < 4 {
        return Err(DemuxError::FormatError("MP3: frame header too short".into()));
    }
    if data[0] != 0xff || (data[1] & 0xe0) != 0xe0 {
        return Err(DemuxError::FormatError("MP3: missing frame sync".into()));
    }

    let version_bits = (data[1] >> 3) & 0x03;
    let layer_bits = (data[1] >> 1) & 0x03;
    let bitrate_index = (data[2] >> 4) & 0x0f;
    let sample_rate_index = (data[2] >> 2) & 0x03;
    let channel_mode = (data[3] >> 6) & 0x03;

    if layer_bits == 0 || sample_rate_index == 3 {
        return Err(DemuxError::FormatError("MP3: reserved layer/sample-rate field".into()));
    }

    let sample_rate = match version_bits {
        0b11 => SAMPLE_RATE_V1[sample_rate_index as usize],
        0b10 => SAMPLE_RATE_V2[sample_rate_index as usize],
        0b00 => SAMPLE_RATE_V25[sample_rate_index as usize],
        _ => return Err(DemuxError::FormatError("MP3: reserved MPEG version field".into())),
    };

    // layer_bits: 01=Layer III, 10=Layer II, 11=Layer I.
    let bit_rate = match (version_bits, layer_bits) {
        (0b11, 0b11) => BITRATE_TABLE_V1_L1[bitrate_index as usize],
        (0b11, 0b10) => BITRATE_TABLE_V1_L2[bitrate_index as usize],
        (0b11, 0b01) => BITRATE_TABLE_V1_L3[bitrate_index as usize],
        (_, 0b11) => BITRATE_TABLE_V2_L1[bitrate_index as usize],
        (_, _) => BITRATE_TABLE_V2_L23[bitrate_index as usize],
    } * 1000;

    let channel_count = if channel_mode == 3 { 1 } else { 2 };

    Ok(Mp3FrameInfo {
        sample_rate,
        channel_count,
        bit_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asc_bytes(object_type: u8, sampling_index: u8, channel_config: u8) -> Vec<u8> {
        let b0 = (object_type << 3) | (sampling_index >> 1);
        let b1 = ((sampling_index & 0x01) << 7) | (channel_config << 3);
        vec![b0, b1]
    }

    #[test]
    fn other_profile_promotes_stereo_lc_to_he_aac() {
        // objectType=2 (LC), 44100Hz (index 4), stereo -> promoted to HE-AAC (5).
        let raw = asc_bytes(2, 4, 2);
        let (cfg, _) = parse_audio_specific_config(&raw, UaProfile::Other).unwrap();
        assert_eq!(cfg.object_type, 5);
        assert_eq!(cfg.sampling_frequency, 44100);
    }

    #[test]
    fn other_profile_keeps_mono_as_lc_aac() {
        let raw = asc_bytes(2, 4, 1);
        let (cfg, _) = parse_audio_specific_config(&raw, UaProfile::Other).unwrap();
        assert_eq!(cfg.object_type, 2);
    }

    #[test]
    fn android_profile_always_lc_aac() {
        let raw = asc_bytes(5, 3, 2);
        let (cfg, _) = parse_audio_specific_config(&raw, UaProfile::Android).unwrap();
        assert_eq!(cfg.object_type, 2);
    }

    #[test]
    fn firefox_profile_depends_on_sampling_index() {
        let raw_low = asc_bytes(2, 3, 2); // index 3 < 6 -> LC
        let (low, _) = parse_audio_specific_config(&raw_low, UaProfile::Firefox).unwrap();
        assert_eq!(low.object_type, 2);

        let raw_high = asc_bytes(2, 8, 2); // index 8 >= 6 -> HE
        let (high, _) = parse_audio_specific_config(&raw_high, UaProfile::Firefox).unwrap();
        assert_eq!(high.object_type, 5);
    }

    #[test]
    fn parses_mp3_v1_layer3_header() {
        // MPEG1 Layer III, bitrate index 9 (128kbps), 44100Hz, stereo.
        let header = [0xff, 0xfb, 0x90, 0x00];
        let info = parse_mp3_frame_header(&header).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.bit_rate, 128_000);
        assert_eq!(info.channel_count, 2);
    }

    #[test]
    fn rejects_missing_sync() {
        let header = [0x00, 0xfb, 0x90, 0x00];
        assert!(parse_mp3_frame_header(&header).is_err());
    }
}
