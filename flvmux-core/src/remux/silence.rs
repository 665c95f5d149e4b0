//! Silent AAC frame byte tables, keyed by channel count (spec.md §4.4
//! "Audio silent-frame gap fill"). MP3 has no silent-frame table; the gap
//! fill workaround applies to AAC only.

/// Canonical 44.1kHz AAC-LC silent frames, one raw AAC frame (no ADTS
/// header) per channel count.
const SILENT_FRAME_MONO: &[u8] = &[0x01, 0x40, 0x20, 0x50, 0x80, 0x00, 0x00, 0xaf, 0x06, 0x00];
const SILENT_FRAME_STEREO: &[u8] =
    &[0x21, 0x00, 0x49, 0x90, 0x02, 0x19, 0x00, 0x23, 0x80, 0x00, 0x00, 0x00, 0x00];

/// Look up the silent-frame byte table for a channel count, falling back
/// to `prior_frame` (the previous real sample's bytes) when no table entry
/// exists (spec.md §4.4: "if absent, repeat the prior frame's bytes").
pub fn silent_frame_for<'a>(channel_count: u8, prior_frame: &'a [u8]) -> &'a [u8] {
    match channel_count {
        1 if !SILENT_FRAME_MONO.is_empty() => SILENT_FRAME_MONO,
        2 if !SILENT_FRAME_STEREO.is_empty() => SILENT_FRAME_STEREO,
        _ => prior_frame,
    }
}
