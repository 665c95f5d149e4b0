//! End-to-end scenarios driving [`crate::Transmuxer`] over a synthetic FLV
//! byte stream, mirroring spec.md §8's end-to-end scenarios at the level a
//! real consumer would exercise the pipeline (as opposed to the per-module
//! unit tests colocated with each subsystem).

mod fixture;

use crate::config::RemuxConfig;
use crate::demux::audio::UaProfile;
use crate::error::TransportError;
use crate::events::PipelineEvent;
use crate::pipeline::Transmuxer;
use fixture::SyntheticStream;

fn transmuxer() -> Transmuxer {
    Transmuxer::new(RemuxConfig::default(), true, true, UaProfile::Other)
}

#[test]
fn init_segment_emission_and_media_info() {
    let stream = SyntheticStream::new().build();
    let mut t = transmuxer();
    t.open("https://example.test/fixture.flv", None);
    let events = t.push_data(&stream, 0, stream.len() as u64, 10.0).unwrap();

    let media_info = events.iter().find_map(|e| match e {
        PipelineEvent::MediaInfo(mi) => Some(mi),
        _ => None,
    });
    let mi = media_info.expect("MediaInfo event");
    assert_eq!(mi.mime_type.as_deref(), Some(r#"video/x-flv; codecs="avc1.42c01f,mp4a.40.5""#));
    assert_eq!(mi.duration, Some(10_000));

    let mut saw_video_init = false;
    let mut saw_audio_init = false;
    for e in &events {
        if let PipelineEvent::InitSegment(seg) = e {
            match seg.container {
                "video/mp4" => {
                    saw_video_init = true;
                    assert_eq!(seg.codec, "avc1.42c01f");
                    assert_eq!(seg.media_duration, 10_000);
                    assert_eq!(&seg.data[4..8], b"ftyp");
                }
                "audio/mp4" => {
                    saw_audio_init = true;
                    assert_eq!(seg.codec, "mp4a.40.5");
                    assert_eq!(seg.media_duration, 10_000);
                }
                other => panic!("unexpected init segment container {other}"),
            }
        }
    }
    assert!(saw_video_init && saw_audio_init);
}

#[test]
fn keyframe_seek_recommends_nearest_point_when_not_accurate() {
    let stream = SyntheticStream::new().build();
    let mut t = transmuxer();
    t.open("https://example.test/fixture.flv", None);
    t.push_data(&stream, 0, stream.len() as u64, 10.0).unwrap();

    let (events, req) = t.seek(3_000);
    assert!(matches!(events.as_slice(), [PipelineEvent::RecommendSeekpoint(2_000)]));
    let req = req.expect("seek request for a keyframe-indexed stream");
    assert_eq!(req.range.from, 50_000);
}

#[test]
fn accurate_seek_suppresses_recommendation() {
    let stream = SyntheticStream::new().build();
    let mut config = RemuxConfig::default();
    config.accurate_seek = true;
    let mut t = Transmuxer::new(config, true, true, UaProfile::Other);
    t.open("https://example.test/fixture.flv", None);
    t.push_data(&stream, 0, stream.len() as u64, 10.0).unwrap();

    let (events, req) = t.seek(3_000);
    assert!(events.is_empty());
    assert!(req.is_some());
}

#[test]
fn early_eof_recovers_to_the_next_byte_range() {
    let mut t = transmuxer();
    t.open("https://example.test/fixture.flv", None);
    let stream = SyntheticStream::new().build();
    let total_received = stream.len() as u64;
    t.push_data(&stream, 0, total_received, 10.0).unwrap();

    // Declare more bytes remain beyond what's been received so far, the
    // way a `Content-Length`/`Content-Range` response header would.
    t.on_content_length_known(total_received + 1_000);

    let req = t.on_error(TransportError::EarlyEof).unwrap().expect("bytes remain, recovery should reconnect");
    assert_eq!(req.range.from, total_received);
}

#[test]
fn early_eof_escalates_once_no_bytes_remain() {
    let mut t = transmuxer();
    t.open("https://example.test/fixture.flv", None);
    let stream = SyntheticStream::new().build();
    let total_received = stream.len() as u64;
    t.push_data(&stream, 0, total_received, 10.0).unwrap();
    t.on_content_length_known(total_received);

    let err = t.on_error(TransportError::EarlyEof).unwrap_err();
    assert!(matches!(err, crate::error::FlvMuxError::Transport(TransportError::UnrecoverableEarlyEof(_))));
}

#[test]
fn feeding_a_single_byte_consumes_nothing_and_emits_no_events() {
    let mut t = transmuxer();
    t.open("https://example.test/fixture.flv", None);
    let events = t.push_data(&[0x46], 0, 1, 1.0).unwrap();
    assert!(events.is_empty());
}
