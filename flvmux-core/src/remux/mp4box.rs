//! ISO BMFF box generator (spec.md §4.3). Pure byte concatenation — no
//! decoding, no dependency on an external muxer crate.

use crate::error::{RemuxError, Result};
use crate::types::{AudioCodec, AudioMetadata, SampleFlags, TrackType, VideoMetadata};

const TIMESCALE: u32 = 1000;

/// `box(type, ...bodies)`: prepend `{size:u32-BE, type:4 bytes}`.
pub fn make_box(box_type: &[u8; 4], bodies: &[&[u8]]) -> Vec<u8> {
    let body_len: usize = bodies.iter().map(|b| b.len()).sum();
    let mut out = Vec::with_capacity(8 + body_len);
    out.extend_from_slice(&((8 + body_len) as u32).to_be_bytes());
    out.extend_from_slice(box_type);
    for b in bodies {
        out.extend_from_slice(b);
    }
    out
}

fn u32be(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

pub fn ftyp() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"isom");
    body.extend_from_slice(&u32be(0x200));
    body.extend_from_slice(b"isom");
    body.extend_from_slice(b"iso2");
    body.extend_from_slice(b"avc1");
    body.extend_from_slice(b"mp41");
    make_box(b"ftyp", &[&body])
}

fn mvhd(duration: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32be(0)); // version(0)+flags
    body.extend_from_slice(&u32be(0)); // creation_time
    body.extend_from_slice(&u32be(0)); // modification_time
    body.extend_from_slice(&u32be(TIMESCALE));
    body.extend_from_slice(&u32be(duration));
    body.extend_from_slice(&u32be(0x0001_0000)); // rate 1.0
    body.extend_from_slice(&[0x01, 0x00]); // volume 1.0
    body.extend_from_slice(&[0, 0]); // reserved
    body.extend_from_slice(&[0u8; 8]); // reserved
    // unity matrix
    let matrix: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
    for m in matrix {
        body.extend_from_slice(&u32be(m));
    }
    body.extend_from_slice(&[0u8; 24]); // pre_defined
    body.extend_from_slice(&u32be(0xFFFF_FFFF)); // next_track_ID
    make_box(b"mvhd", &[&body])
}

fn tkhd(track_id: u32, duration: u32, width: u32, height: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32be(0x0000_0007)); // version(0)+flags (track enabled/in movie/in preview)
    body.extend_from_slice(&u32be(0)); // creation_time
    body.extend_from_slice(&u32be(0)); // modification_time
    body.extend_from_slice(&u32be(track_id));
    body.extend_from_slice(&u32be(0)); // reserved
    body.extend_from_slice(&u32be(duration));
    body.extend_from_slice(&[0u8; 8]); // reserved
    body.extend_from_slice(&u32be(0)); // layer(16)+alternate_group(16)
    body.extend_from_slice(&[0x01, 0x00]); // volume: 1.0 for audio, 0 for video; simplified to same-as-hls.js pattern
    body.extend_from_slice(&[0, 0]); // reserved
    let matrix: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
    for m in matrix {
        body.extend_from_slice(&u32be(m));
    }
    body.extend_from_slice(&u32be(width << 16));
    body.extend_from_slice(&u32be(height << 16));
    make_box(b"tkhd", &[&body])
}

fn mdhd(duration: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32be(0));
    body.extend_from_slice(&u32be(0));
    body.extend_from_slice(&u32be(0));
    body.extend_from_slice(&u32be(TIMESCALE));
    body.extend_from_slice(&u32be(duration));
    body.extend_from_slice(&[0x55, 0xc4]); // language 'und'
    body.extend_from_slice(&[0, 0]); // pre_defined
    make_box(b"mdhd", &[&body])
}

fn hdlr(is_video: bool) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32be(0));
    body.extend_from_slice(&u32be(0)); // pre_defined
    body.extend_from_slice(if is_video { b"vide" } else { b"soun" });
    body.extend_from_slice(&[0u8; 12]); // reserved
    let name = if is_video { b"VideoHandler\0".as_slice() } else { b"SoundHandler\0".as_slice() };
    body.extend_from_slice(name);
    make_box(b"hdlr", &[&body])
}

fn vmhd() -> Vec<u8> {
    let body = [0u8, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
    make_box(b"vmhd", &[&body])
}

fn smhd() -> Vec<u8> {
    let body = [0u8, 0, 0, 0, 0, 0, 0, 0];
    make_box(b"smhd", &[&body])
}

fn dinf() -> Vec<u8> {
    let url = make_box(b"url ", &[&[0, 0, 0, 1]]);
    let dref = make_box(b"dref", &[&u32be(0), &u32be(1), &url]);
    make_box(b"dinf", &[&dref])
}

fn empty_table(box_type: &[u8; 4]) -> Vec<u8> {
    make_box(box_type, &[&u32be(0), &u32be(0)])
}

fn stsz() -> Vec<u8> {
    make_box(b"stsz", &[&u32be(0), &u32be(0), &u32be(0)])
}

fn esds(config: &[u8]) -> Vec<u8> {
    let mut dsi = Vec::new();
    dsi.push(0x05); // DecoderSpecificInfo tag
    dsi.push(config.len() as u8);
    dsi.extend_from_slice(config);

    let mut dec_config = Vec::new();
    dec_config.push(0x04); // DecoderConfigDescriptor tag
    let dec_config_payload_len = 13 + dsi.len();
    dec_config.push(dec_config_payload_len as u8);
    dec_config.push(0x40); // objectTypeIndication: MPEG-4 Audio
    dec_config.push(0x15); // streamType(6)=audio, upStream(1)=0, reserved(1)=1
    dec_config.extend_from_slice(&[0, 0, 0]); // bufferSizeDB
    dec_config.extend_from_slice(&u32be(0)); // maxBitrate
    dec_config.extend_from_slice(&u32be(0)); // avgBitrate
    dec_config.extend_from_slice(&dsi);

    let mut sl_config = vec![0x06, 0x01, 0x02];

    let mut es = Vec::new();
    es.push(0x03); // ESDescriptor tag
    let es_payload_len = 3 + dec_config.len() + sl_config.len();
    es.push(es_payload_len as u8);
    es.extend_from_slice(&[0, 0, 0]); // ES_ID(16) + flags(8)
    es.append(&mut dec_config);
    es.append(&mut sl_config);

    let mut body = Vec::new();
    body.extend_from_slice(&u32be(0));
    body.extend_from_slice(&es);
    make_box(b"esds", &[&body])
}

fn mp4a(audio: &AudioMetadata) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]); // reserved
    body.extend_from_slice(&[0, 1]); // data_reference_index
    body.extend_from_slice(&[0u8; 8]); // reserved
    body.extend_from_slice(&(audio.channel_count as u16).to_be_bytes());
    body.extend_from_slice(&[0, 16]); // sample_size
    body.extend_from_slice(&[0u8; 4]); // pre_defined + reserved
    body.extend_from_slice(&(audio.sample_rate as u16).to_be_bytes());
    body.extend_from_slice(&[0, 0]); // fixed-point low bits
    let esds_box = esds(&audio.config);
    make_box(b"mp4a", &[&body, &esds_box])
}

fn dot_mp3(audio: &AudioMetadata) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]);
    body.extend_from_slice(&[0, 1]);
    body.extend_from_slice(&[0u8; 8]);
    body.extend_from_slice(&(audio.channel_count as u16).to_be_bytes());
    body.extend_from_slice(&[0, 16]);
    body.extend_from_slice(&[0u8; 4]);
    body.extend_from_slice(&(audio.sample_rate as u16).to_be_bytes());
    body.extend_from_slice(&[0, 0]);
    make_box(b".mp3", &[&body])
}

fn avc1(video: &VideoMetadata) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]);
    body.extend_from_slice(&[0, 1]);
    body.extend_from_slice(&[0u8; 16]); // pre_defined/reserved
    body.extend_from_slice(&(video.coded_width as u16).to_be_bytes());
    body.extend_from_slice(&(video.coded_height as u16).to_be_bytes());
    body.extend_from_slice(&u32be(0x0048_0000)); // horizresolution 72dpi
    body.extend_from_slice(&u32be(0x0048_0000)); // vertresolution 72dpi
    body.extend_from_slice(&u32be(0)); // reserved
    body.extend_from_slice(&[0, 1]); // frame_count
    // compressorname: fixed 32 bytes, first byte = length, "xqq/flv.js" padded.
    let mut compressorname = [0u8; 32];
    let name = b"xqq/flv.js";
    compressorname[0] = name.len() as u8;
    compressorname[1..1 + name.len()].copy_from_slice(name);
    body.extend_from_slice(&compressorname);
    body.extend_from_slice(&[0, 0x18]); // depth = 0x18
    body.extend_from_slice(&[0xff, 0xff]); // pre_defined = -1
    let avcc_box = make_box(b"avcC", &[&video.avcc]);
    make_box(b"avc1", &[&body, &avcc_box])
}

fn stsd_audio(audio: &AudioMetadata) -> Vec<u8> {
    let entry = match audio.codec {
        AudioCodec::Mp3 => dot_mp3(audio),
        AudioCodec::Aac { .. } => mp4a(audio),
    };
    make_box(b"stsd", &[&u32be(0), &u32be(1), &entry])
}

fn stsd_video(video: &VideoMetadata) -> Vec<u8> {
    let entry = avc1(video);
    make_box(b"stsd", &[&u32be(0), &u32be(1), &entry])
}

fn stbl_audio(audio: &AudioMetadata) -> Vec<u8> {
    let stsd = stsd_audio(audio);
    make_box(b"stbl", &[&stsd, &empty_table(b"stts"), &empty_table(b"stsc"), &stsz(), &empty_table(b"stco")])
}

fn stbl_video(video: &VideoMetadata) -> Vec<u8> {
    let stsd = stsd_video(video);
    make_box(b"stbl", &[&stsd, &empty_table(b"stts"), &empty_table(b"stsc"), &stsz(), &empty_table(b"stco")])
}

fn minf_audio(audio: &AudioMetadata) -> Vec<u8> {
    let smhd_box = smhd();
    let dinf_box = dinf();
    let stbl_box = stbl_audio(audio);
    make_box(b"minf", &[&smhd_box, &dinf_box, &stbl_box])
}

fn minf_video(video: &VideoMetadata) -> Vec<u8> {
    let vmhd_box = vmhd();
    let dinf_box = dinf();
    let stbl_box = stbl_video(video);
    make_box(b"minf", &[&vmhd_box, &dinf_box, &stbl_box])
}

fn mdia_audio(audio: &AudioMetadata) -> Vec<u8> {
    let mdhd_box = mdhd(audio.duration);
    let hdlr_box = hdlr(false);
    let minf_box = minf_audio(audio);
    make_box(b"mdia", &[&mdhd_box, &hdlr_box, &minf_box])
}

fn mdia_video(video: &VideoMetadata) -> Vec<u8> {
    let mdhd_box = mdhd(video.duration);
    let hdlr_box = hdlr(true);
    let minf_box = minf_video(video);
    make_box(b"mdia", &[&mdhd_box, &hdlr_box, &minf_box])
}

pub fn trak_audio(track_id: u32, audio: &AudioMetadata) -> Vec<u8> {
    let tkhd_box = tkhd(track_id, audio.duration, 0, 0);
    let mdia_box = mdia_audio(audio);
    make_box(b"trak", &[&tkhd_box, &mdia_box])
}

pub fn trak_video(track_id: u32, video: &VideoMetadata) -> Vec<u8> {
    let tkhd_box = tkhd(track_id, video.duration, video.present_width, video.present_height);
    let mdia_box = mdia_video(video);
    make_box(b"trak", &[&tkhd_box, &mdia_box])
}

fn trex(track_id: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&u32be(0));
    body.extend_from_slice(&u32be(track_id));
    body.extend_from_slice(&u32be(1)); // default_sample_description_index
    body.extend_from_slice(&u32be(0)); // default_sample_duration
    body.extend_from_slice(&u32be(0)); // default_sample_size
    body.extend_from_slice(&u32be(0)); // default_sample_flags
    make_box(b"trex", &[&body])
}

fn mvex(track_ids: &[u32]) -> Vec<u8> {
    let boxes: Vec<Vec<u8>> = track_ids.iter().map(|&id| trex(id)).collect();
    let refs: Vec<&[u8]> = boxes.iter().map(|b| b.as_slice()).collect();
    make_box(b"mvex", &refs)
}

/// `generateInitSegment(meta) -> ftyp || moov` (spec.md §4.3).
pub fn generate_init_segment(
    track_id: u32,
    track_type: TrackType,
    duration: u32,
    audio: Option<&AudioMetadata>,
    video: Option<&VideoMetadata>,
) -> Vec<u8> {
    let mvhd_box = mvhd(duration);
    let trak_box = match track_type {
        TrackType::Audio => trak_audio(track_id, audio.expect("audio metadata required")),
        TrackType::Video => trak_video(track_id, video.expect("video metadata required")),
    };
    let mvex_box = mvex(&[track_id]);
    let moov = make_box(b"moov", &[&mvhd_box, &trak_box, &mvex_box]);
    let ftyp_box = ftyp();
    let mut out = Vec::with_capacity(ftyp_box.len() + moov.len());
    out.extend_from_slice(&ftyp_box);
    out.extend_from_slice(&moov);
    out
}

fn mfhd(sequence_number: u32) -> Vec<u8> {
    make_box(b"mfhd", &[&u32be(0), &u32be(sequence_number)])
}

fn tfhd(track_id: u32) -> Vec<u8> {
    // flags 0x020000: default-base-is-moof.
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0x02, 0x00, 0x00]);
    body.extend_from_slice(&u32be(track_id));
    make_box(b"tfhd", &[&body])
}

fn tfdt(base_media_decode_time: u32) -> Vec<u8> {
    make_box(b"tfdt", &[&u32be(0), &u32be(base_media_decode_time)])
}

/// Per-sample fields needed to build one `trun`/`sdtp` entry.
#[derive(Debug, Clone, Copy)]
pub struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: SampleFlags,
    pub composition_time_offset: i32,
}

fn trun(samples: &[TrunSample], data_offset: i32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0x0f, 0x01]); // version 0, flags 0x00000F01
    body.extend_from_slice(&u32be(samples.len() as u32));
    body.extend_from_slice(&data_offset.to_be_bytes());
    for s in samples {
        body.extend_from_slice(&u32be(s.duration));
        body.extend_from_slice(&u32be(s.size));
        let f = &s.flags;
        let sample_flags = ((f.is_leading as u32) << 26)
            | ((f.depends_on as u32) << 24)
            | ((f.is_depended_on as u32) << 22)
            | ((f.has_redundancy as u32) << 20)
            | ((f.is_non_sync as u32) << 16);
        body.extend_from_slice(&u32be(sample_flags));
        body.extend_from_slice(&s.composition_time_offset.to_be_bytes());
    }
    make_box(b"trun", &[&body])
}

fn sdtp(samples: &[TrunSample]) -> Vec<u8> {
    let mut body = vec![0u8, 0, 0, 0];
    for s in samples {
        body.push(s.flags.sdtp_byte());
    }
    make_box(b"sdtp", &[&body])
}

fn traf(track_id: u32, base_media_decode_time: u32, samples: &[TrunSample]) -> Vec<u8> {
    let tfhd_box = tfhd(track_id);
    let tfdt_box = tfdt(base_media_decode_time);
    let sdtp_box = sdtp(samples);

    // data_offset = bytes from the start of this moof to the first sample
    // byte in the following mdat: traf header sizes + trun size + mdat header.
    let tfhd_len = tfhd_box.len();
    let tfdt_len = tfdt_box.len();
    let sdtp_len = sdtp_box.len();
    // trun box: 8-byte header + version/flags(4) + sample_count(4) + data_offset(4) + 16 bytes/sample.
    let trun_len = 8 + 12 + samples.len() * 16;
    let traf_header_len = 8; // traf box header itself
    let mfhd_len = 16;
    let moof_header_len = 8;
    let mdat_header_len = 8;

    let data_offset = (moof_header_len
        + mfhd_len
        + traf_header_len
        + tfhd_len
        + tfdt_len
        + trun_len
        + sdtp_len
        + mdat_header_len) as i32;

    let trun_box = trun(samples, data_offset);
    make_box(b"traf", &[&tfhd_box, &tfdt_box, &trun_box, &sdtp_box])
}

/// `moof(track, baseMediaDecodeTime) = mfhd(seqNum) + traf(...)` (spec.md §4.3).
pub fn moof(track_id: u32, sequence_number: u32, base_media_decode_time: u32, samples: &[TrunSample]) -> Vec<u8> {
    let mfhd_box = mfhd(sequence_number);
    let traf_box = traf(track_id, base_media_decode_time, samples);
    make_box(b"moof", &[&mfhd_box, &traf_box])
}

/// `mdat(data)`.
pub fn mdat(data: &[u8]) -> Vec<u8> {
    make_box(b"mdat", &[data])
}

/// Locate the first child box of `type` within `data` (used by tests and
/// by the round-trip checks in spec.md §8).
pub fn find_box<'a>(data: &'a [u8], box_type: &[u8; 4]) -> Option<&'a [u8]> {
    let mut pos = 0usize;
    while pos + 8 <= data.len() {
        let size = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
        if size < 8 || pos + size > data.len() {
            return None;
        }
        if &data[pos + 4..pos + 8] == box_type {
            return Some(&data[pos..pos + size]);
        }
        pos += size;
    }
    None
}

/// Walk nested boxes by a slash-separated path, e.g. `"moov/trak/tkhd"`.
pub fn find_nested_box<'a>(data: &'a [u8], path: &str) -> Result<&'a [u8]> {
    let mut cur = data;
    for seg in path.split('/') {
        let ty: [u8; 4] = seg
            .as_bytes()
            .try_into()
            .map_err(|_| RemuxError::IllegalState(format!("box path segment must be 4 chars: {seg}")))?;
        let found = find_box(cur, &ty)
            .ok_or_else(|| RemuxError::IllegalState(format!("box {seg} not found while walking {path}")))?;
        // Re-scan from the box body onward on the next iteration.
        cur = &found[8..];
    }
    Ok(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioCodec;

    #[test]
    fn box_header_encodes_size_and_type() {
        let b = make_box(b"test", &[&[1, 2, 3]]);
        assert_eq!(b.len(), 11);
        assert_eq!(u32::from_be_bytes(b[0..4].try_into().unwrap()), 11);
        assert_eq!(&b[4..8], b"test");
    }

    #[test]
    fn init_segment_roundtrips_track_dimensions() {
        let video = VideoMetadata {
            avcc: vec![1, 66, 0xC0, 31, 0xff, 0xe1, 0, 0],
            codec_mime: "avc1.42c01f".into(),
            profile: "Baseline".into(),
            level: "3.1".into(),
            coded_width: 640,
            coded_height: 360,
            present_width: 640,
            present_height: 360,
            frame_rate_fixed: true,
            frame_rate_num: 25,
            frame_rate_den: 1,
            ref_sample_duration: 40.0,
            duration: 10_000,
        };
        let data = generate_init_segment(1, TrackType::Video, 10_000, None, Some(&video));
        let moov = find_box(&data, b"moov").unwrap();
        let mvhd_box = find_box(&moov[8..], b"mvhd").unwrap();
        let duration = u32::from_be_bytes(mvhd_box[24..28].try_into().unwrap());
        assert_eq!(duration, 10_000);

        let trak = find_box(&moov[8..], b"trak").unwrap();
        let tkhd_box = find_box(&trak[8..], b"tkhd").unwrap();
        let width = u32::from_be_bytes(tkhd_box[84..88].try_into().unwrap()) >> 16;
        let height = u32::from_be_bytes(tkhd_box[88..92].try_into().unwrap()) >> 16;
        assert_eq!(width, 640);
        assert_eq!(height, 360);
    }

    #[test]
    fn audio_init_segment_carries_esds_config() {
        let audio = AudioMetadata {
            codec: AudioCodec::Aac { object_type: 5 },
            sample_rate: 44100,
            channel_count: 2,
            config: vec![0x13, 0x90],
            ref_sample_duration: 23.2,
            duration: 10_000,
        };
        let data = generate_init_segment(2, TrackType::Audio, 10_000, Some(&audio), None);
        let moov = find_box(&data, b"moov").unwrap();
        let trak = find_box(&moov[8..], b"trak").unwrap();
        assert!(find_box(&trak[8..], b"mdia").is_some());
    }

    #[test]
    fn moof_data_offset_points_past_traf_and_mdat_header() {
        let samples = [TrunSample {
            duration: 1000,
            size: 200,
            flags: SampleFlags::sync(),
            composition_time_offset: 0,
        }];
        let moof_box = moof(1, 1, 0, &samples);
        let traf_box = find_box(&moof_box[8..], b"traf").unwrap();
        let trun_box = find_box(&traf_box[8..], b"trun").unwrap();
        let data_offset = i32::from_be_bytes(trun_box[16..20].try_into().unwrap());
        assert_eq!(data_offset as usize, moof_box.len() + 8);
    }

    #[test]
    fn sdtp_encodes_per_sample_flags() {
        let samples = [TrunSample {
            duration: 1000,
            size: 200,
            flags: SampleFlags::non_sync(),
            composition_time_offset: 0,
        }];
        let moof_box = moof(1, 1, 0, &samples);
        let traf_box = find_box(&moof_box[8..], b"traf").unwrap();
        let sdtp_box = find_box(&traf_box[8..], b"sdtp").unwrap();
        assert_eq!(sdtp_box[8], SampleFlags::non_sync().sdtp_byte());
    }
}
