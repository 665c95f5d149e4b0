//! A synthetic, hand-built FLV byte stream covering header, `onMetaData`,
//! one AVC sequence header, and one AAC sequence header — enough to drive
//! [`crate::Transmuxer`] through `MediaInfo`/`InitSegment` emission without
//! a real encoder.

const FLV_HEADER_FLAGS_AV: u8 = 0x05; // hasAudio | hasVideo

/// FLV tag-record framing, matching `demux::flv`'s parser byte-for-byte.
fn build_tag(tag_type: u8, timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(tag_type);
    let data_size = body.len() as u32;
    out.extend_from_slice(&data_size.to_be_bytes()[1..4]);
    let ts = timestamp as u32;
    out.extend_from_slice(&ts.to_be_bytes()[1..4]);
    out.push(((ts >> 24) & 0xff) as u8);
    out.extend_from_slice(&[0, 0, 0]); // streamID
    out.extend_from_slice(body);
    let prev_tag_size = (11 + body.len()) as u32;
    out.extend_from_slice(&prev_tag_size.to_be_bytes());
    out
}

// --- AMF0 encoding, the mirror image of `demux::amf`'s decoder --------

fn amf_number(v: f64) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend_from_slice(&v.to_be_bytes());
    out
}

fn amf_bool(v: bool) -> Vec<u8> {
    vec![0x01, v as u8]
}

fn amf_string(s: &str) -> Vec<u8> {
    let mut out = vec![0x02];
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
    out
}

fn amf_strict_array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0x0a];
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

/// key/value pairs plus the trailing `00 00 09` object-end marker.
fn amf_properties(pairs: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in pairs {
        out.extend_from_slice(&(key.len() as u16).to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(value);
    }
    out.extend_from_slice(&[0, 0, 0x09]);
    out
}

fn amf_object(pairs: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0x03];
    out.extend_from_slice(&amf_properties(pairs));
    out
}

fn amf_ecma_array(pairs: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut out = vec![0x08];
    out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    out.extend_from_slice(&amf_properties(pairs));
    out
}

// --- H.264 SPS bit-packing, matching `demux::sps`'s exp-Golomb layout ---

fn ue_bits(mut v: u32) -> String {
    v += 1;
    let nbits = 32 - v.leading_zeros();
    let mut s = "0".repeat((nbits - 1) as usize);
    s.push_str(&format!("{:0width$b}", v, width = nbits as usize));
    s
}

fn pack_bits(bits: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    let padded = format!("{:0<width$}", bits, width = bits.len().div_ceil(8) * 8);
    for chunk in padded.as_bytes().chunks(8) {
        let s = std::str::from_utf8(chunk).unwrap();
        bytes.push(u8::from_str_radix(s, 2).unwrap());
    }
    bytes
}

/// A 640x352 baseline/level-3.1 `avcC` record, no cropping, no VUI.
fn synthetic_avcc() -> Vec<u8> {
    let mut bits = String::new();
    bits.push_str(&ue_bits(0)); // seq_parameter_set_id
    bits.push_str(&ue_bits(0)); // log2_max_frame_num_minus4
    bits.push_str(&ue_bits(0)); // pic_order_cnt_type
    bits.push_str(&ue_bits(0)); // log2_max_pic_order_cnt_lsb_minus4
    bits.push_str(&ue_bits(1)); // max_num_ref_frames
    bits.push('0'); // gaps_in_frame_num_value_allowed_flag
    bits.push_str(&ue_bits(39)); // pic_width_in_mbs_minus1 (640/16 - 1)
    bits.push_str(&ue_bits(21)); // pic_height_in_map_units_minus1 (352/16 - 1)
    bits.push('1'); // frame_mbs_only_flag
    bits.push('1'); // direct_8x8_inference_flag
    bits.push('0'); // frame_cropping_flag
    bits.push('0'); // vui_parameters_present_flag

    let rbsp = pack_bits(&bits);
    let mut sps_payload = vec![66, 0xC0, 31]; // profile=Baseline, constraints, level=3.1
    sps_payload.extend_from_slice(&rbsp);

    let mut nalu = vec![0x67u8]; // NAL header: ref_idc=3, type=7 (SPS)
    nalu.extend_from_slice(&sps_payload);

    let mut avcc = vec![1, 66, 0xC0, 31, 0xff, 0xe1]; // version, profile, constraints, level, naluLengthSize-1=3, numSPS=1
    avcc.extend_from_slice(&(nalu.len() as u16).to_be_bytes());
    avcc.extend_from_slice(&nalu);
    avcc.push(0); // numOfPictureParameterSets = 0
    avcc
}

/// A 2-byte `AudioSpecificConfig`: LC-AAC, 44.1kHz, stereo. The `Other`
/// UA profile promotes this to HE-AAC (object type 5) on decode.
fn synthetic_aac_asc() -> Vec<u8> {
    let object_type = 2u8;
    let sampling_index = 4u8; // 44100 Hz
    let channel_config = 2u8; // stereo
    let byte0 = (object_type << 3) | (sampling_index >> 1);
    let byte1 = ((sampling_index & 0x01) << 7) | (channel_config << 3);
    vec![byte0, byte1]
}

pub struct SyntheticStream;

impl SyntheticStream {
    pub fn new() -> Self {
        Self
    }

    /// header + `onMetaData` (duration 10s, 4 keyframes) + AVC sequence
    /// header + AAC sequence header. No raw sample tags: scenarios that need
    /// samples build their own smaller fixtures alongside the remuxer's unit
    /// tests, which already exercise sample-level behavior directly.
    pub fn build(&self) -> Vec<u8> {
        let mut stream = vec![0x46, 0x4c, 0x56, 1, FLV_HEADER_FLAGS_AV, 0, 0, 0, 9];
        stream.extend_from_slice(&[0, 0, 0, 0]); // PreviousTagSize0

        let keyframes = amf_object(&[
            ("times", amf_strict_array(&[amf_number(0.0), amf_number(2.0), amf_number(4.0), amf_number(6.0)])),
            (
                "filepositions",
                amf_strict_array(&[amf_number(9.0), amf_number(50_000.0), amf_number(100_000.0), amf_number(150_000.0)]),
            ),
        ]);
        let mut script_body = amf_string("onMetaData");
        script_body.extend_from_slice(&amf_ecma_array(&[
            ("duration", amf_number(10.0)),
            ("hasAudio", amf_bool(true)),
            ("hasVideo", amf_bool(true)),
            ("keyframes", keyframes),
        ]));
        stream.extend_from_slice(&build_tag(18, 0, &script_body));

        let mut video_body = vec![(1u8 << 4) | 7, 0, 0, 0, 0]; // frameType=key, AVC, AVCPacketType=0, cts=0
        video_body.extend_from_slice(&synthetic_avcc());
        stream.extend_from_slice(&build_tag(9, 0, &video_body));

        let mut audio_body = vec![(10u8 << 4) | (3 << 2) | (1 << 1) | 1, 0]; // AAC, 44kHz, 16-bit, stereo, AACPacketType=0
        audio_body.extend_from_slice(&synthetic_aac_asc());
        stream.extend_from_slice(&build_tag(8, 0, &audio_body));

        stream
    }
}
