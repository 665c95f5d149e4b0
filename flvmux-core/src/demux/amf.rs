//! Minimal AMF0 decoder, just enough to pull `onMetaData` out of an FLV
//! script tag (spec.md §4.1 "Script tag").

use std::collections::BTreeMap;

use crate::error::DemuxError;

/// A decoded AMF0 value. Only the markers FLV metadata actually uses are
/// implemented; anything else is rejected with [`DemuxError::FormatError`].
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Number(f64),
    Bool(bool),
    String(String),
    Object(BTreeMap<String, AmfValue>),
    Null,
    EcmaArray(BTreeMap<String, AmfValue>),
    StrictArray(Vec<AmfValue>),
    Date { millis: f64, timezone: i16 },
}

impl AmfValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        match self {
            AmfValue::Object(m) | AmfValue::EcmaArray(m) => m.get(key),
            _ => None,
        }
    }
}

const MARKER_NUMBER: u8 = 0x00;
const MARKER_BOOL: u8 = 0x01;
const MARKER_STRING: u8 = 0x02;
const MARKER_OBJECT: u8 = 0x03;
const MARKER_NULL: u8 = 0x05;
const MARKER_UNDEFINED: u8 = 0x06;
const MARKER_ECMA_ARRAY: u8 = 0x08;
const MARKER_OBJECT_END: u8 = 0x09;
const MARKER_STRICT_ARRAY: u8 = 0x0a;
const MARKER_DATE: u8 = 0x0b;
const MARKER_LONG_STRING: u8 = 0x0c;

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8, DemuxError> {
        if self.remaining() < 1 {
            return Err(DemuxError::FormatError("AMF0: unexpected end of data".into()));
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn read_u16(&mut self) -> Result<u16, DemuxError> {
        if self.remaining() < 2 {
            return Err(DemuxError::FormatError("AMF0: unexpected end of data".into()));
        }
        let v = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, DemuxError> {
        if self.remaining() < 4 {
            return Err(DemuxError::FormatError("AMF0: unexpected end of data".into()));
        }
        let v = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn read_f64(&mut self) -> Result<f64, DemuxError> {
        if self.remaining() < 8 {
            return Err(DemuxError::FormatError("AMF0: unexpected end of data".into()));
        }
        let v = f64::from_be_bytes(self.data[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, DemuxError> {
        if self.remaining() < len {
            return Err(DemuxError::FormatError("AMF0: unexpected end of data".into()));
        }
        let s = String::from_utf8_lossy(&self.data[self.pos..self.pos + len]).into_owned();
        self.pos += len;
        Ok(s)
    }

    fn read_short_string(&mut self) -> Result<String, DemuxError> {
        let len = self.read_u16()? as usize;
        self.read_utf8(len)
    }

    fn peek_u24(&self) -> Option<u32> {
        if self.remaining() < 3 {
            return None;
        }
        Some(u32::from_be_bytes([0, self.data[self.pos], self.data[self.pos + 1], self.data[self.pos + 2]]))
    }
}

fn read_value(c: &mut Cursor) -> Result<AmfValue, DemuxError> {
    let marker = c.read_u8()?;
    match marker {
        MARKER_NUMBER => Ok(AmfValue::Number(c.read_f64()?)),
        MARKER_BOOL => Ok(AmfValue::Bool(c.read_u8()? != 0)),
        MARKER_STRING => Ok(AmfValue::String(c.read_short_string()?)),
        MARKER_LONG_STRING => {
            let len = c.read_u32()? as usize;
            Ok(AmfValue::String(c.read_utf8(len)?))
        }
        MARKER_NULL | MARKER_UNDEFINED => Ok(AmfValue::Null),
        MARKER_OBJECT => Ok(AmfValue::Object(read_object_properties(c)?)),
        MARKER_ECMA_ARRAY => {
            let _count = c.read_u32()?;
            Ok(AmfValue::EcmaArray(read_object_properties(c)?))
        }
        MARKER_STRICT_ARRAY => {
            let count = c.read_u32()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_value(c)?);
            }
            Ok(AmfValue::StrictArray(items))
        }
        MARKER_DATE => {
            let millis = c.read_f64()?;
            let timezone = c.read_u16()? as i16;
            Ok(AmfValue::Date { millis, timezone })
        }
        other => Err(DemuxError::FormatError(format!("AMF0: unsupported marker 0x{other:02x}"))),
    }
}

fn read_object_properties(c: &mut Cursor) -> Result<BTreeMap<String, AmfValue>, DemuxError> {
    let mut map = BTreeMap::new();
    loop {
        // An object-end marker is `00 00 09`: an empty key followed by marker 0x09.
        if c.peek_u24() == Some((MARKER_OBJECT_END as u32)) {
            c.pos += 3;
            break;
        }
        let key = c.read_short_string()?;
        let value = read_value(c)?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Decode one AMF0 value (a string marker, expected to be the method name
/// `"onMetaData"`) followed by its ECMA array payload, per spec.md §4.1.
pub fn parse_script_data(data: &[u8]) -> Result<(String, AmfValue), DemuxError> {
    let mut c = Cursor::new(data);
    let name = match read_value(&mut c)? {
        AmfValue::String(s) => s,
        other => return Err(DemuxError::FormatError(format!("AMF0: expected string name, got {other:?}"))),
    };
    let payload = read_value(&mut c)?;
    Ok((name, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_short_string(s: &str) -> Vec<u8> {
        let mut v = vec![MARKER_STRING];
        v.extend_from_slice(&(s.len() as u16).to_be_bytes());
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn parses_on_metadata_ecma_array() {
        let mut data = encode_short_string("onMetaData");
        data.push(MARKER_ECMA_ARRAY);
        data.extend_from_slice(&2u32.to_be_bytes());

        // "duration" -> 12.5
        data.extend_from_slice(&12u16.to_be_bytes());
        data.extend_from_slice(b"duration");
        data.push(MARKER_NUMBER);
        data.extend_from_slice(&12.5f64.to_be_bytes());

        // "hasAudio" -> true
        data.extend_from_slice(&8u16.to_be_bytes());
        data.extend_from_slice(b"hasAudio");
        data.push(MARKER_BOOL);
        data.push(1);

        // object-end marker
        data.extend_from_slice(&[0, 0, MARKER_OBJECT_END]);

        let (name, value) = parse_script_data(&data).unwrap();
        assert_eq!(name, "onMetaData");
        assert_eq!(value.get("duration").and_then(AmfValue::as_f64), Some(12.5));
        assert_eq!(value.get("hasAudio").and_then(AmfValue::as_bool), Some(true));
    }

    #[test]
    fn rejects_unsupported_marker() {
        let data = vec![0xff];
        assert!(parse_script_data(&data).is_err());
    }
}
