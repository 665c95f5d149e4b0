//! Loader contract and seek-request encoding (spec.md §4.1 "Seek-handler
//! variants", §6 "Loader interface").
//!
//! `flvmux-core` only specifies the contract; real transports (HTTP range
//! requests, WebSocket) live in `flvmux-relay`.

/// An absolute byte range to request from the transport. `to == None`
/// means "to end of stream".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl ByteRange {
    pub fn from_start(from: u64) -> Self {
        Self { from, to: None }
    }
}

/// What the I/O controller asks the transport driver to do: issue a
/// request encoding `range`, optionally against a rewritten URL.
#[derive(Debug, Clone)]
pub struct SeekRequest {
    pub range: ByteRange,
    pub headers: Vec<(String, String)>,
    pub url: Option<String>,
}

/// Encodes a [`ByteRange`] into transport-level headers/URL parameters.
/// `range`, `param`, and a consumer-supplied `custom` handler are three
/// implementors of this trait (spec.md §9, SPEC_FULL.md §3).
pub trait SeekHandler: Send + Sync {
    fn build(&self, range: ByteRange, base_url: &str) -> SeekRequest;
}

/// HTTP `Range:` header encoding.
#[derive(Debug, Clone, Default)]
pub struct RangeSeekHandler;

impl SeekHandler for RangeSeekHandler {
    fn build(&self, range: ByteRange, base_url: &str) -> SeekRequest {
        let value = match range.to {
            Some(to) => format!("bytes={}-{}", range.from, to),
            None => format!("bytes={}-", range.from),
        };
        SeekRequest {
            range,
            headers: vec![("Range".to_string(), value)],
            url: Some(base_url.to_string()),
        }
    }
}

/// URL query-parameter encoding, with configurable parameter names
/// (spec.md §4.1 "param").
#[derive(Debug, Clone)]
pub struct ParamSeekHandler {
    pub start_param: String,
    pub end_param: String,
}

impl ParamSeekHandler {
    pub fn new(start_param: impl Into<String>, end_param: impl Into<String>) -> Self {
        Self { start_param: start_param.into(), end_param: end_param.into() }
    }
}

impl SeekHandler for ParamSeekHandler {
    fn build(&self, range: ByteRange, base_url: &str) -> SeekRequest {
        let sep = if base_url.contains('?') { '&' } else { '?' };
        let mut url = format!("{base_url}{sep}{}={}", self.start_param, range.from);
        if let Some(to) = range.to {
            url.push_str(&format!("&{}={}", self.end_param, to));
        }
        SeekRequest { range, headers: Vec::new(), url: Some(url) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_handler_encodes_header() {
        let h = RangeSeekHandler;
        let req = h.build(ByteRange { from: 100, to: Some(199) }, "https://example/x.flv");
        assert_eq!(req.headers[0], ("Range".to_string(), "bytes=100-199".to_string()));
    }

    #[test]
    fn range_handler_open_ended() {
        let h = RangeSeekHandler;
        let req = h.build(ByteRange::from_start(100), "https://example/x.flv");
        assert_eq!(req.headers[0].1, "bytes=100-");
    }

    #[test]
    fn param_handler_rewrites_url() {
        let h = ParamSeekHandler::new("start", "end");
        let req = h.build(ByteRange { from: 10, to: Some(20) }, "https://example/x.flv?token=abc");
        assert_eq!(req.url.unwrap(), "https://example/x.flv?token=abc&start=10&end=20");
    }
}
