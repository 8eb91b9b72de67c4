use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use crate::http::headers::HeaderMap;
use crate::http::multipart::boundary_from_content_type;
use crate::http::request::{Method, Request};

/// Default cap on the size of one buffered request, head and body together.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Framing outcomes that stop a request from being handed to the router.
///
/// Malformed content never shows up here: the parser degrades to empty or
/// best-effort structures instead. Only "not enough bytes yet" and "too many
/// bytes" are reported.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("message is incomplete")]
    Incomplete,

    #[error("message of at least {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// Frames and parses requests out of a connection read buffer.
#[derive(Debug, Clone, Copy)]
pub struct RequestParser {
    max_request_bytes: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_BYTES)
    }
}

impl RequestParser {
    pub fn new(max_request_bytes: usize) -> Self {
        Self { max_request_bytes }
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Parses one request from the front of `buf`.
    ///
    /// On success returns the request and the number of bytes it occupied, so
    /// the caller can keep pipelined bytes that follow it.
    pub fn parse(&self, buf: &[u8]) -> Result<(Request, usize), ParseError> {
        // Stray line breaks between pipelined requests are ignored.
        let skipped = buf
            .iter()
            .take_while(|b| matches!(b, b'\r' | b'\n'))
            .count();
        let buf = &buf[skipped..];

        let Some((headers_end, separator_len)) = find_headers_end(buf) else {
            return Err(self.incomplete(buf.len()));
        };

        let head = String::from_utf8_lossy(&buf[..headers_end]);
        let mut lines = head.lines();

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let method = Method::parse_lenient(parts.next().unwrap_or_default());
        let target = parts.next().unwrap_or("/");
        let version = parts.next().unwrap_or("HTTP/1.1").to_string();

        let mut headers = HeaderMap::new();
        parse_header_lines(lines, &mut headers);

        let body_start = headers_end + separator_len;
        let body_len = self.body_length(&headers, &buf[body_start..], body_start)?;
        let body = Bytes::copy_from_slice(&buf[body_start..body_start + body_len]);

        let request = Request::from_parts(method, target, version, headers, body);
        Ok((request, skipped + body_start + body_len))
    }

    fn body_length(
        &self,
        headers: &HeaderMap,
        available: &[u8],
        head_len: usize,
    ) -> Result<usize, ParseError> {
        if let Some(length) = headers.get("Content-Length") {
            let length = length.trim().parse::<usize>().unwrap_or(0);

            let total = head_len.saturating_add(length);
            if total > self.max_request_bytes {
                return Err(ParseError::TooLarge {
                    size: total,
                    limit: self.max_request_bytes,
                });
            }
            if available.len() < length {
                return Err(ParseError::Incomplete);
            }
            return Ok(length);
        }

        // Without a length, a multipart body ends at its closing boundary.
        let boundary = headers
            .get("Content-Type")
            .filter(|ct| ct.contains("multipart/form-data"))
            .and_then(boundary_from_content_type);

        match boundary {
            Some(boundary) => {
                let closing = format!("--{boundary}--");
                match find_subslice(available, closing.as_bytes()) {
                    Some(pos) => {
                        let end = pos + closing.len();
                        let trailer = if available[end..].starts_with(b"\r\n") { 2 } else { 0 };
                        Ok(end + trailer)
                    }
                    None => Err(self.incomplete(head_len + available.len())),
                }
            }
            None => Ok(0),
        }
    }

    fn incomplete(&self, buffered: usize) -> ParseError {
        if buffered > self.max_request_bytes {
            ParseError::TooLarge {
                size: buffered,
                limit: self.max_request_bytes,
            }
        } else {
            ParseError::Incomplete
        }
    }
}

/// Parses one request from the front of `buf` with the default size limit.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    RequestParser::default().parse(buf)
}

/// A response read back off the wire.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    /// Body with any chunked framing removed
    pub body: Bytes,
}

/// Parses one serialized response from the front of `buf`.
///
/// Understands `Content-Length` and chunked bodies; a response with neither
/// is assumed to have no body.
pub fn parse_http_response(buf: &[u8]) -> Result<(ParsedResponse, usize), ParseError> {
    let (headers_end, separator_len) = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let head = String::from_utf8_lossy(&buf[..headers_end]);
    let mut lines = head.lines();

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default().to_string();
    let status = parts
        .next()
        .and_then(|code| code.parse().ok())
        .unwrap_or_default();
    let reason = parts.next().unwrap_or_default().to_string();

    let mut headers = HeaderMap::new();
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            headers.append(key.trim(), value.trim());
        }
    }

    let body_start = headers_end + separator_len;
    let rest = &buf[body_start..];

    let chunked = headers
        .get("Transfer-Encoding")
        .is_some_and(|te| te.eq_ignore_ascii_case("chunked"));

    let (body, body_len) = if chunked {
        decode_chunked(rest)?
    } else {
        let length = headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if rest.len() < length {
            return Err(ParseError::Incomplete);
        }
        (Bytes::copy_from_slice(&rest[..length]), length)
    };

    let response = ParsedResponse {
        version,
        status,
        reason,
        headers,
        body,
    };
    Ok((response, body_start + body_len))
}

fn decode_chunked(buf: &[u8]) -> Result<(Bytes, usize), ParseError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = find_subslice(&buf[pos..], b"\r\n").ok_or(ParseError::Incomplete)?;
        let size_line = String::from_utf8_lossy(&buf[pos..pos + line_end]);
        let size_field = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16).unwrap_or(0);
        pos += line_end + 2;

        if buf.len().saturating_sub(pos) < size.saturating_add(2) {
            return Err(ParseError::Incomplete);
        }
        if size == 0 {
            return Ok((Bytes::from(body), pos + 2));
        }

        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size + 2;
    }
}

/// Parses `a=1&b=2` into a map. Values are kept literally and a key without
/// `=` maps to an empty string.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Splits each line at the first `:`; lines without one are skipped.
pub(crate) fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
    headers: &mut HeaderMap,
) {
    for line in lines {
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim(), value.trim());
        }
    }
}

/// Locates the blank line ending a header block.
///
/// Returns its offset and the separator length: 4 for `\r\n\r\n`, 2 for a
/// bare `\n\n`.
pub(crate) fn find_headers_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find_subslice(buf, b"\r\n\r\n").map(|pos| (pos, 4));
    let lf = find_subslice(buf, b"\n\n").map(|pos| (pos, 2));

    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
