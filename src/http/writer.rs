use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::http::cookie::Cookie;
use crate::http::headers::HeaderMap;
use crate::http::response::{Body, BodyStream, Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Headers the writer always computes itself.
const FRAMING_HEADERS: [&str; 3] = ["Content-Length", "Transfer-Encoding", "Connection"];

fn write_head(
    buf: &mut BytesMut,
    status: StatusCode,
    headers: &HeaderMap,
    cookies: &[Cookie],
    framing: Framing,
    keep_alive: bool,
) {
    // Status line
    buf.put_slice(
        format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        )
        .as_bytes(),
    );

    // Headers, in the order handlers set them
    for (k, v) in headers.iter() {
        if FRAMING_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(k)) {
            continue;
        }
        put_header(buf, k, v);
    }

    if !status.is_bodiless() && !headers.contains_key("Content-Type") {
        put_header(buf, "Content-Type", "text/plain");
    }

    match framing {
        Framing::Length(len) => put_header(buf, "Content-Length", &len.to_string()),
        Framing::Chunked => put_header(buf, "Transfer-Encoding", "chunked"),
        Framing::None => {}
    }

    put_header(
        buf,
        "Connection",
        if keep_alive { "keep-alive" } else { "close" },
    );

    for cookie in cookies {
        put_header(buf, "Set-Cookie", &cookie.to_string());
    }

    // Header/body separator
    buf.put_slice(b"\r\n");
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

fn put_chunk(buf: &mut BytesMut, chunk: &[u8]) {
    if chunk.is_empty() {
        return;
    }
    buf.put_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
    buf.put_slice(chunk);
    buf.put_slice(b"\r\n");
}

#[derive(Debug, Clone, Copy)]
enum Framing {
    Length(u64),
    Chunked,
    None,
}

/// Serializes a response and hands out its bytes as the socket accepts them.
///
/// The status line, headers and any in-memory body are encoded up front.
/// Streaming bodies are pulled one chunk at a time by [`ResponseWriter::fill`]
/// whenever the pending bytes run out, so a large file never sits in memory
/// at once.
pub struct ResponseWriter {
    buffer: BytesMut,
    source: Option<Box<dyn BodyStream>>,
    chunked: bool,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: Response, keep_alive: bool) -> Self {
        let (status, headers, cookies, body, chunked) = response.into_parts();
        let mut buffer = BytesMut::with_capacity(512);

        if status.is_bodiless() {
            write_head(&mut buffer, status, &headers, &cookies, Framing::None, keep_alive);
            return Self {
                buffer,
                source: None,
                chunked: false,
                written: 0,
            };
        }

        let mut source = None;
        match body {
            Body::Empty | Body::Full(_) if chunked => {
                write_head(&mut buffer, status, &headers, &cookies, Framing::Chunked, keep_alive);
                if let Body::Full(bytes) = body {
                    put_chunk(&mut buffer, &bytes);
                }
                buffer.put_slice(b"0\r\n\r\n");
            }
            Body::Empty => {
                write_head(&mut buffer, status, &headers, &cookies, Framing::Length(0), keep_alive);
            }
            Body::Full(bytes) => {
                let framing = Framing::Length(bytes.len() as u64);
                write_head(&mut buffer, status, &headers, &cookies, framing, keep_alive);
                buffer.put_slice(&bytes);
            }
            Body::Stream { source: stream, length } => {
                let framing = match length {
                    Some(len) => Framing::Length(len),
                    None => Framing::Chunked,
                };
                write_head(&mut buffer, status, &headers, &cookies, framing, keep_alive);
                source = Some(stream);
            }
        }

        Self {
            buffer,
            source,
            chunked,
            written: 0,
        }
    }

    /// Bytes ready to be written.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Marks `n` pending bytes as written.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.buffer.len());
        self.buffer.advance(n);
        self.written += n;
    }

    /// Pulls the next piece of a streaming body once the pending bytes have
    /// drained. Appends the chunked terminator when the stream ends.
    pub fn fill(&mut self) -> io::Result<()> {
        while self.buffer.is_empty() {
            let Some(source) = self.source.as_mut() else {
                return Ok(());
            };

            match source.next_chunk()? {
                Some(chunk) if self.chunked => put_chunk(&mut self.buffer, &chunk),
                Some(chunk) => self.buffer.put_slice(&chunk),
                None => {
                    if self.chunked {
                        self.buffer.put_slice(b"0\r\n\r\n");
                    }
                    self.source = None;
                }
            }
        }
        Ok(())
    }

    /// Whether every byte of the response has been handed out.
    pub fn is_finished(&self) -> bool {
        self.buffer.is_empty() && self.source.is_none()
    }

    /// Total bytes handed out so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }
}

/// Serializes a whole response, draining any streaming body.
pub fn serialize_response(response: Response, keep_alive: bool) -> io::Result<Bytes> {
    let mut writer = ResponseWriter::new(response, keep_alive);
    let mut out = BytesMut::new();

    loop {
        writer.fill()?;
        if writer.is_finished() {
            break;
        }
        let n = writer.pending().len();
        out.put_slice(writer.pending());
        writer.advance(n);
    }

    Ok(out.freeze())
}
