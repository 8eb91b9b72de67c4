use std::fmt;
use std::io;

use bytes::Bytes;
use serde::Serialize;

use crate::http::cookie::Cookie;
use crate::http::headers::HeaderMap;
use crate::http::request::Request;

/// An HTTP status code.
///
/// Any value can be carried; [`StatusCode::reason_phrase`] knows the common
/// ones and answers `Unknown` for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const PARTIAL_CONTENT: StatusCode = StatusCode(206);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const RANGE_NOT_SATISFIABLE: StatusCode = StatusCode(416);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    pub const fn from_u16(code: u16) -> Self {
        StatusCode(code)
    }

    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use hearth::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::NOT_FOUND.as_u16(), 404);
    /// ```
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            413 => "Payload Too Large",
            415 => "Unsupported Media Type",
            416 => "Range Not Satisfiable",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        }
    }

    /// Whether a response with this status carries no body at all.
    pub fn is_bodiless(&self) -> bool {
        (100..200).contains(&self.0) || self.0 == 204 || self.0 == 304
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

/// A pull-based source of body bytes, read as the socket drains.
pub trait BodyStream: Send {
    /// Returns the next piece of the body, or `None` once it is exhausted.
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;
}

impl<F> BodyStream for F
where
    F: FnMut() -> io::Result<Option<Bytes>> + Send,
{
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        self()
    }
}

/// Response body.
pub enum Body {
    Empty,
    Full(Bytes),
    /// Produced lazily. A known `length` is framed with `Content-Length`,
    /// an unknown one with chunked transfer encoding.
    Stream {
        source: Box<dyn BodyStream>,
        length: Option<u64>,
    },
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream { length, .. } => f.debug_struct("Stream").field("length", length).finish(),
        }
    }
}

/// Request headers that file responses consult for ranges and revalidation.
#[derive(Debug, Clone, Default)]
pub(crate) struct Conditionals {
    pub(crate) range: Option<String>,
    pub(crate) if_none_match: Option<String>,
    pub(crate) if_modified_since: Option<String>,
}

/// An HTTP response under construction.
///
/// The first completing call (`send`, `json`, `send_file`, `download`,
/// `stream_file`, `stream`, `redirect`) marks the response as sent. From then
/// on every mutating call is a no-op, so at most one response is produced no
/// matter how many middleware or handlers try to answer.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    body: Body,
    chunked: bool,
    sent: bool,
    pub(crate) conditionals: Conditionals,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Body::Empty,
            chunked: false,
            sent: false,
            conditionals: Conditionals::default(),
        }
    }

    /// Creates a response that remembers the request headers needed for
    /// range and conditional file responses.
    pub fn for_request(request: &Request) -> Self {
        let mut response = Self::new();
        response.conditionals = Conditionals {
            range: request.header("Range").map(str::to_string),
            if_none_match: request.header("If-None-Match").map(str::to_string),
            if_modified_since: request.header("If-Modified-Since").map(str::to_string),
        };
        response
    }

    pub fn status(&mut self, code: u16) -> &mut Self {
        if !self.sent {
            self.status = StatusCode(code);
        }
        self
    }

    /// Sets or replaces a header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        if !self.sent {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn headers<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.header(name, value);
        }
        self
    }

    pub fn content_type(&mut self, content_type: impl Into<String>) -> &mut Self {
        self.header("Content-Type", content_type)
    }

    pub fn cookie(&mut self, cookie: Cookie) -> &mut Self {
        if !self.sent {
            self.cookies.push(cookie);
        }
        self
    }

    /// Queues an already-expired cookie so the client drops `name`.
    pub fn clear_cookie(&mut self, name: impl Into<String>) -> &mut Self {
        self.cookie(
            Cookie::new(name, "")
                .path("/")
                .max_age(0)
                .expires(std::time::UNIX_EPOCH),
        )
    }

    /// Sends `body` as-is.
    pub fn send(&mut self, body: impl Into<Bytes>) -> &mut Self {
        if !self.sent {
            self.body = Body::Full(body.into());
            self.sent = true;
        }
        self
    }

    /// Serializes `value` as JSON and sends it with `application/json`.
    ///
    /// A value that fails to serialize is sent as `{}`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        if self.sent {
            return self;
        }

        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        self.content_type("application/json");
        self.send(body)
    }

    pub fn redirect(&mut self, url: impl Into<String>, code: u16) -> &mut Self {
        if self.sent {
            return self;
        }

        self.status(code).header("Location", url);
        self.send(Bytes::new())
    }

    /// Streams a body of unknown length with chunked transfer encoding.
    pub fn stream(&mut self, source: impl BodyStream + 'static) -> &mut Self {
        self.stream_body(Box::new(source), None)
    }

    pub(crate) fn stream_body(&mut self, source: Box<dyn BodyStream>, length: Option<u64>) -> &mut Self {
        if !self.sent {
            self.body = Body::Stream { source, length };
            self.sent = true;
        }
        self
    }

    /// Forces chunked transfer encoding for a full body.
    pub fn chunked(&mut self, chunked: bool) -> &mut Self {
        if !self.sent {
            self.chunked = chunked;
        }
        self
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// The body bytes, or `None` for a streaming body.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Empty => Some(&[][..]),
            Body::Full(bytes) => Some(&bytes[..]),
            Body::Stream { .. } => None,
        }
    }

    pub fn is_chunked(&self) -> bool {
        match &self.body {
            Body::Stream { length, .. } => length.is_none(),
            _ => self.chunked,
        }
    }

    /// Splits the response into the parts the writer serializes.
    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Vec<Cookie>, Body, bool) {
        let chunked = self.is_chunked();
        (self.status, self.headers, self.cookies, self.body, chunked)
    }
}
