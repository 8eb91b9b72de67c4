//! File responses: whole, streamed, ranged and conditional.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use bytes::Bytes;

use crate::error::HttpError;
use crate::http::response::{BodyStream, Response};

/// Files above this size are streamed with chunked encoding.
pub const DEFAULT_STREAM_THRESHOLD: u64 = 1024 * 1024;

/// Bytes read from disk per streamed chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Options for [`Response::send_file`] and friends.
#[derive(Debug, Clone)]
pub struct FileOptions {
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    /// Used verbatim instead of the computed ETag
    pub etag: Option<String>,
    pub chunk_size: usize,
    /// Stream with chunked encoding regardless of size
    pub stream: bool,
    pub stream_threshold: u64,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            content_type: None,
            cache_control: None,
            etag: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            stream: false,
            stream_threshold: DEFAULT_STREAM_THRESHOLD,
        }
    }
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn stream_threshold(mut self, threshold: u64) -> Self {
        self.stream_threshold = threshold;
        self
    }
}

/// How a `Range` header applies to a body of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// No usable range; serve the whole body.
    Full,
    /// Inclusive span to serve with 206.
    Partial { start: u64, end: u64 },
    /// Answer 416.
    Unsatisfiable,
}

impl ByteRange {
    /// Resolves a single `bytes=start-end` range against `size`.
    ///
    /// An omitted or oversized end is clamped to `size - 1`; `bytes=-n` asks
    /// for the last `n` bytes. Headers that are not a single byte range are
    /// ignored.
    pub fn resolve(header: Option<&str>, size: u64) -> ByteRange {
        let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return ByteRange::Full;
        };
        if spec.contains(',') {
            return ByteRange::Full;
        }
        let Some((start, end)) = spec.split_once('-') else {
            return ByteRange::Full;
        };
        let (start, end) = (start.trim(), end.trim());

        if start.is_empty() {
            return match end.parse::<u64>() {
                Ok(0) => ByteRange::Unsatisfiable,
                Ok(_) if size == 0 => ByteRange::Unsatisfiable,
                Ok(suffix) => ByteRange::Partial {
                    start: size.saturating_sub(suffix),
                    end: size - 1,
                },
                Err(_) => ByteRange::Full,
            };
        }

        let Ok(start) = start.parse::<u64>() else {
            return ByteRange::Full;
        };
        let end = if end.is_empty() {
            size.saturating_sub(1)
        } else {
            match end.parse::<u64>() {
                Ok(end) => end.min(size.saturating_sub(1)),
                Err(_) => return ByteRange::Full,
            }
        };

        if start >= size || start > end {
            ByteRange::Unsatisfiable
        } else {
            ByteRange::Partial { start, end }
        }
    }
}

/// ETag derived from size and modification time.
pub fn compute_etag(size: u64, modified: SystemTime) -> String {
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("\"{size:x}-{secs:x}\"")
}

/// Reads a file in `chunk_size` pieces as the socket drains.
///
/// Reads are blocking `std::fs` calls made on the event-loop thread, so a slow
/// disk stalls every connection on that loop while a chunk is read.
struct FileStream {
    reader: io::Take<File>,
    chunk_size: usize,
}

impl BodyStream for FileStream {
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(Some(Bytes::from(chunk)));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl Response {
    /// Sends the file at `path`.
    ///
    /// Emits `ETag`, `Last-Modified` and `Accept-Ranges`, answers 304 when the
    /// request's validators still match, honours a single byte range, and
    /// streams with chunked encoding above the stream threshold. A missing
    /// file is a 404 [`HttpError`].
    pub fn send_file(&mut self, path: impl AsRef<Path>, options: &FileOptions) -> anyhow::Result<()> {
        if self.is_sent() {
            return Ok(());
        }

        let path = path.as_ref();
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(HttpError::not_found(format!("File not found: {}", path.display())).into()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(HttpError::not_found(format!("File not found: {}", path.display())).into());
            }
            Err(e) => return Err(e).with_context(|| format!("failed to stat {}", path.display())),
        };

        let size = metadata.len();
        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        let etag = options
            .etag
            .clone()
            .unwrap_or_else(|| compute_etag(size, modified));

        if self.get_header("Content-Type").is_none() {
            let content_type = options
                .content_type
                .as_deref()
                .unwrap_or("application/octet-stream");
            self.content_type(content_type);
        }
        self.header("ETag", etag.as_str())
            .header("Last-Modified", httpdate::fmt_http_date(modified))
            .header("Accept-Ranges", "bytes");
        if let Some(cache_control) = &options.cache_control {
            self.header("Cache-Control", cache_control.as_str());
        }

        if self.is_not_modified(&etag, modified) {
            self.status(304).send(Bytes::new());
            return Ok(());
        }

        let open = || File::open(path).with_context(|| format!("failed to open {}", path.display()));

        match ByteRange::resolve(self.conditionals.range.as_deref(), size) {
            ByteRange::Unsatisfiable => {
                self.status(416)
                    .header("Content-Range", format!("bytes */{size}"))
                    .content_type("text/plain")
                    .send("Range Not Satisfiable");
            }
            ByteRange::Partial { start, end } => {
                let length = end - start + 1;
                let mut file = open()?;
                file.seek(SeekFrom::Start(start))?;

                self.status(206)
                    .header("Content-Range", format!("bytes {start}-{end}/{size}"));

                if length > options.stream_threshold {
                    let stream = FileStream {
                        reader: file.take(length),
                        chunk_size: options.chunk_size,
                    };
                    self.stream_body(Box::new(stream), Some(length));
                } else {
                    let mut body = Vec::with_capacity(length as usize);
                    file.take(length).read_to_end(&mut body)?;
                    self.send(body);
                }
            }
            ByteRange::Full => {
                let file = open()?;

                if options.stream || size > options.stream_threshold {
                    let stream = FileStream {
                        reader: file.take(size),
                        chunk_size: options.chunk_size,
                    };
                    self.stream_body(Box::new(stream), None);
                } else {
                    let mut body = Vec::with_capacity(size as usize);
                    file.take(size).read_to_end(&mut body)?;
                    self.send(body);
                }
            }
        }

        Ok(())
    }

    /// Sends the file as an attachment named `filename`, or after the file
    /// itself when no name is given.
    pub fn download(
        &mut self,
        path: impl AsRef<Path>,
        filename: Option<&str>,
        options: &FileOptions,
    ) -> anyhow::Result<()> {
        if self.is_sent() {
            return Ok(());
        }

        let path = path.as_ref();
        let name = filename
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "download".to_string());

        self.header(
            "Content-Disposition",
            format!("attachment; filename=\"{name}\""),
        );
        self.send_file(path, options)
    }

    /// Sends the file with chunked encoding whatever its size.
    pub fn stream_file(&mut self, path: impl AsRef<Path>, options: &FileOptions) -> anyhow::Result<()> {
        let options = options.clone().stream(true);
        self.send_file(path, &options)
    }

    fn is_not_modified(&self, etag: &str, modified: SystemTime) -> bool {
        if let Some(if_none_match) = &self.conditionals.if_none_match {
            return if_none_match
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == "*" || candidate == etag);
        }

        let Some(since) = self
            .conditionals
            .if_modified_since
            .as_deref()
            .and_then(|v| httpdate::parse_http_date(v).ok())
        else {
            return false;
        };

        // HTTP dates have one-second resolution.
        let modified_secs = modified.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        let since_secs = since.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        modified_secs <= since_secs
    }
}
