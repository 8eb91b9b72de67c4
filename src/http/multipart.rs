//! `multipart/form-data` decoding.
//!
//! Decoding is lenient: parts that cannot be understood are skipped and a
//! body without a usable boundary produces no fields at all.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use bytes::Bytes;

use crate::http::headers::HeaderMap;
use crate::http::parser::{find_headers_end, find_subslice, parse_header_lines};

/// A file received in a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file was attached to
    pub field_name: String,
    /// Filename supplied by the client
    pub file_name: String,
    /// Content type of the part, `text/plain` when absent
    pub content_type: String,
    /// Size of `data` in bytes
    pub size: usize,
    pub data: Bytes,
}

impl UploadedFile {
    /// Writes the file contents to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, &self.data)
    }
}

/// Fields and files decoded from one multipart body.
#[derive(Debug, Default)]
pub struct Multipart {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

/// Extracts the boundary token from a `Content-Type` value.
///
/// Both `boundary=abc` and `boundary="abc"` are accepted.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }

        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Splits `body` on `--boundary` markers and decodes every part.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Multipart {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut result = Multipart::default();

    let Some(first) = find_subslice(body, delimiter) else {
        return result;
    };
    let mut rest = &body[first + delimiter.len()..];

    loop {
        // `--` right after a delimiter closes the body.
        if rest.starts_with(b"--") {
            break;
        }

        let (part, next) = match find_subslice(rest, delimiter) {
            Some(end) => (&rest[..end], Some(&rest[end + delimiter.len()..])),
            None => (rest, None),
        };

        if let Some(part) = decode_part(part) {
            match part {
                Part::Field { name, value } => {
                    result.fields.insert(name, value);
                }
                Part::File(file) => result.files.push(file),
            }
        }

        match next {
            Some(next) => rest = next,
            None => break,
        }
    }

    result
}

enum Part {
    Field { name: String, value: String },
    File(UploadedFile),
}

fn decode_part(raw: &[u8]) -> Option<Part> {
    let raw = strip_leading_newline(raw);

    let (headers_end, separator_len) = find_headers_end(raw)?;
    let head = std::str::from_utf8(&raw[..headers_end]).ok()?;
    let content = strip_trailing_newline(&raw[headers_end + separator_len..]);

    let mut headers = HeaderMap::new();
    parse_header_lines(head.lines(), &mut headers);

    let disposition = headers.get("Content-Disposition")?;
    let params = disposition_params(disposition);
    let name = params.get("name")?.clone();

    match params.get("filename") {
        Some(file_name) if !file_name.is_empty() => Some(Part::File(UploadedFile {
            field_name: name,
            file_name: file_name.clone(),
            content_type: headers
                .get("Content-Type")
                .unwrap_or("text/plain")
                .to_string(),
            size: content.len(),
            data: Bytes::copy_from_slice(content),
        })),
        Some(_) => None,
        None => Some(Part::Field {
            name,
            value: String::from_utf8_lossy(content).into_owned(),
        }),
    }
}

fn disposition_params(value: &str) -> HashMap<String, String> {
    value
        .split(';')
        .skip(1)
        .filter_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            Some((
                key.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ))
        })
        .collect()
}

fn strip_leading_newline(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(b"\r\n")
        .or_else(|| raw.strip_prefix(b"\n"))
        .unwrap_or(raw)
}

fn strip_trailing_newline(raw: &[u8]) -> &[u8] {
    raw.strip_suffix(b"\r\n")
        .or_else(|| raw.strip_suffix(b"\n"))
        .unwrap_or(raw)
}
