use std::path::PathBuf;

use hearth::HttpError;
use hearth::http::file::{ByteRange, FileOptions, compute_etag};
use hearth::http::parser::parse_http_response;
use hearth::http::request::{Method, RequestBuilder};
use hearth::http::response::Response;
use hearth::http::writer::serialize_response;
use tempfile::TempDir;

fn fixture(len: usize) -> (TempDir, PathBuf, Vec<u8>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.bin");
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &data).unwrap();
    (dir, path, data)
}

fn response_with(headers: &[(&str, &str)]) -> Response {
    let mut builder = RequestBuilder::new().method(Method::GET).path("/file");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    Response::for_request(&builder.build().unwrap())
}

#[test]
fn test_byte_range_resolution() {
    assert_eq!(ByteRange::resolve(None, 10), ByteRange::Full);
    assert_eq!(
        ByteRange::resolve(Some("bytes=0-4"), 10),
        ByteRange::Partial { start: 0, end: 4 }
    );
    assert_eq!(
        ByteRange::resolve(Some("bytes=5-"), 10),
        ByteRange::Partial { start: 5, end: 9 }
    );
    assert_eq!(
        ByteRange::resolve(Some("bytes=5-100"), 10),
        ByteRange::Partial { start: 5, end: 9 }
    );
    assert_eq!(
        ByteRange::resolve(Some("bytes=-3"), 10),
        ByteRange::Partial { start: 7, end: 9 }
    );
    assert_eq!(ByteRange::resolve(Some("bytes=6-2"), 10), ByteRange::Unsatisfiable);
    assert_eq!(ByteRange::resolve(Some("bytes=10-12"), 10), ByteRange::Unsatisfiable);
    assert_eq!(ByteRange::resolve(Some("bytes=0-1,4-5"), 10), ByteRange::Full);
    assert_eq!(ByteRange::resolve(Some("items=0-1"), 10), ByteRange::Full);
    assert_eq!(ByteRange::resolve(Some("bytes=a-b"), 10), ByteRange::Full);
}

#[test]
fn test_send_file_whole() {
    let (_dir, path, data) = fixture(64);
    let mut res = response_with(&[]);

    res.send_file(&path, &FileOptions::new().content_type("application/x-test"))
        .unwrap();

    assert!(res.is_sent());
    assert_eq!(res.status_code().as_u16(), 200);
    assert_eq!(res.body_bytes(), Some(&data[..]));
    assert_eq!(res.get_header("Content-Type"), Some("application/x-test"));
    assert_eq!(res.get_header("Accept-Ranges"), Some("bytes"));
    assert!(res.get_header("ETag").is_some());
    assert!(res.get_header("Last-Modified").is_some());
}

#[test]
fn test_send_file_default_content_type_and_cache_control() {
    let (_dir, path, _) = fixture(8);
    let mut res = response_with(&[]);

    res.send_file(&path, &FileOptions::new().cache_control("max-age=60"))
        .unwrap();

    assert_eq!(res.get_header("Content-Type"), Some("application/octet-stream"));
    assert_eq!(res.get_header("Cache-Control"), Some("max-age=60"));
}

#[test]
fn test_send_file_range_returns_partial_content() {
    let (_dir, path, data) = fixture(1000);
    let mut res = response_with(&[("Range", "bytes=100-199")]);

    res.send_file(&path, &FileOptions::default()).unwrap();

    assert_eq!(res.status_code().as_u16(), 206);
    assert_eq!(res.get_header("Content-Range"), Some("bytes 100-199/1000"));

    let bytes = serialize_response(res, true).unwrap();
    let (parsed, _) = parse_http_response(&bytes).unwrap();
    assert_eq!(parsed.headers.get("Content-Length"), Some("100"));
    assert_eq!(&parsed.body[..], &data[100..200]);
}

#[test]
fn test_send_file_large_range_is_streamed_with_length() {
    let (_dir, path, data) = fixture(4096);
    let mut res = response_with(&[("Range", "bytes=1000-")]);

    let options = FileOptions::new().stream_threshold(512).chunk_size(700);
    res.send_file(&path, &options).unwrap();

    assert_eq!(res.body_bytes(), None);
    assert!(!res.is_chunked());

    let bytes = serialize_response(res, true).unwrap();
    let (parsed, _) = parse_http_response(&bytes).unwrap();
    assert_eq!(parsed.status, 206);
    assert_eq!(parsed.headers.get("Content-Length"), Some("3096"));
    assert_eq!(&parsed.body[..], &data[1000..]);
}

#[test]
fn test_send_file_unsatisfiable_range() {
    let (_dir, path, _) = fixture(100);
    let mut res = response_with(&[("Range", "bytes=500-600")]);

    res.send_file(&path, &FileOptions::default()).unwrap();

    assert_eq!(res.status_code().as_u16(), 416);
    assert_eq!(res.get_header("Content-Range"), Some("bytes */100"));
}

#[test]
fn test_send_file_if_none_match_returns_not_modified() {
    let (_dir, path, _) = fixture(32);
    let mut res = response_with(&[("If-None-Match", "\"v1\"")]);

    res.send_file(&path, &FileOptions::new().etag("\"v1\"")).unwrap();

    assert_eq!(res.status_code().as_u16(), 304);
    assert_eq!(res.body_bytes(), Some(&b""[..]));
    assert_eq!(res.get_header("ETag"), Some("\"v1\""));
}

#[test]
fn test_send_file_stale_etag_sends_body() {
    let (_dir, path, data) = fixture(32);
    let mut res = response_with(&[("If-None-Match", "\"old\"")]);

    res.send_file(&path, &FileOptions::default()).unwrap();

    assert_eq!(res.status_code().as_u16(), 200);
    assert_eq!(res.body_bytes(), Some(&data[..]));
}

#[test]
fn test_send_file_if_modified_since_returns_not_modified() {
    let (_dir, path, _) = fixture(32);
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
    let since = httpdate::fmt_http_date(modified + std::time::Duration::from_secs(5));
    let mut res = response_with(&[("If-Modified-Since", since.as_str())]);

    res.send_file(&path, &FileOptions::default()).unwrap();

    assert_eq!(res.status_code().as_u16(), 304);
}

#[test]
fn test_computed_etag_matches_header() {
    let (_dir, path, _) = fixture(77);
    let meta = std::fs::metadata(&path).unwrap();
    let expected = compute_etag(meta.len(), meta.modified().unwrap());

    let mut res = response_with(&[]);
    res.send_file(&path, &FileOptions::default()).unwrap();

    assert_eq!(res.get_header("ETag"), Some(expected.as_str()));
}

#[test]
fn test_stream_file_uses_chunked_encoding() {
    let (_dir, path, data) = fixture(3000);
    let mut res = response_with(&[]);

    res.stream_file(&path, &FileOptions::new().chunk_size(1024))
        .unwrap();
    assert!(res.is_chunked());

    let bytes = serialize_response(res, true).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("Transfer-Encoding: chunked\r\n"));
    assert!(text.contains("\r\n400\r\n"));

    let (parsed, consumed) = parse_http_response(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(&parsed.body[..], &data[..]);
}

#[test]
fn test_files_over_threshold_are_streamed() {
    let (_dir, path, _) = fixture(2048);
    let mut res = response_with(&[]);

    res.send_file(&path, &FileOptions::new().stream_threshold(1024))
        .unwrap();

    assert!(res.is_chunked());
    assert_eq!(res.body_bytes(), None);
}

#[test]
fn test_download_sets_attachment_disposition() {
    let (_dir, path, _) = fixture(10);

    let mut res = response_with(&[]);
    res.download(&path, Some("report.bin"), &FileOptions::default())
        .unwrap();
    assert_eq!(
        res.get_header("Content-Disposition"),
        Some("attachment; filename=\"report.bin\"")
    );

    let mut res = response_with(&[]);
    res.download(&path, None, &FileOptions::default()).unwrap();
    assert_eq!(
        res.get_header("Content-Disposition"),
        Some("attachment; filename=\"data.bin\"")
    );
}

#[test]
fn test_missing_file_is_not_found_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut res = response_with(&[]);

    let err = res
        .send_file(dir.path().join("nope.txt"), &FileOptions::default())
        .unwrap_err();

    let http = err.downcast_ref::<HttpError>().unwrap();
    assert_eq!(http.status().as_u16(), 404);
    assert!(!res.is_sent());
}

#[test]
fn test_send_file_after_send_is_noop() {
    let (_dir, path, _) = fixture(10);
    let mut res = response_with(&[]);
    res.send("first");

    res.send_file(&path, &FileOptions::default()).unwrap();

    assert_eq!(res.body_bytes(), Some(&b"first"[..]));
    assert!(res.get_header("ETag").is_none());
}
