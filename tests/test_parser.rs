use hearth::http::parser::{
    ParseError, RequestParser, parse_http_request, parse_http_response, parse_query,
};
use hearth::http::request::Method;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/api");
    assert_eq!(&parsed.body[..], b"hello");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(parsed.headers.get("user-agent").unwrap(), "test-client");
    assert_eq!(parsed.headers.get("ACCEPT").unwrap(), "*/*");
}

#[test]
fn test_parse_request_splits_query_string() {
    let req = b"GET /search?q=rust&page=2&flag HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.path, "/search");
    assert_eq!(parsed.query_string, "q=rust&page=2&flag");
    assert_eq!(parsed.query("q"), Some("rust"));
    assert_eq!(parsed.query("page"), Some("2"));
    assert_eq!(parsed.query("flag"), Some(""));
}

#[test]
fn test_query_values_are_not_decoded() {
    let query = parse_query("name=John%20Doe&a=b=c");

    assert_eq!(query.get("name").unwrap(), "John%20Doe");
    assert_eq!(query.get("a").unwrap(), "b=c");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_unknown_method_is_kept() {
    let req = b"BREW /pot HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::Other("BREW".to_string()));
    assert_eq!(parsed.method.as_str(), "BREW");
}

#[test]
fn test_parse_malformed_header_is_skipped() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\nHost: ok\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.len(), 1);
    assert_eq!(parsed.header("Host"), Some("ok"));
}

#[test]
fn test_parse_header_value_split_at_first_colon() {
    let req = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.header("Host"), Some("localhost:8080"));
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} / HTTP/1.1\r\n\r\n", method_str);
        let (parsed, _) = parse_http_request(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_accepts_bare_newlines() {
    let req = b"GET /lf HTTP/1.1\nHost: example.com\n\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.path, "/lf");
    assert_eq!(parsed.header("Host"), Some("example.com"));
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_leaves_pipelined_bytes() {
    let first = b"GET /one HTTP/1.1\r\n\r\n".as_slice();
    let second = b"GET /two HTTP/1.1\r\n\r\n".as_slice();
    let buf = [first, second].concat();

    let (parsed, consumed) = parse_http_request(&buf).unwrap();
    assert_eq!(parsed.path, "/one");
    assert_eq!(consumed, first.len());

    let (parsed, _) = parse_http_request(&buf[consumed..]).unwrap();
    assert_eq!(parsed.path, "/two");
}

#[test]
fn test_parse_request_with_empty_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body.len(), 0);
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(&parsed.body[..], &[0, 1, 2, 3]);
}

#[test]
fn test_parse_rejects_declared_length_over_limit() {
    let parser = RequestParser::new(64);
    let req = b"POST /big HTTP/1.1\r\nContent-Length: 1000\r\n\r\n";

    assert!(matches!(
        parser.parse(req),
        Err(ParseError::TooLarge { limit: 64, .. })
    ));
}

#[test]
fn test_parse_rejects_content_length_near_usize_max() {
    let parser = RequestParser::default();
    let req = format!(
        "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\nabc",
        usize::MAX
    );

    assert!(matches!(
        parser.parse(req.as_bytes()),
        Err(ParseError::TooLarge { size: usize::MAX, .. })
    ));
}

#[test]
fn test_parse_response_with_huge_chunk_size_is_incomplete() {
    let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nabc";

    assert!(matches!(
        parse_http_response(raw),
        Err(ParseError::Incomplete)
    ));
}

#[test]
fn test_parse_rejects_unterminated_head_over_limit() {
    let parser = RequestParser::new(32);
    let req = format!("GET /{} HTTP/1.1\r\n", "a".repeat(64));

    assert!(matches!(
        parser.parse(req.as_bytes()),
        Err(ParseError::TooLarge { .. })
    ));
}

#[test]
fn test_parse_multipart_without_length_ends_at_closing_boundary() {
    let req = b"POST /upload HTTP/1.1\r\n\
Content-Type: multipart/form-data; boundary=XyZ\r\n\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello\r\n\
--XyZ--\r\n";

    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(consumed, req.len());
    assert_eq!(parsed.field("title"), Some("hello"));
}

#[test]
fn test_parse_multipart_without_length_waits_for_boundary() {
    let req = b"POST /upload HTTP/1.1\r\n\
Content-Type: multipart/form-data; boundary=XyZ\r\n\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hel";

    assert!(matches!(parse_http_request(req), Err(ParseError::Incomplete)));
}
