use std::time::{Duration, UNIX_EPOCH};

use hearth::http::cookie::{Cookie, SameSite, parse_cookie_header};

#[test]
fn test_cookie_name_value_only() {
    assert_eq!(Cookie::new("a", "1").to_string(), "a=1");
}

#[test]
fn test_cookie_all_attributes() {
    let cookie = Cookie::new("session", "abc")
        .domain("example.com")
        .path("/app")
        .expires(UNIX_EPOCH + Duration::from_secs(784_111_777))
        .max_age(3600)
        .secure(true)
        .http_only(true)
        .same_site(SameSite::None);

    assert_eq!(
        cookie.to_string(),
        "session=abc; Domain=example.com; Path=/app; \
         Expires=Sun, 06 Nov 1994 08:49:37 GMT; Max-Age=3600; Secure; HttpOnly; SameSite=None"
    );
}

#[test]
fn test_cookie_accessors() {
    let cookie = Cookie::new("theme", "dark");

    assert_eq!(cookie.name(), "theme");
    assert_eq!(cookie.value(), "dark");
}

#[test]
fn test_parse_cookie_header() {
    let cookies = parse_cookie_header("a=1; b = two ; c=x=y;;=bad; d");

    assert_eq!(cookies.get("a").unwrap(), "1");
    assert_eq!(cookies.get("b").unwrap(), "two");
    assert_eq!(cookies.get("c").unwrap(), "x=y");
    assert_eq!(cookies.len(), 3);
}
