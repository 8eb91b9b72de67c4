use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::http::cookie::parse_cookie_header;
use crate::http::headers::HeaderMap;
use crate::http::multipart::{self, UploadedFile};
use crate::http::parser::parse_query;

/// HTTP request methods.
///
/// Methods the router knows how to register are listed explicitly; anything
/// else is preserved verbatim in `Other` so it can still be logged and answered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other token found in the request line
    Other(String),
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// Matching is case-sensitive, as method tokens are.
    ///
    /// # Example
    ///
    /// ```
    /// # use hearth::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    /// Like [`Method::from_str`], but keeps unknown tokens as `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        Self::from_str(s).unwrap_or_else(|| Method::Other(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Property = Box<dyn Any + Send + Sync>;

/// Represents a parsed HTTP request from a client.
///
/// Handlers see the request immutably. The framework binds route parameters
/// and rewrites `path` while dispatching into mounted routers; middleware get
/// a mutable borrow and may attach typed properties for later stages.
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path without the query string. Inside a mounted router
    /// this is the remainder after the mount prefix.
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query_string: String,
    /// Query parameters, values taken literally
    pub query: HashMap<String, String>,
    /// Route parameters bound while matching
    pub params: HashMap<String, String>,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Cookies from the `Cookie` header
    pub cookies: HashMap<String, String>,
    /// Raw request body
    pub body: Bytes,
    /// Urlencoded and multipart form fields
    pub form: HashMap<String, String>,
    /// Files uploaded through `multipart/form-data`
    pub files: Vec<UploadedFile>,
    /// Address of the client, when known
    pub peer_addr: Option<SocketAddr>,
    /// Path as received, set once a mounted router rewrites `path`
    pub original_path: Option<String>,
    properties: HashMap<String, Property>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("files", &self.files.len())
            .field("peer_addr", &self.peer_addr)
            .finish_non_exhaustive()
    }
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            query_string: String::new(),
            query: HashMap::new(),
            params: HashMap::new(),
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            body: Bytes::new(),
            form: HashMap::new(),
            files: Vec::new(),
            peer_addr: None,
            original_path: None,
            properties: HashMap::new(),
        }
    }
}

/// Builder for constructing Request objects.
///
/// Derived fields (query map, cookies, form fields, uploads) are computed in
/// [`RequestBuilder::build`] exactly as the wire parser computes them.
#[derive(Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    version: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the request target; anything after `?` becomes the query string.
    pub fn path(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let method = self.method.ok_or("method missing")?;
        let target = self.target.ok_or("path missing")?;

        Ok(Request::from_parts(
            method,
            &target,
            self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            self.headers,
            self.body,
        ))
    }
}

impl Request {
    /// Assembles a request from its wire parts and derives the query map,
    /// cookies, form fields and uploaded files.
    pub fn from_parts(
        method: Method,
        target: &str,
        version: String,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query.to_string()),
            None => (target.to_string(), String::new()),
        };

        let mut request = Request {
            method,
            query: parse_query(&query_string),
            path,
            query_string,
            version,
            headers,
            body,
            ..Request::default()
        };

        if let Some(cookie) = request.headers.get("Cookie") {
            request.cookies = parse_cookie_header(cookie);
        }

        request.decode_form();
        request
    }

    fn decode_form(&mut self) {
        let content_type = self.content_type().unwrap_or_default().to_string();

        if content_type.contains("multipart/form-data") {
            if let Some(boundary) = multipart::boundary_from_content_type(&content_type) {
                let parsed = multipart::parse_multipart(&self.body, &boundary);
                self.form.extend(parsed.fields);
                self.files = parsed.files;
            }
        } else if content_type.contains("application/x-www-form-urlencoded") {
            self.form = parse_query(&String::from_utf8_lossy(&self.body));
        }
    }

    /// Retrieves a header value by name, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// HTTP/1.1 keeps the connection unless the client sent `Connection: close`.
    /// HTTP/1.0 closes it unless the client asked for `keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version != "HTTP/1.0",
        }
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    /// Looks a value up in the form fields first, then the query string.
    pub fn input(&self, name: &str) -> Option<&str> {
        self.field(name).or_else(|| self.query(name))
    }

    pub fn file(&self, field_name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field_name == field_name)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Reads the body as JSON.
    ///
    /// The body is parsed when the content type mentions JSON or the body is
    /// non-empty. Any failure yields an empty object; this never errors.
    pub fn json(&self) -> serde_json::Value {
        let declared = self
            .content_type()
            .is_some_and(|ct| ct.contains("application/json"));

        if declared || !self.body.is_empty() {
            if let Ok(value) = serde_json::from_slice(&self.body) {
                return value;
            }
        }

        serde_json::Value::Object(serde_json::Map::new())
    }

    /// Deserializes the body into `T`, or `None` when it does not fit.
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Attaches a typed property for later middleware or the handler.
    pub fn set<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.properties.insert(name.into(), Box::new(value));
    }

    /// Returns a property if it exists and has type `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.properties.get(name)?.downcast_ref()
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Client IP address, when the peer is known.
    pub fn ip(&self) -> Option<String> {
        self.peer_addr.map(|addr| addr.ip().to_string())
    }
}
