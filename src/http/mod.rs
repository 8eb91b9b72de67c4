//! HTTP protocol implementation.
//!
//! This module holds the HTTP/1.1 wire layer, independent of sockets.
//!
//! # Architecture
//!
//! - **`buffer`**: Growable read buffer for a connection
//! - **`headers`**: Insertion-ordered, case-insensitive header map
//! - **`parser`**: Frames and parses requests from byte buffers
//! - **`request`**: HTTP request representation and accessors
//! - **`cookie`**: `Cookie` header parsing and `Set-Cookie` values
//! - **`multipart`**: `multipart/form-data` bodies and uploaded files
//! - **`response`**: HTTP response under construction, sent at most once
//! - **`file`**: File responses with ranges, validators and streaming
//! - **`writer`**: Serializes responses into wire bytes
//!
//! # Request lifecycle
//!
//! ```text
//!   bytes ──► RequestParser ──► Request
//!                                  │
//!                                  ▼
//!                        middleware + router
//!                                  │
//!                                  ▼
//!   bytes ◄── ResponseWriter ◄── Response
//! ```

pub mod buffer;
pub mod cookie;
pub mod file;
pub mod headers;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
