//! Hearth - embeddable HTTP/1.1 server
//!
//! Core library: wire parsing and serialization, routing and middleware, and
//! a single-threaded event loop that serves them.

pub mod config;
pub mod error;
pub mod http;
pub mod router;
pub mod server;

pub use error::HttpError;
pub use http::request::{Method, Request};
pub use http::response::{Response, StatusCode};
pub use router::Router;
pub use router::middleware::Next;
pub use server::Server;
