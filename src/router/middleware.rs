//! Middleware and the continuation that drives them.
//!
//! A middleware receives the request, the response and a [`Next`]. It can
//! call `next.run(req, res)` to hand over to the rest of the chain (and do
//! more work once that returns), answer on its own and return without calling
//! it, or stop the chain with `next.fail(err)`.
//!
//! ```
//! use hearth::router::middleware::{self, Next};
//!
//! let auth = middleware::from_fn(|req, res, next: Next<'_>| {
//!     if req.header("Authorization").is_none() {
//!         res.status(401).send("Unauthorized");
//!         return Ok(());
//!     }
//!     next.run(req, res)
//! });
//! # let _ = auth;
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::http::request::Request;
use crate::http::response::Response;

/// A route handler.
pub type Handler = Arc<dyn Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync>;

/// A middleware step.
pub type Middleware =
    Arc<dyn Fn(&mut Request, &mut Response, Next<'_>) -> anyhow::Result<()> + Send + Sync>;

/// What runs after the last middleware.
pub type Endpoint<'a> = dyn Fn(&mut Request, &mut Response) -> anyhow::Result<()> + 'a;

/// The rest of a middleware chain.
///
/// Consumed on use, so a middleware continues the chain at most once.
pub struct Next<'a> {
    chain: &'a [Middleware],
    endpoint: &'a Endpoint<'a>,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Middleware], endpoint: &'a Endpoint<'a>) -> Self {
        Self { chain, endpoint }
    }

    /// Runs the next middleware, or the endpoint once the chain is exhausted.
    ///
    /// Does nothing once the response has been sent.
    pub fn run(self, req: &mut Request, res: &mut Response) -> anyhow::Result<()> {
        if res.is_sent() {
            return Ok(());
        }

        match self.chain.split_first() {
            Some((middleware, rest)) => middleware(req, res, Next::new(rest, self.endpoint)),
            None => (self.endpoint)(req, res),
        }
    }

    /// Stops the chain with an error for the error handler.
    pub fn fail(self, err: impl Into<anyhow::Error>) -> anyhow::Result<()> {
        Err(err.into())
    }

    /// Middleware left after this point, endpoint excluded.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// An ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middleware: Vec<Middleware>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Runs the chain in registration order, ending in `endpoint`.
    pub fn execute(
        &self,
        req: &mut Request,
        res: &mut Response,
        endpoint: &Endpoint<'_>,
    ) -> anyhow::Result<()> {
        Next::new(&self.middleware, endpoint).run(req, res)
    }

    pub fn as_slice(&self) -> &[Middleware] {
        &self.middleware
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

/// Wraps a closure as [`Middleware`].
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(&mut Request, &mut Response, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Runs `middleware` only for paths at or below `prefix`; other requests pass
/// straight through.
pub fn scoped(prefix: impl Into<String>, middleware: Middleware) -> Middleware {
    let prefix = prefix.into().trim_end_matches('/').to_string();

    from_fn(move |req, res, next| {
        if strip_prefix(&req.path, &prefix).is_some() {
            middleware(req, res, next)
        } else {
            next.run(req, res)
        }
    })
}

/// Logs every request with its status and latency.
pub fn request_logger() -> Middleware {
    from_fn(|req, res, next| {
        let started = Instant::now();
        let method = req.method.clone();
        let path = req.original_path.clone().unwrap_or_else(|| req.path.clone());

        let result = next.run(req, res);

        tracing::info!(
            method = %method,
            path = %path,
            status = res.status_code().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{} {}",
            method,
            path
        );
        result
    })
}

/// Remainder of `path` below `prefix`, matched on a segment boundary.
///
/// `prefix` must not end in `/`; an empty prefix matches everything.
pub(crate) fn strip_prefix(path: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some(path.to_string());
    }

    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}
