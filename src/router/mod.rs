//! Routing and middleware composition.
//!
//! A [`Router`] holds routes, middleware and mounted sub-routers. Dispatch
//! tries mounted routers first, in mount order, then the router's own routes
//! in registration order; the first route whose method and pattern both match
//! handles the request.
//!
//! ```
//! use hearth::router::Router;
//!
//! let mut api = Router::new();
//! api.get("/users/:id", |req, res| {
//!     let id = req.param("id").unwrap_or_default();
//!     res.json(&serde_json::json!({ "id": id }));
//!     Ok(())
//! });
//!
//! let mut root = Router::new();
//! root.mount("/api", api);
//! ```

pub mod middleware;
pub mod pattern;

use std::sync::Arc;

use crate::http::request::{Method, Request};
use crate::http::response::Response;

use middleware::{Handler, Middleware, Next};
use pattern::RoutePattern;

/// A registered route.
pub struct Route {
    method: Method,
    pattern: RoutePattern,
    handler: Handler,
    middleware: Vec<Middleware>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }
}

#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    middleware: Vec<Middleware>,
    mounts: Vec<(String, Router)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route with its own middleware.
    pub fn route<H>(
        &mut self,
        method: Method,
        path: &str,
        middleware: Vec<Middleware>,
        handler: H,
    ) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        tracing::debug!(method = %method, path, "route registered");

        self.routes.push(Route {
            method,
            pattern: RoutePattern::new(path),
            handler: Arc::new(handler),
            middleware,
        });
        self
    }

    pub fn get<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, Vec::new(), handler)
    }

    pub fn post<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, Vec::new(), handler)
    }

    pub fn put<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, Vec::new(), handler)
    }

    pub fn delete<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, Vec::new(), handler)
    }

    pub fn patch<H>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, Vec::new(), handler)
    }

    pub fn get_with<H>(&mut self, path: &str, middleware: Vec<Middleware>, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::GET, path, middleware, handler)
    }

    pub fn post_with<H>(&mut self, path: &str, middleware: Vec<Middleware>, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::POST, path, middleware, handler)
    }

    pub fn put_with<H>(&mut self, path: &str, middleware: Vec<Middleware>, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PUT, path, middleware, handler)
    }

    pub fn delete_with<H>(&mut self, path: &str, middleware: Vec<Middleware>, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, path, middleware, handler)
    }

    pub fn patch_with<H>(&mut self, path: &str, middleware: Vec<Middleware>, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, path, middleware, handler)
    }

    /// Adds middleware run before every route of this router.
    ///
    /// Requests served by a mounted router only see that router's middleware.
    pub fn use_middleware<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(f));
        self
    }

    pub fn add_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Adds middleware that only runs for paths at or below `prefix`.
    pub fn use_at<F>(&mut self, prefix: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.middleware
            .push(middleware::scoped(prefix, middleware::from_fn(f)));
        self
    }

    /// Mounts `router` under `prefix`.
    ///
    /// Inside the mounted router `req.path` is the remainder after the prefix,
    /// always starting with `/`; `req.original_path` keeps the full path.
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        tracing::debug!(prefix = %prefix, "router mounted");
        self.mounts.push((prefix, router));
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Dispatches the request.
    ///
    /// Returns `Ok(true)` when a route handled it and `Ok(false)` when nothing
    /// matched. Errors from middleware or the handler are passed up untouched.
    pub fn handle(&self, req: &mut Request, res: &mut Response) -> anyhow::Result<bool> {
        for (prefix, router) in &self.mounts {
            let Some(rest) = middleware::strip_prefix(&req.path, prefix) else {
                continue;
            };

            let full_path = std::mem::replace(&mut req.path, rest);
            let previous_original = req.original_path.clone();
            if req.original_path.is_none() {
                req.original_path = Some(full_path.clone());
            }

            let result = router.handle(req, res);
            req.path = full_path;

            match result {
                Ok(false) => req.original_path = previous_original,
                handled => return handled,
            }
        }

        for route in &self.routes {
            if route.method != req.method {
                continue;
            }
            let Some(params) = route.pattern.matches(&req.path) else {
                continue;
            };
            req.params.extend(params);

            let chain: Vec<Middleware> = self
                .middleware
                .iter()
                .chain(&route.middleware)
                .cloned()
                .collect();
            let handler = |req: &mut Request, res: &mut Response| -> anyhow::Result<()> {
                if res.is_sent() {
                    return Ok(());
                }
                (route.handler)(req, res)
            };

            Next::new(&chain, &handler).run(req, res)?;
            return Ok(true);
        }

        Ok(false)
    }
}
