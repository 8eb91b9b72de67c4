//! The embedding surface: configure, register, listen.
//!
//! ```no_run
//! use hearth::server::Server;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut server = Server::new();
//!     server.configure(8080, "0.0.0.0");
//!     server.get("/", |_req, res| {
//!         res.send("hello");
//!         Ok(())
//!     });
//!     server.listen()
//! }
//! ```

pub mod connection;
pub mod event_loop;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{Config, ServerConfig};
use crate::error::{default_error_handler, ErrorHandler, HttpError};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::router::Router;
use crate::router::middleware::{self, Middleware, Next};

pub use event_loop::EventLoop;

/// Runtime settings derived from [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    pub max_request_bytes: usize,
    pub max_connections: usize,
}

impl From<&ServerConfig> for Settings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            max_request_bytes: config.max_request_bytes,
            max_connections: config.max_connections,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Stops a running [`EventLoop`] from anywhere.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Closes every connection and the listener; `run` then returns.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Everything needed to answer a request, frozen once the server binds.
pub struct App {
    router: Router,
    middleware: Vec<Middleware>,
    error_handler: ErrorHandler,
    settings: Settings,
}

impl App {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs global middleware and the router, turning any error or panic
    /// into a response through the error handler.
    pub fn process(&self, req: &mut Request) -> Response {
        let mut res = Response::for_request(req);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(req, &mut res)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(method = %req.method, path = %req.path, panic = %message, "handler panicked");
                Some(anyhow::anyhow!(message))
            }
        };

        if let Some(err) = failure {
            if !res.is_sent() {
                res = Response::for_request(req);
            }
            (self.error_handler)(&err, req, &mut res);
        }

        res
    }

    fn dispatch(&self, req: &mut Request, res: &mut Response) -> anyhow::Result<()> {
        let router = |req: &mut Request, res: &mut Response| -> anyhow::Result<()> {
            if self.router.handle(req, res)? {
                Ok(())
            } else {
                Err(HttpError::not_found(format!("Route not found: {}", req.path)).into())
            }
        };

        Next::new(&self.middleware, &router).run(req, res)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// An HTTP server under construction.
pub struct Server {
    router: Router,
    middleware: Vec<Middleware>,
    error_handler: ErrorHandler,
    settings: Settings,
    shutdown: ShutdownHandle,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_settings(Settings::from(&config.server))
    }

    fn with_settings(settings: Settings) -> Self {
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            error_handler: Arc::new(default_error_handler),
            settings,
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn configure(&mut self, port: u16, host: impl Into<String>) -> &mut Self {
        self.settings.port = port;
        self.settings.host = host.into();
        self
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Adds middleware run for every request, before routing.
    pub fn use_middleware<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.middleware.push(middleware::from_fn(f));
        self
    }

    /// Adds an already built [`Middleware`] to the global chain.
    pub fn add_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Adds global middleware that only runs for paths at or below `prefix`.
    pub fn use_at<F>(&mut self, prefix: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.middleware
            .push(middleware::scoped(prefix, middleware::from_fn(f)));
        self
    }

    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        self.router.mount(prefix, router);
        self
    }

    pub fn route<H>(&mut self, method: Method, path: &str, middleware: Vec<Middleware>, handler: H) -> &mut Self
    where
        H: Fn(&Request, &mut Response) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.router.route(method, path, middleware, handler);
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

    /// Replaces the handler that turns errors into responses.
    pub fn set_error_handler<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&anyhow::Error, &Request, &mut Response) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(f);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Freezes the application and binds the listener.
    pub async fn bind(self) -> anyhow::Result<EventLoop> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local_addr = listener
            .local_addr()
            .with_context(|| format!("failed to read local address of {addr}"))?;
        info!("Listening on {}", local_addr);

        let app = Arc::new(App {
            router: self.router,
            middleware: self.middleware,
            error_handler: self.error_handler,
            settings: self.settings,
        });

        Ok(EventLoop::new(listener, app, self.shutdown))
    }

    /// Binds and serves on the current runtime until stopped.
    pub async fn serve(self) -> anyhow::Result<()> {
        self.bind().await?.run().await
    }

    /// Serves on a fresh single-threaded runtime, blocking until stopped.
    pub fn listen(self) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start runtime")?;
        runtime.block_on(self.serve())
    }
}
