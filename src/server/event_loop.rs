use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::server::connection::Connection;
use crate::server::{App, ShutdownHandle};

/// Last time a connection moved bytes, shared between the connection task
/// and the idle sweep.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    epoch: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ActivityClock {
    pub fn new(epoch: Instant) -> Self {
        let clock = Self {
            epoch,
            last_ms: Arc::new(AtomicU64::new(0)),
        };
        clock.touch();
        clock
    }

    pub fn touch(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.last_ms.store(now, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_ms.load(Ordering::Relaxed)))
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

struct Tracked {
    handle: JoinHandle<()>,
    activity: ActivityClock,
}

/// Accepts connections and watches over them until stopped.
///
/// Every connection is a task on the same single-threaded runtime, woken by
/// the reactor when its socket becomes readable or writable.
pub struct EventLoop {
    listener: TcpListener,
    app: Arc<App>,
    shutdown: ShutdownHandle,
    connections: HashMap<u64, Tracked>,
    next_id: u64,
    epoch: Instant,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("listener", &self.listener)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl EventLoop {
    pub(crate) fn new(listener: TcpListener, app: Arc<App>, shutdown: ShutdownHandle) -> Self {
        Self {
            listener,
            app,
            shutdown,
            connections: HashMap::new(),
            next_id: 0,
            epoch: Instant::now(),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Runs until [`ShutdownHandle::stop`] is called.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut stop = self.shutdown.subscribe();
        let mut sweep = tokio::time::interval(self.app.settings().sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop_requested(&mut stop) => {
                    info!("Shutdown requested");
                    break;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.add_connection(socket, peer),
                    Err(e) => warn!(error = %e, "accept failed"),
                },

                _ = sweep.tick() => self.sweep(),
            }
        }

        self.close_all();
        Ok(())
    }

    /// Starts serving an accepted socket.
    pub fn add_connection(&mut self, socket: TcpStream, peer: SocketAddr) {
        self.connections.retain(|_, tracked| !tracked.handle.is_finished());

        let max = self.app.settings().max_connections;
        if self.connections.len() >= max {
            warn!(peer = %peer, max, "connection limit reached, rejecting");
            return;
        }

        if let Err(e) = socket.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "could not set TCP_NODELAY");
        }

        info!("Accepted connection from {}", peer);

        let activity = ActivityClock::new(self.epoch);
        let conn = Connection::new(socket, peer, self.app.clone(), activity.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = conn.run().await {
                error!("Connection error from {}: {}", peer, e);
            }
        });

        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(id, Tracked { handle, activity });
    }

    /// Reaps finished connections and closes idle ones.
    pub fn sweep(&mut self) {
        let idle_timeout = self.app.settings().idle_timeout;

        self.connections.retain(|id, tracked| {
            if tracked.handle.is_finished() {
                return false;
            }
            if tracked.activity.idle_for() > idle_timeout {
                debug!(connection = id, "closing idle connection");
                tracked.handle.abort();
                return false;
            }
            true
        });
    }

    fn close_all(&mut self) {
        for (_, tracked) in self.connections.drain() {
            tracked.handle.abort();
        }
        info!("Event loop stopped");
    }
}
