use std::{
    fmt,
    net::{SocketAddr, SocketAddrV4},
    sync::{atomic::Ordering, Arc, RwLock},
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{error, info};

use crate::{
    runtime::{listener_thread::ListenerThread, worker_pool::WorkerPool},
    settings::ServerSettings,
    App,
};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_STARTUP_FAILURE: i32 = 1;
pub const EXIT_FORCED_SHUTDOWN: i32 = 2;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Bound,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Starting => "starting",
            ServerState::Bound => "bound",
            ServerState::Running => "running",
            ServerState::Draining => "draining",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A startup failure. Fatal: the process never enters Running and exits
/// with a non-zero code.
#[derive(Debug)]
pub enum BindError {
    AddressInUse(SocketAddrV4),
    PermissionDenied(SocketAddrV4),
    InvalidAddress(String),
    Io(std::io::Error),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::AddressInUse(addr) => write!(f, "address {addr} is already in use"),
            BindError::PermissionDenied(addr) => {
                write!(f, "permission denied binding to {addr}")
            }
            BindError::InvalidAddress(msg) => f.write_str(msg),
            BindError::Io(e) => write!(f, "failed to bind: {e}"),
        }
    }
}

impl std::error::Error for BindError {}

/// How the drain phase ended. Graceful maps to exit code 0, a forced
/// shutdown after the drain timeout to a distinct non-zero code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Graceful,
    ForcedShutdown,
}

impl DrainOutcome {
    pub fn exit_code(self: &Self) -> i32 {
        match self {
            DrainOutcome::Graceful => EXIT_SUCCESS,
            DrainOutcome::ForcedShutdown => EXIT_FORCED_SHUTDOWN,
        }
    }
}

/// Owns the process lifecycle: bind before accept, worker pool creation,
/// and signal-driven graceful shutdown bounded by the drain timeout.
pub struct Supervisor {
    app: Arc<App>,
    settings: ServerSettings,
}

impl Supervisor {
    pub fn new(app: &Arc<App>, settings: &ServerSettings) -> Self {
        Self {
            app: app.clone(),
            settings: settings.clone(),
        }
    }

    /// Starting -> Bound -> Running. Bind failure aborts startup.
    pub fn start(self: Self) -> Result<RunningServer, BindError> {
        let state = Arc::new(RwLock::new(ServerState::Starting));
        info!("Supervisor: Starting");

        let addr = self
            .settings
            .socket_addr()
            .map_err(BindError::InvalidAddress)?;
        let listener = ListenerThread::bind(addr)?;
        let local_addr = listener.local_addr().map_err(BindError::Io)?;
        *state.write().unwrap() = ServerState::Bound;
        info!("Supervisor: Bound to {local_addr}");

        let metrics = self.app.metrics.clone();
        let metrics_stop_signal = self.app.stop_signal.clone();
        thread::spawn(move || metrics.run(&metrics_stop_signal));

        let pool = WorkerPool::new(&self.app, self.settings.worker_threads);
        let listener_thread = ListenerThread::new(listener, pool.sender(), &self.app);
        let listener_handle = thread::spawn(move || listener_thread.run());

        *state.write().unwrap() = ServerState::Running;
        info!(
            "Supervisor: Running with {} worker threads",
            self.settings.worker_threads
        );

        Ok(RunningServer {
            app: self.app,
            local_addr,
            state,
            listener_handle,
            pool,
            drain_timeout: self.settings.drain_timeout(),
        })
    }
}

/// A server that has reached Running. Dropping this without calling wait()
/// abandons the serving threads.
pub struct RunningServer {
    app: Arc<App>,
    local_addr: SocketAddr,
    state: Arc<RwLock<ServerState>>,
    listener_handle: JoinHandle<()>,
    pool: WorkerPool,
    drain_timeout: Duration,
}

impl RunningServer {
    pub fn local_addr(self: &Self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(self: &Self) -> ServerState {
        *self.state.read().unwrap()
    }

    /// Initiates a graceful drain, same as a termination signal
    pub fn stop(self: &Self) {
        self.app.stop_signal.store(true, Ordering::Relaxed);
    }

    /// Blocks until a stop is signalled, then drains: no new connections
    /// are accepted, in-flight requests finish, bounded by the drain
    /// timeout.
    pub fn wait(self: Self) -> DrainOutcome {
        while !self.app.stop_signal.load(Ordering::Relaxed) {
            thread::sleep(STOP_POLL_INTERVAL);
        }

        *self.state.write().unwrap() = ServerState::Draining;
        info!("Supervisor: Draining");

        self.listener_handle.join().ok();
        let outcome = self.pool.drain(self.drain_timeout);
        match outcome {
            DrainOutcome::Graceful => info!("Supervisor: Drain complete"),
            DrainOutcome::ForcedShutdown => {
                error!("Supervisor: Drain timeout exceeded, forcing shutdown")
            }
        }

        *self.state.write().unwrap() = ServerState::Stopped;
        info!(
            "Supervisor: Stopped after {} requests",
            self.app.request_count.load(Ordering::Relaxed)
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_outcomes_map_to_exit_codes() {
        assert_eq!(DrainOutcome::Graceful.exit_code(), EXIT_SUCCESS);
        assert_eq!(DrainOutcome::ForcedShutdown.exit_code(), EXIT_FORCED_SHUTDOWN);
        assert_ne!(EXIT_FORCED_SHUTDOWN, EXIT_STARTUP_FAILURE);
    }

    #[test]
    fn states_render_for_logging() {
        assert_eq!(ServerState::Running.to_string(), "running");
        assert_eq!(ServerState::Draining.to_string(), "draining");
    }
}
