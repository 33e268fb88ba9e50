use std::{
    io,
    net::{SocketAddr, SocketAddrV4, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use gantry_net::data_types::ConnectionId;

use super::ConnectionMessage;
use crate::{observability::Metrics, supervisor::BindError, App};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const LISTEN_BACKLOG: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Unbound,
    Bound,
    Accepting,
    Draining,
    Closed,
}

/// A thread that accepts connections and hands each one to the worker pool.
/// Construct with new() then call run() in a thread spawn closure.
pub struct ListenerThread {
    listener: TcpListener,
    sender: Sender<ConnectionMessage>,
    stop_signal: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
    next_connection_id: ConnectionId,
    state: ListenerState,
}

impl ListenerThread {
    /// Binds the listening socket with the address reuse option set before
    /// bind, so the address is immediately reusable across process restarts
    pub(crate) fn bind(addr: SocketAddrV4) -> Result<TcpListener, BindError> {
        let socket =
            Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(BindError::Io)?;
        socket.set_reuse_address(true).map_err(BindError::Io)?;
        socket
            .bind(&SocketAddr::V4(addr).into())
            .map_err(|e| match e.kind() {
                io::ErrorKind::AddrInUse => BindError::AddressInUse(addr),
                io::ErrorKind::PermissionDenied => BindError::PermissionDenied(addr),
                _ => BindError::Io(e),
            })?;
        socket.listen(LISTEN_BACKLOG).map_err(BindError::Io)?;
        Ok(socket.into())
    }

    pub(crate) fn new(
        listener: TcpListener,
        sender: Sender<ConnectionMessage>,
        app: &Arc<App>,
    ) -> Self {
        let mut thread = Self {
            listener,
            sender,
            stop_signal: app.stop_signal.clone(),
            metrics: app.metrics.clone(),
            next_connection_id: 1,
            state: ListenerState::Unbound,
        };
        thread.set_state(ListenerState::Bound);
        thread
    }

    /// This method owns Self so that when this function exits the dispatch
    /// sender and the listening socket are dropped
    pub(crate) fn run(mut self: Self) {
        info!("ListenerThread: Starting");
        if let Err(e) = self.listener.set_nonblocking(true) {
            self.stop(&format!("ListenerThread: Failed to configure accept: {e}"));
            return;
        }
        self.set_state(ListenerState::Accepting);
        while !self.stop_signal.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, remote_addr)) => self.dispatch(stream, remote_addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL)
                }
                // Aborted handshakes and descriptor exhaustion are transient;
                // the listener keeps accepting rather than draining the process
                Err(e) => {
                    warn!("ListenerThread: Accept failed: {e}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
        self.set_state(ListenerState::Draining);
        info!("ListenerThread: No longer accepting connections");
        self.set_state(ListenerState::Closed);
        info!("ListenerThread: Stopping");
    }

    fn dispatch(self: &mut Self, stream: TcpStream, remote_addr: SocketAddr) {
        let connection_id = self.next_connection_id;
        self.next_connection_id = self.next_connection_id.wrapping_add(1);

        debug!("ListenerThread: Client {remote_addr} connected. id={connection_id}");
        self.metrics.incr(Metrics::METRIC_CONNECTION_ACCEPTED_COUNT);

        // The listener polls non-blocking; workers read with timeouts
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("ListenerThread: Dropping connection {connection_id}: {e}");
            return;
        }

        let message = ConnectionMessage {
            connection_id,
            stream,
            remote_addr,
        };
        if self.sender.send(message).is_err() {
            self.stop("ListenerThread: Worker pool is gone");
        }
    }

    fn set_state(self: &mut Self, state: ListenerState) {
        debug!("ListenerThread: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn stop(self: &Self, msg: &str) {
        error!("{}", msg);
        info!("ListenerThread: Signalling thread to stop");
        self.stop_signal.store(true, Ordering::Relaxed);
    }
}
