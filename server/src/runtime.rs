/*
The serving machinery. A ListenerThread accepts connections and hands each
one over a dispatch channel to a fixed-size pool of worker threads. Each
worker processes one connection to completion through the HandlerAdapter
before taking the next, so at most worker_threads requests are ever inside
the handler at the same time.
*/

use std::net::{SocketAddr, TcpStream};

use gantry_net::data_types::ConnectionId;

pub mod adapter;
pub mod listener_thread;
pub mod worker_pool;
pub mod worker_thread;

/// An accepted connection in flight from the listener to a worker. Owned
/// exclusively by the worker that receives it.
#[derive(Debug)]
pub(crate) struct ConnectionMessage {
    pub connection_id: ConnectionId,
    pub stream: TcpStream,
    pub remote_addr: SocketAddr,
}
