use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
        Arc, Mutex,
    },
    time::Duration,
};

use log::{error, info};

use gantry_net::data_types::WorkerId;

use super::{adapter::HandlerAdapter, ConnectionMessage};
use crate::{observability::Metrics, App};

const RECEIVE_TIMEOUT: Duration = Duration::from_millis(50);

/// One of the pool's execution units. Loops pulling a connection from the
/// shared dispatch queue and processing it to completion, until told to
/// stop or the queue is gone.
pub struct WorkerThread {
    worker_id: WorkerId,
    receiver: Arc<Mutex<Receiver<ConnectionMessage>>>,
    stop_signal: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
    adapter: HandlerAdapter,
}

impl WorkerThread {
    pub(crate) fn new(
        worker_id: WorkerId,
        app: &Arc<App>,
        receiver: &Arc<Mutex<Receiver<ConnectionMessage>>>,
    ) -> Self {
        Self {
            worker_id,
            receiver: receiver.clone(),
            stop_signal: app.stop_signal.clone(),
            metrics: app.metrics.clone(),
            adapter: HandlerAdapter::new(app),
        }
    }

    pub(crate) fn run(self: Self) {
        info!("WorkerThread {}: Starting", self.worker_id);
        while !self.stop_signal.load(Ordering::Relaxed) {
            // The guard is released before the connection is served
            let message = self.receiver.lock().unwrap().recv_timeout(RECEIVE_TIMEOUT);
            match message {
                Ok(connection) => self.serve(connection),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("WorkerThread {}: Stopping", self.worker_id);
    }

    /// The unit boundary: any panic that escapes the adapter is contained
    /// here so the worker returns to the pool instead of dying
    fn serve(self: &Self, connection: ConnectionMessage) {
        let connection_id = connection.connection_id;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.adapter.serve(connection)));
        if result.is_err() {
            self.metrics.incr(Metrics::METRIC_HANDLER_PANIC_COUNT);
            error!(
                "WorkerThread {}: Panic while serving connection {connection_id}",
                self.worker_id
            );
        }
    }
}
