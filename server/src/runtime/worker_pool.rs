use std::{
    sync::{
        mpsc::{channel, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{info, warn};

use super::{worker_thread::WorkerThread, ConnectionMessage};
use crate::{supervisor::DrainOutcome, App};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Owns exactly worker_count long-lived worker threads, all pulling from a
/// single shared dispatch queue so that a free worker takes the next
/// connection. This bounds handler concurrency at exactly worker_count:
/// when every worker is busy, accepted connections wait in the queue and
/// the OS backlog rather than being rejected.
pub struct WorkerPool {
    sender: Sender<ConnectionMessage>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(app: &Arc<App>, worker_count: usize) -> Self {
        let (sender, receiver) = channel::<ConnectionMessage>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut threads = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let worker = WorkerThread::new(worker_id, app, &receiver);
            threads.push(thread::spawn(move || worker.run()));
        }
        info!("WorkerPool: Started {worker_count} worker threads");

        Self { sender, threads }
    }

    pub(crate) fn sender(self: &Self) -> Sender<ConnectionMessage> {
        self.sender.clone()
    }

    /// Waits for every worker to finish its current connection and exit.
    /// Workers still busy past the timeout are abandoned.
    pub(crate) fn drain(self, timeout: Duration) -> DrainOutcome {
        drop(self.sender);

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.threads.iter().all(|thread| thread.is_finished()) {
                for thread in self.threads {
                    thread.join().ok();
                }
                info!("WorkerPool: All workers stopped");
                return DrainOutcome::Graceful;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }

        let busy = self.threads.iter().filter(|thread| !thread.is_finished()).count();
        warn!("WorkerPool: {busy} workers still busy after the drain timeout, abandoning them");
        DrainOutcome::ForcedShutdown
    }
}
