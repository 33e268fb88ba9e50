use std::sync::{
    atomic::{AtomicBool, AtomicU32},
    Arc,
};

use handler::Handler;
use observability::Metrics;

mod build_number;

/// The seam to application logic: the handler contract and the built-in
/// handler registered by the gantry binary
pub mod handler;

/// Statsd metrics accumulated in-process and flushed once per second
pub mod observability;

/// The serving machinery: listener thread, worker pool and handler adapter
pub mod runtime;

/// Process configuration loaded from Settings files and the environment
pub mod settings;

/// Process lifecycle: startup ordering, graceful drain and exit codes
pub mod supervisor;

pub use build_number::BUILD_NUMBER;

/// A container for the application singletons. Injecting App is much simpler
/// than injecting dependencies individually. The application owns Arcs and
/// the Arcs own the singletons.
pub struct App {
    pub stop_signal: Arc<AtomicBool>,
    pub request_count: Arc<AtomicU32>,
    pub metrics: Arc<Metrics>,
    pub handler: Arc<dyn Handler>,
}

impl App {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            stop_signal: Arc::new(AtomicBool::new(false)),
            request_count: Arc::new(AtomicU32::new(0)),
            metrics: Arc::new(Metrics::new()),
            handler,
        }
    }
}
