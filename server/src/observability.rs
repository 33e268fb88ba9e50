use statsd::Client;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

pub struct Metrics {
    client: Mutex<Client>,
    counts: Mutex<HashMap<String, f64>>,
}

impl Metrics {
    pub const METRIC_REQUEST_COUNT: &str = "http.request.count";
    pub const METRIC_RESPONSE_OK_COUNT: &str = "http.response.ok.count";
    pub const METRIC_RESPONSE_ERROR_COUNT: &str = "http.response.error.count";
    pub const METRIC_MALFORMED_REQUEST_COUNT: &str = "http.request.malformed.count";
    pub const METRIC_HANDLER_ERROR_COUNT: &str = "http.handler.error.count";
    pub const METRIC_HANDLER_PANIC_COUNT: &str = "http.handler.panic.count";
    pub const METRIC_CONNECTION_ACCEPTED_COUNT: &str = "connection.accepted.count";
    pub const METRIC_CONNECTION_CLOSED_COUNT: &str = "connection.closed.count";

    pub fn new() -> Self {
        let client = statsd::Client::new("127.0.0.1:8125", "gantry").unwrap();
        let counts = HashMap::with_capacity(20);

        Self {
            client: Mutex::new(client),
            counts: Mutex::new(counts),
        }
    }

    pub fn incr(self: &Self, metric: &str) {
        let metric = String::from(metric);
        let mut counts = self.counts.lock().unwrap();
        *counts.entry(metric).or_insert(0.0) += 1.0;
    }

    pub fn count(self: &Self, metric: &str, count: f64) {
        let metric = String::from(metric);
        let mut counts = self.counts.lock().unwrap();
        *counts.entry(metric).or_insert(0.0) += count;
    }

    /// Flush loop, run on a dedicated thread until the stop signal is set
    pub fn run(self: &Self, stop_signal: &Arc<AtomicBool>) {
        while !stop_signal.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(1000));

            let client = self.client.lock().unwrap();
            let mut counts = self.counts.lock().unwrap();

            let mut pipeline = client.pipeline();
            for (metric, count) in counts.iter() {
                pipeline.count(metric, *count);
            }

            pipeline.send(&client);
            counts.clear();
        }
    }
}
