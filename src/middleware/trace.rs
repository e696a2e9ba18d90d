//! Per-request log line: method, path, status, latency.

use std::time::Instant;

use tracing::{info, warn};

/// Started when a request is accepted; [`finish`](Self::finish) logs it.
pub struct RequestTrace {
    method: String,
    path: String,
    started: Instant,
}

impl RequestTrace {
    pub fn start(method: &str, path: &str) -> Self {
        Self { method: method.to_owned(), path: path.to_owned(), started: Instant::now() }
    }

    pub fn finish(self, status: u16) {
        let latency_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if status >= 500 {
            warn!(method = %self.method, path = %self.path, status, latency_ms, "request");
        } else {
            info!(method = %self.method, path = %self.path, status, latency_ms, "request");
        }
    }
}
