//! Middleware applied by the server around every dispatched request.
//!
//! - [`cors`]: open CORS for the browser front-end, including preflight.
//! - [`trace`]: one log line per request with status and latency.

pub mod cors;
pub mod trace;
