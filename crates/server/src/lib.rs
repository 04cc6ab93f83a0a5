//! HTTP surface of DaemonView: the axum API, its shared state and metrics.

pub mod api;
pub mod metrics;
pub mod state;
