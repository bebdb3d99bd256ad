//! HTTP surface of stillreel: job intake, batch control, downloads, the
//! single-shot conversion endpoint, WebSocket updates and metrics.

pub mod api;
pub mod metrics;
pub mod state;
