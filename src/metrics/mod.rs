//! Prometheus metrics for the Kafka roller
//!
//! This module exposes metrics for monitoring rolling-restart passes.

mod prometheus;

pub use prometheus::*;
