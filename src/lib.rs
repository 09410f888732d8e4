//! Rolling-restart orchestrator for Kafka broker pods on Kubernetes
//!
//! Restarting brokers one at a time sounds simple until the details bite:
//! the pod holding the controller role must roll last, a broker may only
//! be bounced if no partition drops below its minimum in-sync replicas,
//! and every kind of failure needs its own escalation. This crate owns
//! that algorithm and nothing else; the reconciliation loop, pod
//! management and config diffing plug in through the collaborator traits.

pub mod admin;
pub mod availability;
pub mod backoff;
pub mod config;
pub mod differ;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod pod;
pub mod pod_lifecycle;
pub mod problem;
pub mod roller;
pub mod telemetry;

pub use config::{BackOffConfig, RollerConfig};
pub use error::{Error, Result};
pub use pod::PodRef;
pub use problem::Problem;
pub use roller::{RollAction, RollReport, Roller, RollerDeps};
