//! Broker administrative API, at the seam the roller needs
//!
//! Only the handful of administrative calls the algorithm uses are
//! modelled: controller id, topic metadata, and get/alter configs. The
//! concrete provider (and its bootstrap/TLS plumbing) belongs to the
//! embedding operator; the roller opens one connection per pod attempt,
//! scoped to that pod's own broker, and closes it on every exit path.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::differ::ConfigDiff;
use crate::error::Result;
use crate::problem::Problem;

/// Metadata for a single partition of a topic
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    pub partition: i32,
    pub leader: Option<i32>,
    pub replicas: Vec<i32>,
    /// Brokers currently in sync for this partition
    pub isr: Vec<i32>,
}

/// Metadata for a topic and its partitions
#[derive(Debug, Clone)]
pub struct TopicDescription {
    pub name: String,
    pub partitions: Vec<PartitionInfo>,
}

/// Opens administrative connections against individual brokers
#[async_trait]
pub trait AdminConnectionProvider: Send + Sync {
    /// Open a connection using the given bootstrap addresses. A pod
    /// attempt passes only that pod's own broker address, because during
    /// partial outages cluster state may be visible from some brokers and
    /// not others.
    async fn open(
        &self,
        bootstrap_addresses: &[String],
    ) -> std::result::Result<Box<dyn AdminConnection>, Problem>;
}

/// Handle to one broker's administrative API
#[async_trait]
pub trait AdminConnection: Send + Sync {
    /// The broker's view of the current cluster controller, or `None` if
    /// it knows of no controller right now
    async fn controller_id(&self) -> Result<Option<i32>>;

    /// Names of all topics the broker knows about
    async fn topic_names(&self) -> Result<Vec<String>>;

    /// Partition metadata for the named topics
    async fn describe_topics(&self, names: &[String]) -> Result<Vec<TopicDescription>>;

    /// Per-topic configuration entries for the named topics
    async fn describe_topic_configs(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, HashMap<String, String>>>;

    /// Configuration entries of the given broker
    async fn describe_configs(&self, broker_id: i32) -> Result<HashMap<String, String>>;

    /// Apply a dynamic configuration change to the given broker, in place
    async fn alter_configs(&self, broker_id: i32, diff: &ConfigDiff) -> Result<()>;

    /// Release the connection. Idempotent; errors are reported but the
    /// handle is considered closed either way.
    async fn close(&self) -> Result<()>;
}
