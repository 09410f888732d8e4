//! Availability check guarding broker restarts
//!
//! A broker may only be bounced if doing so leaves every partition it
//! replicates at or above the partition's `min.insync.replicas`. Topic
//! metadata and configs are fetched lazily through the current attempt's
//! admin connection and cached for the duration of one rolling-restart
//! pass; the roller builds a fresh checker per pass.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::admin::{AdminConnection, TopicDescription};
use crate::error::Result;

const MIN_INSYNC_REPLICAS: &str = "min.insync.replicas";

/// Predicate deciding whether a broker can be restarted safely right now
#[async_trait]
pub trait AvailabilityCheck: Send + Sync {
    async fn can_roll(&self, admin: &dyn AdminConnection, broker_id: i32) -> Result<bool>;
}

/// Produces a fresh availability checker for each rolling-restart pass,
/// so cached metadata never outlives the pass that fetched it
pub type AvailabilityFactory = Box<dyn Fn() -> Box<dyn AvailabilityCheck> + Send + Sync>;

struct ClusterState {
    topics: Vec<TopicDescription>,
    min_isr: HashMap<String, i32>,
}

/// Min-ISR availability check over broker topic metadata
pub struct KafkaAvailability {
    cache: Mutex<Option<ClusterState>>,
}

impl KafkaAvailability {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(None),
        }
    }

    async fn fetch_state(&self, admin: &dyn AdminConnection) -> Result<ClusterState> {
        let names = admin.topic_names().await?;
        let topics = admin.describe_topics(&names).await?;
        let configs = admin.describe_topic_configs(&names).await?;

        let min_isr = configs
            .into_iter()
            .filter_map(|(topic, entries)| {
                entries
                    .get(MIN_INSYNC_REPLICAS)
                    .and_then(|v| v.parse::<i32>().ok())
                    .map(|min| (topic, min))
            })
            .collect();

        Ok(ClusterState { topics, min_isr })
    }

    fn would_violate_min_isr(state: &ClusterState, broker_id: i32) -> Option<(String, i32)> {
        for topic in &state.topics {
            // Topics without an explicit min.insync.replicas use the broker
            // default of 1.
            let min = state.min_isr.get(&topic.name).copied().unwrap_or(1);
            for partition in &topic.partitions {
                if !partition.replicas.contains(&broker_id) {
                    continue;
                }
                if min > partition.replicas.len() as i32 {
                    debug!(
                        topic = %topic.name,
                        partition = partition.partition,
                        min_isr = min,
                        replicas = partition.replicas.len(),
                        "Partition can never satisfy its min.insync.replicas"
                    );
                }
                let in_sync = partition.isr.len() as i32
                    - i32::from(partition.isr.contains(&broker_id));
                if in_sync < min {
                    return Some((topic.name.clone(), partition.partition));
                }
            }
        }
        None
    }
}

impl Default for KafkaAvailability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvailabilityCheck for KafkaAvailability {
    async fn can_roll(&self, admin: &dyn AdminConnection, broker_id: i32) -> Result<bool> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.fetch_state(admin).await?);
        }
        let violation = cache
            .as_ref()
            .and_then(|state| Self::would_violate_min_isr(state, broker_id));

        match violation {
            Some((topic, partition)) => {
                info!(
                    broker_id,
                    topic = %topic,
                    partition,
                    "Restarting broker would take partition below min.insync.replicas"
                );
                Ok(false)
            }
            None => Ok(true),
        }
    }
}
