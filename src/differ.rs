//! Config-diff collaborator interface
//!
//! The diff computation itself (which entries changed, and whether the
//! change is dynamically applicable) lives outside this crate. The roller
//! only asks: given this pod, what dynamic changes should be applied in
//! place? An empty diff means the live configuration already matches.

use async_trait::async_trait;

use crate::admin::AdminConnection;
use crate::error::Result;
use crate::pod::PodRef;

/// A single dynamically applicable configuration change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDelta {
    pub name: String,
    pub desired: String,
}

/// Set of dynamic configuration changes for one broker
#[derive(Debug, Clone, Default)]
pub struct ConfigDiff {
    pub entries: Vec<ConfigDelta>,
}

impl ConfigDiff {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Decides whether a pod's live configuration matches the desired one,
/// and if not, which changes can be applied without a restart
#[async_trait]
pub trait ConfigDiffer: Send + Sync {
    async fn diff(&self, pod: &PodRef, admin: &dyn AdminConnection) -> Result<ConfigDiff>;
}

/// Differ that always reports the live configuration as in sync. Useful as
/// a wiring default when dynamic reconfiguration is not wanted.
pub struct AlwaysInSync;

#[async_trait]
impl ConfigDiffer for AlwaysInSync {
    async fn diff(&self, _pod: &PodRef, _admin: &dyn AdminConnection) -> Result<ConfigDiff> {
        Ok(ConfigDiff::empty())
    }
}
