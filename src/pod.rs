//! Pod identity and per-pod, per-pass restart state

use serde::Serialize;

use crate::backoff::BackOff;
use crate::error::{Error, Result};
use crate::problem::Problem;

/// Stable identity of a broker pod, derived from the pod's ordinal.
///
/// StatefulSet pods are named `<prefix>-<ordinal>`; the ordinal doubles as
/// the broker id. Ordinals need not be contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodRef {
    pub pod_id: i32,
    pub pod_name: String,
}

impl PodRef {
    pub fn new(pod_id: i32, pod_name: impl Into<String>) -> Self {
        Self {
            pod_id,
            pod_name: pod_name.into(),
        }
    }

    /// Derive the pod's identity from its name, taking the trailing
    /// `-<ordinal>` segment as the broker id
    pub fn from_pod_name(pod_name: &str) -> Result<Self> {
        let ordinal = pod_name
            .rsplit_once('-')
            .and_then(|(_, suffix)| suffix.parse::<i32>().ok())
            .ok_or_else(|| {
                Error::config(format!(
                    "Pod name '{}' does not end with a numeric ordinal",
                    pod_name
                ))
            })?;
        Ok(Self::new(ordinal, pod_name))
    }
}

impl std::fmt::Display for PodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pod_name)
    }
}

/// Mutable per-pod state for one rolling-restart pass.
///
/// Created when a pod is first examined within a pass and discarded when
/// the pass completes; nothing survives across invocations.
#[derive(Debug)]
pub struct RestartContext {
    pub pod_ref: PodRef,
    /// Restart reasons reported by the caller on the latest attempt
    pub reasons: Vec<String>,
    /// Attempts made so far, including the initial one
    pub attempts: u32,
    pub back_off: BackOff,
    /// Set once the pod's retry budget is exhausted; the next attempt
    /// bypasses the availability check and restarts unconditionally
    pub force_now: bool,
    pub last_problem: Option<Problem>,
    /// Earliest instant the next attempt may run
    pub not_before: Option<tokio::time::Instant>,
}

impl RestartContext {
    pub fn new(pod_ref: PodRef, back_off: BackOff) -> Self {
        Self {
            pod_ref,
            reasons: Vec::new(),
            attempts: 0,
            back_off,
            force_now: false,
            last_problem: None,
            not_before: None,
        }
    }
}
