//! Pod lifecycle collaborator
//!
//! The roller delegates the actual restart (pod deletion; the StatefulSet
//! controller recreates the pod) and readiness tracking to this interface.
//! `KubePodLifecycle` is the Kubernetes-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DeleteParams;
use kube::{Api, Client};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pod::PodRef;

/// Restarts pods and reports their readiness
#[async_trait]
pub trait PodLifecycle: Send + Sync {
    /// Delete the pod so its controller recreates it
    async fn restart(&self, pod: &PodRef) -> Result<()>;

    /// Whether the pod currently exists and has a Ready=True condition
    async fn is_ready(&self, namespace: &str, name: &str) -> Result<bool>;

    /// Poll until the pod is ready, failing with the timeout kind of
    /// [`Error`] if it is not ready within `timeout`
    async fn await_readiness(
        &self,
        namespace: &str,
        name: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_ready(namespace, name).await? {
                return Ok(());
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(Error::ReadinessTimeout(name.to_string()));
            }
            let remaining = deadline - now;
            tokio::time::sleep(poll_interval.min(remaining)).await;
        }
    }
}

/// Whether a pod reports a Ready=True condition
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status.as_ref().is_some_and(|status| {
        status.conditions.as_ref().is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
    })
}

/// Pod lifecycle backed by the Kubernetes API, scoped to one namespace
pub struct KubePodLifecycle {
    client: Client,
    namespace: String,
}

impl KubePodLifecycle {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl PodLifecycle for KubePodLifecycle {
    async fn restart(&self, pod: &PodRef) -> Result<()> {
        info!(pod = %pod, namespace = %self.namespace, "Deleting pod for restart");
        let pods = self.pods(&self.namespace);
        match pods.delete(&pod.pod_name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Already gone; the controller is recreating it
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(pod = %pod, "Pod already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_ready(&self, namespace: &str, name: &str) -> Result<bool> {
        match self.pods(namespace).get_opt(name).await? {
            Some(pod) => Ok(is_pod_ready(&pod)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pod_with_ready(status: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: "Ready".to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn ready_condition_true_is_ready() {
        assert!(is_pod_ready(&pod_with_ready("True")));
        assert!(!is_pod_ready(&pod_with_ready("False")));
        assert!(!is_pod_ready(&Pod::default()));
    }

    struct CountdownLifecycle {
        ready_after: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PodLifecycle for CountdownLifecycle {
        async fn restart(&self, _pod: &PodRef) -> Result<()> {
            Ok(())
        }

        async fn is_ready(&self, _namespace: &str, _name: &str) -> Result<bool> {
            let seen = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(seen >= self.ready_after)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn await_readiness_polls_until_ready() {
        let lifecycle = CountdownLifecycle {
            ready_after: 3,
            calls: AtomicUsize::new(0),
        };
        lifecycle
            .await_readiness(
                "ns",
                "c-kafka-0",
                Duration::from_millis(100),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(lifecycle.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn await_readiness_times_out_with_the_timeout_kind() {
        let lifecycle = CountdownLifecycle {
            ready_after: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        let err = lifecycle
            .await_readiness(
                "ns",
                "c-kafka-0",
                Duration::from_millis(100),
                Duration::from_millis(350),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("c-kafka-0"));
    }
}
