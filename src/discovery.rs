//! Controller discovery
//!
//! Asks a broker, over its own administrative connection, who it believes
//! the current controller is. The call is deliberately scoped to one
//! broker rather than the whole cluster: during partial outages the
//! controller may be visible from some brokers and not others.

use async_trait::async_trait;
use tracing::debug;

use crate::admin::AdminConnection;
use crate::pod::PodRef;
use crate::problem::Problem;

/// Resolves the cluster controller as seen by a single broker
#[async_trait]
pub trait ControllerDiscovery: Send + Sync {
    /// The controller id this pod's broker currently reports, or `None`
    /// if it knows of no controller. Failures are Forceable: the pod is
    /// retried on its backoff while the run falls back to ascending-order
    /// scheduling until a later query succeeds.
    async fn controller(
        &self,
        pod: &PodRef,
        admin: &dyn AdminConnection,
    ) -> Result<Option<i32>, Problem>;
}

/// Discovery over the pod's own admin connection
pub struct AdminControllerDiscovery;

#[async_trait]
impl ControllerDiscovery for AdminControllerDiscovery {
    async fn controller(
        &self,
        pod: &PodRef,
        admin: &dyn AdminConnection,
    ) -> Result<Option<i32>, Problem> {
        match admin.controller_id().await {
            Ok(controller) => {
                debug!(pod = %pod, ?controller, "Broker reported controller");
                Ok(controller)
            }
            Err(cause) => Err(Problem::forceable_with(
                format!(
                    "An error while trying to determine the cluster controller from pod {}",
                    pod.pod_name
                ),
                cause,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::TopicDescription;
    use crate::differ::ConfigDiff;
    use crate::error::{Error, Result};
    use std::collections::HashMap;

    struct StubAdmin {
        controller: Result<Option<i32>>,
    }

    #[async_trait]
    impl AdminConnection for StubAdmin {
        async fn controller_id(&self) -> Result<Option<i32>> {
            match &self.controller {
                Ok(id) => Ok(*id),
                Err(_) => Err(Error::admin("connection reset")),
            }
        }

        async fn topic_names(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn describe_topics(&self, _names: &[String]) -> Result<Vec<TopicDescription>> {
            Ok(Vec::new())
        }

        async fn describe_topic_configs(
            &self,
            _names: &[String],
        ) -> Result<HashMap<String, HashMap<String, String>>> {
            Ok(HashMap::new())
        }

        async fn describe_configs(&self, _broker_id: i32) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }

        async fn alter_configs(&self, _broker_id: i32, _diff: &ConfigDiff) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn reports_the_brokers_controller_view() {
        let admin = StubAdmin {
            controller: Ok(Some(2)),
        };
        let pod = PodRef::new(0, "c-kafka-0");
        let controller = AdminControllerDiscovery
            .controller(&pod, &admin)
            .await
            .unwrap();
        assert_eq!(controller, Some(2));
    }

    #[tokio::test]
    async fn no_controller_is_not_an_error() {
        let admin = StubAdmin {
            controller: Ok(None),
        };
        let pod = PodRef::new(0, "c-kafka-0");
        let controller = AdminControllerDiscovery
            .controller(&pod, &admin)
            .await
            .unwrap();
        assert_eq!(controller, None);
    }

    #[tokio::test]
    async fn query_failure_is_forceable_and_names_the_pod() {
        let admin = StubAdmin {
            controller: Err(Error::admin("down")),
        };
        let pod = PodRef::new(1, "c-kafka-1");
        let problem = AdminControllerDiscovery
            .controller(&pod, &admin)
            .await
            .unwrap_err();
        assert!(problem.is_forceable());
        assert_eq!(
            problem.to_string(),
            "An error while trying to determine the cluster controller from pod c-kafka-1"
        );
    }
}
