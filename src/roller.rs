//! Rolling-restart orchestrator
//!
//! Drives one pass over a cluster of broker pods: decides the order in
//! which pods are bounced, retries recoverable failures per pod, defers
//! the current controller to the end, and aggregates the outcome of the
//! whole pass into a single success or failure.
//!
//! Exactly one pod is acted upon at a time, bounding the number of
//! simultaneously unavailable brokers to one. Scheduling is a FIFO queue
//! over pending pods, seeded in ascending pod-id order; a pod that hits a
//! recoverable problem goes to the back of the queue with its next backoff
//! delay, so unrelated pods keep progressing.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admin::{AdminConnection, AdminConnectionProvider};
use crate::availability::{AvailabilityCheck, AvailabilityFactory};
use crate::backoff::BackOff;
use crate::config::RollerConfig;
use crate::differ::ConfigDiffer;
use crate::discovery::ControllerDiscovery;
use crate::error::Result;
use crate::metrics;
use crate::pod::{PodRef, RestartContext};
use crate::pod_lifecycle::PodLifecycle;
use crate::problem::Problem;

/// Maps a pod to the bootstrap addresses of its own broker, so each
/// attempt talks to that broker only
pub type BootstrapFn = Box<dyn Fn(&PodRef) -> Vec<String> + Send + Sync>;

/// What a pass did to one pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RollAction {
    /// The pod was deleted and came back ready
    Restarted,
    /// Configuration was applied in place, no restart
    Reconfigured,
    /// Nothing needed doing
    Unchanged,
}

/// Terminal state of one pod within a pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodOutcome {
    pub pod: PodRef,
    pub action: RollAction,
    pub completed_at: DateTime<Utc>,
}

/// Ordered record of what a successful pass did, in completion order
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollReport {
    pub outcomes: Vec<PodOutcome>,
}

impl RollReport {
    fn record(&mut self, pod: PodRef, action: RollAction) {
        self.outcomes.push(PodOutcome {
            pod,
            action,
            completed_at: Utc::now(),
        });
    }

    fn pods_with(&self, action: RollAction) -> Vec<&PodRef> {
        self.outcomes
            .iter()
            .filter(|o| o.action == action)
            .map(|o| &o.pod)
            .collect()
    }

    /// Pods that were restarted, in restart order
    pub fn restarted(&self) -> Vec<&PodRef> {
        self.pods_with(RollAction::Restarted)
    }

    /// Pods that were reconfigured in place
    pub fn reconfigured(&self) -> Vec<&PodRef> {
        self.pods_with(RollAction::Reconfigured)
    }

    /// Pods that needed no action
    pub fn unchanged(&self) -> Vec<&PodRef> {
        self.pods_with(RollAction::Unchanged)
    }

    /// Status fragment for the embedding reconciler to patch into its
    /// resource status
    pub fn status_json(&self) -> serde_json::Value {
        let names = |action: RollAction| {
            self.pods_with(action)
                .iter()
                .map(|p| p.pod_name.clone())
                .collect::<Vec<_>>()
        };
        json!({
            "restartedPods": names(RollAction::Restarted),
            "reconfiguredPods": names(RollAction::Reconfigured),
            "unchangedPods": names(RollAction::Unchanged),
            "completedAt": self.outcomes.last().map(|o| o.completed_at),
        })
    }
}

/// The collaborators the roller acts through. Each is independently
/// substitutable; tests inject doubles here.
pub struct RollerDeps {
    pub pod_lifecycle: Arc<dyn PodLifecycle>,
    pub admin_provider: Arc<dyn AdminConnectionProvider>,
    pub controller_discovery: Arc<dyn ControllerDiscovery>,
    pub config_differ: Arc<dyn ConfigDiffer>,
    /// Fresh availability checker per pass, so cached metadata never
    /// outlives the pass that fetched it
    pub availability: AvailabilityFactory,
    pub bootstrap_addresses: BootstrapFn,
}

/// Rolling-restart orchestrator for one cluster's broker pods
pub struct Roller {
    config: RollerConfig,
    namespace: String,
    /// Snapshot of the cluster's pods, ascending by pod id
    pods: Vec<PodRef>,
    deps: RollerDeps,
    cancel: CancellationToken,
}

impl Roller {
    /// Build a roller over the given pod names. Ordinals are taken from
    /// the trailing `-<n>` of each name; gaps are preserved, not
    /// renumbered.
    pub fn new(
        config: RollerConfig,
        namespace: impl Into<String>,
        pod_names: Vec<String>,
        deps: RollerDeps,
    ) -> Result<Self> {
        config.validate()?;
        let mut pods = pod_names
            .iter()
            .map(|name| PodRef::from_pod_name(name))
            .collect::<Result<Vec<_>>>()?;
        pods.sort_by_key(|p| p.pod_id);
        Ok(Self {
            config,
            namespace: namespace.into(),
            pods,
            deps,
            cancel: CancellationToken::new(),
        })
    }

    /// Token for cooperatively interrupting a running pass. Cancelling it
    /// makes `rolling_restart` resolve with [`Problem::Interrupted`]; the
    /// pass is incomplete and safe to re-invoke.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Restart (or dynamically reconfigure) every pod for which
    /// `reason_fn` demands it, controller last, one pod at a time.
    ///
    /// An empty reason set means "no restart required for this pod, but a
    /// dynamic config update may still be attempted". Resolves with the
    /// ordered record of what was done, or the single problem that ended
    /// the pass.
    pub async fn rolling_restart<F>(&self, reason_fn: F) -> std::result::Result<RollReport, Problem>
    where
        F: Fn(&PodRef) -> Vec<String>,
    {
        let started = std::time::Instant::now();
        let result = self.run(&reason_fn).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(Problem::Interrupted) => "interrupted",
            Err(_) => "failure",
        };
        metrics::ROLLS_TOTAL.with_label_values(&[outcome]).inc();
        metrics::ROLL_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());
        result
    }

    async fn run<F>(&self, reason_fn: &F) -> std::result::Result<RollReport, Problem>
    where
        F: Fn(&PodRef) -> Vec<String>,
    {
        let deadline = Instant::now() + self.config.operation_timeout();
        let availability = (self.deps.availability)();

        let mut queue: VecDeque<RestartContext> = self
            .pods
            .iter()
            .map(|pod| {
                RestartContext::new(pod.clone(), BackOff::from_config(&self.config.backoff))
            })
            .collect();

        let mut known_controller: Option<i32> = None;
        let mut report = RollReport::default();
        // Exhausted unforceable problems, in the order the pods gave up.
        // They end the pass in failure, but only after every other pod has
        // reached a terminal state.
        let mut given_up: Vec<Problem> = Vec::new();

        info!(
            namespace = %self.namespace,
            pods = self.pods.len(),
            "Starting rolling restart pass"
        );

        while let Some(mut ctx) = queue.pop_front() {
            self.check_interrupted()?;

            if let Some(at) = ctx.not_before.take() {
                tokio::time::sleep_until(at).await;
                self.check_interrupted()?;
            }

            let others_pending = !queue.is_empty();
            let attempt = self
                .attempt_pod(
                    &mut ctx,
                    reason_fn,
                    &mut known_controller,
                    others_pending,
                    availability.as_ref(),
                    deadline,
                )
                .await;

            match attempt {
                Ok(action) => {
                    info!(pod = %ctx.pod_ref, ?action, "Pod reached its terminal state");
                    report.record(ctx.pod_ref.clone(), action);
                }
                Err(Problem::Interrupted) => return Err(Problem::Interrupted),
                Err(problem @ Problem::Fatal { .. }) => {
                    error!(pod = %ctx.pod_ref, error = %problem, "Aborting rolling restart pass");
                    return Err(problem);
                }
                Err(problem @ Problem::Forceable { .. }) => {
                    match ctx.back_off.next_delay() {
                        Some(delay) => {
                            info!(
                                pod = %ctx.pod_ref,
                                attempt = ctx.attempts,
                                retry_in = ?delay,
                                error = %problem,
                                "Attempt failed, will retry"
                            );
                            ctx.last_problem = Some(problem);
                            ctx.not_before = Some(Instant::now() + delay);
                            queue.push_back(ctx);
                        }
                        None if ctx.force_now => {
                            // The forced attempt itself was refused: the pod
                            // is the controller and others are still pending
                            error!(pod = %ctx.pod_ref, error = %problem, "Forced attempt refused");
                            return Err(problem);
                        }
                        None => {
                            warn!(
                                pod = %ctx.pod_ref,
                                attempts = ctx.attempts,
                                error = %problem,
                                "Retry budget exhausted; forcing the restart"
                            );
                            ctx.last_problem = Some(problem);
                            ctx.force_now = true;
                            queue.push_front(ctx);
                        }
                    }
                }
                Err(problem @ Problem::Unforceable { .. }) => match ctx.back_off.next_delay() {
                    Some(delay) => {
                        info!(
                            pod = %ctx.pod_ref,
                            attempt = ctx.attempts,
                            retry_in = ?delay,
                            error = %problem,
                            "Pod cannot be rolled right now, will retry"
                        );
                        ctx.last_problem = Some(problem);
                        ctx.not_before = Some(Instant::now() + delay);
                        queue.push_back(ctx);
                    }
                    None => {
                        warn!(
                            pod = %ctx.pod_ref,
                            attempts = ctx.attempts,
                            error = %problem,
                            "Giving up on pod; other pods continue"
                        );
                        given_up.push(problem);
                    }
                },
            }
        }

        if let Some(problem) = given_up.into_iter().next() {
            return Err(problem);
        }

        info!(
            restarted = report.restarted().len(),
            reconfigured = report.reconfigured().len(),
            unchanged = report.unchanged().len(),
            "Rolling restart pass complete"
        );
        Ok(report)
    }

    /// One attempt at one pod: steps 1-6 of the per-pod algorithm
    async fn attempt_pod<F>(
        &self,
        ctx: &mut RestartContext,
        reason_fn: &F,
        known_controller: &mut Option<i32>,
        others_pending: bool,
        availability: &dyn AvailabilityCheck,
        deadline: Instant,
    ) -> std::result::Result<RollAction, Problem>
    where
        F: Fn(&PodRef) -> Vec<String>,
    {
        ctx.attempts += 1;
        let pod = ctx.pod_ref.clone();
        ctx.reasons = reason_fn(&pod);
        let needs_restart = !ctx.reasons.is_empty();

        // Forced attempt: the retry budget is spent, restart unconditionally.
        // Controller deferral is the one check that survives forcing, unless
        // this pod is the last one pending.
        if ctx.force_now {
            if *known_controller == Some(pod.pod_id) && others_pending {
                return Err(controller_deferral(&pod));
            }
            warn!(pod = %pod, "Forcing restart; availability check bypassed");
            metrics::FORCED_RESTARTS_TOTAL
                .with_label_values(&[&self.namespace, &pod.pod_name])
                .inc();
            self.restart_pod(&pod, true).await?;
            self.await_pod_readiness(&pod, true, deadline).await?;
            return Ok(RollAction::Restarted);
        }

        // A pod that needs restarting and is already unready gets restarted
        // straight away: bouncing an unavailable broker cannot reduce
        // availability any further. The known controller is still deferred.
        if needs_restart && (*known_controller != Some(pod.pod_id) || !others_pending) {
            match self
                .deps
                .pod_lifecycle
                .is_ready(&self.namespace, &pod.pod_name)
                .await
            {
                Ok(false) => {
                    info!(pod = %pod, reasons = ?ctx.reasons, "Pod is not ready; restarting immediately");
                    self.restart_pod(&pod, false).await?;
                    self.await_pod_readiness(&pod, true, deadline).await?;
                    return Ok(RollAction::Restarted);
                }
                Ok(true) => {}
                Err(e) => {
                    debug!(pod = %pod, error = %e, "Could not determine pod readiness; continuing");
                }
            }
        }

        // Step 1: admin connection scoped to this pod's own broker. An open
        // failure is a Forceable problem from the provider; once the budget
        // is exhausted the restart happens without a connection.
        let addresses = (self.deps.bootstrap_addresses)(&pod);
        let admin = self.deps.admin_provider.open(&addresses).await?;
        metrics::OPEN_ADMIN_CONNECTIONS.inc();

        let result = self
            .attempt_with_admin(
                &pod,
                &ctx.reasons,
                admin.as_ref(),
                known_controller,
                others_pending,
                availability,
                deadline,
            )
            .await;

        // Step 6: the connection is released on every exit path; a close
        // failure is logged and does not change the outcome
        metrics::OPEN_ADMIN_CONNECTIONS.dec();
        if let Err(e) = admin.close().await {
            warn!(pod = %pod, error = %e, "Error while closing admin connection");
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt_with_admin(
        &self,
        pod: &PodRef,
        reasons: &[String],
        admin: &dyn AdminConnection,
        known_controller: &mut Option<i32>,
        others_pending: bool,
        availability: &dyn AvailabilityCheck,
        deadline: Instant,
    ) -> std::result::Result<RollAction, Problem> {
        self.check_interrupted()?;

        // Step 2: re-read the controller through this pod's connection.
        // A failure defers this pod; scheduling stays ascending-only until
        // a later query succeeds.
        *known_controller = self
            .deps
            .controller_discovery
            .controller(pod, admin)
            .await?;

        // Step 3: the controller rolls last, unless it is the only pod left
        if *known_controller == Some(pod.pod_id) && others_pending {
            info!(pod = %pod, "Pod is the controller; deferring it behind the remaining pods");
            return Err(controller_deferral(pod));
        }

        self.check_interrupted()?;

        if reasons.is_empty() {
            // Step 4: no restart required; a dynamic config update may
            // still apply
            let diff = self
                .deps
                .config_differ
                .diff(pod, admin)
                .await
                .map_err(|e| {
                    Problem::forceable_with(
                        format!(
                            "An error while trying to get the configuration of pod {}",
                            pod.pod_name
                        ),
                        e,
                    )
                })?;
            if diff.is_empty() {
                debug!(pod = %pod, "No restart and no configuration change needed");
                self.await_pod_readiness(pod, false, deadline).await?;
                return Ok(RollAction::Unchanged);
            }
            info!(pod = %pod, entries = diff.len(), "Applying dynamic configuration update");
            admin
                .alter_configs(pod.pod_id, &diff)
                .await
                .map_err(|e| {
                    Problem::forceable_with(
                        format!(
                            "An error while trying to update the configuration of pod {}",
                            pod.pod_name
                        ),
                        e,
                    )
                })?;
            metrics::DYNAMIC_UPDATES_TOTAL
                .with_label_values(&[&self.namespace, &pod.pod_name])
                .inc();
            self.await_pod_readiness(pod, false, deadline).await?;
            return Ok(RollAction::Reconfigured);
        }

        // Step 5: restart required; the availability check guards it
        let can_roll = availability
            .can_roll(admin, pod.pod_id)
            .await
            .map_err(|e| {
                Problem::forceable_with(
                    format!(
                        "An error while trying to determine whether pod {} can be rolled",
                        pod.pod_name
                    ),
                    e,
                )
            })?;
        if !can_roll {
            return Err(Problem::unforceable(format!(
                "Pod {} is currently not rollable",
                pod.pod_name
            )));
        }

        info!(pod = %pod, reasons = ?reasons, "Restarting pod");
        self.restart_pod(pod, false).await?;
        self.await_pod_readiness(pod, true, deadline).await?;
        Ok(RollAction::Restarted)
    }

    async fn restart_pod(&self, pod: &PodRef, forced: bool) -> std::result::Result<(), Problem> {
        self.check_interrupted()?;
        self.deps.pod_lifecycle.restart(pod).await.map_err(|e| {
            let message = format!("Error while trying to restart pod {}", pod.pod_name);
            if forced {
                Problem::fatal_with(message, e)
            } else {
                Problem::forceable_with(message, e)
            }
        })?;
        metrics::POD_RESTARTS_TOTAL
            .with_label_values(&[&self.namespace, &pod.pod_name])
            .inc();
        Ok(())
    }

    /// Wait for the pod within what remains of the pass budget. Failures
    /// here are fatal: the pass stops where it stands, already-restarted
    /// pods are left alone and unexamined pods stay unexamined.
    async fn await_pod_readiness(
        &self,
        pod: &PodRef,
        restarted: bool,
        deadline: Instant,
    ) -> std::result::Result<(), Problem> {
        self.check_interrupted()?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.deps
            .pod_lifecycle
            .await_readiness(
                &self.namespace,
                &pod.pod_name,
                self.config.readiness_poll_interval(),
                remaining,
            )
            .await
            .map_err(|e| {
                let kind = if restarted { "restarted" } else { "non-restarted" };
                Problem::fatal_with(
                    format!(
                        "Error while waiting for {} pod {} to become ready",
                        kind, pod.pod_name
                    ),
                    e,
                )
            })
    }

    fn check_interrupted(&self) -> std::result::Result<(), Problem> {
        if self.cancel.is_cancelled() {
            Err(Problem::Interrupted)
        } else {
            Ok(())
        }
    }
}

fn controller_deferral(pod: &PodRef) -> Problem {
    Problem::forceable(format!(
        "Pod {} is currently the controller and there are other pods still to roll",
        pod.pod_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_orders_and_filters_outcomes() {
        let mut report = RollReport::default();
        report.record(PodRef::new(0, "c-kafka-0"), RollAction::Restarted);
        report.record(PodRef::new(1, "c-kafka-1"), RollAction::Unchanged);
        report.record(PodRef::new(2, "c-kafka-2"), RollAction::Restarted);

        let restarted: Vec<i32> = report.restarted().iter().map(|p| p.pod_id).collect();
        assert_eq!(restarted, vec![0, 2]);
        assert_eq!(report.unchanged().len(), 1);
        assert!(report.reconfigured().is_empty());
    }

    #[test]
    fn status_json_lists_pods_by_action() {
        let mut report = RollReport::default();
        report.record(PodRef::new(0, "c-kafka-0"), RollAction::Restarted);
        report.record(PodRef::new(1, "c-kafka-1"), RollAction::Reconfigured);

        let status = report.status_json();
        assert_eq!(status["restartedPods"][0], "c-kafka-0");
        assert_eq!(status["reconfiguredPods"][0], "c-kafka-1");
        assert!(status["completedAt"].is_string());
    }
}
