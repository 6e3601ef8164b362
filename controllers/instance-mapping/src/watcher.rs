//! InstanceMapping watcher.
//!
//! Drives the reconciler from `kube_runtime::Controller`, which handles
//! reconnection, debouncing and per-object serialization. Failed reconciles
//! are retried with a per-resource Fibonacci backoff.
//!
//! The watch also delivers the controller's own status writes. [`ReconcileGate`]
//! drops those events: a resource that converged at its current generation
//! waits for a spec change, and one that failed waits out its backoff.

use crate::backoff::BackoffRegistry;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::InstanceMapping;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{Controller, watcher};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

/// Delay before re-running a resource whose spec was just defaulted
pub const REQUEUE_AFTER_DEFAULTING: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateEntry {
    Converged { generation: Option<i64> },
    BackingOff { generation: Option<i64>, retry_at: Instant },
}

/// Last known result per resource, keyed by `namespace/name`.
///
/// Only events for an unchanged `metadata.generation` are filtered, so spec
/// edits always get through.
#[derive(Debug, Default)]
pub struct ReconcileGate {
    entries: Mutex<HashMap<String, GateEntry>>,
}

impl ReconcileGate {
    /// Returns the action to take instead of reconciling, if the event can be dropped.
    pub fn skip(&self, key: &str, generation: Option<i64>, now: Instant) -> Option<Action> {
        let entries = self.entries.lock().ok()?;
        match entries.get(key)? {
            GateEntry::Converged { generation: seen } if *seen == generation => Some(Action::await_change()),
            GateEntry::BackingOff { generation: seen, retry_at } if *seen == generation && now < *retry_at => {
                Some(Action::requeue(*retry_at - now))
            }
            _ => None,
        }
    }

    /// Record that `key` converged at `generation`.
    pub fn converged(&self, key: &str, generation: Option<i64>) {
        self.set(key, GateEntry::Converged { generation });
    }

    /// Hold back same-generation events for `key` until `retry_at`.
    pub fn failed(&self, key: &str, generation: Option<i64>, retry_at: Instant) {
        self.set(key, GateEntry::BackingOff { generation, retry_at });
    }

    /// Drop what is known about `key`; its next event is always reconciled.
    pub fn forget(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    fn set(&self, key: &str, entry: GateEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), entry);
        }
    }
}

/// Shared state handed to every reconcile and error-policy invocation
pub struct WatchContext {
    pub reconciler: Arc<Reconciler>,
    pub backoff: BackoffRegistry,
    pub gate: ReconcileGate,
}

impl WatchContext {
    /// Context with empty backoff and gate state
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            backoff: BackoffRegistry::default(),
            gate: ReconcileGate::default(),
        }
    }
}

fn resource_key(mapping: &InstanceMapping) -> String {
    format!("{}/{}", mapping.namespace().unwrap_or_default(), mapping.name_any())
}

fn outcome_action(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::Requeue => Action::requeue(REQUEUE_AFTER_DEFAULTING),
    }
}

async fn reconcile(mapping: Arc<InstanceMapping>, ctx: Arc<WatchContext>) -> Result<Action, ControllerError> {
    let key = resource_key(&mapping);
    let span = info_span!("reconcile", instancemapping = %key, correlation_id = %Uuid::new_v4());

    async move {
        let generation = mapping.metadata.generation;
        let deleting = mapping.is_being_deleted();
        if !deleting {
            if let Some(action) = ctx.gate.skip(&key, generation, Instant::now()) {
                debug!("No change since last reconcile of generation {:?}, skipping", generation);
                return Ok(action);
            }
        }

        let namespace = mapping
            .namespace()
            .ok_or_else(|| ControllerError::InvalidResource(format!("{} has no namespace", key)))?;
        let name = mapping.name_any();
        debug!("Reconciling InstanceMapping");

        match ctx.reconciler.reconcile(&namespace, &name).await {
            Ok(outcome) => {
                ctx.backoff.reset(&key);
                match outcome {
                    ReconcileOutcome::Done if !deleting => ctx.gate.converged(&key, generation),
                    _ => ctx.gate.forget(&key),
                }
                Ok(outcome_action(outcome))
            }
            Err(e) => {
                error!("Reconciliation failed for InstanceMapping {}: {}", key, e);
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

fn error_policy(mapping: Arc<InstanceMapping>, error: &ControllerError, ctx: Arc<WatchContext>) -> Action {
    let key = resource_key(&mapping);
    let delay = ctx.backoff.next_delay(&key);
    ctx.gate.failed(&key, mapping.metadata.generation, Instant::now() + delay);
    warn!(
        instancemapping = %key,
        error = %error,
        "Requeueing InstanceMapping in {}s",
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Watch InstanceMappings until a shutdown signal arrives.
pub async fn watch_instance_mappings(
    api: Api<InstanceMapping>,
    ctx: Arc<WatchContext>,
    concurrency: u16,
    debounce: Duration,
) -> Result<(), ControllerError> {
    info!("Starting InstanceMapping watcher");

    let runtime_config = RuntimeConfig::default()
        .debounce(debounce)
        .concurrency(concurrency);

    Controller::new(api, watcher::Config::default())
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _action)) => debug!("Reconciled {}", obj),
                Err(e) => warn!("InstanceMapping controller error: {}", e),
            }
        })
        .await;

    info!("InstanceMapping watcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn context(harness: TestHarness) -> Arc<WatchContext> {
        let TestHarness { reconciler, .. } = harness;
        Arc::new(WatchContext::new(Arc::new(reconciler)))
    }

    #[test]
    fn test_outcome_action() {
        assert_eq!(outcome_action(ReconcileOutcome::Done), Action::await_change());
        assert_eq!(
            outcome_action(ReconcileOutcome::Requeue),
            Action::requeue(REQUEUE_AFTER_DEFAULTING)
        );
    }

    #[tokio::test]
    async fn test_error_policy_backs_off_per_resource() {
        let ctx = context(TestHarness::new());
        let a = Arc::new(create_test_mapping(NAMESPACE, "a", SERVICE_INSTANCE_ID, None));
        let b = Arc::new(create_test_mapping(NAMESPACE, "b", SERVICE_INSTANCE_ID, None));
        let error = ControllerError::Watch("boom".to_string());

        assert_eq!(error_policy(a.clone(), &error, ctx.clone()), Action::requeue(Duration::from_secs(5)));
        assert_eq!(error_policy(a.clone(), &error, ctx.clone()), Action::requeue(Duration::from_secs(5)));
        assert_eq!(error_policy(a, &error, ctx.clone()), Action::requeue(Duration::from_secs(10)));
        assert_eq!(error_policy(b, &error, ctx), Action::requeue(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_successful_reconcile_resets_backoff() {
        let harness = TestHarness::with_mapping(Some(NAMESPACE));
        let mut stored = harness.stored().unwrap();
        let ctx = context(harness);
        let error = ControllerError::Watch("boom".to_string());

        let failed = Arc::new(stored.clone());
        error_policy(failed.clone(), &error, ctx.clone());
        error_policy(failed.clone(), &error, ctx.clone());
        error_policy(failed, &error, ctx.clone());

        stored.metadata.generation = Some(2);
        let mapping = Arc::new(stored);
        let action = reconcile(mapping.clone(), ctx.clone()).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert_eq!(
            error_policy(mapping, &error, ctx),
            Action::requeue(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_gate_matches_generation() {
        let gate = ReconcileGate::default();
        let now = Instant::now();
        assert_eq!(gate.skip("ns/a", Some(1), now), None);

        gate.converged("ns/a", Some(1));
        assert_eq!(gate.skip("ns/a", Some(1), now), Some(Action::await_change()));
        assert_eq!(gate.skip("ns/a", Some(2), now), None);
        assert_eq!(gate.skip("ns/b", Some(1), now), None);

        gate.failed("ns/a", Some(1), now + Duration::from_secs(5));
        assert_eq!(
            gate.skip("ns/a", Some(1), now + Duration::from_secs(2)),
            Some(Action::requeue(Duration::from_secs(3)))
        );
        assert_eq!(gate.skip("ns/a", Some(1), now + Duration::from_secs(5)), None);
        assert_eq!(gate.skip("ns/a", Some(2), now), None);

        gate.forget("ns/a");
        assert_eq!(gate.skip("ns/a", Some(1), now), None);
    }

    #[tokio::test]
    async fn test_status_event_after_convergence_is_skipped() {
        let harness = TestHarness::with_mapping(Some(NAMESPACE));
        let inventory = harness.inventory.clone();
        let ctx = context(harness);
        let mapping = Arc::new(create_test_mapping(NAMESPACE, NAME, SERVICE_INSTANCE_ID, Some(NAMESPACE)));

        assert_eq!(reconcile(mapping.clone(), ctx.clone()).await.unwrap(), Action::await_change());
        let calls = inventory.calls().len();
        assert!(calls > 0);

        // the Succeeded status write comes back with the same generation
        assert_eq!(reconcile(mapping.clone(), ctx.clone()).await.unwrap(), Action::await_change());
        assert_eq!(inventory.calls().len(), calls);

        let mut edited = (*mapping).clone();
        edited.metadata.generation = Some(2);
        reconcile(Arc::new(edited), ctx).await.unwrap();
        assert!(inventory.calls().len() > calls);
    }

    #[tokio::test]
    async fn test_failed_status_event_waits_for_backoff() {
        let harness = TestHarness::with_mapping(Some(NAMESPACE));
        let inventory = harness.inventory.clone();
        inventory.set_create_failure(Some(500));
        let ctx = context(harness);
        let mapping = Arc::new(create_test_mapping(NAMESPACE, NAME, SERVICE_INSTANCE_ID, Some(NAMESPACE)));

        let error = reconcile(mapping.clone(), ctx.clone()).await.unwrap_err();
        assert_eq!(
            error_policy(mapping.clone(), &error, ctx.clone()),
            Action::requeue(Duration::from_secs(5))
        );
        let calls = inventory.calls().len();

        // the Failed status write must not bypass the backoff
        let action = reconcile(mapping.clone(), ctx.clone()).await.unwrap();
        assert_ne!(action, Action::await_change());
        assert_eq!(inventory.calls().len(), calls);

        let mut edited = (*mapping).clone();
        edited.metadata.generation = Some(2);
        assert!(reconcile(Arc::new(edited), ctx).await.is_err());
        assert!(inventory.calls().len() > calls);
    }

    #[tokio::test]
    async fn test_deletion_bypasses_gate() {
        let harness = TestHarness::with_mapping(Some(NAMESPACE));
        let inventory = harness.inventory.clone();
        let mut mapping = create_test_mapping(NAMESPACE, NAME, SERVICE_INSTANCE_ID, Some(NAMESPACE));
        harness.reconcile().await.unwrap();
        harness.delete();
        let ctx = context(harness);
        ctx.gate.converged(&resource_key(&mapping), Some(1));
        assert_eq!(inventory.mappings(SERVICE_INSTANCE_ID).len(), 1);

        mark_deleted(&mut mapping);
        reconcile(Arc::new(mapping), ctx).await.unwrap();
        assert!(inventory.mappings(SERVICE_INSTANCE_ID).is_empty());
    }
}
