//! Batch runner — checks every endpoint in a scope and reports per owner.
//!
//! Owners are processed concurrently. Within an owner every endpoint is
//! checked on its own task; the owner's report is sent only after all of
//! them have finished. Probes across the whole run share one semaphore, and
//! each endpoint is guarded by its own async mutex so overlapping runs never
//! interleave on the same endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};

use downwatch_core::RunnerConfig;
use downwatch_notify::{Delivery, Notifier, StatusMessage};
use downwatch_state::{Endpoint, EndpointId, Owner, Repository};

use crate::clock::{Clock, SystemClock};
use crate::error::{CheckError, CheckResult};
use crate::prober::Prober;
use crate::scope::{OwnerBatch, Scope, resolve};
use crate::summary::{EndpointFault, OwnerReport, RunSummary};
use crate::tracker::{StateTracker, Transition};

/// Per-endpoint async mutexes, created on demand.
#[derive(Clone, Default)]
pub struct EndpointLocks {
    inner: Arc<Mutex<HashMap<EndpointId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl EndpointLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `id`. Every caller for the same id gets the same one.
    pub fn lock_for(&self, id: EndpointId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(id).or_default().clone()
    }

    /// Drop mutexes nobody holds a handle to.
    pub fn prune(&self) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What one owner's batch produced.
struct OwnerOutcome {
    checked: usize,
    faults: Vec<EndpointFault>,
    /// Present only if the owner had messages and a report was attempted.
    report: Option<(OwnerReport, bool)>,
}

/// Drives a check run over a [`Scope`].
#[derive(Clone)]
pub struct BatchRunner {
    repo: Arc<dyn Repository>,
    prober: Arc<dyn Prober>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    tracker: StateTracker,
    probe_permits: Arc<Semaphore>,
    locks: EndpointLocks,
}

impl BatchRunner {
    pub fn new(
        repo: Arc<dyn Repository>,
        prober: Arc<dyn Prober>,
        notifier: Notifier,
        config: &RunnerConfig,
    ) -> Self {
        Self {
            tracker: StateTracker::new(repo.clone()),
            repo,
            prober,
            notifier,
            clock: Arc::new(SystemClock),
            probe_permits: Arc::new(Semaphore::new(config.max_concurrent_probes.max(1))),
            locks: EndpointLocks::new(),
        }
    }

    /// Replace the wall clock, e.g. with a `ManualClock` in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn endpoint_locks(&self) -> &EndpointLocks {
        &self.locks
    }

    /// Check every endpoint in `scope` and send one report per owner with
    /// updates.
    ///
    /// Only a storage failure while resolving the scope is returned as an
    /// error. Missing targets, endpoint faults and failed deliveries are
    /// collected in the summary.
    pub async fn run(&self, scope: Scope) -> CheckResult<RunSummary> {
        let mut summary = RunSummary::new(scope, self.clock.now());
        info!(%scope, "check run started");

        let resolution = resolve(self.repo.as_ref(), scope)?;
        for target in &resolution.not_found {
            warn!(%scope, %target, "check target not found");
        }
        summary.not_found = resolution.not_found;

        let mut owners = JoinSet::new();
        let mut spawned: HashMap<Id, (usize, Owner, Vec<Endpoint>)> = HashMap::new();
        for (index, batch) in resolution.batches.into_iter().enumerate() {
            let context = (index, batch.owner.clone(), batch.endpoints.clone());
            let runner = self.clone();
            let handle = owners.spawn(async move { runner.run_owner(batch).await });
            spawned.insert(handle.id(), context);
        }

        let mut outcomes: Vec<Option<OwnerOutcome>> = (0..spawned.len()).map(|_| None).collect();
        while let Some(joined) = owners.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    if let Some((index, _, _)) = spawned.get(&id) {
                        outcomes[*index] = Some(outcome);
                    }
                }
                Err(e) => {
                    let Some((index, owner, endpoints)) = spawned.get(&e.id()) else {
                        continue;
                    };
                    error!(owner_id = owner.id, error = %e, "owner batch task failed");
                    let err = CheckError::Task(e.to_string());
                    outcomes[*index] = Some(OwnerOutcome {
                        checked: 0,
                        faults: endpoints
                            .iter()
                            .map(|ep| EndpointFault::from_error(ep.id, &ep.address, owner.id, &err))
                            .collect(),
                        report: None,
                    });
                }
            }
        }

        for outcome in outcomes.into_iter().flatten() {
            summary.endpoints_checked += outcome.checked;
            summary.faults.extend(outcome.faults);
            match outcome.report {
                Some((report, true)) => summary.delivered.push(report),
                Some((report, false)) => summary.failed.push(report),
                None => {}
            }
        }

        self.locks.prune();

        info!(
            %scope,
            checked = summary.endpoints_checked,
            delivered = summary.delivered.len(),
            failed = summary.failed.len(),
            faults = summary.faults.len(),
            not_found = summary.not_found.len(),
            "check run finished"
        );
        Ok(summary)
    }

    /// Check one owner's endpoints, then notify them once if anything changed.
    async fn run_owner(self, batch: OwnerBatch) -> OwnerOutcome {
        let OwnerBatch { owner, endpoints } = batch;

        let mut checks = JoinSet::new();
        let mut spawned: HashMap<Id, usize> = HashMap::new();
        for (index, endpoint) in endpoints.iter().cloned().enumerate() {
            let runner = self.clone();
            let handle = checks.spawn(async move { runner.check_endpoint(endpoint).await });
            spawned.insert(handle.id(), index);
        }

        let mut results: Vec<Option<CheckResult<Option<Transition>>>> =
            (0..endpoints.len()).map(|_| None).collect();
        while let Some(joined) = checks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => (e.id(), Err(CheckError::Task(e.to_string()))),
            };
            if let Some(&index) = spawned.get(&id) {
                results[index] = Some(result);
            }
        }

        let mut outcome = OwnerOutcome {
            checked: 0,
            faults: Vec::new(),
            report: None,
        };
        let mut messages: Vec<StatusMessage> = Vec::new();
        for (endpoint, result) in endpoints.iter().zip(results) {
            match result {
                Some(Ok(Some(transition))) => {
                    outcome.checked += 1;
                    messages.extend(transition.message);
                }
                Some(Ok(None)) | None => {}
                Some(Err(err)) => {
                    match &err {
                        CheckError::ConsistencyFault { .. } => {
                            error!(endpoint_id = endpoint.id, owner_id = owner.id, error = %err, "consistency fault")
                        }
                        _ => warn!(endpoint_id = endpoint.id, owner_id = owner.id, error = %err, "endpoint check failed"),
                    }
                    outcome
                        .faults
                        .push(EndpointFault::from_error(endpoint.id, &endpoint.address, owner.id, &err));
                }
            }
        }

        if messages.is_empty() {
            debug!(owner_id = owner.id, "no updates for owner");
            return outcome;
        }

        let report = match self.notifier.notify(&owner, &messages).await {
            Delivery::Delivered => {
                info!(owner_id = owner.id, username = %owner.username, messages = messages.len(), "report sent");
                (OwnerReport::new(&owner, messages, None), true)
            }
            Delivery::Failed(reason) => {
                warn!(owner_id = owner.id, username = %owner.username, %reason, "report delivery failed");
                (OwnerReport::new(&owner, messages, Some(reason)), false)
            }
        };
        outcome.report = Some(report);
        outcome
    }

    /// Probe one endpoint and apply the verdict.
    ///
    /// Returns `Ok(None)` if the endpoint was deleted before its turn came.
    async fn check_endpoint(self, endpoint: Endpoint) -> CheckResult<Option<Transition>> {
        let lock = self.locks.lock_for(endpoint.id);
        let _guard = lock.lock().await;

        // Another run may have moved the stored state while we waited.
        let Some(current) = self.repo.find_endpoint(endpoint.id)? else {
            debug!(endpoint_id = endpoint.id, "endpoint removed before check");
            return Ok(None);
        };

        let verdict = {
            let _permit = self
                .probe_permits
                .acquire()
                .await
                .map_err(|e| CheckError::Task(e.to_string()))?;
            self.prober.probe(&current.address).await
        };
        debug!(endpoint_id = current.id, address = %current.address, ?verdict, "probed");

        let now = self.clock.now();
        self.tracker.apply(&current, verdict, now).map(Some)
    }
}
