//! StateTracker — turns a probe verdict into a status transition.
//!
//! | stored | probe | effect                                              |
//! |--------|-------|-----------------------------------------------------|
//! | down   | up    | close the down log, report the downtime (recovered) |
//! | up     | down  | open a down log, no message                         |
//! | up     | up    | nothing                                             |
//! | down   | down  | report the downtime so far (still down)             |
//!
//! The endpoint's stored status is always overwritten with the probe verdict,
//! including the no-change cases. A status change and its down-log change are
//! committed as one repository command, so a failed write leaves neither. A
//! missing or duplicate down log is a consistency fault: the transition is
//! abandoned before any write.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use downwatch_notify::StatusMessage;
use downwatch_state::{Endpoint, EndpointId, Repository, StateError};

use crate::duration::{DowntimeBreakdown, normalize};
use crate::error::{CheckError, CheckResult};
use crate::prober::Verdict;

/// Which branch of the state machine was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Recovered,
    WentDown,
    StillUp,
    StillDown,
}

/// Outcome of applying one verdict to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    /// Downtime covered by the message, if one was produced.
    pub downtime: Option<DowntimeBreakdown>,
    pub message: Option<StatusMessage>,
}

impl Transition {
    fn silent(kind: TransitionKind) -> Self {
        Self {
            kind,
            downtime: None,
            message: None,
        }
    }
}

/// Applies probe verdicts to stored endpoint state.
#[derive(Clone)]
pub struct StateTracker {
    repo: Arc<dyn Repository>,
}

impl StateTracker {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Apply `verdict` to `endpoint` as of `now` (epoch seconds).
    ///
    /// Callers must serialize calls for the same endpoint.
    pub fn apply(&self, endpoint: &Endpoint, verdict: Verdict, now: u64) -> CheckResult<Transition> {
        let reachable = verdict.is_reachable();

        let transition = match (endpoint.is_active, reachable) {
            (false, true) => {
                // Read first so a missing log aborts before anything is written.
                self.require_down_log(endpoint.id, "endpoint recovered but has no open down log")?;
                let opened_at = self.repo.record_recovery(endpoint.id, now)?.ok_or_else(|| {
                    CheckError::fault(endpoint.id, "down log vanished while closing it")
                })?;
                let downtime = normalize(now.saturating_sub(opened_at));
                info!(endpoint_id = endpoint.id, address = %endpoint.address, %downtime, "endpoint recovered");
                Transition {
                    kind: TransitionKind::Recovered,
                    downtime: Some(downtime),
                    message: Some(StatusMessage::recovered(format!(
                        "The url/app \"{}\" is now up, it was down for {downtime}.",
                        endpoint.address
                    ))),
                }
            }
            (true, false) => {
                match self.repo.record_went_down(endpoint.id, now) {
                    Ok(_) => {}
                    Err(StateError::DownLogAlreadyOpen(id)) => {
                        return Err(CheckError::fault(
                            id,
                            "endpoint went down but a down log is already open",
                        ));
                    }
                    Err(e) => return Err(e.into()),
                }
                info!(endpoint_id = endpoint.id, address = %endpoint.address, "endpoint went down");
                Transition::silent(TransitionKind::WentDown)
            }
            (true, true) => {
                self.repo.save_endpoint_status(endpoint.id, true, now)?;
                Transition::silent(TransitionKind::StillUp)
            }
            (false, false) => {
                let entry =
                    self.require_down_log(endpoint.id, "endpoint is down but has no open down log")?;
                self.repo.save_endpoint_status(endpoint.id, false, now)?;
                let downtime = normalize(now.saturating_sub(entry.opened_at));
                debug!(endpoint_id = endpoint.id, %downtime, "endpoint still down");
                Transition {
                    kind: TransitionKind::StillDown,
                    downtime: Some(downtime),
                    message: Some(StatusMessage::still_down(format!(
                        "The url/app \"{}\" is still down, it is down since {downtime}.",
                        endpoint.address
                    ))),
                }
            }
        };

        Ok(transition)
    }

    fn require_down_log(
        &self,
        endpoint_id: EndpointId,
        detail: &str,
    ) -> CheckResult<downwatch_state::DownLogEntry> {
        self.repo
            .find_down_log(endpoint_id)?
            .ok_or_else(|| CheckError::fault(endpoint_id, detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downwatch_notify::MessageKind;
    use std::sync::atomic::{AtomicBool, Ordering};

    use downwatch_state::{DownLogEntry, Owner, StateResult, StateStore};

    fn setup(is_active: bool) -> (StateStore, StateTracker, Endpoint) {
        let store = StateStore::open_in_memory().unwrap();
        let owner = store.create_owner("alice", "alice@example.com", 0).unwrap();
        let endpoint = store
            .create_endpoint(owner.id, "https://example.com", is_active, 1_000)
            .unwrap();
        let tracker = StateTracker::new(Arc::new(store.clone()));
        (store, tracker, endpoint)
    }

    fn reload(store: &StateStore, endpoint: &Endpoint) -> Endpoint {
        store.find_endpoint(endpoint.id).unwrap().unwrap()
    }

    #[test]
    fn up_to_down_opens_down_log_silently() {
        let (store, tracker, endpoint) = setup(true);

        let t = tracker.apply(&endpoint, Verdict::Unreachable, 2_000).unwrap();
        assert_eq!(t.kind, TransitionKind::WentDown);
        assert!(t.message.is_none());

        assert_eq!(store.find_down_log(endpoint.id).unwrap().unwrap().opened_at, 2_000);
        assert!(!reload(&store, &endpoint).is_active);
    }

    #[test]
    fn down_to_up_reports_exact_downtime_and_closes_log() {
        let (store, tracker, endpoint) = setup(true);
        tracker.apply(&endpoint, Verdict::Unreachable, 2_000).unwrap();

        let endpoint = reload(&store, &endpoint);
        let t = tracker.apply(&endpoint, Verdict::Reachable, 2_000 + 3_661).unwrap();

        assert_eq!(t.kind, TransitionKind::Recovered);
        assert_eq!(t.downtime.unwrap().total_seconds(), 3_661);
        let message = t.message.unwrap();
        assert_eq!(message.kind, MessageKind::RecoveredFromDown);
        assert_eq!(
            message.text,
            "The url/app \"https://example.com\" is now up, it was down for \
             0 week(s), 0 day(s), 1 hour(s), 1 minute(s) and 1 second."
        );
        assert!(store.find_down_log(endpoint.id).unwrap().is_none());
        assert!(reload(&store, &endpoint).is_active);
    }

    #[test]
    fn still_down_reports_without_mutating_log() {
        let (store, tracker, endpoint) = setup(false);

        let t = tracker.apply(&endpoint, Verdict::Unreachable, 1_000 + 90).unwrap();
        assert_eq!(t.kind, TransitionKind::StillDown);
        let message = t.message.unwrap();
        assert_eq!(message.kind, MessageKind::StillDown);
        assert_eq!(
            message.text,
            "The url/app \"https://example.com\" is still down, it is down since \
             0 week(s), 0 day(s), 0 hour(s), 1 minute(s) and 30 second."
        );
        assert_eq!(store.find_down_log(endpoint.id).unwrap().unwrap().opened_at, 1_000);
    }

    #[test]
    fn still_up_twice_is_idempotent() {
        let (store, tracker, endpoint) = setup(true);

        for now in [2_000, 3_000] {
            let endpoint = reload(&store, &endpoint);
            let t = tracker.apply(&endpoint, Verdict::Reachable, now).unwrap();
            assert_eq!(t, Transition::silent(TransitionKind::StillUp));
            assert!(store.find_down_log(endpoint.id).unwrap().is_none());
        }
        assert_eq!(reload(&store, &endpoint).updated_at, 3_000);
    }

    #[test]
    fn recovery_without_down_log_is_a_fault() {
        let (store, tracker, endpoint) = setup(false);
        store.close_down_log(endpoint.id).unwrap();

        let err = tracker.apply(&endpoint, Verdict::Reachable, 5_000).unwrap_err();
        assert!(matches!(err, CheckError::ConsistencyFault { endpoint_id, .. } if endpoint_id == endpoint.id));

        // Nothing was written.
        let stored = reload(&store, &endpoint);
        assert!(!stored.is_active);
        assert_eq!(stored.updated_at, 1_000);
    }

    #[test]
    fn still_down_without_down_log_is_a_fault() {
        let (store, tracker, endpoint) = setup(false);
        store.close_down_log(endpoint.id).unwrap();

        let err = tracker.apply(&endpoint, Verdict::Unreachable, 5_000).unwrap_err();
        assert!(matches!(err, CheckError::ConsistencyFault { .. }));
    }

    #[test]
    fn going_down_with_stale_log_is_a_fault() {
        let (store, tracker, endpoint) = setup(true);
        store.open_down_log(endpoint.id, 500).unwrap();

        let err = tracker.apply(&endpoint, Verdict::Unreachable, 5_000).unwrap_err();
        assert!(matches!(err, CheckError::ConsistencyFault { .. }));
        assert_eq!(store.find_down_log(endpoint.id).unwrap().unwrap().opened_at, 500);
        assert!(reload(&store, &endpoint).is_active);
    }

    #[test]
    fn clock_behind_opening_time_reports_zero_downtime() {
        let (_store, tracker, endpoint) = setup(false);
        let t = tracker.apply(&endpoint, Verdict::Unreachable, 10).unwrap();
        assert_eq!(t.downtime, Some(DowntimeBreakdown::default()));
    }

    #[test]
    fn deleted_endpoint_cannot_be_saved() {
        let (store, tracker, endpoint) = setup(true);
        store.delete_endpoint(endpoint.id).unwrap();

        let err = tracker.apply(&endpoint, Verdict::Reachable, 2_000).unwrap_err();
        assert!(matches!(err, CheckError::State(StateError::NotFound(_))));
    }

    #[test]
    fn going_down_on_a_deleted_endpoint_leaves_no_down_log() {
        let (store, tracker, endpoint) = setup(true);
        store.delete_endpoint(endpoint.id).unwrap();

        let err = tracker.apply(&endpoint, Verdict::Unreachable, 2_000).unwrap_err();
        assert!(matches!(err, CheckError::State(StateError::NotFound(_))));
        assert!(store.find_down_log(endpoint.id).unwrap().is_none());
    }

    /// Delegates to a real store, but the next status-changing write fails.
    struct FailNextChange {
        inner: StateStore,
        armed: AtomicBool,
    }

    impl FailNextChange {
        fn trip(&self) -> StateResult<()> {
            if self.armed.swap(false, Ordering::SeqCst) {
                return Err(StateError::Write("disk full".to_string()));
            }
            Ok(())
        }
    }

    impl Repository for FailNextChange {
        fn find_endpoint(&self, id: EndpointId) -> StateResult<Option<Endpoint>> {
            self.inner.find_endpoint(id)
        }
        fn find_owner(&self, id: u64) -> StateResult<Option<Owner>> {
            self.inner.find_owner(id)
        }
        fn list_all_owners(&self) -> StateResult<Vec<Owner>> {
            self.inner.list_all_owners()
        }
        fn endpoints_of(&self, owner_id: u64) -> StateResult<Vec<Endpoint>> {
            self.inner.endpoints_of(owner_id)
        }
        fn find_down_log(&self, endpoint_id: EndpointId) -> StateResult<Option<DownLogEntry>> {
            self.inner.find_down_log(endpoint_id)
        }
        fn record_went_down(&self, id: EndpointId, at: u64) -> StateResult<DownLogEntry> {
            self.trip()?;
            self.inner.record_went_down(id, at)
        }
        fn record_recovery(&self, id: EndpointId, at: u64) -> StateResult<Option<u64>> {
            self.trip()?;
            self.inner.record_recovery(id, at)
        }
        fn save_endpoint_status(&self, id: EndpointId, is_active: bool, at: u64) -> StateResult<()> {
            self.inner.save_endpoint_status(id, is_active, at)
        }
    }

    fn flaky(store: &StateStore) -> StateTracker {
        StateTracker::new(Arc::new(FailNextChange {
            inner: store.clone(),
            armed: AtomicBool::new(true),
        }))
    }

    #[test]
    fn failed_down_write_is_retried_cleanly_next_run() {
        let (store, _, endpoint) = setup(true);
        let tracker = flaky(&store);

        let err = tracker.apply(&endpoint, Verdict::Unreachable, 100).unwrap_err();
        assert!(matches!(err, CheckError::State(StateError::Write(_))));
        assert!(reload(&store, &endpoint).is_active);
        assert!(store.find_down_log(endpoint.id).unwrap().is_none());

        let endpoint = reload(&store, &endpoint);
        let t = tracker.apply(&endpoint, Verdict::Unreachable, 200).unwrap();
        assert_eq!(t.kind, TransitionKind::WentDown);
        assert_eq!(store.find_down_log(endpoint.id).unwrap().unwrap().opened_at, 200);

        let endpoint = reload(&store, &endpoint);
        let t = tracker.apply(&endpoint, Verdict::Unreachable, 260).unwrap();
        assert_eq!(t.kind, TransitionKind::StillDown);
        assert_eq!(t.downtime.unwrap().total_seconds(), 60);
    }

    #[test]
    fn failed_recovery_write_keeps_the_interval_for_next_run() {
        let (store, _, endpoint) = setup(false);
        let tracker = flaky(&store);

        let err = tracker.apply(&endpoint, Verdict::Reachable, 1_500).unwrap_err();
        assert!(matches!(err, CheckError::State(StateError::Write(_))));
        assert!(!reload(&store, &endpoint).is_active);
        assert_eq!(store.find_down_log(endpoint.id).unwrap().unwrap().opened_at, 1_000);

        let endpoint = reload(&store, &endpoint);
        let t = tracker.apply(&endpoint, Verdict::Reachable, 1_600).unwrap();
        assert_eq!(t.kind, TransitionKind::Recovered);
        assert_eq!(t.downtime.unwrap().total_seconds(), 600);
        assert!(t.message.is_some());
    }
}
