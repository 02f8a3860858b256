//! downwatch-check — the status-check engine.
//!
//! Probes endpoints, interprets each verdict against the stored status,
//! keeps the down log in step, and sends every owner one consolidated report
//! per run.
//!
//! # Architecture
//!
//! ```text
//! BatchRunner::run(scope)
//!   ├── resolve scope → per-owner endpoint batches
//!   ├── per owner (concurrently)
//!   │   ├── per endpoint (concurrently, bounded by a probe semaphore)
//!   │   │   ├── per-endpoint lock
//!   │   │   ├── Prober::probe() → Verdict
//!   │   │   └── StateTracker::apply() → Transition (+ StatusMessage)
//!   │   ├── join all endpoint checks (barrier)
//!   │   └── Notifier::notify() once if any messages
//!   └── RunSummary (delivered / failed / not found / faults)
//! ```
//!
//! Per-endpoint and per-owner failures are isolated and collected in the
//! summary. Only a malformed scope aborts a run.

pub mod clock;
pub mod duration;
pub mod error;
pub mod prober;
pub mod runner;
pub mod scope;
pub mod summary;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duration::{DowntimeBreakdown, normalize};
pub use error::{CheckError, CheckResult};
pub use prober::{HttpProber, Prober, Verdict};
pub use runner::{BatchRunner, EndpointLocks};
pub use scope::{OwnerBatch, Scope};
pub use summary::{EndpointFault, FaultKind, OwnerReport, RunSummary};
pub use tracker::{StateTracker, Transition, TransitionKind};
