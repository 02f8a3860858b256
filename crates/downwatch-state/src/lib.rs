//! downwatch-state — persistence for monitored endpoints.
//!
//! Backed by [redb](https://docs.rs/redb). Owners, endpoints and open
//! down-log entries are JSON-serialized into `&[u8]` value columns keyed by
//! their `u64` id. Down-log entries are keyed by endpoint id, so an endpoint
//! can never have more than one open downtime interval.
//!
//! The engine talks to persistence only through the [`Repository`] trait;
//! [`StateStore`] is the embedded implementation. It is `Clone` + `Send` +
//! `Sync` (backed by `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod repository;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use repository::Repository;
pub use store::StateStore;
pub use types::*;
