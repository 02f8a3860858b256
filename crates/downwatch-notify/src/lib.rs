//! downwatch-notify — consolidated status reports for endpoint owners.
//!
//! The check engine produces [`StatusMessage`]s; the [`Notifier`] bundles an
//! owner's messages into one [`Envelope`] and hands it to a [`Transport`].
//!
//! ```text
//! Notifier::notify(owner, messages)
//!   ├── render_report() → plain-text body
//!   ├── Envelope { to, from, subject, messages, body }
//!   └── Transport::deliver()
//!         ├── LogTransport      (tracing only)
//!         ├── WebhookTransport  (JSON POST)
//!         └── MemoryTransport   (records envelopes, for tests)
//! ```
//!
//! Delivery failures never escape as errors: `notify` returns
//! [`Delivery::Failed`] and the caller decides how to report it.

pub mod message;
pub mod notifier;
pub mod report;
pub mod transport;
pub mod webhook;

pub use message::{MessageKind, StatusMessage};
pub use notifier::{Delivery, Notifier};
pub use report::{Envelope, Recipient, render_report};
pub use transport::{LogTransport, MemoryTransport, Transport, TransportError, TransportResult};
pub use webhook::WebhookTransport;
