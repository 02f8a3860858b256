//! Notification transports.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::report::Envelope;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("transport rejected the report with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Delivers a rendered report to its recipient.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver exactly one outbound message for `envelope`.
    async fn deliver(&self, envelope: &Envelope) -> TransportResult<()>;
}

/// Writes reports to the log. Always succeeds.
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn deliver(&self, envelope: &Envelope) -> TransportResult<()> {
        info!(
            to = %envelope.to.address,
            name = %envelope.to.display_name,
            subject = %envelope.subject,
            messages = envelope.messages.len(),
            "status report"
        );
        for message in &envelope.messages {
            info!(kind = ?message.kind, "{}", message.text);
        }
        Ok(())
    }
}

/// Records envelopes in memory. Can be told to fail, globally or for
/// specific recipient addresses.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    delivered: Mutex<Vec<Envelope>>,
    attempts: Mutex<Vec<String>>,
    fail_all: Mutex<bool>,
    fail_for: Mutex<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that rejects every delivery.
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_all.lock() {
            *flag = fail;
        }
    }

    /// Reject deliveries addressed to `address`.
    pub fn fail_for(&self, address: &str) {
        if let Ok(mut set) = self.fail_for.lock() {
            set.insert(address.to_string());
        }
    }

    /// Envelopes that were accepted, in delivery order.
    pub fn delivered(&self) -> Vec<Envelope> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Recipient addresses of every attempt, successful or not.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn deliver(&self, envelope: &Envelope) -> TransportResult<()> {
        let poisoned = || TransportError::Unavailable("memory transport poisoned".to_string());

        self.attempts
            .lock()
            .map_err(|_| poisoned())?
            .push(envelope.to.address.clone());

        let fail_all = *self.fail_all.lock().map_err(|_| poisoned())?;
        let fail_this = self
            .fail_for
            .lock()
            .map_err(|_| poisoned())?
            .contains(&envelope.to.address);
        if fail_all || fail_this {
            return Err(TransportError::Unavailable(format!(
                "delivery to {} refused",
                envelope.to.address
            )));
        }

        self.delivered
            .lock()
            .map_err(|_| poisoned())?
            .push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StatusMessage;
    use crate::report::Recipient;

    fn envelope(to: &str) -> Envelope {
        Envelope {
            to: Recipient {
                address: to.to_string(),
                display_name: "someone".to_string(),
            },
            from_name: "downwatch".to_string(),
            from_address: "downwatch@localhost".to_string(),
            subject: "report".to_string(),
            messages: vec![StatusMessage::still_down("x is still down")],
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn log_transport_always_succeeds() {
        assert!(LogTransport.deliver(&envelope("a@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn memory_transport_records_deliveries() {
        let transport = MemoryTransport::new();
        transport.deliver(&envelope("a@example.com")).await.unwrap();
        transport.deliver(&envelope("b@example.com")).await.unwrap();

        let delivered = transport.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[1].to.address, "b@example.com");
    }

    #[tokio::test]
    async fn memory_transport_fails_selected_recipients() {
        let transport = MemoryTransport::new();
        transport.fail_for("b@example.com");

        assert!(transport.deliver(&envelope("a@example.com")).await.is_ok());
        assert!(transport.deliver(&envelope("b@example.com")).await.is_err());
        assert_eq!(transport.delivered().len(), 1);
        assert_eq!(transport.attempts().len(), 2);
    }

    #[tokio::test]
    async fn failing_memory_transport_rejects_everything() {
        let transport = MemoryTransport::failing();
        assert!(transport.deliver(&envelope("a@example.com")).await.is_err());
        assert!(transport.delivered().is_empty());
    }
}
