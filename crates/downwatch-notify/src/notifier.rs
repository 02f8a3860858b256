//! Notifier — one consolidated report per owner per check cycle.

use std::sync::Arc;

use tracing::{debug, warn};

use downwatch_core::{NotifyConfig, TransportConfig};
use downwatch_state::Owner;

use crate::message::StatusMessage;
use crate::report::{Envelope, Recipient, render_report};
use crate::transport::{LogTransport, Transport, TransportResult};
use crate::webhook::WebhookTransport;

/// Outcome of a single `notify` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Sends an owner's collected messages through a transport.
///
/// Subject and sender identity are fixed at construction.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn Transport>,
    subject: String,
    from_name: String,
    from_address: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>, config: &NotifyConfig) -> Self {
        Self {
            transport,
            subject: config.subject.clone(),
            from_name: config.sender_name.clone(),
            from_address: config.sender_address.clone(),
        }
    }

    /// Build the transport named in the config.
    pub fn from_config(config: &NotifyConfig) -> TransportResult<Self> {
        let transport: Arc<dyn Transport> = match &config.transport {
            TransportConfig::Log => Arc::new(LogTransport),
            TransportConfig::Webhook { url } => Arc::new(WebhookTransport::new(url.clone())?),
        };
        Ok(Self::new(transport, config))
    }

    /// Send exactly one report containing `messages` in order.
    ///
    /// Transport failures come back as `Delivery::Failed`; this never errors.
    pub async fn notify(&self, owner: &Owner, messages: &[StatusMessage]) -> Delivery {
        if messages.is_empty() {
            warn!(owner_id = owner.id, "refusing to send an empty report");
            return Delivery::Failed("no messages to report".to_string());
        }

        let envelope = Envelope {
            to: Recipient::from(owner),
            from_name: self.from_name.clone(),
            from_address: self.from_address.clone(),
            subject: self.subject.clone(),
            messages: messages.to_vec(),
            body: render_report(owner, messages),
        };

        match self.transport.deliver(&envelope).await {
            Ok(()) => {
                debug!(owner_id = owner.id, messages = messages.len(), "report delivered");
                Delivery::Delivered
            }
            Err(e) => {
                warn!(owner_id = owner.id, error = %e, "report delivery failed");
                Delivery::Failed(e.to_string())
            }
        }
    }
}
