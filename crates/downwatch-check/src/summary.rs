//! Run summary — what was sent, what failed, and what could not be checked.

use serde::Serialize;

use downwatch_notify::StatusMessage;
use downwatch_state::{EndpointId, Owner, OwnerId};

use crate::error::CheckError;
use crate::scope::Scope;

/// One owner's report and how its delivery went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerReport {
    pub owner_id: OwnerId,
    pub username: String,
    pub email: String,
    pub messages: Vec<StatusMessage>,
    /// Transport failure reason; `None` when delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl OwnerReport {
    pub(crate) fn new(owner: &Owner, messages: Vec<StatusMessage>, detail: Option<String>) -> Self {
        Self {
            owner_id: owner.id,
            username: owner.username.clone(),
            email: owner.email.clone(),
            messages,
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Stored state contradicts itself (missing or duplicate down log).
    Consistency,
    /// The store failed to read or write.
    Storage,
    /// The check task itself died.
    Task,
}

/// An endpoint whose check could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointFault {
    pub endpoint_id: EndpointId,
    pub address: String,
    pub owner_id: OwnerId,
    pub kind: FaultKind,
    pub detail: String,
}

impl EndpointFault {
    pub(crate) fn from_error(endpoint_id: EndpointId, address: &str, owner_id: OwnerId, err: &CheckError) -> Self {
        let kind = match err {
            CheckError::ConsistencyFault { .. } => FaultKind::Consistency,
            CheckError::Task(_) => FaultKind::Task,
            _ => FaultKind::Storage,
        };
        let detail = match err {
            CheckError::ConsistencyFault { detail, .. } => detail.clone(),
            other => other.to_string(),
        };
        Self {
            endpoint_id,
            address: address.to_string(),
            owner_id,
            kind,
            detail,
        }
    }
}

/// Aggregate outcome of one `BatchRunner::run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scope: Scope,
    pub started_at: u64,
    pub endpoints_checked: usize,
    pub delivered: Vec<OwnerReport>,
    pub failed: Vec<OwnerReport>,
    pub not_found: Vec<String>,
    pub faults: Vec<EndpointFault>,
}

impl RunSummary {
    pub(crate) fn new(scope: Scope, started_at: u64) -> Self {
        Self {
            scope,
            started_at,
            endpoints_checked: 0,
            delivered: Vec::new(),
            failed: Vec::new(),
            not_found: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// True when the run produced no status messages at all.
    pub fn no_updates(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }

    /// True when a report could not be delivered, an endpoint faulted, or a
    /// requested owner or endpoint does not exist.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || !self.faults.is_empty() || !self.not_found.is_empty()
    }

    /// Total status messages produced across all owners.
    pub fn message_count(&self) -> usize {
        self.delivered
            .iter()
            .chain(&self.failed)
            .map(|r| r.messages.len())
            .sum()
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render the summary as plain-text tables.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        for target in &self.not_found {
            out.push_str(&format!("Not found: {target}\n"));
        }

        if self.no_updates() {
            out.push_str("No updates available\n");
        } else {
            let errors: Vec<String> = self
                .failed
                .iter()
                .map(|r| match &r.detail {
                    Some(reason) => format!(
                        "Error occurred while sending the report to {} ({reason})",
                        r.username
                    ),
                    None => format!("Error occurred while sending the report to {}", r.username),
                })
                .collect();
            let success: Vec<String> = self
                .delivered
                .iter()
                .map(|r| format!("Report sent successfully to {}", r.username))
                .collect();
            out.push_str(&table("Errors", &errors));
            out.push_str(&table("Success", &success));
        }

        if !self.faults.is_empty() {
            let rows: Vec<String> = self
                .faults
                .iter()
                .map(|f| format!("endpoint {} ({}): {}", f.endpoint_id, f.address, f.detail))
                .collect();
            out.push_str(&table("Faults", &rows));
        }

        out
    }
}

/// A single-column bordered table.
fn table(header: &str, rows: &[String]) -> String {
    let width = rows
        .iter()
        .map(|r| r.chars().count())
        .chain(std::iter::once(header.chars().count()))
        .max()
        .unwrap_or(0);
    let border = format!("+{}+\n", "-".repeat(width + 2));

    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&format!("| {header:<width$} |\n"));
    out.push_str(&border);
    for row in rows {
        out.push_str(&format!("| {row:<width$} |\n"));
    }
    if !rows.is_empty() {
        out.push_str(&border);
    }
    out
}
