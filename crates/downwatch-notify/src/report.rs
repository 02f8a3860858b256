//! Report envelope and plain-text rendering.

use serde::{Deserialize, Serialize};

use downwatch_state::Owner;

use crate::message::StatusMessage;

/// Who a report is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub display_name: String,
}

impl From<&Owner> for Recipient {
    fn from(owner: &Owner) -> Self {
        Self {
            address: owner.email.clone(),
            display_name: owner.username.clone(),
        }
    }
}

/// Everything a transport needs to deliver one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub to: Recipient,
    pub from_name: String,
    pub from_address: String,
    pub subject: String,
    /// Messages in the order they were generated.
    pub messages: Vec<StatusMessage>,
    /// Rendered plain-text body.
    pub body: String,
}

/// Render the plain-text body of an owner's report.
pub fn render_report(owner: &Owner, messages: &[StatusMessage]) -> String {
    let mut body = format!(
        "Hello {},\n\nHere is the latest availability report for your websites/apps:\n\n",
        owner.username
    );
    for message in messages {
        body.push_str("- ");
        body.push_str(&message.text);
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Owner {
        Owner {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            created_at: 0,
        }
    }

    #[test]
    fn report_lists_messages_in_order() {
        let messages = vec![
            StatusMessage::still_down("first"),
            StatusMessage::recovered("second"),
        ];
        let body = render_report(&owner(), &messages);

        assert!(body.starts_with("Hello alice,"));
        let first = body.find("- first").unwrap();
        let second = body.find("- second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn recipient_comes_from_owner() {
        let recipient = Recipient::from(&owner());
        assert_eq!(recipient.address, "alice@example.com");
        assert_eq!(recipient.display_name, "alice");
    }
}
