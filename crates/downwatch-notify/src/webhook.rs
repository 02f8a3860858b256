//! Webhook transport: POSTs each report envelope as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::report::Envelope;
use crate::transport::{Transport, TransportError, TransportResult};

/// A transport for pushing reports to a custom webhook.
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> TransportResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn deliver(&self, envelope: &Envelope) -> TransportResult<()> {
        let response = self.client.post(&self.url).json(envelope).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %self.url, to = %envelope.to.address, "report posted to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StatusMessage;
    use crate::report::Recipient;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, read the full request, answer with `status_line`
    /// and hand back the raw request text.
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}/hook"), handle)
    }

    fn envelope() -> Envelope {
        Envelope {
            to: Recipient {
                address: "alice@example.com".to_string(),
                display_name: "alice".to_string(),
            },
            from_name: "downwatch".to_string(),
            from_address: "downwatch@localhost".to_string(),
            subject: "Website Availability Status Report".to_string(),
            messages: vec![StatusMessage::recovered("site is now up")],
            body: "Hello alice".to_string(),
        }
    }

    #[tokio::test]
    async fn posts_envelope_as_json() {
        let (url, server) = serve_once("HTTP/1.1 200 OK").await;
        let transport = WebhookTransport::new(url).unwrap();

        transport.deliver(&envelope()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["subject"], "Website Availability Status Report");
        assert_eq!(json["to"]["address"], "alice@example.com");
        assert_eq!(json["messages"][0]["kind"], "recovered_from_down");
        assert_eq!(json["messages"][0]["text"], "site is now up");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let (url, server) = serve_once("HTTP/1.1 503 Service Unavailable").await;
        let transport = WebhookTransport::new(url).unwrap();

        let err = transport.deliver(&envelope()).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 503, .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_network_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebhookTransport::new(format!("http://{addr}/hook")).unwrap();
        let err = transport.deliver(&envelope()).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
