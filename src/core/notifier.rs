use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Credentials, MailConfig};
use crate::error::{WatchError, Result};

/// One outgoing change notification, before it is addressed
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Provider acknowledgement for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: String,
    pub id: String,
    pub response: String,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub delivered: Vec<Delivery>,
    pub failed: Vec<(String, String)>,
}

/// Sends a message to every configured recipient. A failure for one
/// recipient must not stop delivery to the rest.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> DispatchReport;
}

#[derive(Debug, Default, Deserialize)]
struct MailgunResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    message: String,
}

/// Mailgun HTTP API notifier, one request per recipient
pub struct MailgunNotifier {
    client: Client,
    endpoint: String,
    private_key: String,
    recipients: Vec<String>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl MailgunNotifier {
    pub fn new(config: &MailConfig, credentials: &Credentials, recipients: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WatchError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v3/{}/messages",
                config.api_base.trim_end_matches('/'),
                credentials.domain
            ),
            private_key: credentials.private_key.clone(),
            recipients,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    async fn send_one(&self, message: &Message, recipient: &str) -> Result<Delivery> {
        let mut attempt = 1;
        loop {
            match self.post(message, recipient).await {
                Ok(delivery) => return Ok(delivery),
                Err(SendError::Transient(reason)) if attempt < self.max_attempts => {
                    warn!(
                        "Delivery to {} failed (attempt {}/{}): {}; retrying",
                        recipient, attempt, self.max_attempts, reason
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(SendError::Transient(reason)) | Err(SendError::Permanent(reason)) => {
                    return Err(WatchError::Notify(format!("{}: {}", recipient, reason)));
                }
            }
        }
    }

    async fn post(&self, message: &Message, recipient: &str) -> std::result::Result<Delivery, SendError> {
        let form = [
            ("from", message.sender.as_str()),
            ("to", recipient),
            ("subject", message.subject.as_str()),
            ("text", message.text.as_str()),
            ("html", message.html.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.private_key))
            .form(&form)
            .send()
            .await
            .map_err(|e| SendError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("HTTP {}: {}", status, body.trim());
            return Err(if is_transient(status) {
                SendError::Transient(reason)
            } else {
                SendError::Permanent(reason)
            });
        }

        // Accepted: from here on a retry would mail the recipient twice
        let body = match response.text().await {
            Ok(raw) => serde_json::from_str::<MailgunResponse>(&raw).unwrap_or_else(|e| {
                warn!("Unreadable acknowledgement for {} ({:?}): {}", recipient, raw, e);
                MailgunResponse::default()
            }),
            Err(e) => {
                warn!("Acknowledgement for {} could not be read: {}", recipient, e);
                MailgunResponse::default()
            }
        };

        Ok(Delivery {
            recipient: recipient.to_string(),
            id: body.id,
            response: body.message,
        })
    }
}

enum SendError {
    Transient(String),
    Permanent(String),
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn send(&self, message: &Message) -> DispatchReport {
        let mut report = DispatchReport::default();

        for recipient in &self.recipients {
            match self.send_one(message, recipient).await {
                Ok(delivery) => {
                    info!("Response ID: {}", delivery.id);
                    info!("Message from server: {}", delivery.response);
                    report.delivered.push(delivery);
                }
                Err(e) => {
                    warn!("Giving up on {}: {}", recipient, e);
                    report.failed.push((recipient.clone(), e.to_string()));
                }
            }
        }

        report
    }
}
