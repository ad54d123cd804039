use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;
use url::Url;

const QUEUE_CAPACITY: usize = 256;
const MAX_ALERT_CHARS: usize = 3000;

#[derive(Clone, Debug)]
pub(crate) struct Alert {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) span_path: Vec<String>,
}

impl Alert {
    pub(crate) fn render(&self) -> String {
        let mut lines = vec![format!(
            "[{}] {} {} ({}) {}",
            self.level.as_str(),
            self.service_name,
            self.stage,
            self.component,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )];

        match &self.location {
            Some(location) => lines.push(format!("{} at {location}", self.target)),
            None => lines.push(self.target.clone()),
        }
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            lines.push(message.trim().to_string());
        }
        if !self.span_path.is_empty() {
            lines.push(format!("spans: {}", self.span_path.join(" > ")));
        }
        for (key, value) in &self.fields {
            lines.push(format!("{key} = {value}"));
        }

        truncate(lines.join("\n"))
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Posts `{ "text": ... }` to an incoming-webhook URL (Slack and Mattermost compatible).
pub(crate) struct WebhookAlertSink {
    webhook_url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "text": alert.render() }))
            .send()
            .await
            // reqwest errors embed the URL, which carries the webhook token.
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("alert webhook timed out")
                } else {
                    anyhow!("alert webhook request failed")
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("alert webhook returned {}", response.status()))
        }
    }
}

/// Bounded queue drained by one background task, so logging never blocks on the network.
#[derive(Clone)]
pub(crate) struct AlertQueue {
    tx: mpsc::Sender<Alert>,
}

impl AlertQueue {
    pub(crate) fn spawn(sink: Arc<dyn AlertSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Alert>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                if let Err(err) = sink.deliver(&alert).await {
                    // Plain eprintln: a tracing event here would loop back into the queue.
                    eprintln!("alert delivery failed: {err}");
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn push(&self, alert: Alert) {
        if let Err(err) = self.tx.try_send(alert) {
            match err {
                mpsc::error::TrySendError::Full(_) => eprintln!("alert queue full; dropping alert"),
                mpsc::error::TrySendError::Closed(_) => {
                    eprintln!("alert queue closed; dropping alert")
                }
            }
        }
    }
}

fn truncate(content: String) -> String {
    if content.chars().count() <= MAX_ALERT_CHARS {
        return content;
    }
    let mut truncated: String = content.chars().take(MAX_ALERT_CHARS - 16).collect();
    truncated.push_str("\n... (truncated)");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn deliver(&self, alert: &Alert) -> Result<()> {
            self.delivered.lock().unwrap().push(alert.render());
            Ok(())
        }
    }

    fn alert(message: &str) -> Alert {
        Alert {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "booking".to_string(),
            stage: "local".to_string(),
            component: "worker".to_string(),
            target: "worker::expiry".to_string(),
            location: Some("worker/src/expiry.rs:10".to_string()),
            message: Some(message.to_string()),
            fields: BTreeMap::from([("booking_id".to_string(), "b-1".to_string())]),
            span_path: vec!["sweep".to_string()],
        }
    }

    #[test]
    fn render_includes_context_and_fields() {
        let text = alert("expiry failed").render();

        assert!(text.starts_with("[ERROR] booking local (worker)"));
        assert!(text.contains("expiry failed"));
        assert!(text.contains("booking_id = b-1"));
        assert!(text.contains("spans: sweep"));
    }

    #[test]
    fn render_truncates_long_messages() {
        let text = alert(&"x".repeat(10_000)).render();

        assert!(text.chars().count() <= MAX_ALERT_CHARS);
        assert!(text.ends_with("(truncated)"));
    }

    #[tokio::test]
    async fn queue_delivers_in_background() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
        });
        let queue = AlertQueue::spawn(sink.clone());

        queue.push(alert("first"));

        for _ in 0..50 {
            if !sink.delivered.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
    }
}
