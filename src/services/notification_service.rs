use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{ debug, warn };
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ScheduledTxExecuted,
    ScheduledTxFailed,
    ScheduledTxExpired,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEvent {
    pub kind: EventKind,
    pub user_id: String,
    pub schedule_id: Uuid,
    pub chain: String,
    pub amount: String,
    pub token_symbol: String,
    pub tx_hash: Option<String>,
    pub savings_usd: Option<f64>,
    pub error: Option<String>,
}

/// Outcome notifications are best-effort: a delivery failure never fails
/// the execution that produced it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: ScheduleEvent);
}

/// Posts events to a configured webhook. Used when NOTIFY_WEBHOOK_URL is
/// set; otherwise the engine runs with no notifier at all.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: ScheduleEvent) {
        match self.client.post(&self.url).json(&event).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(schedule_id = %event.schedule_id, kind = ?event.kind, "notification delivered");
            }
            Ok(response) => {
                warn!(
                    schedule_id = %event.schedule_id,
                    status = %response.status(),
                    "notification webhook rejected event"
                );
            }
            Err(err) => {
                warn!(schedule_id = %event.schedule_id, error = %err, "notification delivery failed");
            }
        }
    }
}
