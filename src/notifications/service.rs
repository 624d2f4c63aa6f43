//! The notification relay: turns activity logs into Discord webhook embeds.
//!
//! Delivery is best-effort. A log row is marked `sent` only after the
//! webhook endpoint acknowledges it; anything else leaves the row unsent so
//! the periodic sweep can retry it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::db::enums::PredictionOutcome;
use crate::db::models::{ActivityLog, NewActivityLog, Settings};
use crate::db::storage::{Storage, StorageError};
use crate::notifications::models::{Embed, EmbedField, EmbedFooter, WebhookPayload};

/// Milliseconds to wait between consecutive deliveries in a sweep, so a
/// backlog does not trip Discord's rate limiting.
const SWEEP_SEND_GAP_MS: u64 = 500;

pub struct NotificationService {
    storage: Arc<dyn Storage>,
    client: reqwest::Client,
}

impl NotificationService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        NotificationService { storage, client }
    }

    /// Posts a payload to a webhook URL. Never fails the caller: delivery
    /// problems are logged and reported as `false`.
    pub async fn send_webhook(&self, url: &str, payload: &WebhookPayload) -> bool {
        match self.client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "webhook endpoint rejected payload");
                false
            }
            Err(e) => {
                error!(error = %e, "webhook delivery failed");
                false
            }
        }
    }

    /// Builds the embed for a log and delivers it to the owner's webhook.
    ///
    /// Returns `Ok(false)` without attempting delivery when the user has no
    /// webhook configured or has the log's category muted. On acknowledged
    /// delivery the log is marked sent.
    pub async fn send_activity_log(&self, log: &ActivityLog) -> Result<bool, StorageError> {
        let settings = self.storage.get_settings(log.user_id).await?;
        let Some(url) = settings.as_ref().and_then(|s| s.discord_webhook.clone()) else {
            debug!(user_id = log.user_id, "no webhook configured, skipping");
            return Ok(false);
        };
        if let Some(settings) = settings.as_ref() {
            if !category_enabled(&log.kind, settings) {
                return Ok(false);
            }
        }
        let username = settings
            .map(|s| s.webhook_name)
            .unwrap_or_else(|| "PointFarm".to_string());

        let mut fields = Vec::new();
        if let Some(channel) = &log.channel {
            fields.push(EmbedField {
                name: "Channel".to_string(),
                value: channel.clone(),
                inline: true,
            });
        }
        if let Some(amount) = log.amount {
            fields.push(EmbedField {
                name: "Amount".to_string(),
                value: format!("{amount} points"),
                inline: true,
            });
        }
        let payload = WebhookPayload {
            username: username.clone(),
            avatar_url: None,
            content: None,
            embeds: vec![Embed {
                title: log.kind.clone(),
                description: log.details.clone(),
                color: embed_color(&log.kind),
                fields,
                footer: EmbedFooter { text: username },
                timestamp: log.timestamp.to_rfc3339(),
            }],
        };

        if self.send_webhook(&url, &payload).await {
            self.storage.mark_log_sent(log.id).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Records a prediction outcome as an activity log and delivers it.
    pub async fn send_prediction_result(
        &self,
        user_id: i32,
        channel: &str,
        outcome: PredictionOutcome,
        profit: i64,
    ) -> Result<bool, StorageError> {
        let (kind, details) = match outcome {
            PredictionOutcome::Win => (
                "Prediction Win",
                format!("{channel} | Profit: {profit} points"),
            ),
            _ => (
                "Prediction Loss",
                format!("{channel} | Loss: {} points", profit.abs()),
            ),
        };
        let log = self
            .storage
            .create_log(NewActivityLog {
                user_id,
                kind: kind.to_string(),
                details,
                channel: Some(channel.to_string()),
                amount: Some(profit),
            })
            .await?;
        self.send_activity_log(&log).await
    }

    /// Fires a throwaway embed at a URL so the user can verify their webhook
    /// before saving it.
    pub async fn send_test_message(&self, url: &str, name: &str) -> bool {
        let payload = WebhookPayload {
            username: name.to_string(),
            avatar_url: None,
            content: None,
            embeds: vec![Embed {
                title: "Webhook Test".to_string(),
                description: "If you can read this, notifications are working.".to_string(),
                color: embed_color("System Event"),
                fields: vec![EmbedField {
                    name: "Status".to_string(),
                    value: "Connected".to_string(),
                    inline: true,
                }],
                footer: EmbedFooter {
                    text: name.to_string(),
                },
                timestamp: Utc::now().to_rfc3339(),
            }],
        };
        self.send_webhook(url, &payload).await
    }

    /// One pass over every user's unsent backlog, oldest first, with a gap
    /// between deliveries. Returns the number of logs delivered.
    pub async fn run_sweep(&self) -> Result<usize, StorageError> {
        let mut delivered = 0;
        for user_id in self.storage.user_ids().await? {
            let backlog = self.storage.get_unsent_logs(user_id).await?;
            for log in backlog {
                if self.send_activity_log(&log).await? {
                    delivered += 1;
                }
                // Pace every attempt, not just successes, so a failing
                // backlog is not retried in a burst.
                time::sleep(Duration::from_millis(SWEEP_SEND_GAP_MS)).await;
            }
        }
        if delivered > 0 {
            debug!(delivered, "notification sweep finished");
        }
        Ok(delivered)
    }

    /// Spawns the background sweep loop.
    pub fn start_periodic_sweep(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        info!(period_secs = period.as_secs(), "starting notification sweep");
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_sweep().await {
                    error!(error = %e, "notification sweep failed");
                }
            }
        })
    }
}

/// Embed accent color per log category.
fn embed_color(kind: &str) -> u32 {
    match kind {
        k if k == "Prediction Win" || k.contains("Claimed") => 0x3CF582,
        "Prediction Loss" => 0xFF2E63,
        k if k == "Warning" || k.contains("Error") => 0xE67E22,
        "System Event" => 0xB537F2,
        _ => 0x00F0FF,
    }
}

/// Whether the user has this log category enabled for relay.
fn category_enabled(kind: &str, settings: &Settings) -> bool {
    match kind {
        "Points Claimed" => settings.log_points,
        "Prediction Win" | "Prediction Loss" => settings.log_predictions,
        k if k == "Warning" || k.contains("Error") => settings.log_errors,
        "System Event" => settings.log_sessions,
        _ => true,
    }
}
