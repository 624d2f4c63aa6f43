//! The prediction engine: simulated channel-point bets scored by a fake
//! "AI", resolved by a detached timer after a randomized delay.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info};

use crate::db::enums::PredictionOutcome;
use crate::db::models::{
    AnalyticsPatch, NewActivityLog, NewPrediction, Prediction, PredictionPatch,
};
use crate::db::storage::{Storage, StorageError};
use crate::notifications::NotificationService;

/// Minimum stake when auto-sizing a bet.
const MIN_BET: i64 = 50;
/// Resolution delay bounds, in milliseconds.
const RESOLVE_DELAY_MS: (u64, u64) = (5000, 15000);

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("channel with id {0} not found")]
    ChannelNotFound(i32),
    #[error("prediction with id {0} not found")]
    PredictionNotFound(i32),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Aggregate betting figures for a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStats {
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage over resolved bets, 0.0 when none have resolved.
    pub win_rate: f64,
    pub net_profit: i64,
}

#[derive(Clone)]
pub struct PredictionService {
    storage: Arc<dyn Storage>,
    relay: Arc<NotificationService>,
}

impl PredictionService {
    pub fn new(storage: Arc<dyn Storage>, relay: Arc<NotificationService>) -> Self {
        PredictionService { storage, relay }
    }

    /// Places a bet on a channel and schedules its resolution.
    ///
    /// The confidence score is fixed at placement; the pending prediction is
    /// returned immediately while a detached timer resolves it after a
    /// 5 to 15 second delay.
    pub async fn make_prediction(
        &self,
        user_id: i32,
        channel_id: i32,
        title: &str,
        amount: i64,
    ) -> Result<Prediction, PredictionError> {
        let channel = self
            .storage
            .get_channel(channel_id)
            .await?
            .ok_or(PredictionError::ChannelNotFound(channel_id))?;

        let probability = calculate_probability(title);
        let prediction = self
            .storage
            .create_prediction(NewPrediction {
                user_id,
                channel_id,
                title: title.to_string(),
                amount,
                probability,
            })
            .await?;

        self.storage
            .create_log(NewActivityLog {
                user_id,
                kind: "System Event".to_string(),
                details: format!("New prediction placed: {title}"),
                channel: Some(channel.name.clone()),
                amount: Some(amount),
            })
            .await?;

        info!(
            prediction_id = prediction.id,
            channel = %channel.name,
            probability,
            amount,
            "prediction placed"
        );

        let delay = rand::rng().random_range(RESOLVE_DELAY_MS.0..=RESOLVE_DELAY_MS.1);
        let service = self.clone();
        let prediction_id = prediction.id;
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(delay)).await;
            if let Err(e) = service.resolve_prediction(prediction_id).await {
                error!(prediction_id, error = %e, "prediction resolution failed");
            }
        });

        Ok(prediction)
    }

    /// Resolves a pending prediction: decides win or loss, settles profit,
    /// refreshes the user's win rate and relays the outcome.
    pub(crate) async fn resolve_prediction(
        &self,
        prediction_id: i32,
    ) -> Result<Prediction, PredictionError> {
        let prediction = self
            .storage
            .get_prediction(prediction_id)
            .await?
            .ok_or(PredictionError::PredictionNotFound(prediction_id))?;
        if prediction.outcome != PredictionOutcome::Pending {
            return Ok(prediction);
        }
        let channel = self
            .storage
            .get_channel(prediction.channel_id)
            .await?
            .ok_or(PredictionError::ChannelNotFound(prediction.channel_id))?;

        let risk_threshold = self
            .storage
            .get_settings(prediction.user_id)
            .await?
            .map(|s| s.risk_threshold)
            .unwrap_or(65);
        let roll: f64 = rand::rng().random_range(0.0..1.0);
        let won = wins_bet(prediction.probability, risk_threshold, roll);

        let (outcome, profit) = if won {
            (PredictionOutcome::Win, prediction.amount * 3 / 2)
        } else {
            (PredictionOutcome::Loss, -prediction.amount)
        };
        let resolved = self
            .storage
            .update_prediction(
                prediction_id,
                PredictionPatch {
                    outcome: Some(outcome),
                    profit: Some(profit),
                },
            )
            .await?;

        self.refresh_win_rate(prediction.user_id).await?;

        // The relay creates the outcome log and marks it sent on delivery;
        // an undelivered log stays queued for the sweep.
        self.relay
            .send_prediction_result(prediction.user_id, &channel.name, outcome, profit)
            .await?;

        debug!(prediction_id, ?outcome, profit, "prediction resolved");
        Ok(resolved)
    }

    /// Recomputes the analytics win rate over resolved predictions.
    async fn refresh_win_rate(&self, user_id: i32) -> Result<(), PredictionError> {
        let predictions = self.storage.get_predictions(user_id).await?;
        let wins = predictions
            .iter()
            .filter(|p| p.outcome == PredictionOutcome::Win)
            .count();
        let completed = predictions
            .iter()
            .filter(|p| p.outcome != PredictionOutcome::Pending)
            .count();
        if completed == 0 {
            return Ok(());
        }
        self.storage
            .update_analytics(
                user_id,
                AnalyticsPatch {
                    win_rate: Some(wins as f64 / completed as f64 * 100.0),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Betting figures over the user's whole prediction history.
    pub async fn get_prediction_stats(
        &self,
        user_id: i32,
    ) -> Result<PredictionStats, PredictionError> {
        let predictions = self.storage.get_predictions(user_id).await?;
        let wins = predictions
            .iter()
            .filter(|p| p.outcome == PredictionOutcome::Win)
            .count();
        let losses = predictions
            .iter()
            .filter(|p| p.outcome == PredictionOutcome::Loss)
            .count();
        let resolved = wins + losses;
        let win_rate = if resolved > 0 {
            wins as f64 / resolved as f64 * 100.0
        } else {
            0.0
        };
        Ok(PredictionStats {
            total_bets: predictions.len(),
            wins,
            losses,
            win_rate,
            net_profit: predictions.iter().map(|p| p.profit).sum(),
        })
    }

    /// Whether the auto-better may stake a bet at this confidence. Users
    /// without a settings row have never opted in.
    pub async fn should_place_bet(
        &self,
        user_id: i32,
        probability: i32,
    ) -> Result<bool, PredictionError> {
        let Some(settings) = self.storage.get_settings(user_id).await? else {
            return Ok(false);
        };
        Ok(settings.ai_enabled && probability >= settings.risk_threshold)
    }

    /// Sizes an auto-bet as a percentage of the available points, with a
    /// floor so early-game bets are not trivially small.
    pub async fn calculate_bet_amount(
        &self,
        user_id: i32,
        total_available: i64,
    ) -> Result<i64, PredictionError> {
        let percentage = self
            .storage
            .get_settings(user_id)
            .await?
            .map(|s| s.bet_percentage)
            .unwrap_or(20) as i64;
        Ok((total_available * percentage / 100).max(MIN_BET))
    }
}

/// Scores a prediction title: a base of 50, nudged by sentiment keywords,
/// plus uniform jitter, clamped to 5..=95.
pub fn calculate_probability(title: &str) -> i32 {
    let jitter = rand::rng().random_range(-10..=10);
    (keyword_score(title) + jitter).clamp(5, 95)
}

fn keyword_score(title: &str) -> i32 {
    let title = title.to_lowercase();
    let mut score = 50;
    if title.contains("win") {
        score += 5;
    }
    if title.contains("lose") || title.contains("loss") {
        score -= 5;
    }
    if title.contains("clutch") {
        score += 3;
    }
    if title.contains("fail") {
        score -= 3;
    }
    if title.contains("easy") {
        score += 7;
    }
    if title.contains("hard") || title.contains("difficult") {
        score -= 7;
    }
    score
}

/// A bet wins only when confidence clears the risk threshold and the roll
/// lands under the confidence.
fn wins_bet(probability: i32, risk_threshold: i32, roll: f64) -> bool {
    probability >= risk_threshold && roll <= probability as f64 / 100.0
}
