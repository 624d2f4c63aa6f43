use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ChannelStatus, PredictionOutcome};

/// Represents a user in the system.
/// The engines only need identity and ownership; authentication lives in the
/// API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

/// A simulated channel being passively farmed for points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub auto_farm: bool,
    pub collect_bonuses: bool,
    pub watch_hours: f64,
    pub points_earned: i64,
    pub status: ChannelStatus,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChannel {
    pub user_id: i32,
    pub name: String,
    pub auto_farm: bool,
    pub collect_bonuses: bool,
}

/// Whole-record merge patch for a channel. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub auto_farm: Option<bool>,
    pub collect_bonuses: Option<bool>,
    pub watch_hours: Option<f64>,
    pub points_earned: Option<i64>,
    pub status: Option<ChannelStatus>,
    pub last_active: Option<DateTime<Utc>>,
}

/// A simulated bet with an AI-generated confidence score, resolved after a
/// randomized delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: i32,
    pub user_id: i32,
    pub channel_id: i32,
    pub title: String,
    pub amount: i64,
    /// AI confidence, 0..=100.
    pub probability: i32,
    pub outcome: PredictionOutcome,
    /// 0 while pending; `floor(amount * 1.5)` on win, `-amount` on loss.
    pub profit: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrediction {
    pub user_id: i32,
    pub channel_id: i32,
    pub title: String,
    pub amount: i64,
    pub probability: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionPatch {
    pub outcome: Option<PredictionOutcome>,
    pub profit: Option<i64>,
}

/// An activity log entry emitted by the engines and relayed to the
/// configured webhook. `sent` flips to true only after successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: i32,
    pub user_id: i32,
    /// Category string, e.g. "Points Claimed", "Prediction Win", "Warning",
    /// "System Event".
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    pub channel: Option<String>,
    pub amount: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityLog {
    pub user_id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    pub channel: Option<String>,
    pub amount: Option<i64>,
}

/// Per-user singleton configuration. Created lazily with defaults on first
/// write, merged on each subsequent write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: i32,
    pub user_id: i32,
    pub discord_webhook: Option<String>,
    pub webhook_name: String,
    pub ai_enabled: bool,
    /// Minimum AI confidence required before a bet can win, 0..=100.
    pub risk_threshold: i32,
    /// Percentage of available points staked per auto-bet, 0..=100.
    pub bet_percentage: i32,
    pub ai_model: String,
    pub stealth_mode: bool,
    /// Lower bound of the randomized farming tick period, in milliseconds.
    pub min_delay: u64,
    /// Upper bound of the randomized farming tick period, in milliseconds.
    pub max_delay: u64,
    pub log_points: bool,
    pub log_predictions: bool,
    pub log_errors: bool,
    pub log_sessions: bool,
}

impl Settings {
    /// Default settings for a user that has never written any.
    pub fn defaults(id: i32, user_id: i32) -> Self {
        Settings {
            id,
            user_id,
            discord_webhook: None,
            webhook_name: "PointFarm".to_string(),
            ai_enabled: true,
            risk_threshold: 65,
            bet_percentage: 20,
            ai_model: "advanced".to_string(),
            stealth_mode: true,
            min_delay: 1000,
            max_delay: 3000,
            log_points: true,
            log_predictions: true,
            log_errors: true,
            log_sessions: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub discord_webhook: Option<String>,
    pub webhook_name: Option<String>,
    pub ai_enabled: Option<bool>,
    pub risk_threshold: Option<i32>,
    pub bet_percentage: Option<i32>,
    pub ai_model: Option<String>,
    pub stealth_mode: Option<bool>,
    pub min_delay: Option<u64>,
    pub max_delay: Option<u64>,
    pub log_points: Option<bool>,
    pub log_predictions: Option<bool>,
    pub log_errors: Option<bool>,
    pub log_sessions: Option<bool>,
}

/// Per-user singleton aggregate counters backing the dashboard. Created
/// lazily zeroed, merged on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub id: i32,
    pub user_id: i32,
    pub date: DateTime<Utc>,
    pub total_points: i64,
    pub daily_points: i64,
    pub active_channels: i32,
    /// Win percentage over completed predictions, 0.0..=100.0.
    pub win_rate: f64,
    /// Uptime in minutes.
    pub uptime: i64,
    pub last_reset: DateTime<Utc>,
}

impl Analytics {
    pub fn zeroed(id: i32, user_id: i32, now: DateTime<Utc>) -> Self {
        Analytics {
            id,
            user_id,
            date: now,
            total_points: 0,
            daily_points: 0,
            active_channels: 0,
            win_rate: 0.0,
            uptime: 0,
            last_reset: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsPatch {
    pub total_points: Option<i64>,
    pub daily_points: Option<i64>,
    pub active_channels: Option<i32>,
    pub win_rate: Option<f64>,
    pub uptime: Option<i64>,
}

/// An uptime-tracking session. At most one active session per user; starting
/// a new one force-ends any other active session for that user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i32,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub active: bool,
}
