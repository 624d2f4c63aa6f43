//! In-process reference implementation of the [`Storage`] trait.
//!
//! Every table is a `HashMap` behind its own `RwLock`; ids come from atomic
//! counters that only ever move forward, so an id is never reused even after
//! a delete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::enums::ChannelStatus;
use super::models::{
    ActivityLog, Analytics, AnalyticsPatch, Channel, ChannelPatch, NewActivityLog, NewChannel,
    NewPrediction, NewUser, Prediction, PredictionPatch, Session, Settings, SettingsPatch, User,
};
use super::storage::{Storage, StorageError};

#[derive(Default)]
pub struct MemoryStorage {
    users: RwLock<HashMap<i32, User>>,
    channels: RwLock<HashMap<i32, Channel>>,
    predictions: RwLock<HashMap<i32, Prediction>>,
    logs: RwLock<HashMap<i32, ActivityLog>>,
    /// Keyed by user id: per-user singleton.
    settings: RwLock<HashMap<i32, Settings>>,
    /// Keyed by user id: per-user singleton.
    analytics: RwLock<HashMap<i32, Analytics>>,
    sessions: RwLock<HashMap<i32, Session>>,

    next_user_id: AtomicI32,
    next_channel_id: AtomicI32,
    next_prediction_id: AtomicI32,
    next_log_id: AtomicI32,
    next_settings_id: AtomicI32,
    next_analytics_id: AtomicI32,
    next_session_id: AtomicI32,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            next_user_id: AtomicI32::new(1),
            next_channel_id: AtomicI32::new(1),
            next_prediction_id: AtomicI32::new(1),
            next_log_id: AtomicI32::new(1),
            next_settings_id: AtomicI32::new(1),
            next_analytics_id: AtomicI32::new(1),
            next_session_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    fn next_id(counter: &AtomicI32) -> i32 {
        counter.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let id = Self::next_id(&self.next_user_id);
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        self.users.write().await.insert(id, user.clone());
        Ok(user)
    }

    async fn user_ids(&self) -> Result<Vec<i32>, StorageError> {
        let mut ids: Vec<i32> = self.users.read().await.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn get_channels(&self, user_id: i32) -> Result<Vec<Channel>, StorageError> {
        let mut channels: Vec<Channel> = self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn get_active_channels(&self, user_id: i32) -> Result<Vec<Channel>, StorageError> {
        let mut channels: Vec<Channel> = self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id && c.status == ChannelStatus::Active)
            .cloned()
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn get_channel(&self, id: i32) -> Result<Option<Channel>, StorageError> {
        Ok(self.channels.read().await.get(&id).cloned())
    }

    async fn get_channel_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<Option<Channel>, StorageError> {
        let lowered = name.to_lowercase();
        Ok(self
            .channels
            .read()
            .await
            .values()
            .find(|c| c.user_id == user_id && c.name.to_lowercase() == lowered)
            .cloned())
    }

    async fn create_channel(&self, channel: NewChannel) -> Result<Channel, StorageError> {
        let id = Self::next_id(&self.next_channel_id);
        let channel = Channel {
            id,
            user_id: channel.user_id,
            name: channel.name,
            auto_farm: channel.auto_farm,
            collect_bonuses: channel.collect_bonuses,
            watch_hours: 0.0,
            points_earned: 0,
            status: ChannelStatus::Offline,
            last_active: None,
        };
        self.channels.write().await.insert(id, channel.clone());
        Ok(channel)
    }

    async fn update_channel(&self, id: i32, patch: ChannelPatch) -> Result<Channel, StorageError> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&id)
            .ok_or(StorageError::ChannelNotFound(id))?;
        if let Some(name) = patch.name {
            channel.name = name;
        }
        if let Some(auto_farm) = patch.auto_farm {
            channel.auto_farm = auto_farm;
        }
        if let Some(collect_bonuses) = patch.collect_bonuses {
            channel.collect_bonuses = collect_bonuses;
        }
        if let Some(watch_hours) = patch.watch_hours {
            channel.watch_hours = watch_hours;
        }
        if let Some(points_earned) = patch.points_earned {
            channel.points_earned = points_earned;
        }
        if let Some(status) = patch.status {
            channel.status = status;
        }
        if let Some(last_active) = patch.last_active {
            channel.last_active = Some(last_active);
        }
        Ok(channel.clone())
    }

    async fn delete_channel(&self, id: i32) -> Result<bool, StorageError> {
        Ok(self.channels.write().await.remove(&id).is_some())
    }

    async fn get_predictions(&self, user_id: i32) -> Result<Vec<Prediction>, StorageError> {
        let mut predictions: Vec<Prediction> = self
            .predictions
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        predictions.sort_by_key(|p| p.id);
        Ok(predictions)
    }

    async fn get_predictions_by_channel(
        &self,
        channel_id: i32,
    ) -> Result<Vec<Prediction>, StorageError> {
        let mut predictions: Vec<Prediction> = self
            .predictions
            .read()
            .await
            .values()
            .filter(|p| p.channel_id == channel_id)
            .cloned()
            .collect();
        predictions.sort_by_key(|p| p.id);
        Ok(predictions)
    }

    async fn get_recent_predictions(
        &self,
        user_id: i32,
        limit: usize,
    ) -> Result<Vec<Prediction>, StorageError> {
        let mut predictions = self.get_predictions(user_id).await?;
        predictions.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        predictions.truncate(limit);
        Ok(predictions)
    }

    async fn get_prediction(&self, id: i32) -> Result<Option<Prediction>, StorageError> {
        Ok(self.predictions.read().await.get(&id).cloned())
    }

    async fn create_prediction(
        &self,
        prediction: NewPrediction,
    ) -> Result<Prediction, StorageError> {
        let id = Self::next_id(&self.next_prediction_id);
        let prediction = Prediction {
            id,
            user_id: prediction.user_id,
            channel_id: prediction.channel_id,
            title: prediction.title,
            amount: prediction.amount,
            probability: prediction.probability,
            outcome: super::enums::PredictionOutcome::Pending,
            profit: 0,
            timestamp: Utc::now(),
        };
        self.predictions.write().await.insert(id, prediction.clone());
        Ok(prediction)
    }

    async fn update_prediction(
        &self,
        id: i32,
        patch: PredictionPatch,
    ) -> Result<Prediction, StorageError> {
        let mut predictions = self.predictions.write().await;
        let prediction = predictions
            .get_mut(&id)
            .ok_or(StorageError::PredictionNotFound(id))?;
        if let Some(outcome) = patch.outcome {
            prediction.outcome = outcome;
        }
        if let Some(profit) = patch.profit {
            prediction.profit = profit;
        }
        Ok(prediction.clone())
    }

    async fn get_logs(&self, user_id: i32) -> Result<Vec<ActivityLog>, StorageError> {
        let mut logs: Vec<ActivityLog> = self
            .logs
            .read()
            .await
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        Ok(logs)
    }

    async fn get_recent_logs(
        &self,
        user_id: i32,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, StorageError> {
        let mut logs = self.get_logs(user_id).await?;
        logs.truncate(limit);
        Ok(logs)
    }

    async fn create_log(&self, log: NewActivityLog) -> Result<ActivityLog, StorageError> {
        let id = Self::next_id(&self.next_log_id);
        let log = ActivityLog {
            id,
            user_id: log.user_id,
            kind: log.kind,
            details: log.details,
            channel: log.channel,
            amount: log.amount,
            timestamp: Utc::now(),
            sent: false,
        };
        self.logs.write().await.insert(id, log.clone());
        Ok(log)
    }

    async fn get_unsent_logs(&self, user_id: i32) -> Result<Vec<ActivityLog>, StorageError> {
        let mut logs: Vec<ActivityLog> = self
            .logs
            .read()
            .await
            .values()
            .filter(|l| l.user_id == user_id && !l.sent)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.id);
        Ok(logs)
    }

    async fn mark_log_sent(&self, id: i32) -> Result<ActivityLog, StorageError> {
        let mut logs = self.logs.write().await;
        let log = logs.get_mut(&id).ok_or(StorageError::LogNotFound(id))?;
        log.sent = true;
        Ok(log.clone())
    }

    async fn get_settings(&self, user_id: i32) -> Result<Option<Settings>, StorageError> {
        Ok(self.settings.read().await.get(&user_id).cloned())
    }

    async fn update_settings(
        &self,
        user_id: i32,
        patch: SettingsPatch,
    ) -> Result<Settings, StorageError> {
        let mut table = self.settings.write().await;
        let settings = table.entry(user_id).or_insert_with(|| {
            Settings::defaults(Self::next_id(&self.next_settings_id), user_id)
        });
        if let Some(discord_webhook) = patch.discord_webhook {
            settings.discord_webhook = Some(discord_webhook);
        }
        if let Some(webhook_name) = patch.webhook_name {
            settings.webhook_name = webhook_name;
        }
        if let Some(ai_enabled) = patch.ai_enabled {
            settings.ai_enabled = ai_enabled;
        }
        if let Some(risk_threshold) = patch.risk_threshold {
            settings.risk_threshold = risk_threshold;
        }
        if let Some(bet_percentage) = patch.bet_percentage {
            settings.bet_percentage = bet_percentage;
        }
        if let Some(ai_model) = patch.ai_model {
            settings.ai_model = ai_model;
        }
        if let Some(stealth_mode) = patch.stealth_mode {
            settings.stealth_mode = stealth_mode;
        }
        if let Some(min_delay) = patch.min_delay {
            settings.min_delay = min_delay;
        }
        if let Some(max_delay) = patch.max_delay {
            settings.max_delay = max_delay;
        }
        if let Some(log_points) = patch.log_points {
            settings.log_points = log_points;
        }
        if let Some(log_predictions) = patch.log_predictions {
            settings.log_predictions = log_predictions;
        }
        if let Some(log_errors) = patch.log_errors {
            settings.log_errors = log_errors;
        }
        if let Some(log_sessions) = patch.log_sessions {
            settings.log_sessions = log_sessions;
        }
        Ok(settings.clone())
    }

    async fn get_analytics(&self, user_id: i32) -> Result<Option<Analytics>, StorageError> {
        Ok(self.analytics.read().await.get(&user_id).cloned())
    }

    async fn update_analytics(
        &self,
        user_id: i32,
        patch: AnalyticsPatch,
    ) -> Result<Analytics, StorageError> {
        let mut table = self.analytics.write().await;
        let analytics = table.entry(user_id).or_insert_with(|| {
            Analytics::zeroed(Self::next_id(&self.next_analytics_id), user_id, Utc::now())
        });
        if let Some(total_points) = patch.total_points {
            analytics.total_points = total_points;
        }
        if let Some(daily_points) = patch.daily_points {
            analytics.daily_points = daily_points;
        }
        if let Some(active_channels) = patch.active_channels {
            analytics.active_channels = active_channels;
        }
        if let Some(win_rate) = patch.win_rate {
            analytics.win_rate = win_rate;
        }
        if let Some(uptime) = patch.uptime {
            analytics.uptime = uptime;
        }
        Ok(analytics.clone())
    }

    async fn start_session(&self, user_id: i32) -> Result<Session, StorageError> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        // At most one active session per user.
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.active {
                session.active = false;
                session.end_time = Some(now);
            }
        }
        let id = Self::next_id(&self.next_session_id);
        let session = Session {
            id,
            user_id,
            start_time: now,
            end_time: None,
            active: true,
        };
        sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn end_session(&self, id: i32) -> Result<Session, StorageError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(StorageError::SessionNotFound(id))?;
        session.active = false;
        session.end_time = Some(Utc::now());
        Ok(session.clone())
    }

    async fn get_current_session(&self, user_id: i32) -> Result<Option<Session>, StorageError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.user_id == user_id && s.active)
            .cloned())
    }
}
