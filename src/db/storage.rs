//! The storage contract consumed by the engines.
//!
//! Engines never touch a concrete backend directly; they are handed an
//! `Arc<dyn Storage>`. The in-process reference implementation lives in
//! `db::memory`; a database-backed implementation can be swapped in without
//! touching engine code.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{
    ActivityLog, Analytics, AnalyticsPatch, Channel, ChannelPatch, NewActivityLog, NewChannel,
    NewPrediction, NewUser, Prediction, PredictionPatch, Session, Settings, SettingsPatch, User,
};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("channel with id {0} not found")]
    ChannelNotFound(i32),
    #[error("prediction with id {0} not found")]
    PredictionNotFound(i32),
    #[error("log with id {0} not found")]
    LogNotFound(i32),
    #[error("session with id {0} not found")]
    SessionNotFound(i32),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Async CRUD contract over the engine's entities.
///
/// All list operations are scoped by user id. `update_*` calls have
/// whole-record merge semantics: fields left `None` in the patch are kept.
/// Settings and analytics updates are upserts that lazily create the
/// per-user singleton with defaults.
#[async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;
    /// Every known user id; drives the notification sweep.
    async fn user_ids(&self) -> Result<Vec<i32>, StorageError>;

    // Channels
    async fn get_channels(&self, user_id: i32) -> Result<Vec<Channel>, StorageError>;
    async fn get_active_channels(&self, user_id: i32) -> Result<Vec<Channel>, StorageError>;
    async fn get_channel(&self, id: i32) -> Result<Option<Channel>, StorageError>;
    /// Name comparison is case-insensitive.
    async fn get_channel_by_name(
        &self,
        user_id: i32,
        name: &str,
    ) -> Result<Option<Channel>, StorageError>;
    async fn create_channel(&self, channel: NewChannel) -> Result<Channel, StorageError>;
    async fn update_channel(&self, id: i32, patch: ChannelPatch) -> Result<Channel, StorageError>;
    async fn delete_channel(&self, id: i32) -> Result<bool, StorageError>;

    // Predictions
    async fn get_predictions(&self, user_id: i32) -> Result<Vec<Prediction>, StorageError>;
    async fn get_predictions_by_channel(
        &self,
        channel_id: i32,
    ) -> Result<Vec<Prediction>, StorageError>;
    /// Newest first.
    async fn get_recent_predictions(
        &self,
        user_id: i32,
        limit: usize,
    ) -> Result<Vec<Prediction>, StorageError>;
    async fn get_prediction(&self, id: i32) -> Result<Option<Prediction>, StorageError>;
    async fn create_prediction(
        &self,
        prediction: NewPrediction,
    ) -> Result<Prediction, StorageError>;
    async fn update_prediction(
        &self,
        id: i32,
        patch: PredictionPatch,
    ) -> Result<Prediction, StorageError>;

    // Activity logs
    async fn get_logs(&self, user_id: i32) -> Result<Vec<ActivityLog>, StorageError>;
    /// Newest first.
    async fn get_recent_logs(
        &self,
        user_id: i32,
        limit: usize,
    ) -> Result<Vec<ActivityLog>, StorageError>;
    async fn create_log(&self, log: NewActivityLog) -> Result<ActivityLog, StorageError>;
    async fn get_unsent_logs(&self, user_id: i32) -> Result<Vec<ActivityLog>, StorageError>;
    async fn mark_log_sent(&self, id: i32) -> Result<ActivityLog, StorageError>;

    // Settings
    async fn get_settings(&self, user_id: i32) -> Result<Option<Settings>, StorageError>;
    async fn update_settings(
        &self,
        user_id: i32,
        patch: SettingsPatch,
    ) -> Result<Settings, StorageError>;

    // Analytics
    async fn get_analytics(&self, user_id: i32) -> Result<Option<Analytics>, StorageError>;
    async fn update_analytics(
        &self,
        user_id: i32,
        patch: AnalyticsPatch,
    ) -> Result<Analytics, StorageError>;

    // Sessions
    /// Force-ends any other active session for the user before starting.
    async fn start_session(&self, user_id: i32) -> Result<Session, StorageError>;
    async fn end_session(&self, id: i32) -> Result<Session, StorageError>;
    async fn get_current_session(&self, user_id: i32) -> Result<Option<Session>, StorageError>;
}
