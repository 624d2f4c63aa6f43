//! The farming engine: one repeating timer per active channel, each tick
//! granting randomized points to the channel and the owner's analytics.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::db::enums::ChannelStatus;
use crate::db::models::{AnalyticsPatch, Channel, ChannelPatch, NewActivityLog, NewChannel};
use crate::db::storage::{Storage, StorageError};

/// Seconds of simulated watch time credited per tick.
const WATCH_SECONDS_PER_TICK: f64 = 15.0;
/// Chance of a bonus chest on a tick, when the channel collects bonuses.
const BONUS_CHANCE: f64 = 0.1;

#[derive(Error, Debug)]
pub enum FarmingError {
    #[error("channel with id {0} not found")]
    ChannelNotFound(i32),
    #[error("channel {0} already exists for this user")]
    DuplicateChannel(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Owns the per-channel farming timers.
///
/// Constructed once at process start and shared by reference; the timer
/// registry enforces the "at most one timer per channel" invariant centrally
/// so callers cannot stack timers by calling start twice.
pub struct FarmingService {
    storage: Arc<dyn Storage>,
    timers: DashMap<i32, JoinHandle<()>>,
}

impl FarmingService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        FarmingService {
            storage,
            timers: DashMap::new(),
        }
    }

    /// Whether a farming timer is currently registered for the channel.
    pub fn is_farming(&self, channel_id: i32) -> bool {
        self.timers.contains_key(&channel_id)
    }

    /// Starts (or restarts) farming for a channel.
    ///
    /// If a timer is already registered it is cancelled and replaced, never
    /// stacked. The tick period is drawn once, uniformly from the user's
    /// `[min_delay, max_delay]` stealth bounds, and stays fixed for the life
    /// of this registration.
    pub async fn start_autofarm(&self, channel_id: i32) -> Result<Channel, FarmingError> {
        let channel = self
            .storage
            .get_channel(channel_id)
            .await?
            .ok_or(FarmingError::ChannelNotFound(channel_id))?;

        if let Some((_, old)) = self.timers.remove(&channel_id) {
            old.abort();
        }

        let updated = self
            .storage
            .update_channel(
                channel_id,
                ChannelPatch {
                    status: Some(ChannelStatus::Active),
                    last_active: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        let settings = self.storage.get_settings(channel.user_id).await?;
        let (min_delay, max_delay) = settings
            .as_ref()
            .map(|s| (s.min_delay, s.max_delay))
            .unwrap_or((1000, 3000));
        let log_sessions = settings.map(|s| s.log_sessions).unwrap_or(false);

        if log_sessions {
            self.storage
                .create_log(NewActivityLog {
                    user_id: channel.user_id,
                    kind: "System Event".to_string(),
                    details: format!("Auto-farm started for channel: {}", channel.name),
                    channel: Some(channel.name.clone()),
                    amount: None,
                })
                .await?;
        }

        // Guard against inverted bounds.
        let period = rand::rng().random_range(min_delay..=max_delay.max(min_delay));
        let storage = Arc::clone(&self.storage);
        let user_id = channel.user_id;
        let channel_name = channel.name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(Duration::from_millis(period));
            // The first interval tick completes immediately; the first grant
            // should wait a full period.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = farm_tick(storage.as_ref(), channel_id).await {
                    warn!(channel_id, error = %err, "farm tick failed");
                    if let Err(log_err) =
                        log_tick_failure(storage.as_ref(), user_id, &channel_name, &err).await
                    {
                        error!(channel_id, error = %log_err, "failed to record farm tick warning");
                    }
                }
            }
        });
        // A concurrent start may have registered a timer since the remove
        // above; the replaced handle must be aborted or it ticks forever.
        if let Some(old) = self.timers.insert(channel_id, handle) {
            old.abort();
        }
        debug!(channel_id, period_ms = period, "farming timer registered");

        Ok(updated)
    }

    /// Stops farming for a channel. A no-op on the timer side if none is
    /// registered; the channel is still marked `Paused`.
    pub async fn stop_autofarm(&self, channel_id: i32) -> Result<Channel, FarmingError> {
        if let Some((_, handle)) = self.timers.remove(&channel_id) {
            handle.abort();
        }

        let channel = self
            .storage
            .get_channel(channel_id)
            .await?
            .ok_or(FarmingError::ChannelNotFound(channel_id))?;

        let updated = self
            .storage
            .update_channel(
                channel_id,
                ChannelPatch {
                    status: Some(ChannelStatus::Paused),
                    ..Default::default()
                },
            )
            .await?;

        let settings = self.storage.get_settings(channel.user_id).await?;
        if settings.map(|s| s.log_sessions).unwrap_or(false) {
            self.storage
                .create_log(NewActivityLog {
                    user_id: channel.user_id,
                    kind: "System Event".to_string(),
                    details: format!("Auto-farm stopped for channel: {}", channel.name),
                    channel: Some(channel.name.clone()),
                    amount: None,
                })
                .await?;
        }

        Ok(updated)
    }

    /// Registers a new channel for the user. Names are unique per user,
    /// case-insensitively.
    pub async fn add_channel(&self, user_id: i32, name: &str) -> Result<Channel, FarmingError> {
        if self
            .storage
            .get_channel_by_name(user_id, name)
            .await?
            .is_some()
        {
            return Err(FarmingError::DuplicateChannel(name.to_string()));
        }

        let channel = self
            .storage
            .create_channel(NewChannel {
                user_id,
                name: name.to_string(),
                auto_farm: true,
                collect_bonuses: true,
            })
            .await?;

        let count = self.storage.get_channels(user_id).await?.len() as i32;
        self.storage
            .update_analytics(
                user_id,
                AnalyticsPatch {
                    active_channels: Some(count),
                    ..Default::default()
                },
            )
            .await?;

        Ok(channel)
    }

    /// Deletes a channel, cancelling its farming timer first so the timer
    /// cannot outlive the record.
    pub async fn remove_channel(&self, channel_id: i32) -> Result<bool, FarmingError> {
        if let Some((_, handle)) = self.timers.remove(&channel_id) {
            handle.abort();
        }
        let channel = self.storage.get_channel(channel_id).await?;
        let removed = self.storage.delete_channel(channel_id).await?;
        if let (true, Some(channel)) = (removed, channel) {
            let count = self.storage.get_channels(channel.user_id).await?.len() as i32;
            self.storage
                .update_analytics(
                    channel.user_id,
                    AnalyticsPatch {
                        active_channels: Some(count),
                        ..Default::default()
                    },
                )
                .await?;
        }
        Ok(removed)
    }

    /// Starts farming on every channel the user has flagged for auto-farm.
    pub async fn start_all_channels(&self, user_id: i32) -> Result<Vec<Channel>, FarmingError> {
        let channels = self.storage.get_channels(user_id).await?;
        let mut started = Vec::new();
        for channel in channels {
            if channel.auto_farm {
                started.push(self.start_autofarm(channel.id).await?);
            }
        }

        self.storage
            .update_analytics(
                user_id,
                AnalyticsPatch {
                    active_channels: Some(started.len() as i32),
                    ..Default::default()
                },
            )
            .await?;

        let settings = self.storage.get_settings(user_id).await?;
        if settings.map(|s| s.log_sessions).unwrap_or(false) {
            self.storage
                .create_log(NewActivityLog {
                    user_id,
                    kind: "System Event".to_string(),
                    details: format!("Auto-farm started across {} channels", started.len()),
                    channel: None,
                    amount: None,
                })
                .await?;
        }

        info!(user_id, count = started.len(), "started all auto-farm channels");
        Ok(started)
    }

    /// Stops farming on every currently active channel of the user.
    pub async fn stop_all_channels(&self, user_id: i32) -> Result<Vec<Channel>, FarmingError> {
        let channels = self.storage.get_channels(user_id).await?;
        let mut stopped = Vec::new();
        for channel in channels {
            if channel.status == ChannelStatus::Active {
                stopped.push(self.stop_autofarm(channel.id).await?);
            }
        }

        self.storage
            .update_analytics(
                user_id,
                AnalyticsPatch {
                    active_channels: Some(0),
                    ..Default::default()
                },
            )
            .await?;

        let settings = self.storage.get_settings(user_id).await?;
        if settings.map(|s| s.log_sessions).unwrap_or(false) {
            self.storage
                .create_log(NewActivityLog {
                    user_id,
                    kind: "System Event".to_string(),
                    details: "Auto-farm stopped for all channels".to_string(),
                    channel: None,
                    amount: None,
                })
                .await?;
        }

        info!(user_id, count = stopped.len(), "stopped all channels");
        Ok(stopped)
    }

    /// Total points earned across all of the user's channels.
    pub async fn total_points(&self, user_id: i32) -> Result<i64, FarmingError> {
        let channels = self.storage.get_channels(user_id).await?;
        Ok(channels.iter().map(|c| c.points_earned).sum())
    }

    /// Number of the user's channels currently marked active.
    pub async fn active_channel_count(&self, user_id: i32) -> Result<usize, FarmingError> {
        Ok(self.storage.get_active_channels(user_id).await?.len())
    }

    /// Cancels every registered farming timer. Must run on shutdown,
    /// otherwise detached timers keep mutating storage.
    pub fn cleanup(&self) {
        let count = self.timers.len();
        for entry in self.timers.iter() {
            entry.value().abort();
        }
        self.timers.clear();
        info!(timers = count, "farming timers cancelled");
    }
}

/// One farming tick: grant points, maybe a bonus chest, advance watch time.
///
/// Reads the channel fresh each tick so grants accumulate; errors bubble to
/// the timer loop, which records them without cancelling the timer.
async fn farm_tick(storage: &dyn Storage, channel_id: i32) -> Result<(), FarmingError> {
    let channel = storage
        .get_channel(channel_id)
        .await?
        .ok_or(FarmingError::ChannelNotFound(channel_id))?;
    let settings = storage.get_settings(channel.user_id).await?;
    let log_points = settings.map(|s| s.log_points).unwrap_or(false);

    let (farmed, bonus) = {
        let mut rng = rand::rng();
        let farmed: i64 = rng.random_range(20..=50);
        let bonus: Option<i64> = if channel.collect_bonuses && rng.random_bool(BONUS_CHANCE) {
            Some(rng.random_range(200..=500))
        } else {
            None
        };
        (farmed, bonus)
    };
    let granted = farmed + bonus.unwrap_or(0);

    storage
        .update_channel(
            channel_id,
            ChannelPatch {
                points_earned: Some(channel.points_earned + granted),
                watch_hours: Some(channel.watch_hours + WATCH_SECONDS_PER_TICK / 3600.0),
                ..Default::default()
            },
        )
        .await?;

    let analytics = storage.get_analytics(channel.user_id).await?;
    let (total, daily) = analytics
        .map(|a| (a.total_points, a.daily_points))
        .unwrap_or((0, 0));
    storage
        .update_analytics(
            channel.user_id,
            AnalyticsPatch {
                total_points: Some(total + granted),
                daily_points: Some(daily + granted),
                ..Default::default()
            },
        )
        .await?;

    if log_points {
        storage
            .create_log(NewActivityLog {
                user_id: channel.user_id,
                kind: "Points Claimed".to_string(),
                details: format!("Amount: {farmed} points"),
                channel: Some(channel.name.clone()),
                amount: Some(farmed),
            })
            .await?;
        if let Some(bonus) = bonus {
            storage
                .create_log(NewActivityLog {
                    user_id: channel.user_id,
                    kind: "Points Claimed".to_string(),
                    details: format!("Bonus Chest: {bonus} points"),
                    channel: Some(channel.name.clone()),
                    amount: Some(bonus),
                })
                .await?;
        }
    }

    Ok(())
}

/// Converts a failed tick into a "Warning" log, gated by `log_errors`.
async fn log_tick_failure(
    storage: &dyn Storage,
    user_id: i32,
    channel_name: &str,
    err: &FarmingError,
) -> Result<(), StorageError> {
    let log_errors = storage
        .get_settings(user_id)
        .await?
        .map(|s| s.log_errors)
        .unwrap_or(false);
    if log_errors {
        storage
            .create_log(NewActivityLog {
                user_id,
                kind: "Warning".to_string(),
                details: format!("Error farming points: {err}"),
                channel: Some(channel_name.to_string()),
                amount: None,
            })
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStorage;
    use crate::db::models::{
        ActivityLog, Analytics, NewPrediction, NewUser, Prediction, PredictionPatch, Session,
        Settings, SettingsPatch, User,
    };
    use async_trait::async_trait;

    /// Suspends on reads the way a database-backed implementation would, so
    /// interleavings that are rare against [`MemoryStorage`] become
    /// deterministic.
    struct YieldingStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl Storage for YieldingStorage {
        async fn get_user(&self, id: i32) -> Result<Option<User>, StorageError> {
            self.inner.get_user(id).await
        }
        async fn get_user_by_username(
            &self,
            username: &str,
        ) -> Result<Option<User>, StorageError> {
            self.inner.get_user_by_username(username).await
        }
        async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
            self.inner.create_user(user).await
        }
        async fn user_ids(&self) -> Result<Vec<i32>, StorageError> {
            self.inner.user_ids().await
        }
        async fn get_channels(&self, user_id: i32) -> Result<Vec<Channel>, StorageError> {
            self.inner.get_channels(user_id).await
        }
        async fn get_active_channels(&self, user_id: i32) -> Result<Vec<Channel>, StorageError> {
            self.inner.get_active_channels(user_id).await
        }
        async fn get_channel(&self, id: i32) -> Result<Option<Channel>, StorageError> {
            tokio::task::yield_now().await;
            self.inner.get_channel(id).await
        }
        async fn get_channel_by_name(
            &self,
            user_id: i32,
            name: &str,
        ) -> Result<Option<Channel>, StorageError> {
            self.inner.get_channel_by_name(user_id, name).await
        }
        async fn create_channel(&self, channel: NewChannel) -> Result<Channel, StorageError> {
            self.inner.create_channel(channel).await
        }
        async fn update_channel(
            &self,
            id: i32,
            patch: ChannelPatch,
        ) -> Result<Channel, StorageError> {
            tokio::task::yield_now().await;
            self.inner.update_channel(id, patch).await
        }
        async fn delete_channel(&self, id: i32) -> Result<bool, StorageError> {
            self.inner.delete_channel(id).await
        }
        async fn get_predictions(&self, user_id: i32) -> Result<Vec<Prediction>, StorageError> {
            self.inner.get_predictions(user_id).await
        }
        async fn get_predictions_by_channel(
            &self,
            channel_id: i32,
        ) -> Result<Vec<Prediction>, StorageError> {
            self.inner.get_predictions_by_channel(channel_id).await
        }
        async fn get_recent_predictions(
            &self,
            user_id: i32,
            limit: usize,
        ) -> Result<Vec<Prediction>, StorageError> {
            self.inner.get_recent_predictions(user_id, limit).await
        }
        async fn get_prediction(&self, id: i32) -> Result<Option<Prediction>, StorageError> {
            self.inner.get_prediction(id).await
        }
        async fn create_prediction(
            &self,
            prediction: NewPrediction,
        ) -> Result<Prediction, StorageError> {
            self.inner.create_prediction(prediction).await
        }
        async fn update_prediction(
            &self,
            id: i32,
            patch: PredictionPatch,
        ) -> Result<Prediction, StorageError> {
            self.inner.update_prediction(id, patch).await
        }
        async fn get_logs(&self, user_id: i32) -> Result<Vec<ActivityLog>, StorageError> {
            self.inner.get_logs(user_id).await
        }
        async fn get_recent_logs(
            &self,
            user_id: i32,
            limit: usize,
        ) -> Result<Vec<ActivityLog>, StorageError> {
            self.inner.get_recent_logs(user_id, limit).await
        }
        async fn create_log(&self, log: NewActivityLog) -> Result<ActivityLog, StorageError> {
            tokio::task::yield_now().await;
            self.inner.create_log(log).await
        }
        async fn get_unsent_logs(&self, user_id: i32) -> Result<Vec<ActivityLog>, StorageError> {
            self.inner.get_unsent_logs(user_id).await
        }
        async fn mark_log_sent(&self, id: i32) -> Result<ActivityLog, StorageError> {
            self.inner.mark_log_sent(id).await
        }
        async fn get_settings(&self, user_id: i32) -> Result<Option<Settings>, StorageError> {
            tokio::task::yield_now().await;
            self.inner.get_settings(user_id).await
        }
        async fn update_settings(
            &self,
            user_id: i32,
            patch: SettingsPatch,
        ) -> Result<Settings, StorageError> {
            self.inner.update_settings(user_id, patch).await
        }
        async fn get_analytics(&self, user_id: i32) -> Result<Option<Analytics>, StorageError> {
            self.inner.get_analytics(user_id).await
        }
        async fn update_analytics(
            &self,
            user_id: i32,
            patch: AnalyticsPatch,
        ) -> Result<Analytics, StorageError> {
            self.inner.update_analytics(user_id, patch).await
        }
        async fn start_session(&self, user_id: i32) -> Result<Session, StorageError> {
            self.inner.start_session(user_id).await
        }
        async fn end_session(&self, id: i32) -> Result<Session, StorageError> {
            self.inner.end_session(id).await
        }
        async fn get_current_session(&self, user_id: i32) -> Result<Option<Session>, StorageError> {
            self.inner.get_current_session(user_id).await
        }
    }

    fn service() -> (Arc<dyn Storage>, FarmingService) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let farming = FarmingService::new(Arc::clone(&storage));
        (storage, farming)
    }

    /// Settings with delays long enough that no tick fires during the test.
    async fn quiet_settings(storage: &dyn Storage, user_id: i32) {
        storage
            .update_settings(
                user_id,
                SettingsPatch {
                    min_delay: Some(60_000),
                    max_delay: Some(120_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_registers_timer_and_marks_active() {
        let (storage, farming) = service();
        quiet_settings(storage.as_ref(), 1).await;
        let channel = farming.add_channel(1, "xQc").await.unwrap();
        assert_eq!(channel.status, ChannelStatus::Offline);
        assert!(!farming.is_farming(channel.id));

        let started = farming.start_autofarm(channel.id).await.unwrap();
        assert_eq!(started.status, ChannelStatus::Active);
        assert!(started.last_active.is_some());
        assert!(farming.is_farming(channel.id));

        let stopped = farming.stop_autofarm(channel.id).await.unwrap();
        assert_eq!(stopped.status, ChannelStatus::Paused);
        assert!(!farming.is_farming(channel.id));
        farming.cleanup();
    }

    #[tokio::test]
    async fn double_start_leaves_exactly_one_timer() {
        let (storage, farming) = service();
        quiet_settings(storage.as_ref(), 1).await;
        let channel = farming.add_channel(1, "shroud").await.unwrap();

        farming.start_autofarm(channel.id).await.unwrap();
        farming.start_autofarm(channel.id).await.unwrap();
        assert_eq!(farming.timers.len(), 1);
        farming.cleanup();
        assert_eq!(farming.timers.len(), 0);
    }

    #[tokio::test]
    async fn stop_on_stopped_channel_is_idempotent() {
        let (storage, farming) = service();
        quiet_settings(storage.as_ref(), 1).await;
        let channel = farming.add_channel(1, "Ludwig").await.unwrap();

        let stopped = farming.stop_autofarm(channel.id).await.unwrap();
        assert_eq!(stopped.status, ChannelStatus::Paused);
        let stopped_again = farming.stop_autofarm(channel.id).await.unwrap();
        assert_eq!(stopped_again.status, ChannelStatus::Paused);
    }

    #[tokio::test]
    async fn start_unknown_channel_fails_with_not_found() {
        let (_, farming) = service();
        assert!(matches!(
            farming.start_autofarm(999).await,
            Err(FarmingError::ChannelNotFound(999))
        ));
        assert!(!farming.is_farming(999));
    }

    #[tokio::test]
    async fn duplicate_channel_name_is_a_conflict() {
        let (storage, farming) = service();
        farming.add_channel(1, "xQc").await.unwrap();
        let err = farming.add_channel(1, "XQC").await.unwrap_err();
        assert!(matches!(err, FarmingError::DuplicateChannel(_)));
        assert_eq!(storage.get_channels(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn racing_starts_never_leak_a_timer() {
        let storage: Arc<dyn Storage> = Arc::new(YieldingStorage {
            inner: MemoryStorage::new(),
        });
        let farming = FarmingService::new(Arc::clone(&storage));
        storage
            .update_settings(
                1,
                SettingsPatch {
                    min_delay: Some(10),
                    max_delay: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let channel = farming.add_channel(1, "racy").await.unwrap();

        // Both calls suspend between the registry remove and the insert, so
        // each passes the remove before either has inserted its timer.
        let (first, second) = tokio::join!(
            farming.start_autofarm(channel.id),
            farming.start_autofarm(channel.id)
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(farming.timers.len(), 1);

        farming.cleanup();
        let before = storage
            .get_channel(channel.id)
            .await
            .unwrap()
            .unwrap()
            .points_earned;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let after = storage
            .get_channel(channel.id)
            .await
            .unwrap()
            .unwrap()
            .points_earned;
        assert_eq!(before, after, "a farming timer survived cleanup");
    }

    #[tokio::test]
    async fn removing_a_channel_cancels_its_timer() {
        let (storage, farming) = service();
        quiet_settings(storage.as_ref(), 1).await;
        let channel = farming.add_channel(1, "gone").await.unwrap();
        farming.start_autofarm(channel.id).await.unwrap();
        assert!(farming.is_farming(channel.id));

        assert!(farming.remove_channel(channel.id).await.unwrap());
        assert!(!farming.is_farming(channel.id));
        assert!(storage.get_channel(channel.id).await.unwrap().is_none());
        assert_eq!(
            storage.get_analytics(1).await.unwrap().unwrap().active_channels,
            0
        );
        // Already gone.
        assert!(!farming.remove_channel(channel.id).await.unwrap());
    }

    #[tokio::test]
    async fn thousand_ticks_without_bonuses_stay_in_per_tick_bounds() {
        let (storage, _) = service();
        let channel = storage
            .create_channel(NewChannel {
                user_id: 1,
                name: "pokimane".to_string(),
                auto_farm: true,
                collect_bonuses: false,
            })
            .await
            .unwrap();

        for _ in 0..1000 {
            farm_tick(storage.as_ref(), channel.id).await.unwrap();
        }

        let channel = storage.get_channel(channel.id).await.unwrap().unwrap();
        assert!(channel.points_earned >= 20 * 1000);
        assert!(channel.points_earned <= 50 * 1000);
        let expected_hours = 1000.0 * WATCH_SECONDS_PER_TICK / 3600.0;
        assert!((channel.watch_hours - expected_hours).abs() < 1e-9);

        // Analytics counters track the channel exactly.
        let analytics = storage.get_analytics(1).await.unwrap().unwrap();
        assert_eq!(analytics.total_points, channel.points_earned);
        assert_eq!(analytics.daily_points, channel.points_earned);
    }

    #[tokio::test]
    async fn point_logs_are_gated_by_settings() {
        let (storage, _) = service();
        let channel = storage
            .create_channel(NewChannel {
                user_id: 1,
                name: "a".to_string(),
                auto_farm: true,
                collect_bonuses: false,
            })
            .await
            .unwrap();

        // No settings row: logging defaults off.
        farm_tick(storage.as_ref(), channel.id).await.unwrap();
        assert!(storage.get_logs(1).await.unwrap().is_empty());

        storage
            .update_settings(1, SettingsPatch::default())
            .await
            .unwrap();
        farm_tick(storage.as_ref(), channel.id).await.unwrap();
        let logs = storage.get_logs(1).await.unwrap();
        assert!(!logs.is_empty());
        assert!(logs.iter().all(|l| l.kind == "Points Claimed"));
    }

    #[tokio::test]
    async fn tick_failure_becomes_warning_log_when_enabled() {
        let (storage, _) = service();
        let err = farm_tick(storage.as_ref(), 42).await.unwrap_err();
        assert!(matches!(err, FarmingError::ChannelNotFound(42)));

        storage
            .update_settings(1, SettingsPatch::default())
            .await
            .unwrap();
        log_tick_failure(storage.as_ref(), 1, "gone", &err)
            .await
            .unwrap();
        let logs = storage.get_logs(1).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, "Warning");
        assert!(logs[0].details.contains("Error farming points"));
    }

    #[tokio::test]
    async fn start_all_only_touches_auto_farm_channels() {
        let (storage, farming) = service();
        quiet_settings(storage.as_ref(), 1).await;
        let auto = farming.add_channel(1, "auto").await.unwrap();
        let manual = storage
            .create_channel(NewChannel {
                user_id: 1,
                name: "manual".to_string(),
                auto_farm: false,
                collect_bonuses: true,
            })
            .await
            .unwrap();

        let started = farming.start_all_channels(1).await.unwrap();
        assert_eq!(started.len(), 1);
        assert!(farming.is_farming(auto.id));
        assert!(!farming.is_farming(manual.id));
        assert_eq!(
            storage.get_analytics(1).await.unwrap().unwrap().active_channels,
            1
        );

        let stopped = farming.stop_all_channels(1).await.unwrap();
        assert_eq!(stopped.len(), 1);
        assert!(!farming.is_farming(auto.id));
        assert_eq!(
            storage.get_analytics(1).await.unwrap().unwrap().active_channels,
            0
        );
        assert_eq!(farming.active_channel_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn running_timer_accrues_points() {
        let (storage, farming) = service();
        storage
            .update_settings(
                1,
                SettingsPatch {
                    min_delay: Some(10),
                    max_delay: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let channel = farming.add_channel(1, "fast").await.unwrap();
        farming.start_autofarm(channel.id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        farming.cleanup();

        let channel = storage.get_channel(channel.id).await.unwrap().unwrap();
        assert!(channel.points_earned > 0);
        assert!(channel.watch_hours > 0.0);
    }
}
