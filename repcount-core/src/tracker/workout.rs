//! Workout session management operations.

use chrono::{DateTime, Utc};
use log::info;

use super::Tracker;
use crate::error::TrackerError;
use crate::workout::{self, WorkoutSession};

impl Tracker {
    /// Start a new workout, closing any workout the user left open and
    /// resetting their rep counter.
    pub async fn start_workout(&self, user_id: &str) -> Result<WorkoutSession, TrackerError> {
        let context = self.context(user_id).await;
        let mut counter = context.lock().await;

        let started = self.store.start_session(user_id, workout::now()).await?;
        counter.reset();

        info!("Started workout {} for {}", started.session.id, user_id);
        Ok(started.session)
    }

    /// End an open workout. Returns the recorded end time.
    ///
    /// The owner's counting context stays locked while the session closes,
    /// so no frame of theirs can count against the old count in between.
    pub async fn end_workout(&self, workout_id: &str) -> Result<DateTime<Utc>, TrackerError> {
        let owner = self
            .store
            .get(workout_id)
            .await?
            .filter(WorkoutSession::is_open)
            .ok_or_else(|| TrackerError::NotFound(workout_id.to_string()))?
            .user_id;

        let context = self.context(&owner).await;
        let mut counter = context.lock().await;
        let ended = self
            .store
            .end_session(workout_id, workout::now())
            .await?
            .ok_or_else(|| TrackerError::NotFound(workout_id.to_string()))?;
        counter.reset();
        drop(counter);
        self.release_context(&owner, context).await;

        info!(
            "Ended workout {} for {} with {} push-ups",
            ended.id, ended.user_id, ended.total_pushups
        );
        ended
            .end_time
            .ok_or_else(|| TrackerError::Store(anyhow::anyhow!("Ended workout has no end time")))
    }

    /// Completed workouts, most recent first.
    pub async fn list_workouts(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<WorkoutSession>, TrackerError> {
        Ok(self.store.list_closed(user_id).await?)
    }

    pub async fn get_workout(&self, workout_id: &str) -> Result<WorkoutSession, TrackerError> {
        self.store
            .get(workout_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(workout_id.to_string()))
    }

    /// The user's open workout, if any.
    pub async fn current_workout(
        &self,
        user_id: &str,
    ) -> Result<Option<WorkoutSession>, TrackerError> {
        Ok(self.store.find_open(user_id).await?)
    }
}
