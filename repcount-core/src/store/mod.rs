//! Durable storage of workout sessions.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::workout::{RecordedRep, RepEvent, StartedWorkout, WorkoutSession};

/// Operations the tracker needs from a session store.
///
/// Implementations must keep at most one open session per user:
/// `record_rep` finds-or-creates atomically and `start_session` closes any
/// session the user still has open before inserting.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<WorkoutSession>>;

    async fn find_open(&self, user_id: &str) -> Result<Option<WorkoutSession>>;

    async fn start_session(
        &self,
        user_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<StartedWorkout>;

    async fn record_rep(&self, user_id: &str, event: &RepEvent) -> Result<RecordedRep>;

    /// Closes an open session. `None` when no open session has that id.
    async fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<Option<WorkoutSession>>;

    /// Closed sessions, most recent `start_time` first.
    async fn list_closed(&self, user_id: Option<&str>) -> Result<Vec<WorkoutSession>>;
}
