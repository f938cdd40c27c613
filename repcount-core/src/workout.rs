//! Workout session records as the rest of the system sees them.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_ID: &str = "default_user";

/// Layout version of persisted session records.
pub const SCHEMA_VERSION: i32 = 1;

/// One completed rep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepEvent {
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_pushups: u32,
    pub pushup_data: Vec<RepEvent>,
    pub schema_version: i32,
}

impl WorkoutSession {
    /// A fresh, open session with no reps.
    pub fn open(user_id: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_time,
            end_time: None,
            total_pushups: 0,
            pushup_data: Vec::new(),
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn push_rep(&mut self, event: RepEvent) {
        self.total_pushups += 1;
        self.pushup_data.push(event);
    }
}

/// Result of attaching a rep to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRep {
    pub session_id: String,
    pub total_pushups: u32,
    pub created: bool,
}

/// Result of starting a workout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedWorkout {
    pub session: WorkoutSession,
    /// Sessions that were still open for the user and got closed.
    pub closed: Vec<String>,
}

/// Fixed-width UTC timestamps, so text ordering matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in store: {}", raw))
}

/// Current time truncated to the precision the store keeps.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    parse_timestamp(&format_timestamp(&now)).unwrap_or(now)
}
