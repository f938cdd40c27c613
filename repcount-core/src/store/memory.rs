use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::SessionStore;
use crate::workout::{RecordedRep, RepEvent, StartedWorkout, WorkoutSession};

/// Keeps sessions in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<WorkoutSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<WorkoutSession>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn find_open(&self, user_id: &str) -> Result<Option<WorkoutSession>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .iter()
            .find(|s| s.user_id == user_id && s.is_open())
            .cloned())
    }

    async fn start_session(
        &self,
        user_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<StartedWorkout> {
        let mut sessions = self.sessions.lock().await;
        let mut closed = Vec::new();
        for session in sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.is_open())
        {
            session.end_time = Some(start_time);
            closed.push(session.id.clone());
        }

        let session = WorkoutSession::open(user_id, start_time);
        sessions.push(session.clone());
        Ok(StartedWorkout { session, closed })
    }

    async fn record_rep(&self, user_id: &str, event: &RepEvent) -> Result<RecordedRep> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.is_open())
        {
            session.push_rep(event.clone());
            return Ok(RecordedRep {
                session_id: session.id.clone(),
                total_pushups: session.total_pushups,
                created: false,
            });
        }

        let mut session = WorkoutSession::open(user_id, event.timestamp);
        session.push_rep(event.clone());
        let recorded = RecordedRep {
            session_id: session.id.clone(),
            total_pushups: session.total_pushups,
            created: true,
        };
        sessions.push(session);
        Ok(recorded)
    }

    async fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<Option<WorkoutSession>> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_open())
            .map(|session| {
                session.end_time = Some(end_time);
                session.clone()
            }))
    }

    async fn list_closed(&self, user_id: Option<&str>) -> Result<Vec<WorkoutSession>> {
        let sessions = self.sessions.lock().await;
        let mut closed: Vec<WorkoutSession> = sessions
            .iter()
            .filter(|s| !s.is_open())
            .filter(|s| user_id.is_none_or(|u| s.user_id == u))
            .cloned()
            .collect();
        closed.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(closed)
    }
}
