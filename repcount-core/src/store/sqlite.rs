use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::sqlite::SqliteConnection;

use super::SessionStore;
use crate::db::{self, DbPool, operations};
use crate::workout::{RecordedRep, RepEvent, StartedWorkout, WorkoutSession};

/// Session store backed by a SQLite file through diesel.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self {
            pool: db::connect(db_path)?,
        })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().context("Failed to get a DB connection")?;
            f(&mut *conn)
        })
        .await
        .context("Database task panicked")?
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<WorkoutSession>> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| operations::get_workout_session(conn, &session_id))
            .await
    }

    async fn find_open(&self, user_id: &str) -> Result<Option<WorkoutSession>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| operations::get_open_workout_session(conn, &user_id))
            .await
    }

    async fn start_session(
        &self,
        user_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<StartedWorkout> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| operations::start_workout_session(conn, &user_id, start_time))
            .await
    }

    async fn record_rep(&self, user_id: &str, event: &RepEvent) -> Result<RecordedRep> {
        let user_id = user_id.to_string();
        let event = event.clone();
        self.with_conn(move |conn| operations::record_rep(conn, &user_id, &event))
            .await
    }

    async fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> Result<Option<WorkoutSession>> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            operations::complete_workout_session(conn, &session_id, end_time)
        })
        .await
    }

    async fn list_closed(&self, user_id: Option<&str>) -> Result<Vec<WorkoutSession>> {
        let user_id = user_id.map(str::to_string);
        self.with_conn(move |conn| {
            operations::get_completed_workout_sessions(conn, user_id.as_deref())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workout::DEFAULT_USER_ID;

    #[tokio::test]
    async fn reopening_a_file_keeps_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let path = path.to_str().unwrap();

        let started = {
            let store = SqliteSessionStore::open(path).unwrap();
            let started = store
                .start_session(DEFAULT_USER_ID, crate::workout::now())
                .await
                .unwrap();
            store
                .end_session(&started.session.id, crate::workout::now())
                .await
                .unwrap();
            started
        };

        let store = SqliteSessionStore::open(path).unwrap();
        let listed = store.list_closed(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, started.session.id);
        assert!(store.find_open(DEFAULT_USER_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_first_reps_share_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        let store = SqliteSessionStore::open(path.to_str().unwrap()).unwrap();

        let mut handles = Vec::new();
        for count in 1..=8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let event = RepEvent {
                    count,
                    timestamp: crate::workout::now(),
                };
                store.record_rep(DEFAULT_USER_ID, &event).await.unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().created {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let open = store.find_open(DEFAULT_USER_ID).await.unwrap().unwrap();
        assert_eq!(open.total_pushups, 8);
        assert_eq!(open.pushup_data.len(), 8);
    }
}
