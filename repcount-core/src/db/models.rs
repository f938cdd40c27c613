use anyhow::Result;
use diesel::{AsChangeset, Insertable, Queryable, Selectable};

use crate::db::schema;
use crate::workout::{RepEvent, WorkoutSession, parse_timestamp};

// Session models
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::workout_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WorkoutSessionRow {
    pub id: String,
    pub user_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub total_pushups: i32,
    pub schema_version: i32,
}

#[derive(Insertable)]
#[diesel(table_name = schema::workout_sessions)]
pub struct NewWorkoutSession<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub start_time: &'a str,
    pub end_time: Option<&'a str>,
    pub total_pushups: i32,
    pub schema_version: i32,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::workout_sessions)]
pub struct CloseWorkoutSession<'a> {
    pub end_time: Option<&'a str>,
}

// Rep models
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::rep_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RepEventRow {
    pub id: i32,
    pub session_id: String,
    pub rep_number: i32,
    pub performed_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = schema::rep_events)]
pub struct NewRepEvent<'a> {
    pub session_id: &'a str,
    pub rep_number: i32,
    pub performed_at: &'a str,
}

impl TryFrom<&RepEventRow> for RepEvent {
    type Error = anyhow::Error;

    fn try_from(row: &RepEventRow) -> Result<Self> {
        Ok(RepEvent {
            count: u32::try_from(row.rep_number)?,
            timestamp: parse_timestamp(&row.performed_at)?,
        })
    }
}

impl WorkoutSessionRow {
    /// Builds the session record from its row and its reps, in rep order.
    pub fn into_session(self, reps: &[RepEventRow]) -> Result<WorkoutSession> {
        Ok(WorkoutSession {
            id: self.id,
            user_id: self.user_id,
            start_time: parse_timestamp(&self.start_time)?,
            end_time: self.end_time.as_deref().map(parse_timestamp).transpose()?,
            total_pushups: u32::try_from(self.total_pushups)?,
            pushup_data: reps
                .iter()
                .map(RepEvent::try_from)
                .collect::<Result<Vec<_>>>()?,
            schema_version: self.schema_version,
        })
    }
}
