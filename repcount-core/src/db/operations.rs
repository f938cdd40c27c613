use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};

use crate::db::models::{
    CloseWorkoutSession, NewRepEvent, NewWorkoutSession, RepEventRow, WorkoutSessionRow,
};
use crate::db::schema::{rep_events, workout_sessions};
use crate::workout::{
    RecordedRep, RepEvent, StartedWorkout, WorkoutSession, format_timestamp,
};

fn open_session_row(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> QueryResult<Option<WorkoutSessionRow>> {
    workout_sessions::table
        .filter(workout_sessions::user_id.eq(user_id))
        .filter(workout_sessions::end_time.is_null())
        .order(workout_sessions::start_time.asc())
        .select(WorkoutSessionRow::as_select())
        .first(conn)
        .optional()
}

/// Session ids bound per `IN (...)` query, well under SQLite's 32766
/// host-parameter limit.
const SESSION_ID_CHUNK: usize = 10_000;

fn reps_by_session(
    conn: &mut SqliteConnection,
    session_ids: &[&str],
) -> QueryResult<HashMap<String, Vec<RepEventRow>>> {
    let mut grouped: HashMap<String, Vec<RepEventRow>> = HashMap::new();
    for chunk in session_ids.chunks(SESSION_ID_CHUNK) {
        let rows = rep_events::table
            .filter(rep_events::session_id.eq_any(chunk.iter().copied()))
            .order(rep_events::id.asc())
            .select(RepEventRow::as_select())
            .load(conn)?;
        for row in rows {
            grouped.entry(row.session_id.clone()).or_default().push(row);
        }
    }
    Ok(grouped)
}

fn hydrate(
    conn: &mut SqliteConnection,
    rows: Vec<WorkoutSessionRow>,
) -> Result<Vec<WorkoutSession>> {
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    let mut reps = reps_by_session(conn, &ids)?;
    rows.into_iter()
        .map(|row| {
            let session_reps = reps.remove(&row.id).unwrap_or_default();
            row.into_session(&session_reps)
        })
        .collect()
}

fn insert_session(conn: &mut SqliteConnection, session: &WorkoutSession) -> Result<()> {
    let start_time = format_timestamp(&session.start_time);
    let end_time = session.end_time.as_ref().map(format_timestamp);
    diesel::insert_into(workout_sessions::table)
        .values(&NewWorkoutSession {
            id: &session.id,
            user_id: &session.user_id,
            start_time: &start_time,
            end_time: end_time.as_deref(),
            total_pushups: i32::try_from(session.total_pushups)?,
            schema_version: session.schema_version,
        })
        .execute(conn)?;
    Ok(())
}

fn insert_rep(conn: &mut SqliteConnection, session_id: &str, event: &RepEvent) -> Result<()> {
    let performed_at = format_timestamp(&event.timestamp);
    diesel::insert_into(rep_events::table)
        .values(&NewRepEvent {
            session_id,
            rep_number: i32::try_from(event.count)?,
            performed_at: &performed_at,
        })
        .execute(conn)?;
    Ok(())
}

pub fn get_workout_session(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Option<WorkoutSession>> {
    let row = workout_sessions::table
        .find(session_id)
        .select(WorkoutSessionRow::as_select())
        .first(conn)
        .optional()?;
    match row {
        Some(row) => Ok(hydrate(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

pub fn get_open_workout_session(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<WorkoutSession>> {
    match open_session_row(conn, user_id)? {
        Some(row) => Ok(hydrate(conn, vec![row])?.pop()),
        None => Ok(None),
    }
}

/// Completed sessions, most recent start first.
pub fn get_completed_workout_sessions(
    conn: &mut SqliteConnection,
    user_id: Option<&str>,
) -> Result<Vec<WorkoutSession>> {
    let mut query = workout_sessions::table
        .filter(workout_sessions::end_time.is_not_null())
        .order(workout_sessions::start_time.desc())
        .select(WorkoutSessionRow::as_select())
        .into_boxed();
    if let Some(user_id) = user_id {
        query = query.filter(workout_sessions::user_id.eq(user_id));
    }
    let rows = query.load(conn)?;
    hydrate(conn, rows)
}

/// Closes whatever the user still has open and opens a fresh session.
pub fn start_workout_session(
    conn: &mut SqliteConnection,
    user_id: &str,
    start_time: DateTime<Utc>,
) -> Result<StartedWorkout> {
    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let ended_at = format_timestamp(&start_time);
        let closed: Vec<String> = diesel::update(
            workout_sessions::table
                .filter(workout_sessions::user_id.eq(user_id))
                .filter(workout_sessions::end_time.is_null()),
        )
        .set(&CloseWorkoutSession {
            end_time: Some(ended_at.as_str()),
        })
        .returning(workout_sessions::id)
        .get_results(conn)?;

        for id in &closed {
            info!("Closed open workout {} for {} before starting a new one", id, user_id);
        }

        let session = WorkoutSession::open(user_id, start_time);
        insert_session(conn, &session)?;
        Ok(StartedWorkout { session, closed })
    })
}

/// Attaches a rep to the user's open session, opening one if there is none.
///
/// Runs as a single `BEGIN IMMEDIATE` transaction so concurrent writers
/// cannot both miss the open session and insert two.
pub fn record_rep(
    conn: &mut SqliteConnection,
    user_id: &str,
    event: &RepEvent,
) -> Result<RecordedRep> {
    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        match open_session_row(conn, user_id)? {
            Some(row) => {
                insert_rep(conn, &row.id, event)?;
                let total: i32 = diesel::update(workout_sessions::table.find(row.id.as_str()))
                    .set(workout_sessions::total_pushups.eq(workout_sessions::total_pushups + 1))
                    .returning(workout_sessions::total_pushups)
                    .get_result(conn)?;
                debug!("Rep {} appended to workout {}", event.count, row.id);
                Ok(RecordedRep {
                    session_id: row.id,
                    total_pushups: u32::try_from(total)?,
                    created: false,
                })
            }
            None => {
                let mut session = WorkoutSession::open(user_id, event.timestamp);
                session.total_pushups = 1;
                insert_session(conn, &session)?;
                insert_rep(conn, &session.id, event)?;
                info!("Opened workout {} for {} on first rep", session.id, user_id);
                Ok(RecordedRep {
                    session_id: session.id,
                    total_pushups: 1,
                    created: true,
                })
            }
        }
    })
}

/// Sets `end_time` on an open session. `None` if nothing matched.
pub fn complete_workout_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    end_time: DateTime<Utc>,
) -> Result<Option<WorkoutSession>> {
    let ended_at = format_timestamp(&end_time);
    let updated = diesel::update(
        workout_sessions::table
            .find(session_id)
            .filter(workout_sessions::end_time.is_null()),
    )
    .set(&CloseWorkoutSession {
        end_time: Some(ended_at.as_str()),
    })
    .execute(conn)?;

    if updated == 0 {
        return Ok(None);
    }
    get_workout_session(conn, session_id)
}
