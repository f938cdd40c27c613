use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::debug;
use repcount::tracker::{FrameOutcome, FrameRequest, Tracker};
use repcount::workout::{DEFAULT_USER_ID, WorkoutSession};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::ApiError;

/// Optional header naming the user a request acts for.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self {
            tracker,
            start_time: Instant::now(),
        }
    }
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_USER_ID)
        .to_string()
}

#[derive(Serialize)]
struct StartWorkoutResponse {
    workout_id: String,
    start_time: DateTime<Utc>,
}

#[derive(Serialize)]
struct EndWorkoutResponse {
    status: &'static str,
    end_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ListParams {
    user_id: Option<String>,
}

async fn process_frame(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FrameRequest>,
) -> Result<Json<FrameOutcome>, ApiError> {
    let user_id = user_id(&headers);
    let outcome = state.tracker.process_frame(&user_id, request).await?;
    Ok(Json(outcome))
}

async fn start_workout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StartWorkoutResponse>, ApiError> {
    let session = state.tracker.start_workout(&user_id(&headers)).await?;
    Ok(Json(StartWorkoutResponse {
        workout_id: session.id,
        start_time: session.start_time,
    }))
}

async fn end_workout(
    State(state): State<AppState>,
    Path(workout_id): Path<String>,
) -> Result<Json<EndWorkoutResponse>, ApiError> {
    let end_time = state.tracker.end_workout(&workout_id).await?;
    Ok(Json(EndWorkoutResponse {
        status: "success",
        end_time,
    }))
}

async fn list_workouts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<WorkoutSession>>, ApiError> {
    let workouts = state
        .tracker
        .list_workouts(params.user_id.as_deref())
        .await?;
    debug!("Listing {} completed workouts", workouts.len());
    Ok(Json(workouts))
}

async fn get_workout(
    State(state): State<AppState>,
    Path(workout_id): Path<String>,
) -> Result<Json<WorkoutSession>, ApiError> {
    Ok(Json(state.tracker.get_workout(&workout_id).await?))
}

/// The caller's open workout, or `null`.
async fn current_workout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<WorkoutSession>>, ApiError> {
    Ok(Json(state.tracker.current_workout(&user_id(&headers)).await?))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/process_frame", post(process_frame))
        .route("/api/start_workout", post(start_workout))
        .route("/api/end_workout/{workout_id}", post(end_workout))
        .route("/api/workouts", get(list_workouts))
        .route("/api/workouts/current", get(current_workout))
        .route("/api/workouts/{workout_id}", get(get_workout))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
