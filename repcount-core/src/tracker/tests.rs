use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, RgbImage};

use super::{FrameRequest, Tracker};
use crate::counter::Stage;
use crate::error::TrackerError;
use crate::frame::{self, Frame};
use crate::pose::{Detection, JointSample, Point2, PoseDetector, SuppliedLandmarks};
use crate::store::{MemorySessionStore, SessionStore};
use crate::workout::{DEFAULT_USER_ID, RecordedRep, RepEvent, StartedWorkout, WorkoutSession};

/// Left arm whose elbow angle is `degrees`.
fn arm_at(degrees: f64) -> JointSample {
    let elbow = Point2::new(0.5, 0.5);
    let wrist_dir = (180.0 - degrees).to_radians();
    JointSample {
        shoulder: Point2::new(0.2, 0.5),
        elbow,
        wrist: Point2::new(elbow.x + 0.3 * wrist_dir.cos(), elbow.y + 0.3 * wrist_dir.sin()),
    }
}

fn memory_tracker() -> Tracker {
    Tracker::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(SuppliedLandmarks),
    )
}

async fn feed(tracker: &Tracker, user_id: &str, angles: &[f64]) -> Vec<(u32, Option<Stage>)> {
    let mut progression = Vec::new();
    for &angle in angles {
        let observation = tracker
            .observe(user_id, Detection::Detected(arm_at(angle)))
            .await
            .unwrap();
        progression.push((observation.counter.count(), observation.counter.stage()));
    }
    progression
}

#[test]
fn arm_helper_produces_requested_angle() {
    for degrees in [0.0, 45.0, 85.0, 150.0, 170.0, 180.0] {
        assert!((arm_at(degrees).elbow_angle() - degrees).abs() < 1e-6);
    }
}

#[tokio::test]
async fn counts_through_tracker() {
    let tracker = memory_tracker();
    let progression = feed(&tracker, DEFAULT_USER_ID, &[170.0, 150.0, 85.0, 170.0, 85.0]).await;
    assert_eq!(
        progression,
        vec![
            (0, Some(Stage::Down)),
            (0, Some(Stage::Down)),
            (1, Some(Stage::Up)),
            (1, Some(Stage::Down)),
            (2, Some(Stage::Up)),
        ]
    );
}

#[tokio::test]
async fn first_rep_opens_session_and_second_appends() {
    let tracker = memory_tracker();
    assert!(tracker.current_workout(DEFAULT_USER_ID).await.unwrap().is_none());

    feed(&tracker, DEFAULT_USER_ID, &[170.0]).await;
    let first = tracker
        .observe(DEFAULT_USER_ID, Detection::Detected(arm_at(60.0)))
        .await
        .unwrap()
        .rep
        .unwrap();
    assert!(first.created);
    assert_eq!(first.total_pushups, 1);

    feed(&tracker, DEFAULT_USER_ID, &[170.0]).await;
    let second = tracker
        .observe(DEFAULT_USER_ID, Detection::Detected(arm_at(60.0)))
        .await
        .unwrap()
        .rep
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.total_pushups, 2);

    let open = tracker
        .current_workout(DEFAULT_USER_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(open.pushup_data.iter().map(|r| r.count).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn missing_pose_leaves_counter_untouched() {
    let tracker = memory_tracker();
    feed(&tracker, DEFAULT_USER_ID, &[170.0]).await;
    let before = tracker.counter(DEFAULT_USER_ID).await;

    let observation = tracker
        .observe(DEFAULT_USER_ID, Detection::NotDetected)
        .await
        .unwrap();
    assert_eq!(observation.counter, before);
    assert!(observation.angle.is_none());
    assert!(observation.rep.is_none());
}

#[tokio::test]
async fn start_workout_resets_counter_and_closes_open_session() {
    let tracker = memory_tracker();
    feed(&tracker, DEFAULT_USER_ID, &[170.0, 60.0, 170.0]).await;
    let auto_opened = tracker
        .current_workout(DEFAULT_USER_ID)
        .await
        .unwrap()
        .unwrap();

    let started = tracker.start_workout(DEFAULT_USER_ID).await.unwrap();
    assert_eq!(started.total_pushups, 0);
    assert_ne!(started.id, auto_opened.id);
    assert_eq!(tracker.counter(DEFAULT_USER_ID).await.count(), 0);
    assert_eq!(tracker.counter(DEFAULT_USER_ID).await.stage(), None);

    let closed = tracker.list_workouts(None).await.unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, auto_opened.id);

    // the next rep lands in the explicitly started session
    let reps = feed(&tracker, DEFAULT_USER_ID, &[170.0, 60.0]).await;
    assert_eq!(reps.last(), Some(&(1, Some(Stage::Up))));
    let open = tracker
        .current_workout(DEFAULT_USER_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(open.id, started.id);
    assert_eq!(open.total_pushups, 1);
}

#[tokio::test]
async fn end_workout_succeeds_once() {
    let tracker = memory_tracker();
    assert!(
        tracker
            .end_workout("missing")
            .await
            .unwrap_err()
            .is_not_found()
    );

    let older = tracker.start_workout(DEFAULT_USER_ID).await.unwrap();
    tracker.end_workout(&older.id).await.unwrap();
    assert!(tracker.end_workout(&older.id).await.unwrap_err().is_not_found());

    tokio::time::sleep(Duration::from_millis(2)).await;
    let newer = tracker.start_workout(DEFAULT_USER_ID).await.unwrap();
    let end_time = tracker.end_workout(&newer.id).await.unwrap();
    assert!(end_time >= newer.start_time);

    let listed: Vec<String> = tracker
        .list_workouts(None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, vec![newer.id.clone(), older.id.clone()]);
    assert_eq!(tracker.get_workout(&older.id).await.unwrap().id, older.id);
    assert!(tracker.get_workout("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn ending_a_workout_resets_its_owner_counter() {
    let tracker = memory_tracker();
    let started = tracker.start_workout("gwen").await.unwrap();
    feed(&tracker, "gwen", &[170.0, 60.0]).await;
    assert_eq!(tracker.counter("gwen").await.count(), 1);

    tracker.end_workout(&started.id).await.unwrap();
    assert_eq!(tracker.counter("gwen").await.count(), 0);
}

/// Memory store whose `end_session` lingers after closing the session.
#[derive(Default)]
struct SlowEndStore {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for SlowEndStore {
    async fn get(&self, id: &str) -> Result<Option<WorkoutSession>> {
        self.inner.get(id).await
    }

    async fn find_open(&self, user_id: &str) -> Result<Option<WorkoutSession>> {
        self.inner.find_open(user_id).await
    }

    async fn start_session(&self, user_id: &str, at: DateTime<Utc>) -> Result<StartedWorkout> {
        self.inner.start_session(user_id, at).await
    }

    async fn record_rep(&self, user_id: &str, event: &RepEvent) -> Result<RecordedRep> {
        self.inner.record_rep(user_id, event).await
    }

    async fn end_session(&self, id: &str, at: DateTime<Utc>) -> Result<Option<WorkoutSession>> {
        let ended = self.inner.end_session(id, at).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        ended
    }

    async fn list_closed(&self, user_id: Option<&str>) -> Result<Vec<WorkoutSession>> {
        self.inner.list_closed(user_id).await
    }
}

#[tokio::test]
async fn frames_wait_while_a_workout_is_ending() {
    let tracker = Arc::new(Tracker::new(
        Arc::new(SlowEndStore::default()),
        Arc::new(SuppliedLandmarks),
    ));
    let started = tracker.start_workout("hana").await.unwrap();
    feed(&tracker, "hana", &[170.0, 60.0, 170.0]).await;

    let ending = {
        let tracker = Arc::clone(&tracker);
        let id = started.id.clone();
        tokio::spawn(async move { tracker.end_workout(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // arrives mid-close and must see the reset counter
    let mid = feed(&tracker, "hana", &[60.0]).await;
    assert_eq!(mid, vec![(0, None)]);
    ending.await.unwrap().unwrap();

    feed(&tracker, "hana", &[170.0, 60.0]).await;
    assert_eq!(tracker.counter("hana").await.count(), 1);

    let open = tracker.current_workout("hana").await.unwrap().unwrap();
    assert_ne!(open.id, started.id);
    assert_eq!(open.pushup_data.iter().map(|r| r.count).collect::<Vec<_>>(), vec![1]);
    assert_eq!(tracker.get_workout(&started.id).await.unwrap().total_pushups, 1);
}

#[tokio::test]
async fn ending_a_workout_releases_the_counting_context() {
    let tracker = memory_tracker();
    for user in ["ines", "jon", "kai"] {
        let started = tracker.start_workout(user).await.unwrap();
        feed(&tracker, user, &[170.0, 60.0]).await;
        tracker.end_workout(&started.id).await.unwrap();
    }
    assert_eq!(tracker.tracked_users().await, 0);

    assert_eq!(tracker.counter("nobody").await.count(), 0);
    assert_eq!(tracker.tracked_users().await, 0);
}

#[tokio::test]
async fn users_count_independently() {
    let tracker = memory_tracker();
    feed(&tracker, "alice", &[170.0]).await;
    feed(&tracker, "bob", &[60.0]).await;
    feed(&tracker, "alice", &[60.0]).await;

    assert_eq!(tracker.counter("alice").await.count(), 1);
    assert_eq!(tracker.counter("bob").await.count(), 0);
    assert_eq!(tracker.counter("bob").await.stage(), None);
}

#[tokio::test]
async fn concurrent_frames_for_one_user_count_once() {
    let tracker = Arc::new(memory_tracker());
    feed(&tracker, DEFAULT_USER_ID, &[170.0]).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker
                .observe(DEFAULT_USER_ID, Detection::Detected(arm_at(45.0)))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(tracker.counter(DEFAULT_USER_ID).await.count(), 1);
    let open = tracker
        .current_workout(DEFAULT_USER_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(open.total_pushups, 1);
}

struct BrokenStore;

#[async_trait]
impl SessionStore for BrokenStore {
    async fn get(&self, _: &str) -> Result<Option<WorkoutSession>> {
        Err(anyhow!("store offline"))
    }

    async fn find_open(&self, _: &str) -> Result<Option<WorkoutSession>> {
        Err(anyhow!("store offline"))
    }

    async fn start_session(&self, _: &str, _: DateTime<Utc>) -> Result<StartedWorkout> {
        Err(anyhow!("store offline"))
    }

    async fn record_rep(&self, _: &str, _: &RepEvent) -> Result<RecordedRep> {
        Err(anyhow!("store offline"))
    }

    async fn end_session(&self, _: &str, _: DateTime<Utc>) -> Result<Option<WorkoutSession>> {
        Err(anyhow!("store offline"))
    }

    async fn list_closed(&self, _: Option<&str>) -> Result<Vec<WorkoutSession>> {
        Err(anyhow!("store offline"))
    }
}

#[tokio::test]
async fn failed_store_write_rolls_counter_back() {
    let tracker = Tracker::new(Arc::new(BrokenStore), Arc::new(SuppliedLandmarks));
    feed(&tracker, DEFAULT_USER_ID, &[170.0]).await;
    let before = tracker.counter(DEFAULT_USER_ID).await;

    let err = tracker
        .observe(DEFAULT_USER_ID, Detection::Detected(arm_at(45.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Store(_)));
    assert_eq!(tracker.counter(DEFAULT_USER_ID).await, before);

    assert!(matches!(
        tracker.start_workout(DEFAULT_USER_ID).await.unwrap_err(),
        TrackerError::Store(_)
    ));
}

fn png_uri() -> String {
    let image = DynamicImage::ImageRgb8(RgbImage::new(32, 24));
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    frame::to_data_uri(&buf, "image/png")
}

#[tokio::test]
async fn process_frame_counts_supplied_landmarks() {
    let tracker = memory_tracker();
    for (angle, expected) in [(170.0, 0), (40.0, 1)] {
        let outcome = tracker
            .process_frame(
                DEFAULT_USER_ID,
                FrameRequest {
                    image_data: png_uri(),
                    timestamp: Some(Utc::now().to_rfc3339()),
                    landmarks: Some(arm_at(angle)),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.counter, expected);
        assert!(outcome.processed_image.starts_with("data:image/jpeg;base64,"));
        assert!((outcome.angle.unwrap() - angle).abs() < 1e-6);
    }

    let outcome = tracker
        .process_frame(
            DEFAULT_USER_ID,
            FrameRequest {
                image_data: png_uri(),
                timestamp: None,
                landmarks: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.counter, 1);
    assert_eq!(outcome.stage, Some(Stage::Up));
    assert!(outcome.last_pushup_time.is_some());
    assert!(outcome.angle.is_none());
}

struct FailingDetector;

#[async_trait]
impl PoseDetector for FailingDetector {
    async fn detect(&self, _: &Frame) -> Result<Detection> {
        Err(anyhow!("pose service returned 500"))
    }
}

#[tokio::test]
async fn process_frame_reports_detector_failure() {
    let tracker = Tracker::new(Arc::new(MemorySessionStore::new()), Arc::new(FailingDetector));
    let err = tracker
        .process_frame(
            DEFAULT_USER_ID,
            FrameRequest {
                image_data: png_uri(),
                timestamp: None,
                landmarks: None,
            },
        )
        .await
        .unwrap_err();
    match err {
        TrackerError::Detection(msg) => assert!(msg.contains("500")),
        other => panic!("expected a detection error, got {other:?}"),
    }
    assert_eq!(tracker.counter(DEFAULT_USER_ID).await.stage(), None);
}

#[tokio::test]
async fn process_frame_rejects_garbage() {
    let tracker = memory_tracker();
    let err = tracker
        .process_frame(
            DEFAULT_USER_ID,
            FrameRequest {
                image_data: "data:image/jpeg;base64,@@@".to_string(),
                timestamp: None,
                landmarks: Some(arm_at(170.0)),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Decode(_)));
    assert_eq!(tracker.counter(DEFAULT_USER_ID).await.stage(), None);
}
