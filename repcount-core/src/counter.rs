//! Push-up rep counting over the elbow-angle signal.
//!
//! A rep is a full extension (angle above [`EXTENDED_ANGLE`]) followed by a
//! flex (angle below [`FLEXED_ANGLE`]). Jitter inside the flexed zone cannot
//! count twice because only an extension re-arms the counter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pose::Detection;
use crate::workout::RepEvent;

pub const EXTENDED_ANGLE: f64 = 160.0;
pub const FLEXED_ANGLE: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Arm extended, armed for the next rep.
    Down,
    /// Arm flexed, rep just counted.
    Up,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Down => "down",
            Stage::Up => "up",
        }
    }
}

/// Counting state for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepCounter {
    stage: Option<Stage>,
    count: u32,
    last_rep_time: Option<DateTime<Utc>>,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last_rep_time(&self) -> Option<DateTime<Utc>> {
        self.last_rep_time
    }

    /// Feeds one angle reading, returning the rep it completed, if any.
    pub fn observe(&mut self, angle: f64, now: DateTime<Utc>) -> Option<RepEvent> {
        if angle > EXTENDED_ANGLE {
            self.stage = Some(Stage::Down);
            return None;
        }

        if angle < FLEXED_ANGLE && self.stage == Some(Stage::Down) {
            self.stage = Some(Stage::Up);
            self.count += 1;
            self.last_rep_time = Some(now);
            return Some(RepEvent {
                count: self.count,
                timestamp: now,
            });
        }

        None
    }

    /// Frames without a pose leave the state untouched.
    pub fn observe_detection(
        &mut self,
        detection: &Detection,
        now: DateTime<Utc>,
    ) -> Option<RepEvent> {
        let joints = detection.joints()?;
        self.observe(joints.elbow_angle(), now)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
