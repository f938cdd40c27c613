//! Joint geometry and the pose-detector seam.
//!
//! Landmark extraction itself happens outside this crate. A detector hands
//! back a [`Detection`] per frame and the rest of the pipeline only ever sees
//! the three left-arm joints in normalized image coordinates.

mod angle;
mod detector;

pub use angle::joint_angle;
pub use detector::{PoseDetector, RemotePoseDetector, SuppliedLandmarks};

use serde::{Deserialize, Serialize};

/// A point in normalized image coordinates, `0.0..=1.0` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Shoulder, elbow and wrist of the tracked arm for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub shoulder: Point2,
    pub elbow: Point2,
    pub wrist: Point2,
}

impl JointSample {
    /// Interior elbow angle in degrees.
    pub fn elbow_angle(&self) -> f64 {
        joint_angle(self.shoulder, self.elbow, self.wrist)
    }
}

/// Outcome of running the pose detector on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Detected(JointSample),
    NotDetected,
}

impl Detection {
    pub fn joints(&self) -> Option<&JointSample> {
        match self {
            Detection::Detected(sample) => Some(sample),
            Detection::NotDetected => None,
        }
    }
}

impl From<Option<JointSample>> for Detection {
    fn from(sample: Option<JointSample>) -> Self {
        sample.map_or(Detection::NotDetected, Detection::Detected)
    }
}
