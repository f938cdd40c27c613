//! Per-frame processing: detect, count, persist, annotate.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use super::Tracker;
use crate::counter::{RepCounter, Stage};
use crate::error::TrackerError;
use crate::frame::{self, Frame};
use crate::pose::{Detection, JointSample};
use crate::workout::{self, RecordedRep};

#[derive(Debug, Clone, Deserialize)]
pub struct FrameRequest {
    pub image_data: String,
    /// Client capture time, only used for latency logging.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Joints extracted client-side, if the client runs its own detector.
    #[serde(default)]
    pub landmarks: Option<JointSample>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameOutcome {
    pub processed_image: String,
    pub counter: u32,
    pub stage: Option<Stage>,
    pub last_pushup_time: Option<DateTime<Utc>>,
    pub angle: Option<f64>,
}

/// Counter state after one detection has been applied.
#[derive(Debug, Clone)]
pub struct Observation {
    pub counter: RepCounter,
    pub angle: Option<f64>,
    pub rep: Option<RecordedRep>,
}

impl Tracker {
    /// Applies one detection to the user's counter and stores any rep.
    pub async fn observe(
        &self,
        user_id: &str,
        detection: Detection,
    ) -> Result<Observation, TrackerError> {
        let context = self.context(user_id).await;
        let mut counter = context.lock().await;
        self.observe_locked(user_id, &mut counter, detection).await
    }

    async fn observe_locked(
        &self,
        user_id: &str,
        counter: &mut RepCounter,
        detection: Detection,
    ) -> Result<Observation, TrackerError> {
        let angle = detection.joints().map(JointSample::elbow_angle);
        let before = counter.clone();

        let rep = match counter.observe_detection(&detection, workout::now()) {
            Some(event) => {
                info!("Rep {} counted for {}", event.count, user_id);
                match self.store.record_rep(user_id, &event).await {
                    Ok(recorded) => Some(recorded),
                    Err(e) => {
                        error!("Failed to store rep {} for {}: {:#}", event.count, user_id, e);
                        *counter = before;
                        return Err(e.into());
                    }
                }
            }
            None => None,
        };

        Ok(Observation {
            counter: counter.clone(),
            angle,
            rep,
        })
    }

    pub async fn process_frame(
        &self,
        user_id: &str,
        request: FrameRequest,
    ) -> Result<FrameOutcome, TrackerError> {
        if let Some(sent_at) = request
            .timestamp
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        {
            let lag = Utc::now().signed_duration_since(sent_at);
            debug!("Frame for {} arrived {}ms after capture", user_id, lag.num_milliseconds());
        }

        let image = frame::decode_data_uri(&request.image_data)
            .map_err(|e| TrackerError::Decode(format!("{:#}", e)))?;
        let frame = Frame {
            image,
            landmarks: request.landmarks,
        };

        let context = self.context(user_id).await;
        let mut counter = context.lock().await;

        let detection = self
            .detector
            .detect(&frame)
            .await
            .map_err(|e| TrackerError::Detection(format!("{:#}", e)))?;
        if detection == Detection::NotDetected {
            debug!("No pose in frame for {}, nothing to count", user_id);
        }

        let observation = self.observe_locked(user_id, &mut counter, detection).await?;
        drop(counter);

        let annotated = frame::annotate(&frame.image, detection.joints(), &observation.counter);
        let jpeg = frame::encode_jpeg(&DynamicImage::ImageRgb8(annotated))
            .map_err(|e| TrackerError::Encode(format!("{:#}", e)))?;

        Ok(FrameOutcome {
            processed_image: frame::to_data_uri(&jpeg, "image/jpeg"),
            counter: observation.counter.count(),
            stage: observation.counter.stage(),
            last_pushup_time: observation.counter.last_rep_time(),
            angle: observation.angle,
        })
    }
}
