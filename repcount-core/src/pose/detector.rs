use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{Detection, JointSample};
use crate::frame::{self, Frame};

/// Maps a decoded frame to the tracked joints.
///
/// Returning `Ok(Detection::NotDetected)` means "no pose in this frame" and
/// is not an error. `Err` is reserved for a detector that failed outright.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Detection>;
}

/// Uses the landmarks the client attached to the frame, if any.
///
/// This is the detector for clients that run pose estimation in the browser
/// and upload the joints alongside the picture.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuppliedLandmarks;

#[async_trait]
impl PoseDetector for SuppliedLandmarks {
    async fn detect(&self, frame: &Frame) -> Result<Detection> {
        Ok(frame.landmarks.into())
    }
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    image_data: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    landmarks: Option<JointSample>,
}

/// Calls an HTTP pose-estimation service for each frame.
///
/// The service receives `{"image_data": "<data uri>"}` and answers
/// `{"landmarks": {"shoulder": {...}, "elbow": {...}, "wrist": {...}} | null}`.
/// A request that exceeds the timeout counts as a frame without a pose.
pub struct RemotePoseDetector {
    client: reqwest::Client,
    endpoint: String,
}

impl RemotePoseDetector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build pose detector HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PoseDetector for RemotePoseDetector {
    async fn detect(&self, frame: &Frame) -> Result<Detection> {
        if let Some(sample) = frame.landmarks {
            return Ok(Detection::Detected(sample));
        }

        let jpeg = frame::encode_jpeg(&frame.image)?;
        let image_data = frame::to_data_uri(&jpeg, "image/jpeg");

        let response = match self
            .client
            .post(&self.endpoint)
            .json(&DetectRequest {
                image_data: &image_data,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("Pose detector timed out, skipping frame");
                return Ok(Detection::NotDetected);
            }
            Err(e) => return Err(anyhow!("Pose detector request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Pose detector returned {}", status));
        }

        // the client timeout also bounds the body read
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) if e.is_timeout() => {
                warn!("Pose detector timed out mid-response, skipping frame");
                return Ok(Detection::NotDetected);
            }
            Err(e) => return Err(anyhow!("Failed to read pose detector response: {}", e)),
        };
        let body: DetectResponse = serde_json::from_slice(&bytes)
            .context("Pose detector returned an unreadable body")?;
        debug!("Pose detector found landmarks: {}", body.landmarks.is_some());
        Ok(body.landmarks.into())
    }
}
