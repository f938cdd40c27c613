use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("workout not found: {0}")]
    NotFound(String),
    #[error("could not decode frame: {0}")]
    Decode(String),
    #[error("could not encode frame: {0}")]
    Encode(String),
    #[error("pose detection failed: {0}")]
    Detection(String),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl TrackerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackerError::NotFound(_))
    }
}
