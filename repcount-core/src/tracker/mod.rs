//! Per-user counting contexts and the workout-session lifecycle.
//!
//! The [`Tracker`] owns one [`RepCounter`](crate::counter::RepCounter) per
//! user and routes every rep it produces into the session store.

mod frames;
mod tracker;
mod workout;

pub use frames::{FrameOutcome, FrameRequest, Observation};
pub use tracker::Tracker;

#[cfg(test)]
mod tests;
