//! Measurement engines.
//!
//! The positioning algorithm itself lives behind [`MeasurementEngine`]. A
//! session hands the engine everything the host supplied for one cycle and
//! forwards whatever it returns to the session callbacks.

use crate::device_info::DeviceInfo;
use crate::frame::LumaFrame;
use crate::types::{
    CameraIntrinsics, LatLng, LocationMeasurements, MeasurementStatus, MotionMeasurements,
    Orientation, ScapeMeasurements, SessionError, SessionState,
};
use std::time::Duration;

/// Inputs gathered for one measurement cycle.
#[derive(Debug, Clone)]
pub struct MeasurementInput {
    /// Seconds since the Unix epoch at the start of the cycle.
    pub timestamp: f64,
    pub frame: Option<LumaFrame>,
    pub intrinsics: Option<CameraIntrinsics>,
    pub motion: MotionMeasurements,
    pub location: LocationMeasurements,
    pub device: Option<DeviceInfo>,
}

/// Turns one cycle's inputs into a measurement or a session error.
pub trait MeasurementEngine: Send {
    fn measure(&mut self, input: &MeasurementInput) -> Result<ScapeMeasurements, SessionError>;
}

impl<F> MeasurementEngine for F
where
    F: FnMut(&MeasurementInput) -> Result<ScapeMeasurements, SessionError> + Send,
{
    fn measure(&mut self, input: &MeasurementInput) -> Result<ScapeMeasurements, SessionError> {
        self(input)
    }
}

/// Reports the host's own sensor fix without visual positioning.
///
/// Results carry `NoResults` status and zero confidence so consumers can
/// tell them apart from a real localization.
#[derive(Debug, Default)]
pub struct PassthroughEngine;

impl MeasurementEngine for PassthroughEngine {
    fn measure(&mut self, input: &MeasurementInput) -> Result<ScapeMeasurements, SessionError> {
        if input.frame.is_none() {
            return Err(SessionError::new(
                SessionState::ImageSensorsError,
                "no camera frame supplied",
            ));
        }

        let location = &input.location;
        if !location.lat_lng.is_valid() {
            return Err(SessionError::new(
                SessionState::LocationSensorsError,
                format!(
                    "invalid location reading ({}, {})",
                    location.lat_lng.latitude, location.lat_lng.longitude
                ),
            ));
        }

        let [roll, pitch, yaw] = input.motion.attitude;
        if !(roll.is_finite() && pitch.is_finite() && yaw.is_finite()) {
            return Err(SessionError::new(
                SessionState::MotionSensorsError,
                "invalid attitude reading",
            ));
        }

        Ok(ScapeMeasurements {
            timestamp: input.timestamp,
            lat_lng: location.lat_lng,
            heading: location.heading,
            orientation: Orientation::from_euler(roll, pitch, yaw),
            raw_height_estimate: location.altitude,
            confidence_score: 0.0,
            status: MeasurementStatus::NoResults,
        })
    }
}

/// Confidence reported by [`MockEngine::at`] results.
pub const MOCK_CONFIDENCE: f64 = 5.0;

/// Returns canned results, optionally after a delay.
#[derive(Debug, Clone)]
pub struct MockEngine {
    result: ScapeMeasurements,
    /// Keep the caller's timestamp instead of stamping each cycle.
    fixed_timestamp: bool,
    delay: Duration,
}

impl MockEngine {
    /// A found result at a fixed position and heading.
    pub fn at(lat_lng: LatLng, heading: f64) -> Self {
        Self {
            result: ScapeMeasurements {
                timestamp: 0.0,
                lat_lng,
                heading,
                orientation: Orientation::IDENTITY,
                raw_height_estimate: 0.0,
                confidence_score: MOCK_CONFIDENCE,
                status: MeasurementStatus::ResultsFound,
            },
            fixed_timestamp: false,
            delay: Duration::ZERO,
        }
    }

    /// Deliver exactly `result`, field for field, on every cycle.
    pub fn returning(result: ScapeMeasurements) -> Self {
        Self {
            result,
            fixed_timestamp: true,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl MeasurementEngine for MockEngine {
    fn measure(&mut self, input: &MeasurementInput) -> Result<ScapeMeasurements, SessionError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let mut result = self.result;
        if !self.fixed_timestamp {
            result.timestamp = input.timestamp;
        }
        Ok(result)
    }
}
