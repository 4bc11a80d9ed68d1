use crate::callbacks::{SessionCallbacks, StateProvider};
use crate::config::ClientConfig;
use crate::debug::{DebugSession, DebugState};
use crate::device_info::DeviceInfo;
use crate::engine::{MeasurementEngine, PassthroughEngine};
use crate::frame::LumaFrame;
use crate::logging;
use crate::session::{Session, Shared};
use crate::types::CameraIntrinsics;
use crate::Result;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Where a client is in its (advisory) lifecycle.
///
/// Calls are accepted in any order; this only records what the host has
/// done so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Lifecycle {
    Created = 0,
    /// Session callbacks registered.
    Configured = 1,
    /// At least one measurement requested.
    Active = 2,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Configured,
            _ => Self::Active,
        }
    }
}

/// Builder for a [`Client`] with a custom measurement engine.
pub struct ClientBuilder {
    config: ClientConfig,
    engine: Option<Box<dyn MeasurementEngine>>,
}

impl ClientBuilder {
    pub fn engine(mut self, engine: impl MeasurementEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn build(self) -> Result<Client> {
        self.config.validate()?;

        let debug_state = Arc::new(DebugState::new());
        let shared = Arc::new(Shared::new(debug_state.clone()));
        let engine = self
            .engine
            .unwrap_or_else(|| Box::new(PassthroughEngine));
        let session = Session::start(shared.clone(), engine)?;

        let debug = if self.config.debug {
            let debug = DebugSession::new(debug_state);
            debug.set_log_config(self.config.log_level, self.config.log_output);
            Some(debug)
        } else {
            None
        };

        log::info!("Scape client created (debug={})", self.config.debug);

        Ok(Client {
            config: self.config,
            shared,
            session,
            debug,
            frame: Mutex::new(None),
            lifecycle: AtomicU8::new(Lifecycle::Created as u8),
        })
    }
}

/// A live Scape client.
///
/// Owns the session thread; dropping the client stops the thread and
/// releases everything it holds. No callback is delivered after drop
/// returns, unless the client is dropped from inside a callback.
pub struct Client {
    config: ClientConfig,
    shared: Arc<Shared>,
    session: Session,
    debug: Option<DebugSession>,
    frame: Mutex<Option<LumaFrame>>,
    lifecycle: AtomicU8,
}

impl Client {
    /// Create a client with the default engine.
    pub fn new(config: ClientConfig) -> Result<Client> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            engine: None,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    /// The debug session, if the client was created with debugging enabled.
    pub fn debug_session(&self) -> Option<&DebugSession> {
        self.debug.as_ref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Relaxed))
    }

    fn advance(&self, to: Lifecycle) {
        let prev = self.lifecycle.fetch_max(to as u8, Ordering::Relaxed);
        if prev < to as u8 {
            log::debug!("Client lifecycle {:?} -> {:?}", Lifecycle::from_u8(prev), to);
        }
    }

    /// Register the session callbacks, replacing any previous registration.
    pub fn set_session_callbacks(&self, callbacks: SessionCallbacks) {
        self.shared.set_callbacks(callbacks);
        self.advance(Lifecycle::Configured);
    }

    /// Register the source of motion and location readings.
    pub fn set_state_provider(&self, provider: impl StateProvider + 'static) {
        self.shared.set_provider(Arc::new(provider));
    }

    /// Start a measurement cycle; the outcome arrives through the session
    /// callbacks. Returns false if the request was ignored because a cycle
    /// is already in flight.
    pub fn request_measurements(&self) -> bool {
        if self.lifecycle() == Lifecycle::Created {
            log::warn!("Measurements requested before session callbacks were set");
        }
        let frame = self.frame.lock().ok().and_then(|f| f.clone());
        let accepted = self.session.request(frame);
        if accepted {
            self.advance(Lifecycle::Active);
        }
        accepted
    }

    /// Set (or clear) the frame used by subsequent measurement cycles.
    pub fn set_frame(&self, frame: Option<LumaFrame>) {
        if let Ok(mut slot) = self.frame.lock() {
            *slot = frame;
        }
    }

    pub fn set_camera_intrinsics(&self, intrinsics: CameraIntrinsics) {
        log::debug!("Camera intrinsics set to {:?}", intrinsics);
        self.shared.set_intrinsics(intrinsics);
    }

    pub fn camera_intrinsics(&self) -> Option<CameraIntrinsics> {
        self.shared.intrinsics()
    }

    /// Identify the host device. Also points file logging at its write directory.
    pub fn set_device_info(&self, info: DeviceInfo) {
        log::info!(
            "Device: {} {} ({} {}), sdk {}",
            info.platform,
            info.model,
            info.os,
            info.os_version,
            info.sdk_version
        );
        logging::set_directory(info.write_dir());
        self.shared.set_device(info);
    }

    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.shared.device()
    }

    /// Whether the session thread is still running.
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("debug", &self.debug.is_some())
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        log::info!("Scape client destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::FnStateProvider;
    use crate::engine::MockEngine;
    use crate::types::{
        LatLng, LocationMeasurements, MeasurementStatus, MotionMeasurements, Orientation,
        ScapeMeasurements, SessionState,
    };
    use crate::{ScapeError, SessionEvent};
    use std::time::Duration;

    fn next_update(events: &crate::SessionEvents) -> ScapeMeasurements {
        loop {
            match events.recv_timeout(Duration::from_secs(2)).unwrap() {
                SessionEvent::MeasurementsUpdated(m) => return m,
                SessionEvent::SessionError(e) => panic!("session error {}", e),
                SessionEvent::MeasurementsRequested(_) => continue,
            }
        }
    }

    #[test]
    fn test_empty_api_key_fails() {
        assert!(matches!(
            Client::new(ClientConfig::new("")),
            Err(ScapeError::MissingApiKey)
        ));
    }

    #[test]
    fn test_create_then_drop() {
        let (callbacks, events) = SessionCallbacks::channel(4);
        let client = Client::new(ClientConfig::new("key")).unwrap();
        assert!(client.is_active());
        assert!(client.debug_session().is_none());
        client.set_session_callbacks(callbacks);
        drop(client);
        assert!(events.try_recv().is_none());
    }

    #[test]
    fn test_lifecycle_advances() {
        let client = Client::builder(ClientConfig::new("key"))
            .engine(MockEngine::at(LatLng::new(0.0, 0.0), 0.0))
            .build()
            .unwrap();
        assert_eq!(client.lifecycle(), Lifecycle::Created);

        let (callbacks, events) = SessionCallbacks::channel(4);
        client.set_session_callbacks(callbacks);
        assert_eq!(client.lifecycle(), Lifecycle::Configured);

        assert!(client.request_measurements());
        assert_eq!(client.lifecycle(), Lifecycle::Active);
        next_update(&events);

        // Replacing callbacks does not move the lifecycle backwards.
        client.set_session_callbacks(SessionCallbacks::new());
        assert_eq!(client.lifecycle(), Lifecycle::Active);
    }

    #[test]
    fn test_set_session_callbacks_replaces_previous() {
        let client = Client::builder(ClientConfig::new("key"))
            .engine(MockEngine::at(LatLng::new(4.0, 5.0), 0.0))
            .build()
            .unwrap();
        let (first, first_events) = SessionCallbacks::channel(4);
        let (second, second_events) = SessionCallbacks::channel(4);
        client.set_session_callbacks(first);
        client.set_session_callbacks(second);

        assert!(client.request_measurements());
        assert_eq!(next_update(&second_events).lat_lng, LatLng::new(4.0, 5.0));
        assert!(first_events.drain().is_empty());
    }

    #[test]
    fn test_stub_measurement_delivered_unchanged() {
        let expected = ScapeMeasurements {
            timestamp: 1234.5,
            lat_lng: LatLng::new(51.50722, -0.1275),
            heading: 271.25,
            orientation: Orientation {
                x: 0.1,
                y: 0.2,
                z: 0.3,
                w: 0.927,
            },
            raw_height_estimate: 1.62,
            confidence_score: 0.87,
            status: MeasurementStatus::Other(17),
        };
        let client = Client::builder(ClientConfig::new("key"))
            .engine(MockEngine::returning(expected))
            .build()
            .unwrap();
        let (callbacks, events) = SessionCallbacks::channel(4);
        client.set_session_callbacks(callbacks);

        assert!(client.request_measurements());
        assert_eq!(next_update(&events), expected);
    }

    #[test]
    fn test_passthrough_uses_frame_and_provider() {
        let client = Client::new(ClientConfig::new("key").with_debug(true)).unwrap();
        let (callbacks, events) = SessionCallbacks::channel(8);
        client.set_session_callbacks(callbacks);
        client.set_state_provider(FnStateProvider::new(MotionMeasurements::default, || {
            LocationMeasurements {
                lat_lng: LatLng::new(35.0, 139.0),
                altitude: 12.0,
                ..Default::default()
            }
        }));

        // No frame yet: image sensor error.
        assert!(client.request_measurements());
        let err = loop {
            match events.recv_timeout(Duration::from_secs(2)).unwrap() {
                SessionEvent::SessionError(e) => break e,
                SessionEvent::MeasurementsUpdated(m) => panic!("unexpected result {:?}", m),
                SessionEvent::MeasurementsRequested(_) => continue,
            }
        };
        assert_eq!(err.state, SessionState::ImageSensorsError);

        client.set_frame(Some(LumaFrame::new(2, 2, vec![1, 2, 3, 4]).unwrap()));
        assert!(client.request_measurements());
        let m = next_update(&events);
        assert_eq!(m.lat_lng, LatLng::new(35.0, 139.0));
        assert_eq!(m.raw_height_estimate, 12.0);

        let debug = client.debug_session().unwrap();
        debug.mock_gps_coordinates(1.0, 1.0);
        debug.mock_gps_coordinates(2.0, 3.0);
        assert!(client.request_measurements());
        assert_eq!(next_update(&events).lat_lng, LatLng::new(2.0, 3.0));
    }

    #[test]
    fn test_setters_are_observable() {
        let client = Client::new(ClientConfig::new("key")).unwrap();
        let intrinsics = CameraIntrinsics {
            x_focal_length: 500.0,
            y_focal_length: 501.0,
            x_principal_point: 320.0,
            y_principal_point: 240.0,
        };
        client.set_camera_intrinsics(intrinsics);
        assert_eq!(client.camera_intrinsics(), Some(intrinsics));

        let mut info = DeviceInfo::default();
        info.model = "Pixel".into();
        client.set_device_info(info.clone());
        assert_eq!(client.device_info(), Some(info));
        assert_eq!(client.api_key(), "key");
    }
}
