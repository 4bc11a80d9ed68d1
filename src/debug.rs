use crate::logging;
use crate::types::{LatLng, LogLevel, LogOutput};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Diagnostic settings shared between a client, its session thread and
/// every [`DebugSession`] handed out for it.
#[derive(Debug)]
pub(crate) struct DebugState {
    mock_gps: Mutex<Option<LatLng>>,
    save_images: AtomicBool,
    log_config: Mutex<(LogLevel, LogOutput)>,
}

impl DebugState {
    pub(crate) fn new() -> Self {
        Self {
            mock_gps: Mutex::new(None),
            save_images: AtomicBool::new(false),
            log_config: Mutex::new((LogLevel::Error, LogOutput::CONSOLE)),
        }
    }

    pub(crate) fn mock_gps(&self) -> Option<LatLng> {
        self.mock_gps.lock().ok().and_then(|m| *m)
    }

    pub(crate) fn save_images(&self) -> bool {
        self.save_images.load(Ordering::Relaxed)
    }
}

/// Diagnostic controls for a client created with debugging enabled.
///
/// Cloning is cheap; every clone controls the same client. Settings take
/// effect from the next measurement cycle and the last write wins.
#[derive(Debug, Clone)]
pub struct DebugSession {
    state: Arc<DebugState>,
}

impl DebugSession {
    pub(crate) fn new(state: Arc<DebugState>) -> Self {
        Self { state }
    }

    /// Set the logging verbosity and destinations.
    pub fn set_log_config(&self, level: LogLevel, output: LogOutput) {
        if let Ok(mut config) = self.state.log_config.lock() {
            *config = (level, output);
        }
        logging::configure(level, output);
        log::debug!("Log config set to {:?} {:?}", level, output);
    }

    pub fn log_config(&self) -> (LogLevel, LogOutput) {
        self.state
            .log_config
            .lock()
            .map(|c| *c)
            .unwrap_or((LogLevel::Error, LogOutput::CONSOLE))
    }

    /// Replace the coordinates of every subsequent location reading.
    pub fn mock_gps_coordinates(&self, latitude: f64, longitude: f64) {
        if let Ok(mut mock) = self.state.mock_gps.lock() {
            *mock = Some(LatLng::new(latitude, longitude));
        }
        log::info!("Mocking GPS coordinates at {}, {}", latitude, longitude);
    }

    /// Stop overriding location readings.
    pub fn clear_mock_gps(&self) {
        if let Ok(mut mock) = self.state.mock_gps.lock() {
            *mock = None;
        }
    }

    pub fn mocked_coordinates(&self) -> Option<LatLng> {
        self.state.mock_gps()
    }

    /// Persist each measured frame under `<write_directory>/images/`.
    pub fn save_images(&self, save: bool) {
        self.state.save_images.store(save, Ordering::Relaxed);
        log::debug!("Save images: {}", save);
    }

    pub fn saves_images(&self) -> bool {
        self.state.save_images()
    }
}
