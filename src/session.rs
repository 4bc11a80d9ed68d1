use crate::callbacks::{SessionCallbacks, StateProvider};
use crate::debug::DebugState;
use crate::device_info::DeviceInfo;
use crate::engine::{MeasurementEngine, MeasurementInput};
use crate::frame::LumaFrame;
use crate::types::{
    CameraIntrinsics, LocationMeasurements, MotionMeasurements, SessionError, SessionState,
};
use crate::{Result, ScapeError};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// State a client shares with its session thread.
pub(crate) struct Shared {
    callbacks: RwLock<Arc<SessionCallbacks>>,
    provider: RwLock<Option<Arc<dyn StateProvider>>>,
    intrinsics: Mutex<Option<CameraIntrinsics>>,
    device: Mutex<Option<DeviceInfo>>,
    pub(crate) debug: Arc<DebugState>,
    in_flight: AtomicBool,
}

impl Shared {
    pub(crate) fn new(debug: Arc<DebugState>) -> Self {
        Self {
            callbacks: RwLock::new(Arc::new(SessionCallbacks::new())),
            provider: RwLock::new(None),
            intrinsics: Mutex::new(None),
            device: Mutex::new(None),
            debug,
            in_flight: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_callbacks(&self, callbacks: SessionCallbacks) {
        if let Ok(mut slot) = self.callbacks.write() {
            *slot = Arc::new(callbacks);
        }
    }

    pub(crate) fn set_provider(&self, provider: Arc<dyn StateProvider>) {
        if let Ok(mut slot) = self.provider.write() {
            *slot = Some(provider);
        }
    }

    pub(crate) fn set_intrinsics(&self, intrinsics: CameraIntrinsics) {
        if let Ok(mut slot) = self.intrinsics.lock() {
            *slot = Some(intrinsics);
        }
    }

    pub(crate) fn intrinsics(&self) -> Option<CameraIntrinsics> {
        self.intrinsics.lock().ok().and_then(|i| *i)
    }

    pub(crate) fn set_device(&self, device: DeviceInfo) {
        if let Ok(mut slot) = self.device.lock() {
            *slot = Some(device);
        }
    }

    pub(crate) fn device(&self) -> Option<DeviceInfo> {
        self.device.lock().ok().and_then(|d| d.clone())
    }

    /// Snapshot taken so callbacks run without holding the lock, and may
    /// replace the registration themselves.
    fn callbacks(&self) -> Arc<SessionCallbacks> {
        match self.callbacks.read() {
            Ok(cb) => cb.clone(),
            Err(_) => Arc::new(SessionCallbacks::new()),
        }
    }

    fn provider(&self) -> Option<Arc<dyn StateProvider>> {
        self.provider.read().ok().and_then(|p| p.clone())
    }
}

enum Command {
    Measure { frame: Option<LumaFrame> },
}

/// Handle to a client's session thread.
///
/// The thread runs one measurement cycle per accepted request and
/// delivers the outcome through the registered session callbacks.
pub(crate) struct Session {
    sender: Option<Sender<Command>>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl Session {
    pub(crate) fn start(
        shared: Arc<Shared>,
        engine: Box<dyn MeasurementEngine>,
    ) -> Result<Session> {
        // One slot: at most one cycle is ever queued or running.
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();
        let shared_clone = shared.clone();

        let thread = std::thread::Builder::new()
            .name("scape-session".into())
            .spawn(move || {
                session_loop(receiver, shared_clone, engine, stop_clone);
            })
            .map_err(ScapeError::Spawn)?;

        Ok(Session {
            sender: Some(sender),
            stop_flag,
            thread: Some(thread),
            shared,
        })
    }

    /// Queue a measurement cycle. Returns false if one is already in flight.
    pub(crate) fn request(&self, frame: Option<LumaFrame>) -> bool {
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };

        if self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Measurements request ignored, a measurement is already in progress");
            return false;
        }

        match sender.try_send(Command::Measure { frame }) {
            Ok(()) => true,
            Err(e) => {
                self.shared.in_flight.store(false, Ordering::Release);
                match e {
                    crossbeam_channel::TrySendError::Full(_) => {
                        log::warn!("Session queue full, dropping measurements request");
                    }
                    crossbeam_channel::TrySendError::Disconnected(_) => {
                        log::warn!("Session thread stopped, dropping measurements request");
                    }
                }
                false
            }
        }
    }

    /// Whether the session thread is still running.
    pub(crate) fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        // Disconnecting wakes the thread if it is idle.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == std::thread::current().id() {
                // Destroyed from inside a callback; the loop exits on its own.
                log::debug!("Session dropped from its own thread, not joining");
                return;
            }
            let _ = thread.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// The session loop runs in a dedicated thread until the client drops its
/// sender or sets the stop flag.
fn session_loop(
    receiver: Receiver<Command>,
    shared: Arc<Shared>,
    mut engine: Box<dyn MeasurementEngine>,
    stop_flag: Arc<AtomicBool>,
) {
    log::info!("Scape session started");
    let mut saved_frames: u64 = 0;

    while let Ok(command) = receiver.recv() {
        if stop_flag.load(Ordering::Relaxed) {
            shared.in_flight.store(false, Ordering::Release);
            break;
        }
        match command {
            Command::Measure { frame } => {
                let cycle = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_cycle(&shared, engine.as_mut(), frame, &mut saved_frames)
                }));
                if let Err(payload) = cycle {
                    report_panic(&shared, panic_message(payload.as_ref()));
                }
            }
        }
    }

    log::info!("Scape session stopped");
}

fn run_cycle(
    shared: &Shared,
    engine: &mut dyn MeasurementEngine,
    frame: Option<LumaFrame>,
    saved_frames: &mut u64,
) {
    let timestamp = unix_now();
    let callbacks = shared.callbacks();
    callbacks.measurements_requested(timestamp as i32);

    let (motion, mut location) = match shared.provider() {
        Some(provider) => (provider.motion(), provider.location()),
        None => {
            log::debug!("No state callbacks registered, using empty sensor readings");
            (MotionMeasurements::default(), LocationMeasurements::default())
        }
    };

    if let Some(mock) = shared.debug.mock_gps() {
        location.lat_lng = mock;
    }

    let device = shared.device();

    if shared.debug.save_images() {
        if let Some(frame) = frame.as_ref() {
            let dir = device
                .as_ref()
                .and_then(DeviceInfo::write_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join("images");
            match save_frame(frame, dir, timestamp, *saved_frames) {
                Ok(path) => {
                    *saved_frames += 1;
                    log::debug!("Saved frame to {}", path.display());
                }
                Err(e) => log::warn!("Failed to save frame: {}", e),
            }
        }
    }

    let input = MeasurementInput {
        timestamp,
        frame,
        intrinsics: shared.intrinsics(),
        motion,
        location,
        device,
    };
    let result = engine.measure(&input);

    // Cleared before delivery so a callback may chain the next request.
    shared.in_flight.store(false, Ordering::Release);

    match result {
        Ok(measurements) => {
            log::debug!(
                "Measurements updated: status={:?} at {}, {}",
                measurements.status,
                measurements.lat_lng.latitude,
                measurements.lat_lng.longitude
            );
            if !callbacks.measurements_updated(measurements) {
                log::debug!("No measurements callback registered, result dropped");
            }
        }
        Err(err) => {
            log::warn!("Session error: {}", err);
            if !callbacks.session_error(&err) {
                log::debug!("No error callback registered, error dropped");
            }
        }
    }
}

/// Recover from a panic inside a cycle: release the in-flight guard and
/// tell the host through the error callback.
fn report_panic(shared: &Shared, message: &str) {
    shared.in_flight.store(false, Ordering::Release);
    log::error!("Measurement cycle panicked: {}", message);

    let err = SessionError::new(
        SessionState::UnexpectedError,
        format!("measurement cycle panicked: {}", message),
    );
    let callbacks = shared.callbacks();
    if panic::catch_unwind(AssertUnwindSafe(|| callbacks.session_error(&err))).is_err() {
        log::error!("Session error callback panicked");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn save_frame(frame: &LumaFrame, dir: PathBuf, timestamp: f64, index: u64) -> Result<PathBuf> {
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!(
        "scape_{}_{:04}.pgm",
        (timestamp * 1000.0) as u64,
        index
    ));
    frame.write_pgm(&path)?;
    Ok(path)
}
