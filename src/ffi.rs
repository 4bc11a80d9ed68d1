//! C ABI for game-engine plugin hosts.
//!
//! Exposes the `citf_` entry points over opaque `void*` handles. Raw
//! callback pointers are wrapped into closures as soon as they arrive and
//! never travel further into the crate. The generated C header is written
//! to `include/scapekit.h` by cbindgen.

use crate::callbacks::{SessionCallbacks, StateProvider};
use crate::client::Client;
use crate::config::ClientConfig;
use crate::debug::DebugSession;
use crate::device_info::{DeviceInfo, FixedText, SMALL_STRING_SIZE};
use crate::error::LastError;
use crate::frame::LumaFrame;
use crate::geo;
use crate::logging;
use crate::types::{
    CameraIntrinsics, LatLng, LocationMeasurements, LogLevel, LogOutput, MeasurementStatus,
    MotionMeasurements, Orientation, ScapeMeasurements,
};
use crate::ScapeError;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Mutex;

/// Last construction error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// The process-wide client returned by `citf_getGlobalScapeClient`.
///
/// Claimed by the first client created while the slot is empty, released
/// when that client is destroyed.
static GLOBAL_CLIENT: AtomicPtr<c_void> = AtomicPtr::new(std::ptr::null_mut());

/// Tag used for host log lines that arrive without one.
const DEFAULT_LOG_TAG: &str = "SCKUnity";

/// Measurement result in C-compatible layout (`scape_measurements`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CScapeMeasurements {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub orientation_x: f64,
    pub orientation_y: f64,
    pub orientation_z: f64,
    pub orientation_w: f64,
    pub raw_height_estimate: f64,
    pub confidence_score: f64,
    pub measurements_status: c_int,
}

/// IMU snapshot in C-compatible layout (`motion_measurements`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CMotionMeasurements {
    pub acceleration: [f64; 3],
    pub acceleration_timestamp: f64,
    pub user_acceleration: [f64; 3],
    pub gyro: [f64; 3],
    pub gyro_timestamp: f64,
    pub magnetometer: [f64; 3],
    pub magnetometer_timestamp: f64,
    pub gravity: [f64; 3],
    pub attitude: [f64; 3],
}

/// GPS/compass snapshot in C-compatible layout (`location_measurements`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CLocationMeasurements {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub coordinates_accuracy: f64,
    pub altitude: f64,
    pub altitude_accuracy: f64,
    pub heading: f64,
    pub heading_accuracy: f64,
    pub course: i64,
    pub speed: i64,
}

/// Device identification in C-compatible layout (`device_info`).
/// Every field is a NUL-terminated string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CDeviceInfo {
    pub id: [c_char; SMALL_STRING_SIZE],
    pub platform: [c_char; SMALL_STRING_SIZE],
    pub model: [c_char; SMALL_STRING_SIZE],
    pub os: [c_char; SMALL_STRING_SIZE],
    pub os_version: [c_char; SMALL_STRING_SIZE],
    pub api_version: [c_char; SMALL_STRING_SIZE],
    pub write_directory: [c_char; SMALL_STRING_SIZE],
    pub sdk_version: [c_char; SMALL_STRING_SIZE],
}

pub type OnScapeMeasurementsRequested = Option<unsafe extern "system" fn(timestamp: c_int)>;
pub type OnScapeSessionError =
    Option<unsafe extern "system" fn(error_status: c_int, error_message: *const c_char)>;
pub type OnScapeMeasurementsUpdated = Option<unsafe extern "system" fn(sm: CScapeMeasurements)>;
pub type OnAcquireMotionMeasurements =
    Option<unsafe extern "system" fn(mm: *mut CMotionMeasurements)>;
pub type OnAcquireLocationMeasurements =
    Option<unsafe extern "system" fn(lm: *mut CLocationMeasurements)>;

impl From<ScapeMeasurements> for CScapeMeasurements {
    fn from(m: ScapeMeasurements) -> Self {
        Self {
            timestamp: m.timestamp,
            latitude: m.lat_lng.latitude,
            longitude: m.lat_lng.longitude,
            heading: m.heading,
            orientation_x: m.orientation.x,
            orientation_y: m.orientation.y,
            orientation_z: m.orientation.z,
            orientation_w: m.orientation.w,
            raw_height_estimate: m.raw_height_estimate,
            confidence_score: m.confidence_score,
            measurements_status: m.status.as_raw(),
        }
    }
}

impl From<CScapeMeasurements> for ScapeMeasurements {
    fn from(c: CScapeMeasurements) -> Self {
        Self {
            timestamp: c.timestamp,
            lat_lng: LatLng::new(c.latitude, c.longitude),
            heading: c.heading,
            orientation: Orientation {
                x: c.orientation_x,
                y: c.orientation_y,
                z: c.orientation_z,
                w: c.orientation_w,
            },
            raw_height_estimate: c.raw_height_estimate,
            confidence_score: c.confidence_score,
            status: MeasurementStatus::from_raw(c.measurements_status),
        }
    }
}

impl From<CMotionMeasurements> for MotionMeasurements {
    fn from(c: CMotionMeasurements) -> Self {
        Self {
            acceleration: c.acceleration,
            acceleration_timestamp: c.acceleration_timestamp,
            user_acceleration: c.user_acceleration,
            gyro: c.gyro,
            gyro_timestamp: c.gyro_timestamp,
            magnetometer: c.magnetometer,
            magnetometer_timestamp: c.magnetometer_timestamp,
            gravity: c.gravity,
            attitude: c.attitude,
        }
    }
}

impl From<CLocationMeasurements> for LocationMeasurements {
    fn from(c: CLocationMeasurements) -> Self {
        Self {
            timestamp: c.timestamp,
            lat_lng: LatLng::new(c.latitude, c.longitude),
            coordinates_accuracy: c.coordinates_accuracy,
            altitude: c.altitude,
            altitude_accuracy: c.altitude_accuracy,
            heading: c.heading,
            heading_accuracy: c.heading_accuracy,
            course: c.course,
            speed: c.speed,
        }
    }
}

impl From<&DeviceInfo> for CDeviceInfo {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            id: info.id.to_c_buf(),
            platform: info.platform.to_c_buf(),
            model: info.model.to_c_buf(),
            os: info.os.to_c_buf(),
            os_version: info.os_version.to_c_buf(),
            api_version: info.api_version.to_c_buf(),
            write_directory: info.write_directory.to_c_buf(),
            sdk_version: info.sdk_version.to_c_buf(),
        }
    }
}

impl From<&CDeviceInfo> for DeviceInfo {
    fn from(c: &CDeviceInfo) -> Self {
        Self {
            id: FixedText::from_c_buf(&c.id),
            platform: FixedText::from_c_buf(&c.platform),
            model: FixedText::from_c_buf(&c.model),
            os: FixedText::from_c_buf(&c.os),
            os_version: FixedText::from_c_buf(&c.os_version),
            api_version: FixedText::from_c_buf(&c.api_version),
            write_directory: FixedText::from_c_buf(&c.write_directory),
            sdk_version: FixedText::from_c_buf(&c.sdk_version),
        }
    }
}

/// Y-plane location last set by the host; copied when a measurement is requested.
#[derive(Debug, Clone, Copy, Default)]
struct YChannel {
    pointer: i64,
    width: i32,
    height: i32,
}

/// Opaque client handle behind `void*`.
struct ClientHandle {
    client: Client,
    /// Lives as long as the client; `citf_getDebugSession` points here.
    debug: Option<DebugHandle>,
    y_channel: Mutex<YChannel>,
}

/// Opaque debug handle behind `void*`.
struct DebugHandle(DebugSession);

fn into_handle(client: Client) -> *mut c_void {
    let debug = client.debug_session().cloned().map(DebugHandle);
    Box::into_raw(Box::new(ClientHandle {
        client,
        debug,
        y_channel: Mutex::new(YChannel::default()),
    })) as *mut c_void
}

unsafe fn client_ref<'a>(client: *mut c_void) -> Option<&'a ClientHandle> {
    (client as *const ClientHandle).as_ref()
}

unsafe fn debug_ref<'a>(debug: *mut c_void) -> Option<&'a DebugSession> {
    (debug as *const DebugHandle).as_ref().map(|d| &d.0)
}

/// Pull callbacks supplied by the host.
struct ForeignStateProvider {
    motion: OnAcquireMotionMeasurements,
    location: OnAcquireLocationMeasurements,
}

impl StateProvider for ForeignStateProvider {
    fn motion(&self) -> MotionMeasurements {
        let mut mm = CMotionMeasurements::default();
        if let Some(f) = self.motion {
            unsafe { f(&mut mm) };
        }
        mm.into()
    }

    fn location(&self) -> LocationMeasurements {
        let mut lm = CLocationMeasurements::default();
        if let Some(f) = self.location {
            unsafe { f(&mut lm) };
        }
        lm.into()
    }
}

fn foreign_session_callbacks(
    req: OnScapeMeasurementsRequested,
    err: OnScapeSessionError,
    mes: OnScapeMeasurementsUpdated,
) -> SessionCallbacks {
    let mut callbacks = SessionCallbacks::new();
    if let Some(req) = req {
        callbacks = callbacks.on_measurements_requested(move |ts| unsafe { req(ts) });
    }
    if let Some(err) = err {
        callbacks = callbacks.on_session_error(move |e| {
            let message = CString::new(e.message.replace('\0', " ")).unwrap_or_default();
            unsafe { err(e.state.as_raw(), message.as_ptr()) };
        });
    }
    if let Some(mes) = mes {
        callbacks = callbacks.on_measurements_updated(move |m| unsafe { mes(m.into()) });
    }
    callbacks
}

/// Create a client. Returns NULL on error (check `citf_lastError()`).
///
/// The first client created while no global client exists becomes the
/// global client.
///
/// # Safety
/// `api_key` must be a valid NUL-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_createClient(
    api_key: *const c_char,
    with_debug: c_int,
) -> *mut c_void {
    logging::init();

    if api_key.is_null() {
        LAST_ERROR.set(&ScapeError::MissingApiKey);
        return std::ptr::null_mut();
    }
    let api_key = match CStr::from_ptr(api_key).to_str() {
        Ok(key) => key,
        Err(_) => {
            LAST_ERROR.set(&ScapeError::InvalidApiKey);
            return std::ptr::null_mut();
        }
    };

    match Client::new(ClientConfig::new(api_key).with_debug(with_debug != 0)) {
        Ok(client) => {
            LAST_ERROR.clear();
            let handle = into_handle(client);
            let _ = GLOBAL_CLIENT.compare_exchange(
                std::ptr::null_mut(),
                handle,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            handle
        }
        Err(e) => {
            log::error!("Failed to create client: {}", e);
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Get the debug session of a client created with `with_debug != 0`.
/// Returns NULL otherwise. The handle is valid until the client is destroyed.
///
/// # Safety
/// `client` must be a live client handle, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_getDebugSession(client: *mut c_void) -> *mut c_void {
    match client_ref(client).and_then(|h| h.debug.as_ref()) {
        Some(debug) => debug as *const DebugHandle as *mut c_void,
        None => std::ptr::null_mut(),
    }
}

/// The process-wide client, or NULL if none is alive.
#[no_mangle]
pub extern "C" fn citf_getGlobalScapeClient() -> *mut c_void {
    GLOBAL_CLIENT.load(Ordering::Acquire)
}

/// Set log verbosity (0 = off .. 5 = error) and output bitmask
/// (1 = console, 2 = file, 4 = overlay, 8 = network).
///
/// # Safety
/// `debug` must be a live debug handle, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_setLogConfig(
    debug: *mut c_void,
    log_level: c_int,
    log_output: c_int,
) {
    let Some(debug) = debug_ref(debug) else {
        return;
    };
    match LogLevel::from_raw(log_level) {
        Some(level) => {
            debug.set_log_config(level, LogOutput::from_bits_truncate(log_output as u32))
        }
        None => log::warn!("Ignoring unknown log level {}", log_level),
    }
}

/// Override the coordinates of subsequent location readings.
///
/// # Safety
/// `debug` must be a live debug handle, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_mockGPSCoordinates(
    debug: *mut c_void,
    latitude: f64,
    longitude: f64,
) {
    if let Some(debug) = debug_ref(debug) {
        debug.mock_gps_coordinates(latitude, longitude);
    }
}

/// Toggle saving of measured frames to the device write directory.
///
/// # Safety
/// `debug` must be a live debug handle, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_saveImages(debug: *mut c_void, save: bool) {
    if let Some(debug) = debug_ref(debug) {
        debug.save_images(save);
    }
}

/// Register the session callbacks, replacing any previous ones. Callbacks
/// run on the session thread. Null entries are skipped.
///
/// # Safety
/// `client` must be a live client handle, or null. Each non-null callback
/// must stay callable until the client is destroyed.
#[no_mangle]
pub unsafe extern "C" fn citf_setSessionCallbacks(
    client: *mut c_void,
    req: OnScapeMeasurementsRequested,
    err: OnScapeSessionError,
    mes: OnScapeMeasurementsUpdated,
) {
    if let Some(handle) = client_ref(client) {
        handle
            .client
            .set_session_callbacks(foreign_session_callbacks(req, err, mes));
    }
}

/// Request a measurement. The result (or an error) arrives through the
/// session callbacks.
///
/// # Safety
/// `client` must be a live client handle, or null. If a Y-channel pointer
/// was set, it must be readable for `width * height` bytes during this call.
#[no_mangle]
pub unsafe extern "C" fn citf_getMeasurements(client: *mut c_void) {
    let Some(handle) = client_ref(client) else {
        return;
    };

    let y = handle.y_channel.lock().map(|y| *y).unwrap_or_default();
    let frame = if y.pointer != 0 && y.width > 0 && y.height > 0 {
        let ptr = y.pointer as usize as *const u8;
        match LumaFrame::copy_from_raw(ptr, y.width as u32, y.height as u32) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("Discarding Y-channel: {}", e);
                None
            }
        }
    } else {
        None
    };
    handle.client.set_frame(frame);
    handle.client.request_measurements();
}

/// Point the client at the luminance plane of the next frame. A null
/// pointer or zero size clears it.
///
/// # Safety
/// `client` must be a live client handle, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_setYChannelPtr(
    client: *mut c_void,
    pointer: i64,
    width: i32,
    height: i32,
) {
    if let Some(handle) = client_ref(client) {
        if let Ok(mut y) = handle.y_channel.lock() {
            *y = YChannel {
                pointer,
                width,
                height,
            };
        }
    }
}

/// # Safety
/// `client` must be a live client handle, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_setCameraIntrinsics(
    client: *mut c_void,
    x_focal_length: f64,
    y_focal_length: f64,
    x_principal_point: f64,
    y_principal_point: f64,
) {
    if let Some(handle) = client_ref(client) {
        handle.client.set_camera_intrinsics(CameraIntrinsics {
            x_focal_length,
            y_focal_length,
            x_principal_point,
            y_principal_point,
        });
    }
}

/// # Safety
/// `client` must be a live client handle, or null. `info` must point to a
/// valid `device_info`, or be null.
#[no_mangle]
pub unsafe extern "C" fn citf_setDeviceInfo(client: *mut c_void, info: *const CDeviceInfo) {
    let (Some(handle), Some(info)) = (client_ref(client), info.as_ref()) else {
        return;
    };
    handle.client.set_device_info(DeviceInfo::from(info));
}

/// Register the motion and location callbacks the client pulls sensor
/// readings from. Each must fill the struct before returning.
///
/// # Safety
/// `client` must be a live client handle, or null. Each non-null callback
/// must stay callable until the client is destroyed.
#[no_mangle]
pub unsafe extern "C" fn citf_setClientStateCallbacks(
    client: *mut c_void,
    motion: OnAcquireMotionMeasurements,
    loc: OnAcquireLocationMeasurements,
) {
    if let Some(handle) = client_ref(client) {
        handle.client.set_state_provider(ForeignStateProvider {
            motion,
            location: loc,
        });
    }
}

/// Destroy a client and free its resources. The client and its debug
/// handle must not be used afterwards.
///
/// # Safety
/// `client` must be a pointer returned by `citf_createClient`, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_destroyClient(client: *mut c_void) {
    if client.is_null() {
        return;
    }
    let _ = GLOBAL_CLIENT.compare_exchange(
        client,
        std::ptr::null_mut(),
        Ordering::AcqRel,
        Ordering::Acquire,
    );
    drop(Box::from_raw(client as *mut ClientHandle));
}

/// Forward a host log line into the logging pipeline.
///
/// # Safety
/// `tag` and `msg` must be valid NUL-terminated strings, or null.
#[no_mangle]
pub unsafe extern "C" fn citf_log(log_level: c_int, tag: *const c_char, msg: *const c_char) {
    if msg.is_null() {
        return;
    }
    let tag = if tag.is_null() {
        DEFAULT_LOG_TAG.into()
    } else {
        CStr::from_ptr(tag).to_string_lossy()
    };
    let msg = CStr::from_ptr(msg).to_string_lossy();
    let level = LogLevel::from_raw(log_level).unwrap_or(LogLevel::Info);
    logging::forward(level, &tag, &msg);
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next `citf_createClient` call.
#[no_mangle]
pub extern "C" fn citf_lastError() -> *const c_char {
    LAST_ERROR.as_ptr()
}

/// S2 cell id of a coordinate at `s2_cell_level` (clamped to 0..=30).
#[no_mangle]
pub extern "C" fn _cellIdForWgs(latitude: f64, longitude: f64, s2_cell_level: c_int) -> i64 {
    let level = s2_cell_level.clamp(0, geo::MAX_LEVEL as c_int) as u8;
    geo::cell_id_for_wgs(latitude, longitude, level) as i64
}

#[no_mangle]
pub extern "C" fn _metersBetweenCoordinates(
    latitude1: f64,
    longitude1: f64,
    latitude2: f64,
    longitude2: f64,
) -> f64 {
    geo::meters_between(latitude1, longitude1, latitude2, longitude2)
}

#[no_mangle]
pub extern "C" fn _angleBetweenCoordinates(
    latitude1: f64,
    longitude1: f64,
    latitude2: f64,
    longitude2: f64,
) -> f64 {
    geo::angle_between(latitude1, longitude1, latitude2, longitude2)
}

/// Writes [x, y, z] scene coordinates into `result`.
///
/// # Safety
/// `result` must point to 3 writable doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn _wgsToLocal(
    latitude: f64,
    longitude: f64,
    altitude: f64,
    cell_id: i64,
    result: *mut f64,
) {
    if result.is_null() {
        return;
    }
    let local = geo::wgs_to_local(latitude, longitude, altitude, cell_id as u64);
    std::ptr::copy_nonoverlapping(local.as_ptr(), result, 3);
}

/// Writes [latitude, longitude, altitude] into `result`.
///
/// # Safety
/// `result` must point to 3 writable doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn _localToWgs(x: f64, y: f64, z: f64, cell_id: i64, result: *mut f64) {
    if result.is_null() {
        return;
    }
    let wgs = geo::local_to_wgs([x, y, z], cell_id as u64);
    std::ptr::copy_nonoverlapping(wgs.as_ptr(), result, 3);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use std::mem::{offset_of, size_of};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if let Some(v) = f() {
                return v;
            }
            assert!(Instant::now() < deadline, "timed out waiting for callback");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_struct_layout() {
        assert_eq!(size_of::<CDeviceInfo>(), 8 * 256);
        assert_eq!(offset_of!(CDeviceInfo, sdk_version), 7 * 256);

        assert_eq!(offset_of!(CScapeMeasurements, confidence_score), 72);
        assert_eq!(offset_of!(CScapeMeasurements, measurements_status), 80);

        assert_eq!(size_of::<CMotionMeasurements>(), 21 * 8);
        assert_eq!(offset_of!(CMotionMeasurements, acceleration_timestamp), 24);
        assert_eq!(offset_of!(CMotionMeasurements, gyro_timestamp), 80);
        assert_eq!(offset_of!(CMotionMeasurements, magnetometer_timestamp), 112);
        assert_eq!(offset_of!(CMotionMeasurements, attitude), 144);

        assert_eq!(size_of::<CLocationMeasurements>(), 80);
        assert_eq!(offset_of!(CLocationMeasurements, course), 64);
        assert_eq!(offset_of!(CLocationMeasurements, speed), 72);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_measurements_tail_padding() {
        assert_eq!(size_of::<CScapeMeasurements>(), 88);
    }

    static CREATE_DESTROY_CALLS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "system" fn count_requested(_ts: c_int) {
        CREATE_DESTROY_CALLS.fetch_add(1, Ordering::SeqCst);
    }
    unsafe extern "system" fn count_error(_status: c_int, _msg: *const c_char) {
        CREATE_DESTROY_CALLS.fetch_add(1, Ordering::SeqCst);
    }
    unsafe extern "system" fn count_updated(_sm: CScapeMeasurements) {
        CREATE_DESTROY_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    // The only test that goes through citf_createClient, so the global
    // slot is not contended.
    #[test]
    fn test_create_destroy_and_global() {
        unsafe {
            assert!(citf_createClient(std::ptr::null(), 0).is_null());
            assert!(!citf_lastError().is_null());

            let empty = CString::new("").unwrap();
            assert!(citf_createClient(empty.as_ptr(), 0).is_null());

            let key = CString::new("test-key").unwrap();
            let first = citf_createClient(key.as_ptr(), 0);
            assert!(!first.is_null());
            assert!(citf_lastError().is_null());
            citf_setSessionCallbacks(
                first,
                Some(count_requested),
                Some(count_error),
                Some(count_updated),
            );
            assert!(citf_getDebugSession(first).is_null());
            assert_eq!(citf_getGlobalScapeClient(), first);

            let second = citf_createClient(key.as_ptr(), 1);
            assert!(!second.is_null());
            assert_eq!(citf_getGlobalScapeClient(), first);
            assert!(!citf_getDebugSession(second).is_null());

            citf_destroyClient(first);
            assert!(citf_getGlobalScapeClient().is_null());
            citf_destroyClient(second);

            let third = citf_createClient(key.as_ptr(), 0);
            assert_eq!(citf_getGlobalScapeClient(), third);
            citf_destroyClient(third);
            assert!(citf_getGlobalScapeClient().is_null());
        }
        assert_eq!(CREATE_DESTROY_CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_null_handles_are_ignored() {
        let null = std::ptr::null_mut();
        unsafe {
            assert!(citf_getDebugSession(null).is_null());
            citf_setLogConfig(null, 2, 1);
            citf_mockGPSCoordinates(null, 1.0, 2.0);
            citf_saveImages(null, true);
            citf_setSessionCallbacks(null, None, None, None);
            citf_getMeasurements(null);
            citf_setYChannelPtr(null, 0, 0, 0);
            citf_setCameraIntrinsics(null, 1.0, 1.0, 1.0, 1.0);
            citf_setDeviceInfo(null, std::ptr::null());
            citf_setClientStateCallbacks(null, None, None);
            citf_destroyClient(null);
            citf_log(3, std::ptr::null(), std::ptr::null());
        }
    }

    static UPDATED: Mutex<Option<CScapeMeasurements>> = Mutex::new(None);

    unsafe extern "system" fn store_updated(sm: CScapeMeasurements) {
        *UPDATED.lock().unwrap() = Some(sm);
    }

    #[test]
    fn test_stub_measurements_round_trip() {
        let expected = ScapeMeasurements {
            timestamp: 1_560_000_000.25,
            lat_lng: LatLng::new(51.5033, -0.1196),
            heading: 12.5,
            orientation: Orientation {
                x: 0.5,
                y: -0.5,
                z: 0.5,
                w: 0.5,
            },
            raw_height_estimate: 1.4,
            confidence_score: 3.75,
            status: MeasurementStatus::ResultsFound,
        };
        let client = Client::builder(ClientConfig::new("key"))
            .engine(MockEngine::returning(expected))
            .build()
            .unwrap();
        let handle = into_handle(client);

        unsafe {
            citf_setSessionCallbacks(handle, None, None, Some(store_updated));
            citf_getMeasurements(handle);
        }
        let received = wait_for(|| UPDATED.lock().unwrap().take());
        unsafe { citf_destroyClient(handle) };

        assert_eq!(received, CScapeMeasurements::from(expected));
        assert_eq!(ScapeMeasurements::from(received), expected);
    }

    static REPLACED_REQUESTED: AtomicUsize = AtomicUsize::new(0);
    static REPLACED_FIRST_UPDATED: AtomicUsize = AtomicUsize::new(0);
    static REPLACED_SECOND_UPDATED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "system" fn replaced_requested(_ts: c_int) {
        REPLACED_REQUESTED.fetch_add(1, Ordering::SeqCst);
    }
    unsafe extern "system" fn replaced_first_updated(_sm: CScapeMeasurements) {
        REPLACED_FIRST_UPDATED.fetch_add(1, Ordering::SeqCst);
    }
    unsafe extern "system" fn replaced_second_updated(_sm: CScapeMeasurements) {
        REPLACED_SECOND_UPDATED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_session_callbacks_replace_previous_set() {
        let client = Client::builder(ClientConfig::new("key"))
            .engine(MockEngine::at(LatLng::new(1.0, 1.0), 0.0))
            .build()
            .unwrap();
        let handle = into_handle(client);
        unsafe {
            citf_setSessionCallbacks(
                handle,
                Some(replaced_requested),
                None,
                Some(replaced_first_updated),
            );
            // A null entry in the new set clears the old one.
            citf_setSessionCallbacks(handle, None, None, Some(replaced_second_updated));
            citf_getMeasurements(handle);
        }
        // The requested callback runs before the update on the session
        // thread, so once the update lands the whole cycle is visible.
        wait_for(|| (REPLACED_SECOND_UPDATED.load(Ordering::SeqCst) > 0).then_some(()));
        unsafe { citf_destroyClient(handle) };

        assert_eq!(REPLACED_SECOND_UPDATED.load(Ordering::SeqCst), 1);
        assert_eq!(REPLACED_FIRST_UPDATED.load(Ordering::SeqCst), 0);
        assert_eq!(REPLACED_REQUESTED.load(Ordering::SeqCst), 0);
    }

    static ERRORS: Mutex<Vec<(c_int, String)>> = Mutex::new(Vec::new());

    unsafe extern "system" fn store_error(status: c_int, msg: *const c_char) {
        let msg = CStr::from_ptr(msg).to_string_lossy().into_owned();
        ERRORS.lock().unwrap().push((status, msg));
    }

    #[test]
    fn test_missing_frame_reports_image_error() {
        let handle = into_handle(Client::new(ClientConfig::new("key")).unwrap());
        unsafe {
            citf_setSessionCallbacks(handle, None, Some(store_error), None);
            citf_setYChannelPtr(handle, 0, 0, 0);
            citf_getMeasurements(handle);
        }
        let (status, msg) = wait_for(|| ERRORS.lock().unwrap().pop());
        unsafe { citf_destroyClient(handle) };

        assert_eq!(status, crate::SessionState::ImageSensorsError.as_raw());
        assert!(!msg.is_empty());
    }

    static PULL_LOCATION: Mutex<Option<CScapeMeasurements>> = Mutex::new(None);

    unsafe extern "system" fn fill_motion(mm: *mut CMotionMeasurements) {
        (*mm).gyro = [0.01, 0.02, 0.03];
        (*mm).gyro_timestamp = 99.0;
    }

    unsafe extern "system" fn fill_location(lm: *mut CLocationMeasurements) {
        (*lm).latitude = 37.7749;
        (*lm).longitude = -122.4194;
        (*lm).altitude = 16.0;
        (*lm).heading = 180.0;
        (*lm).course = 7;
    }

    unsafe extern "system" fn store_pulled(sm: CScapeMeasurements) {
        *PULL_LOCATION.lock().unwrap() = Some(sm);
    }

    #[test]
    fn test_pull_callbacks_fill_synchronously() {
        let provider = ForeignStateProvider {
            motion: Some(fill_motion),
            location: Some(fill_location),
        };
        let motion = provider.motion();
        assert_eq!(motion.gyro, [0.01, 0.02, 0.03]);
        assert_eq!(motion.gyro_timestamp, 99.0);
        let location = provider.location();
        assert_eq!(location.lat_lng, LatLng::new(37.7749, -122.4194));
        assert_eq!(location.course, 7);

        let empty = ForeignStateProvider {
            motion: None,
            location: None,
        };
        assert_eq!(empty.location(), LocationMeasurements::default());
    }

    #[test]
    fn test_measurement_uses_pulled_location_and_frame() {
        let frame = vec![128u8; 8 * 6];
        let handle = into_handle(Client::new(ClientConfig::new("key")).unwrap());
        unsafe {
            citf_setClientStateCallbacks(handle, Some(fill_motion), Some(fill_location));
            citf_setSessionCallbacks(handle, None, None, Some(store_pulled));
            citf_setCameraIntrinsics(handle, 500.0, 500.0, 4.0, 3.0);
            citf_setYChannelPtr(handle, frame.as_ptr() as i64, 8, 6);
            citf_getMeasurements(handle);
        }
        let m = wait_for(|| PULL_LOCATION.lock().unwrap().take());
        unsafe { citf_destroyClient(handle) };

        assert_eq!(m.latitude, 37.7749);
        assert_eq!(m.longitude, -122.4194);
        assert_eq!(m.raw_height_estimate, 16.0);
        assert_eq!(m.heading, 180.0);
        assert_eq!(m.measurements_status, MeasurementStatus::NoResults.as_raw());
    }

    #[test]
    fn test_debug_setters_last_write_wins() {
        let handle = into_handle(Client::new(ClientConfig::new("key").with_debug(true)).unwrap());
        unsafe {
            let debug = citf_getDebugSession(handle);
            assert!(!debug.is_null());
            assert_eq!(citf_getDebugSession(handle), debug);

            citf_mockGPSCoordinates(debug, 10.0, 20.0);
            citf_mockGPSCoordinates(debug, 30.0, 40.0);
            citf_saveImages(debug, true);
            citf_saveImages(debug, true);
            citf_setLogConfig(debug, 4, 5);
            citf_setLogConfig(debug, 42, 1);

            let session = debug_ref(debug).unwrap();
            assert_eq!(session.mocked_coordinates(), Some(LatLng::new(30.0, 40.0)));
            assert!(session.saves_images());
            assert_eq!(
                session.log_config(),
                (LogLevel::Warn, LogOutput::CONSOLE | LogOutput::OVERLAY)
            );

            citf_destroyClient(handle);
        }
    }

    #[test]
    fn test_device_info_through_boundary() {
        let long: String = std::iter::repeat("abcdefghij").take(30).collect();
        let mut info = DeviceInfo::default();
        info.id = FixedText::new(&long);
        info.model = FixedText::new("Pixel 3");
        info.write_directory = FixedText::new(&"d".repeat(255));

        let raw = CDeviceInfo::from(&info);
        assert_eq!(raw.id[255], 0);
        assert_eq!(raw.write_directory[254], b'd' as c_char);
        assert_eq!(raw.write_directory[255], 0);

        let handle = into_handle(Client::new(ClientConfig::new("key")).unwrap());
        unsafe {
            citf_setDeviceInfo(handle, &raw);
            let stored = client_ref(handle).unwrap().client.device_info().unwrap();
            assert_eq!(stored.id.as_str(), &long[..255]);
            assert_eq!(stored.model.as_str(), "Pixel 3");
            assert_eq!(stored.write_directory.as_str(), "d".repeat(255));
            citf_destroyClient(handle);
        }
    }

    #[test]
    fn test_geo_exports() {
        assert_eq!(_cellIdForWgs(0.0, 0.0, 30), 0x1000_0000_0000_0001);
        assert_eq!(_cellIdForWgs(0.0, 0.0, 99), _cellIdForWgs(0.0, 0.0, 30));
        assert_eq!(_cellIdForWgs(0.0, 0.0, -1), 1i64 << 60);
        assert!((_angleBetweenCoordinates(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!(_metersBetweenCoordinates(0.0, 0.0, 0.0, 1.0) > 111_000.0);

        let cell = _cellIdForWgs(51.5074, -0.1278, geo::S2_CELL_LEVEL as c_int);
        let mut local = [0.0f64; 3];
        let mut back = [0.0f64; 3];
        unsafe {
            _wgsToLocal(51.5075, -0.1277, 3.0, cell, local.as_mut_ptr());
            _localToWgs(local[0], local[1], local[2], cell, back.as_mut_ptr());
            _wgsToLocal(0.0, 0.0, 0.0, cell, std::ptr::null_mut());
        }
        assert!((back[0] - 51.5075).abs() < 1e-9);
        assert!((back[1] - -0.1277).abs() < 1e-9);
        assert_eq!(back[2], 3.0);
    }

    #[test]
    fn test_geo_exports_reject_bad_cell_ids() {
        for cell in [0, 1i64 << 62, i64::MIN, -1] {
            let mut local = [0.0f64; 3];
            let mut wgs = [0.0f64; 3];
            unsafe {
                _wgsToLocal(1.0, 2.0, 3.0, cell, local.as_mut_ptr());
                _localToWgs(1.0, 2.0, 3.0, cell, wgs.as_mut_ptr());
            }
            assert!(local.iter().chain(wgs.iter()).all(|v| v.is_nan()), "{:#x}", cell);
        }
    }

    #[test]
    fn test_log_forwarding_accepts_any_level() {
        let tag = CString::new("SCKUnity").unwrap();
        let msg = CString::new("hello from the host").unwrap();
        unsafe {
            citf_log(5, tag.as_ptr(), msg.as_ptr());
            citf_log(-3, std::ptr::null(), msg.as_ptr());
            citf_log(0, tag.as_ptr(), msg.as_ptr());
        }
    }
}
