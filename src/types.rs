/// WGS84 coordinates in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Unit quaternion in [x, y, z, w] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Build a quaternion from roll/pitch/yaw in radians (ZYX order),
    /// the convention device attitude readings use.
    pub fn from_euler(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();
        Self {
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
            w: cr * cp * cy + sr * sp * sy,
        }
    }
}

/// Result status of a Scape measurement.
///
/// The codes are owned by the measurement backend; values it does not
/// document are carried through as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStatus {
    NoResults,
    UnavailableArea,
    ResultsFound,
    InternalError,
    Other(i32),
}

impl MeasurementStatus {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::NoResults,
            1 => Self::UnavailableArea,
            2 => Self::ResultsFound,
            3 => Self::InternalError,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::NoResults => 0,
            Self::UnavailableArea => 1,
            Self::ResultsFound => 2,
            Self::InternalError => 3,
            Self::Other(code) => code,
        }
    }
}

/// Session state reported alongside a session error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoError,
    LocationSensorsError,
    MotionSensorsError,
    ImageSensorsError,
    LockingPositionError,
    AuthenticationError,
    NetworkError,
    UnexpectedError,
    Other(i32),
}

impl SessionState {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => Self::NoError,
            1 => Self::LocationSensorsError,
            2 => Self::MotionSensorsError,
            3 => Self::ImageSensorsError,
            4 => Self::LockingPositionError,
            5 => Self::AuthenticationError,
            6 => Self::NetworkError,
            7 => Self::UnexpectedError,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::LocationSensorsError => 1,
            Self::MotionSensorsError => 2,
            Self::ImageSensorsError => 3,
            Self::LockingPositionError => 4,
            Self::AuthenticationError => 5,
            Self::NetworkError => 6,
            Self::UnexpectedError => 7,
            Self::Other(code) => code,
        }
    }
}

/// Error delivered through the session-error callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub state: SessionState,
    pub message: String,
}

impl SessionError {
    pub fn new(state: SessionState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.state, self.message)
    }
}

/// A single, complete measurement result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScapeMeasurements {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub lat_lng: LatLng,
    /// Degrees clockwise from true north.
    pub heading: f64,
    pub orientation: Orientation,
    pub raw_height_estimate: f64,
    /// Backend-defined scale; not normalized here.
    pub confidence_score: f64,
    pub status: MeasurementStatus,
}

/// Raw IMU snapshot supplied by the host on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionMeasurements {
    pub acceleration: [f64; 3],
    pub acceleration_timestamp: f64,
    /// Acceleration with gravity removed.
    pub user_acceleration: [f64; 3],
    pub gyro: [f64; 3],
    pub gyro_timestamp: f64,
    pub magnetometer: [f64; 3],
    pub magnetometer_timestamp: f64,
    pub gravity: [f64; 3],
    /// [roll, pitch, yaw] in radians.
    pub attitude: [f64; 3],
}

/// GPS/compass snapshot supplied by the host on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationMeasurements {
    pub timestamp: f64,
    pub lat_lng: LatLng,
    pub coordinates_accuracy: f64,
    pub altitude: f64,
    pub altitude_accuracy: f64,
    pub heading: f64,
    pub heading_accuracy: f64,
    pub course: i64,
    pub speed: i64,
}

/// Pinhole calibration of the camera that produced the Y-plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraIntrinsics {
    pub x_focal_length: f64,
    pub y_focal_length: f64,
    pub x_principal_point: f64,
    pub y_principal_point: f64,
}

/// Verbosity of the native logging pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Verbose = 1,
    Debug = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
}

impl LogLevel {
    pub fn from_raw(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Verbose),
            2 => Some(Self::Debug),
            3 => Some(Self::Info),
            4 => Some(Self::Warn),
            5 => Some(Self::Error),
            _ => None,
        }
    }

    /// Parse a level name such as `"debug"` or `"LOG_WARN"`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.strip_prefix("log_").unwrap_or(&name) {
            "off" => Some(Self::Off),
            "verbose" | "trace" => Some(Self::Verbose),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Verbose => log::LevelFilter::Trace,
            Self::Debug => log::LevelFilter::Debug,
            Self::Info => log::LevelFilter::Info,
            Self::Warn => log::LevelFilter::Warn,
            Self::Error => log::LevelFilter::Error,
        }
    }

    /// The `log` level a message at this severity is emitted with.
    pub fn to_level(self) -> Option<log::Level> {
        self.to_level_filter().to_level()
    }
}

bitflags::bitflags! {
    /// Destinations of the native logging pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct LogOutput: u32 {
        const CONSOLE = 1 << 0;
        const FILE    = 1 << 1;
        /// In-memory buffer the host can draw as an on-screen overlay.
        const OVERLAY = 1 << 2;
        /// Accepted but not implemented.
        const NETWORK = 1 << 3;
        const CONSOLE_FILE = Self::CONSOLE.bits() | Self::FILE.bits();
        const ALL = Self::CONSOLE.bits()
            | Self::FILE.bits()
            | Self::OVERLAY.bits()
            | Self::NETWORK.bits();
    }
}
