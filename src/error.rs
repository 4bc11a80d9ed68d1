use std::fmt;

/// Errors that can occur when creating or driving a Scape client.
#[derive(Debug, thiserror::Error)]
pub enum ScapeError {
    #[error("API key is empty")]
    MissingApiKey,

    #[error("API key is not valid UTF-8")]
    InvalidApiKey,

    #[error("Invalid frame: {width}x{height} with {len} bytes")]
    InvalidFrame { width: u32, height: u32, len: usize },

    #[error("Failed to spawn session thread: {0}")]
    Spawn(std::io::Error),

    #[error("Session stopped")]
    SessionStopped,

    #[error("Timeout waiting for session event")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &ScapeError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
