use std::ffi::c_char;

/// Capacity of each device info text field, terminator included.
pub const SMALL_STRING_SIZE: usize = 256;

/// Text bounded to `N - 1` bytes of UTF-8 so it always fits a
/// NUL-terminated `[c_char; N]` buffer.
///
/// Longer input is truncated silently at the last char boundary that fits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FixedText<const N: usize> {
    text: String,
}

impl<const N: usize> FixedText<N> {
    /// Maximum number of visible bytes.
    pub const MAX_LEN: usize = N - 1;

    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(Self::MAX_LEN);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: s[..end].to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Flatten into a NUL-terminated C buffer.
    pub fn to_c_buf(&self) -> [c_char; N] {
        let mut buf = [0 as c_char; N];
        for (dst, &b) in buf.iter_mut().zip(self.text.as_bytes()) {
            *dst = b as c_char;
        }
        buf
    }

    /// Read a C buffer up to the first NUL (or the whole buffer if none).
    /// Invalid UTF-8 is replaced.
    pub fn from_c_buf(buf: &[c_char; N]) -> Self {
        let end = buf.iter().position(|&c| c == 0).unwrap_or(N);
        let bytes: Vec<u8> = buf[..end].iter().map(|&c| c as u8).collect();
        Self::new(&String::from_utf8_lossy(&bytes))
    }
}

impl<const N: usize> From<&str> for FixedText<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> std::fmt::Display for FixedText<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

pub type SmallString = FixedText<SMALL_STRING_SIZE>;

/// Identification of the host device, supplied once per client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: SmallString,
    pub platform: SmallString,
    pub model: SmallString,
    pub os: SmallString,
    pub os_version: SmallString,
    pub api_version: SmallString,
    /// Directory the SDK may write logs and saved frames into.
    pub write_directory: SmallString,
    pub sdk_version: SmallString,
}

impl DeviceInfo {
    /// Device info describing the current process, with `sdk_version`
    /// set to this crate's version.
    pub fn for_current_process() -> Self {
        let write_directory = std::env::temp_dir();
        Self {
            id: SmallString::default(),
            platform: SmallString::new(std::env::consts::OS),
            model: SmallString::new(std::env::consts::ARCH),
            os: SmallString::new(std::env::consts::OS),
            os_version: SmallString::new(std::env::consts::FAMILY),
            api_version: SmallString::default(),
            write_directory: SmallString::new(&write_directory.to_string_lossy()),
            sdk_version: SmallString::new(env!("CARGO_PKG_VERSION")),
        }
    }

    /// `write_directory` as a path, if one was supplied.
    pub fn write_dir(&self) -> Option<std::path::PathBuf> {
        if self.write_directory.is_empty() {
            None
        } else {
            Some(std::path::PathBuf::from(self.write_directory.as_str()))
        }
    }
}
