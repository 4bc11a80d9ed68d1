use crate::{Result, ScapeError};
use std::io::Write;
use std::path::Path;

/// An owned copy of the luminance (Y) plane of a camera frame.
///
/// Exactly `width * height` bytes, one per pixel, row-major with no
/// row padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<LumaFrame> {
        let expected = width as usize * height as usize;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(ScapeError::InvalidFrame {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(LumaFrame {
            width,
            height,
            data,
        })
    }

    /// Copy a frame out of a host-owned buffer.
    ///
    /// # Safety
    /// `ptr` must be valid for reads of `width * height` bytes for the
    /// duration of the call.
    pub(crate) unsafe fn copy_from_raw(
        ptr: *const u8,
        width: u32,
        height: u32,
    ) -> Result<LumaFrame> {
        let len = width as usize * height as usize;
        if ptr.is_null() || len == 0 {
            return Err(ScapeError::InvalidFrame {
                width,
                height,
                len: 0,
            });
        }
        let data = std::slice::from_raw_parts(ptr, len).to_vec();
        LumaFrame::new(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Pixel value at (x, y), or None outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Write the frame as a binary greyscale PGM (P5) image.
    pub fn write_pgm(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut out = std::io::BufWriter::new(file);
        write!(out, "P5\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(&self.data)?;
        out.flush()?;
        Ok(())
    }
}
