//! Captured video frames.

/// One RGB24 image as delivered by a frame source.
///
/// Frames are owned by the capture loop for a single iteration and dropped
/// once the landmark source has run on them.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic per-source counter, starting at 1.
    pub sequence: u64,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            sequence,
        }
    }

    /// Packed RGB bytes, row-major, `width * height * 3` long for real devices.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Expected byte length for a packed RGB24 frame of this size.
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }
}
