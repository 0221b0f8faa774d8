use thiserror::Error;

/// Bytes per pixel of the RGBA rasters handed to the core.
pub const RGBA_CHANNELS: usize = 4;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("frame has zero area ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("RGBA buffer length {got} does not match {width}x{height} (expected {expected})")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
}

/// One captured raster: RGBA pixels, dimensions and capture time.
///
/// `pixels` is `None` when the raster exists but could not be read back
/// (restricted access to the source surface). Samplers treat that as
/// unavailable data rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    timestamp_ms: u64,
    pixels: Option<Vec<u8>>,
}

impl FrameBuffer {
    pub fn from_rgba(
        width: u32,
        height: u32,
        timestamp_ms: u64,
        pixels: Vec<u8>,
    ) -> Result<Self, FrameError> {
        check_area(width, height)?;
        let expected = width as usize * height as usize * RGBA_CHANNELS;
        if pixels.len() != expected {
            return Err(FrameError::LengthMismatch {
                width,
                height,
                expected,
                got: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            timestamp_ms,
            pixels: Some(pixels),
        })
    }

    /// A frame whose pixel data is not readable.
    pub fn unreadable(width: u32, height: u32, timestamp_ms: u64) -> Result<Self, FrameError> {
        check_area(width, height)?;
        Ok(Self {
            width,
            height,
            timestamp_ms,
            pixels: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }
}

fn check_area(width: u32, height: u32) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::Empty { width, height });
    }
    Ok(())
}

/// Optical frame plus the co-registered thermal frame, when the camera pair
/// has one.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePair {
    pub optical: FrameBuffer,
    pub thermal: Option<FrameBuffer>,
}

impl FramePair {
    pub fn new(optical: FrameBuffer, thermal: Option<FrameBuffer>) -> Self {
        Self { optical, thermal }
    }

    /// Absolute capture-time difference, or `None` without a thermal frame.
    pub fn skew_ms(&self) -> Option<u64> {
        self.thermal
            .as_ref()
            .map(|t| t.timestamp_ms().abs_diff(self.optical.timestamp_ms()))
    }
}
