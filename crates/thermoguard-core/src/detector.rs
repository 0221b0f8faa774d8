//! Seams to the external vision model and camera pair.

use thiserror::Error;

use crate::frame::{FrameBuffer, FramePair};
use crate::types::Detection;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("face model unavailable: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source exhausted")]
    Exhausted,
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Face detection + landmarking + descriptor extraction, treated as a black
/// box. `Ok(None)` means the frame was processed and contained no face.
pub trait GeometryExtractor {
    fn detect(&mut self, frame: &FrameBuffer) -> Result<Option<Detection>, DetectorError>;
}

/// Delivers optical (and, when present, thermal) frames with capture
/// timestamps. Transport is the implementor's concern.
pub trait FrameSource {
    fn next_pair(&mut self) -> Result<FramePair, CaptureError>;
}
