//! Recorded capture sessions as frame source and geometry extractor.
//!
//! A session directory holds `session.json` and the images it references:
//!
//! ```json
//! { "frames": [ { "optical": "0001_optical.png", "optical_timestamp_ms": 1000,
//!                 "thermal": "0001_thermal.png", "thermal_timestamp_ms": 1040,
//!                 "detection": { "bounding_box": {...}, "landmarks": [...],
//!                                "descriptor": [...] } } ] }
//! ```
//!
//! `detection` is whatever the external face model produced for the optical
//! frame; frames without one replay as "no face".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thermoguard_core::{
    CaptureError, Detection, DetectorError, FrameBuffer, FrameError, FramePair, FrameSource,
    GeometryExtractor,
};
use thiserror::Error;

pub const MANIFEST_NAME: &str = "session.json";

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid session manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid frame {path}: {source}")]
    Frame {
        path: PathBuf,
        #[source]
        source: FrameError,
    },
    #[error("duplicate optical timestamp {0} ms in session")]
    DuplicateTimestamp(u64),
}

#[derive(Debug, Deserialize)]
struct Manifest {
    frames: Vec<FrameEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct FrameEntry {
    optical: PathBuf,
    optical_timestamp_ms: u64,
    #[serde(default)]
    thermal: Option<PathBuf>,
    #[serde(default)]
    thermal_timestamp_ms: Option<u64>,
    #[serde(default)]
    detection: Option<Detection>,
}

/// Decode an image file into an RGBA frame buffer.
pub fn load_frame(path: &Path, timestamp_ms: u64) -> Result<FrameBuffer, ReplayError> {
    let img = image::open(path)
        .map_err(|source| ReplayError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let (width, height) = img.dimensions();
    FrameBuffer::from_rgba(width, height, timestamp_ms, img.into_raw()).map_err(|source| {
        ReplayError::Frame {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub struct ReplaySession {
    dir: PathBuf,
    frames: Vec<FrameEntry>,
}

impl ReplaySession {
    pub fn open(dir: &Path) -> Result<Self, ReplayError> {
        let path = dir.join(MANIFEST_NAME);
        let text = std::fs::read_to_string(&path).map_err(|source| ReplayError::Io {
            path: path.clone(),
            source,
        })?;
        let manifest: Manifest =
            serde_json::from_str(&text).map_err(|source| ReplayError::Manifest { path, source })?;

        let mut seen = std::collections::HashSet::new();
        for entry in &manifest.frames {
            if !seen.insert(entry.optical_timestamp_ms) {
                return Err(ReplayError::DuplicateTimestamp(entry.optical_timestamp_ms));
            }
        }

        tracing::info!(
            dir = %dir.display(),
            frames = manifest.frames.len(),
            with_thermal = manifest.frames.iter().filter(|f| f.thermal.is_some()).count(),
            "replay session opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            frames: manifest.frames,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Split into a frame source and the extractor that answers for its
    /// optical frames.
    pub fn into_parts(self) -> (ReplaySource, ReplayExtractor) {
        let detections = self
            .frames
            .iter()
            .filter_map(|f| {
                f.detection
                    .clone()
                    .map(|d| (f.optical_timestamp_ms, d))
            })
            .collect();
        (
            ReplaySource {
                dir: self.dir,
                entries: self.frames.into_iter(),
            },
            ReplayExtractor { detections },
        )
    }
}

pub struct ReplaySource {
    dir: PathBuf,
    entries: std::vec::IntoIter<FrameEntry>,
}

impl FrameSource for ReplaySource {
    fn next_pair(&mut self) -> Result<FramePair, CaptureError> {
        let entry = self.entries.next().ok_or(CaptureError::Exhausted)?;

        let optical = load_frame(&self.dir.join(&entry.optical), entry.optical_timestamp_ms)
            .map_err(|e| CaptureError::Failed(e.to_string()))?;

        let thermal = match &entry.thermal {
            Some(rel) => {
                let ts = entry
                    .thermal_timestamp_ms
                    .unwrap_or(entry.optical_timestamp_ms);
                Some(
                    load_frame(&self.dir.join(rel), ts)
                        .map_err(|e| CaptureError::Failed(e.to_string()))?,
                )
            }
            None => None,
        };

        Ok(FramePair::new(optical, thermal))
    }
}

/// Answers `detect` from the detections recorded in the session, keyed by
/// the optical frame's timestamp.
pub struct ReplayExtractor {
    detections: HashMap<u64, Detection>,
}

impl GeometryExtractor for ReplayExtractor {
    fn detect(&mut self, frame: &FrameBuffer) -> Result<Option<Detection>, DetectorError> {
        Ok(self.detections.get(&frame.timestamp_ms()).cloned())
    }
}
