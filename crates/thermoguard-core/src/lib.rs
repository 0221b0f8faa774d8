pub mod blink;
pub mod calibration;
pub mod detector;
pub mod frame;
pub mod liveness;
pub mod reconcile;
pub mod sampler;
pub mod types;

pub use blink::{BlinkDetector, EyeState};
pub use calibration::{fit_calibration, CalibrationFit, Correspondence};
pub use detector::{CaptureError, DetectorError, FrameSource, GeometryExtractor};
pub use frame::{FrameBuffer, FrameError, FramePair};
pub use liveness::{evaluate, AcceptanceRule, FailMode, LivenessPolicy, Outcome, Verdict};
pub use reconcile::{Calibration, MappingParams, ThermalPoint};
pub use sampler::ThermalSampler;
pub use types::{BoundingBox, Descriptor, Detection, Landmarks, Point};
