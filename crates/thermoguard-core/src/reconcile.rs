//! Optical → thermal coordinate reconciliation.
//!
//! The two cameras of a pair are not co-located and rarely share a
//! resolution. A landmark found in the optical frame is carried into the
//! thermal frame with a per-axis linear map: scale by the resolution ratio,
//! then shift by an empirically calibrated offset.

use serde::{Deserialize, Serialize};

use crate::frame::FrameBuffer;
use crate::types::Point;

/// Per-camera-pair calibration, adjustable at runtime.
///
/// When `scale` is `None` the scale factors are derived from the current
/// frame dimensions (`thermal / optical`) on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    pub offset_x: f32,
    pub offset_y: f32,
    #[serde(default)]
    pub scale: Option<(f32, f32)>,
}

/// Fully resolved mapping for one optical/thermal frame pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingParams {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Thermal frame width in pixels.
    pub width: u32,
    /// Thermal frame height in pixels.
    pub height: u32,
}

/// A point in thermal pixel space, guaranteed to lie inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThermalPoint {
    pub x: u32,
    pub y: u32,
    /// The mapped coordinate fell outside the thermal frame and was clamped.
    pub clamped: bool,
}

impl MappingParams {
    /// Resolve the mapping from the frames' current dimensions.
    pub fn for_frames(
        optical: &FrameBuffer,
        thermal: &FrameBuffer,
        calibration: &Calibration,
    ) -> Self {
        let (scale_x, scale_y) = calibration.scale.unwrap_or((
            thermal.width() as f32 / optical.width() as f32,
            thermal.height() as f32 / optical.height() as f32,
        ));
        Self {
            scale_x,
            scale_y,
            offset_x: calibration.offset_x,
            offset_y: calibration.offset_y,
            width: thermal.width(),
            height: thermal.height(),
        }
    }

    /// Map an optical-space point into the thermal frame, rounding to the
    /// nearest pixel and clamping into `[0, width-1] x [0, height-1]`.
    pub fn map(&self, point: Point) -> ThermalPoint {
        let (x, x_clamped) = clamp_axis(point.x * self.scale_x + self.offset_x, self.width);
        let (y, y_clamped) = clamp_axis(point.y * self.scale_y + self.offset_y, self.height);
        let clamped = x_clamped || y_clamped;
        if clamped {
            tracing::warn!(
                optical_x = point.x,
                optical_y = point.y,
                thermal_x = x,
                thermal_y = y,
                width = self.width,
                height = self.height,
                "mapped point outside thermal frame, clamped (check pair calibration)"
            );
        }
        ThermalPoint { x, y, clamped }
    }

    pub fn map_all(&self, points: &[Point]) -> Vec<ThermalPoint> {
        points.iter().map(|&p| self.map(p)).collect()
    }
}

fn clamp_axis(value: f32, extent: u32) -> (u32, bool) {
    let max = extent.saturating_sub(1);
    // Halves round toward +inf, so -0.5 lands on 0 rather than -1.
    let rounded = (value + 0.5).floor();
    if !rounded.is_finite() {
        return (0, true);
    }
    if rounded < 0.0 {
        (0, true)
    } else if rounded > max as f32 {
        (max, true)
    } else {
        (rounded as u32, false)
    }
}
