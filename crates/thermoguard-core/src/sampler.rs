use serde::Serialize;

use crate::frame::{FrameBuffer, RGBA_CHANNELS};
use crate::reconcile::ThermalPoint;

/// One temperature-proxy reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Red-channel intensity, 0 when the pixel could not be read.
    pub value: f32,
    pub available: bool,
}

impl Sample {
    const UNAVAILABLE: Sample = Sample {
        value: 0.0,
        available: false,
    };
}

/// Mean over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageSample {
    /// `None` when the point set was empty.
    pub value: Option<f32>,
    /// At least one contributing pixel could not be read.
    pub degraded: bool,
}

/// Reads the red channel of an RGBA thermal raster as a skin-temperature
/// proxy.
pub struct ThermalSampler<'a> {
    frame: &'a FrameBuffer,
}

impl<'a> ThermalSampler<'a> {
    pub fn new(frame: &'a FrameBuffer) -> Self {
        Self { frame }
    }

    pub fn sample(&self, point: ThermalPoint) -> Sample {
        let Some(pixels) = self.frame.pixels() else {
            tracing::debug!(x = point.x, y = point.y, "thermal pixels unreadable");
            return Sample::UNAVAILABLE;
        };

        if point.x >= self.frame.width() || point.y >= self.frame.height() {
            tracing::debug!(
                x = point.x,
                y = point.y,
                width = self.frame.width(),
                height = self.frame.height(),
                "thermal sample outside frame"
            );
            return Sample::UNAVAILABLE;
        }

        let index = (point.y as usize * self.frame.width() as usize + point.x as usize)
            * RGBA_CHANNELS;
        match pixels.get(index) {
            Some(&red) => Sample {
                value: f32::from(red),
                available: true,
            },
            None => Sample::UNAVAILABLE,
        }
    }

    pub fn average_sample(&self, points: &[ThermalPoint]) -> AverageSample {
        if points.is_empty() {
            return AverageSample {
                value: None,
                degraded: false,
            };
        }

        let mut total = 0.0f32;
        let mut degraded = false;
        for &p in points {
            let s = self.sample(p);
            degraded |= !s.available;
            total += s.value;
        }

        AverageSample {
            value: Some(total / points.len() as f32),
            degraded,
        }
    }

    /// Population variance of the samples, `None` for an empty set.
    pub fn variance(&self, points: &[ThermalPoint]) -> Option<f32> {
        if points.is_empty() {
            return None;
        }
        let values: Vec<f32> = points.iter().map(|&p| self.sample(p).value).collect();
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        Some(values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n)
    }
}
