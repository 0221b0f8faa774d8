//! Fitting camera-pair calibration from point correspondences.
//!
//! An operator marks the same physical feature (a heated target, a face
//! landmark) in both frames a few times. Each axis is fitted independently
//! with ordinary least squares: `thermal = scale * optical + offset`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::Calibration;
use crate::types::Point;

#[derive(Error, Debug, PartialEq)]
pub enum CalibrationError {
    #[error("need at least 2 correspondences, got {0}")]
    TooFewPairs(usize),
    #[error("optical {axis} coordinates are all identical; cannot fit a scale")]
    Degenerate { axis: &'static str },
    #[error("correspondence {0} contains a non-finite coordinate")]
    NonFinite(usize),
}

/// The same feature observed in both frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub optical: Point,
    pub thermal: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationFit {
    pub calibration: Calibration,
    /// Root-mean-square residual in thermal pixels.
    pub rms_error: f32,
}

pub fn fit_calibration(pairs: &[Correspondence]) -> Result<CalibrationFit, CalibrationError> {
    if pairs.len() < 2 {
        return Err(CalibrationError::TooFewPairs(pairs.len()));
    }
    if let Some(i) = pairs.iter().position(|c| {
        ![c.optical.x, c.optical.y, c.thermal.x, c.thermal.y]
            .iter()
            .all(|v| v.is_finite())
    }) {
        return Err(CalibrationError::NonFinite(i));
    }

    let xs: Vec<(f64, f64)> = pairs
        .iter()
        .map(|c| (f64::from(c.optical.x), f64::from(c.thermal.x)))
        .collect();
    let ys: Vec<(f64, f64)> = pairs
        .iter()
        .map(|c| (f64::from(c.optical.y), f64::from(c.thermal.y)))
        .collect();

    let (scale_x, offset_x) = fit_axis(&xs).ok_or(CalibrationError::Degenerate { axis: "x" })?;
    let (scale_y, offset_y) = fit_axis(&ys).ok_or(CalibrationError::Degenerate { axis: "y" })?;

    let sq_err: f64 = pairs
        .iter()
        .map(|c| {
            let dx = scale_x * f64::from(c.optical.x) + offset_x - f64::from(c.thermal.x);
            let dy = scale_y * f64::from(c.optical.y) + offset_y - f64::from(c.thermal.y);
            dx * dx + dy * dy
        })
        .sum();
    let rms_error = (sq_err / pairs.len() as f64).sqrt() as f32;

    tracing::info!(
        pairs = pairs.len(),
        scale_x,
        scale_y,
        offset_x,
        offset_y,
        rms_error,
        "calibration fitted"
    );

    Ok(CalibrationFit {
        calibration: Calibration {
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
            scale: Some((scale_x as f32, scale_y as f32)),
        },
        rms_error,
    })
}

fn fit_axis(samples: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = samples.len() as f64;
    let mean_o = samples.iter().map(|s| s.0).sum::<f64>() / n;
    let mean_t = samples.iter().map(|s| s.1).sum::<f64>() / n;
    let var_o: f64 = samples.iter().map(|s| (s.0 - mean_o).powi(2)).sum();
    if var_o < 1e-9 {
        return None;
    }
    let cov: f64 = samples
        .iter()
        .map(|s| (s.0 - mean_o) * (s.1 - mean_t))
        .sum();
    let scale = cov / var_o;
    Some((scale, mean_t - scale * mean_o))
}
