use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the iBUG-68 landmark layout.
pub const LANDMARK_COUNT: usize = 68;
/// Length of the identity descriptor produced by the recognition model.
pub const DESCRIPTOR_DIM: usize = 128;

#[derive(Error, Debug, PartialEq)]
pub enum ShapeError {
    #[error("invalid landmark count: {0} (expected 68)")]
    LandmarkCount(usize),
    #[error("invalid descriptor dimension: {0} (expected 128)")]
    DescriptorDim(usize),
    #[error("invalid descriptor value (NaN/Inf)")]
    DescriptorValue,
    #[error("invalid landmark {0} (NaN/Inf coordinate)")]
    LandmarkValue(usize),
}

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned face box in optical pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Index ranges of the iBUG-68 layout used by the liveness checks.
pub mod layout {
    use std::ops::Range;

    pub const LEFT_BROW: Range<usize> = 17..22;
    pub const RIGHT_BROW: Range<usize> = 22..27;
    pub const NOSE_TIP: usize = 30;
    pub const LEFT_EYE: Range<usize> = 36..42;
    pub const RIGHT_EYE: Range<usize> = 42..48;
    /// Inner corner of the image-left eye (nearest the nose bridge).
    pub const LEFT_EYE_INNER: usize = 39;
    /// Inner corner of the image-right eye.
    pub const RIGHT_EYE_INNER: usize = 42;
    /// Brows, nose bridge and both eyes.
    pub const PERIOCULAR_ZONE: Range<usize> = 17..48;
}

/// The 68 facial landmarks of one detected face, in the extractor's
/// fixed index order. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks {
    points: Vec<Point>,
}

impl Landmarks {
    pub fn new(points: Vec<Point>) -> Result<Self, ShapeError> {
        if points.len() != LANDMARK_COUNT {
            return Err(ShapeError::LandmarkCount(points.len()));
        }
        if let Some(idx) = points
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite()))
        {
            return Err(ShapeError::LandmarkValue(idx));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn nose_tip(&self) -> Point {
        self.points[layout::NOSE_TIP]
    }

    pub fn left_eye_inner(&self) -> Point {
        self.points[layout::LEFT_EYE_INNER]
    }

    pub fn right_eye_inner(&self) -> Point {
        self.points[layout::RIGHT_EYE_INNER]
    }

    pub fn left_brow(&self) -> &[Point] {
        &self.points[layout::LEFT_BROW]
    }

    pub fn right_brow(&self) -> &[Point] {
        &self.points[layout::RIGHT_BROW]
    }

    pub fn left_eye(&self) -> &[Point] {
        &self.points[layout::LEFT_EYE]
    }

    pub fn right_eye(&self) -> &[Point] {
        &self.points[layout::RIGHT_EYE]
    }

    pub fn periocular_zone(&self) -> &[Point] {
        &self.points[layout::PERIOCULAR_ZONE]
    }

    /// Distance between the two eye centres (mean of each eye's six points).
    pub fn interocular_distance(&self) -> f32 {
        centroid(self.left_eye()).distance(&centroid(self.right_eye()))
    }
}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = ShapeError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.points
    }
}

fn centroid(points: &[Point]) -> Point {
    let n = points.len().max(1) as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

/// Opaque 128-dimensional identity embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, ShapeError> {
        if values.len() != DESCRIPTOR_DIM {
            return Err(ShapeError::DescriptorDim(values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ShapeError::DescriptorValue);
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = ShapeError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Descriptor> for Vec<f32> {
    fn from(descriptor: Descriptor) -> Self {
        descriptor.values
    }
}

/// One face found by the geometry extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub landmarks: Landmarks,
    pub descriptor: Descriptor,
}
