//! Active liveness via eye-blink detection.
//!
//! Independent of the thermal path: a blink is a rapid closure and reopening
//! of both eyes, visible as a large frame-to-frame change in the
//! eye-aspect-ratio (EAR) of both eyes at once.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{Landmarks, Point};

/// Default minimum per-eye EAR change between consecutive frames.
pub const DEFAULT_BLINK_THRESHOLD: f32 = 0.2;
/// Default number of frames kept in the rolling history.
pub const DEFAULT_HISTORY_LEN: usize = 5;

/// Eye-aspect-ratio of both eyes in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeState {
    pub left: f32,
    pub right: f32,
}

impl EyeState {
    pub fn from_landmarks(landmarks: &Landmarks) -> Self {
        Self {
            left: eye_aspect_ratio(landmarks.left_eye()),
            right: eye_aspect_ratio(landmarks.right_eye()),
        }
    }
}

/// `|p1 - p5| / |p3 - p0|` over the six points of one eye, 0 for a
/// degenerate (zero-width) eye.
pub fn eye_aspect_ratio(eye: &[Point]) -> f32 {
    if eye.len() < 6 {
        return 0.0;
    }
    let vertical = eye[1].distance(&eye[5]);
    let horizontal = eye[3].distance(&eye[0]);
    if horizontal <= f32::EPSILON {
        return 0.0;
    }
    vertical / horizontal
}

/// Fixed-capacity FIFO of eye states; pushing past capacity evicts the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct EyeHistory {
    states: VecDeque<EyeState>,
    capacity: usize,
}

impl EyeHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            states: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, state: EyeState) {
        self.states.push_back(state);
        while self.states.len() > self.capacity {
            self.states.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Consecutive-frame changes, oldest first.
    pub fn deltas(&self) -> impl Iterator<Item = EyeState> + '_ {
        self.states
            .iter()
            .zip(self.states.iter().skip(1))
            .map(|(prev, curr)| EyeState {
                left: curr.left - prev.left,
                right: curr.right - prev.right,
            })
    }

    /// Changes between consecutive entries among the newest `frames` states.
    pub fn recent_deltas(&self, frames: usize) -> impl Iterator<Item = EyeState> + '_ {
        let skip = self.states.len().saturating_sub(frames);
        self.deltas().skip(skip)
    }
}

/// Per-stream blink detector. Owns its history; one instance per camera.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    history: EyeHistory,
    threshold: f32,
}

impl Default for BlinkDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BLINK_THRESHOLD, DEFAULT_HISTORY_LEN)
    }
}

impl BlinkDetector {
    pub fn new(threshold: f32, history_len: usize) -> Self {
        Self {
            history: EyeHistory::new(history_len),
            threshold,
        }
    }

    /// Record this frame's eye state and report whether a blink occurred
    /// anywhere in the current window.
    pub fn check(&mut self, landmarks: &Landmarks) -> bool {
        self.observe(EyeState::from_landmarks(landmarks))
    }

    pub fn observe(&mut self, state: EyeState) -> bool {
        self.history.push(state);
        let blinked = self.blinked_within(usize::MAX);
        if blinked {
            tracing::debug!(left = state.left, right = state.right, "blink observed");
        }
        blinked
    }

    /// Whether a blink shows up between the newest `frames` observations
    /// only, ignoring older entries still in the window.
    pub fn blinked_within(&self, frames: usize) -> bool {
        let threshold = self.threshold;
        self.history
            .recent_deltas(frames)
            .any(|d| d.left.abs() > threshold && d.right.abs() > threshold)
    }

    pub fn history(&self) -> &EyeHistory {
        &self.history
    }
}
