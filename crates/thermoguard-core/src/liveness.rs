//! Thermal liveness detection via facial temperature topology.
//!
//! A live face has a characteristic heat map: the inner eye corners (close to
//! the carotid supply) read warmer than the nose tip, which is cooled by
//! breathing and sits furthest from the core. Left and right brows read at
//! roughly the same temperature. A printed photo or a phone screen held in
//! front of the optical camera shows up on the thermal camera as a flat,
//! room-temperature (or uniformly warm) surface with none of that structure.
//!
//! This module fuses the landmarks produced by the optical detector with the
//! co-registered thermal frame. It adds no inference and runs in constant time
//! per face.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs, phone/tablet replays, unheated masks.
//! - **Does not block:** Heated masks or attacks on a pair whose thermal camera
//!   is missing or desynchronized (those evaluations are skipped, see below).
//!
//! # Indeterminate results
//!
//! When the thermal signal cannot be assessed (no thermal frame, capture skew
//! over the limit, unreadable pixels) the verdict is *skipped* and `is_live`
//! follows the policy's [`FailMode`] for that category. Every default is
//! [`FailMode::Open`]: a degraded thermal sensor silently disables this
//! check. The [`Outcome`] always tells a skip apart from a genuine pass.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frame::FramePair;
use crate::reconcile::{Calibration, MappingParams};
use crate::sampler::ThermalSampler;
use crate::types::Landmarks;

/// What an indeterminate check resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// Treat as passed (allow).
    Open,
    /// Treat as failed (deny).
    Closed,
}

impl FailMode {
    pub fn allows(self) -> bool {
        matches!(self, FailMode::Open)
    }
}

impl FromStr for FailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailMode::Open),
            "closed" => Ok(FailMode::Closed),
            other => Err(format!("unknown fail mode '{other}' (expected open|closed)")),
        }
    }
}

/// The acceptance rule applied to the sampled temperatures. Exactly one rule
/// is active per policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceRule {
    /// Eyes warmer than the nose by `eye_nose_margin`, brows within
    /// `eyebrow_symmetry_bound` of each other.
    Gradient,
    /// `nose / eye_average >= nose_eye_ratio_min`.
    Ratio,
    /// Both `Gradient` conditions, each inner eye corner individually warmer
    /// than the nose, and periocular variance of at least
    /// `texture_variance_threshold`.
    ZoneTexture,
}

impl FromStr for AcceptanceRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gradient" => Ok(AcceptanceRule::Gradient),
            "ratio" => Ok(AcceptanceRule::Ratio),
            "zone_texture" => Ok(AcceptanceRule::ZoneTexture),
            other => Err(format!(
                "unknown acceptance rule '{other}' (expected gradient|ratio|zone_texture)"
            )),
        }
    }
}

/// Named, overridable thresholds for the thermal liveness check.
///
/// Calibration is camera- and environment-specific; every value here is
/// expected to be retuned per installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessPolicy {
    pub rule: AcceptanceRule,
    /// Maximum optical/thermal capture-time difference before the pair is
    /// considered desynchronized.
    pub max_sync_skew_ms: u64,
    /// Minimum `eye_average - nose` (intensity units).
    pub eye_nose_margin: f32,
    /// Maximum `|left_brow - right_brow|` (intensity units).
    pub eyebrow_symmetry_bound: f32,
    /// Minimum `nose / eye_average` for [`AcceptanceRule::Ratio`].
    pub nose_eye_ratio_min: f32,
    /// Minimum periocular intensity variance for [`AcceptanceRule::ZoneTexture`].
    pub texture_variance_threshold: f32,
    /// Faces with a smaller optical inter-ocular distance are too small to
    /// sample reliably and are rejected.
    pub min_interocular_px: f32,
    pub on_thermal_unavailable: FailMode,
    pub on_desynchronized: FailMode,
    pub on_read_failure: FailMode,
    pub on_undetermined: FailMode,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            rule: AcceptanceRule::Gradient,
            max_sync_skew_ms: 500,
            eye_nose_margin: 10.0,
            eyebrow_symmetry_bound: 15.0,
            nose_eye_ratio_min: 1.0,
            texture_variance_threshold: 25.0,
            min_interocular_px: 20.0,
            on_thermal_unavailable: FailMode::Open,
            on_desynchronized: FailMode::Open,
            on_read_failure: FailMode::Open,
            on_undetermined: FailMode::Open,
        }
    }
}

/// Why the thermal assessment was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ThermalUnavailable,
    Desynchronized,
    ReadFailed,
    /// A metric had no defined value (empty point set, zero ratio reference).
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Outcome {
    Passed,
    Rejected,
    Skipped(SkipReason),
}

/// A single acceptance condition that did not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    FaceTooSmall,
    EyeNoseMargin,
    EyebrowSymmetry,
    NoseEyeRatio,
    EyesWarmerThanNose,
    ZoneTexture,
}

/// Intermediate values of one evaluation, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LivenessMetrics {
    pub skew_ms: Option<u64>,
    pub interocular_px: Option<f32>,
    pub nose_temp: Option<f32>,
    pub left_eye_temp: Option<f32>,
    pub right_eye_temp: Option<f32>,
    pub left_brow_temp: Option<f32>,
    pub right_brow_temp: Option<f32>,
    pub eye_average: Option<f32>,
    pub eye_to_nose_diff: Option<f32>,
    pub eyebrow_diff: Option<f32>,
    pub nose_eye_ratio: Option<f32>,
    pub zone_variance: Option<f32>,
    /// Number of sampled landmarks that mapped outside the thermal frame.
    pub clamped_points: usize,
}

/// Result of a thermal liveness evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    /// Whether the face passed (true = likely live, or skipped fail-open).
    pub is_live: bool,
    pub outcome: Outcome,
    pub failed_checks: Vec<Check>,
    pub metrics: LivenessMetrics,
}

impl Verdict {
    fn skipped(reason: SkipReason, mode: FailMode, metrics: LivenessMetrics) -> Self {
        tracing::warn!(
            ?reason,
            fail_mode = ?mode,
            skew_ms = ?metrics.skew_ms,
            "thermal liveness skipped"
        );
        Self {
            is_live: mode.allows(),
            outcome: Outcome::Skipped(reason),
            failed_checks: Vec::new(),
            metrics,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped(_))
    }
}

/// Decide whether the face described by `landmarks` is a live human face,
/// using the thermal frame of `frames`.
///
/// Pure with respect to its inputs: identical arguments always produce an
/// identical verdict. `calibration` is read on every call so live offset
/// adjustments take effect on the next frame.
pub fn evaluate(
    landmarks: &Landmarks,
    frames: &FramePair,
    calibration: &Calibration,
    policy: &LivenessPolicy,
) -> Verdict {
    let mut metrics = LivenessMetrics::default();

    let Some(thermal) = frames.thermal.as_ref() else {
        return Verdict::skipped(
            SkipReason::ThermalUnavailable,
            policy.on_thermal_unavailable,
            metrics,
        );
    };

    let skew = frames.skew_ms().unwrap_or(0);
    metrics.skew_ms = Some(skew);
    if skew > policy.max_sync_skew_ms {
        return Verdict::skipped(
            SkipReason::Desynchronized,
            policy.on_desynchronized,
            metrics,
        );
    }

    let mapping = MappingParams::for_frames(&frames.optical, thermal, calibration);
    let nose_pt = mapping.map(landmarks.nose_tip());
    let left_eye_pt = mapping.map(landmarks.left_eye_inner());
    let right_eye_pt = mapping.map(landmarks.right_eye_inner());
    let left_brow_pts = mapping.map_all(landmarks.left_brow());
    let right_brow_pts = mapping.map_all(landmarks.right_brow());

    metrics.clamped_points = [nose_pt, left_eye_pt, right_eye_pt]
        .iter()
        .chain(&left_brow_pts)
        .chain(&right_brow_pts)
        .filter(|p| p.clamped)
        .count();

    let sampler = ThermalSampler::new(thermal);
    let nose = sampler.sample(nose_pt);
    let left_eye = sampler.sample(left_eye_pt);
    let right_eye = sampler.sample(right_eye_pt);
    let left_brow = sampler.average_sample(&left_brow_pts);
    let right_brow = sampler.average_sample(&right_brow_pts);

    metrics.nose_temp = Some(nose.value);
    metrics.left_eye_temp = Some(left_eye.value);
    metrics.right_eye_temp = Some(right_eye.value);
    metrics.left_brow_temp = left_brow.value;
    metrics.right_brow_temp = right_brow.value;

    let unreadable = !(nose.available && left_eye.available && right_eye.available)
        || left_brow.degraded
        || right_brow.degraded;
    if unreadable {
        return Verdict::skipped(SkipReason::ReadFailed, policy.on_read_failure, metrics);
    }

    let (Some(left_brow_temp), Some(right_brow_temp)) = (left_brow.value, right_brow.value) else {
        return Verdict::skipped(SkipReason::Undetermined, policy.on_undetermined, metrics);
    };

    let eye_average = (left_eye.value + right_eye.value) / 2.0;
    let eye_to_nose_diff = eye_average - nose.value;
    let eyebrow_diff = (left_brow_temp - right_brow_temp).abs();
    let interocular = landmarks.interocular_distance();
    metrics.eye_average = Some(eye_average);
    metrics.eye_to_nose_diff = Some(eye_to_nose_diff);
    metrics.eyebrow_diff = Some(eyebrow_diff);
    metrics.interocular_px = Some(interocular);

    let mut failed = Vec::new();
    if interocular < policy.min_interocular_px {
        failed.push(Check::FaceTooSmall);
    }

    match policy.rule {
        AcceptanceRule::Gradient => {
            gradient_checks(eye_to_nose_diff, eyebrow_diff, policy, &mut failed);
        }
        AcceptanceRule::Ratio => {
            if eye_average > 0.0 {
                let ratio = nose.value / eye_average;
                metrics.nose_eye_ratio = Some(ratio);
                if ratio < policy.nose_eye_ratio_min {
                    failed.push(Check::NoseEyeRatio);
                }
            } else if failed.is_empty() {
                return Verdict::skipped(SkipReason::Undetermined, policy.on_undetermined, metrics);
            }
        }
        AcceptanceRule::ZoneTexture => {
            gradient_checks(eye_to_nose_diff, eyebrow_diff, policy, &mut failed);
            if left_eye.value <= nose.value || right_eye.value <= nose.value {
                failed.push(Check::EyesWarmerThanNose);
            }
            let zone = mapping.map_all(landmarks.periocular_zone());
            // A check that already failed outranks an undetermined texture.
            match sampler.variance(&zone) {
                Some(variance) => {
                    metrics.zone_variance = Some(variance);
                    if variance < policy.texture_variance_threshold {
                        failed.push(Check::ZoneTexture);
                    }
                }
                None if failed.is_empty() => {
                    return Verdict::skipped(
                        SkipReason::Undetermined,
                        policy.on_undetermined,
                        metrics,
                    );
                }
                None => {}
            }
        }
    }

    let is_live = failed.is_empty();
    tracing::debug!(
        rule = ?policy.rule,
        is_live,
        nose = nose.value,
        left_eye = left_eye.value,
        right_eye = right_eye.value,
        left_brow = left_brow_temp,
        right_brow = right_brow_temp,
        eye_average,
        eye_to_nose_diff,
        eyebrow_diff,
        interocular,
        clamped_points = metrics.clamped_points,
        failed = ?failed,
        "thermal liveness evaluated"
    );

    Verdict {
        is_live,
        outcome: if is_live {
            Outcome::Passed
        } else {
            Outcome::Rejected
        },
        failed_checks: failed,
        metrics,
    }
}

fn gradient_checks(
    eye_to_nose_diff: f32,
    eyebrow_diff: f32,
    policy: &LivenessPolicy,
    failed: &mut Vec<Check>,
) {
    if eye_to_nose_diff < policy.eye_nose_margin {
        failed.push(Check::EyeNoseMargin);
    }
    if eyebrow_diff > policy.eyebrow_symmetry_bound {
        failed.push(Check::EyebrowSymmetry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuffer;
    use crate::types::{layout, Point, LANDMARK_COUNT};

    const OPTICAL_W: u32 = 640;
    const OPTICAL_H: u32 = 480;
    const THERMAL_W: u32 = 160;
    const THERMAL_H: u32 = 120;

    /// Synthetic frontal face in a 640x480 optical frame. With a 160x120
    /// thermal frame (scale 0.25, no offset) it maps to:
    /// left brow y=40 x∈[50,60], right brow y=40 x∈[90,100],
    /// left inner eye (65,50), right inner eye (90,50), nose tip (80,70).
    fn face() -> Landmarks {
        let mut points = vec![Point::new(320.0, 400.0); LANDMARK_COUNT];
        for (k, i) in layout::LEFT_BROW.enumerate() {
            points[i] = Point::new(200.0 + 10.0 * k as f32, 160.0);
        }
        for (k, i) in layout::RIGHT_BROW.enumerate() {
            points[i] = Point::new(360.0 + 10.0 * k as f32, 160.0);
        }
        let eye = [
            (0.0, 0.0),
            (13.0, -7.0),
            (27.0, -7.0),
            (40.0, 0.0),
            (27.0, 7.0),
            (13.0, 7.0),
        ];
        for (k, (dx, dy)) in eye.iter().enumerate() {
            points[layout::LEFT_EYE.start + k] = Point::new(220.0 + dx, 200.0 + dy);
            points[layout::RIGHT_EYE.start + k] = Point::new(360.0 + dx, 200.0 + dy);
        }
        for (k, i) in (27..36).enumerate() {
            points[i] = Point::new(320.0, 220.0 + 6.0 * k as f32);
        }
        points[layout::NOSE_TIP] = Point::new(320.0, 280.0);
        Landmarks::new(points).unwrap()
    }

    struct Heat {
        background: u8,
        nose: u8,
        left_eye: u8,
        right_eye: u8,
        left_brow: u8,
        right_brow: u8,
    }

    impl Heat {
        fn uniform(v: u8) -> Self {
            Self {
                background: v,
                nose: v,
                left_eye: v,
                right_eye: v,
                left_brow: v,
                right_brow: v,
            }
        }
    }

    fn thermal(heat: &Heat, timestamp_ms: u64) -> FrameBuffer {
        let mut pixels = vec![0u8; (THERMAL_W * THERMAL_H * 4) as usize];
        for y in 0..THERMAL_H {
            for x in 0..THERMAL_W {
                let red = match (x, y) {
                    (80, 70) => heat.nose,
                    (65, 50) => heat.left_eye,
                    (90, 50) => heat.right_eye,
                    (_, 40) if x < 80 => heat.left_brow,
                    (_, 40) => heat.right_brow,
                    _ => heat.background,
                };
                let i = ((y * THERMAL_W + x) * 4) as usize;
                pixels[i..i + 4].copy_from_slice(&[red, red, red, 255]);
            }
        }
        FrameBuffer::from_rgba(THERMAL_W, THERMAL_H, timestamp_ms, pixels).unwrap()
    }

    fn optical(timestamp_ms: u64) -> FrameBuffer {
        FrameBuffer::unreadable(OPTICAL_W, OPTICAL_H, timestamp_ms).unwrap()
    }

    fn live_heat() -> Heat {
        Heat {
            background: 40,
            nose: 100,
            left_eye: 150,
            right_eye: 150,
            left_brow: 130,
            right_brow: 130,
        }
    }

    fn run(heat: &Heat, policy: &LivenessPolicy) -> Verdict {
        let frames = FramePair::new(optical(1_000), Some(thermal(heat, 1_100)));
        evaluate(&face(), &frames, &Calibration::default(), policy)
    }

    #[test]
    fn warm_eyes_cool_nose_passes() {
        let verdict = run(&live_heat(), &LivenessPolicy::default());
        assert!(verdict.is_live);
        assert_eq!(verdict.outcome, Outcome::Passed);
        assert_eq!(verdict.metrics.nose_temp, Some(100.0));
        assert_eq!(verdict.metrics.eye_average, Some(150.0));
        assert_eq!(verdict.metrics.eye_to_nose_diff, Some(50.0));
        assert_eq!(verdict.metrics.eyebrow_diff, Some(0.0));
        assert_eq!(verdict.metrics.clamped_points, 0);
    }

    #[test]
    fn flat_surface_fails_margin() {
        let verdict = run(&Heat::uniform(120), &LivenessPolicy::default());
        assert!(!verdict.is_live);
        assert_eq!(verdict.outcome, Outcome::Rejected);
        assert_eq!(verdict.metrics.eye_to_nose_diff, Some(0.0));
        assert_eq!(verdict.failed_checks, vec![Check::EyeNoseMargin]);
    }

    #[test]
    fn asymmetric_brows_fail() {
        let heat = Heat {
            right_brow: 180,
            ..live_heat()
        };
        let verdict = run(&heat, &LivenessPolicy::default());
        assert!(!verdict.is_live);
        assert_eq!(verdict.metrics.eyebrow_diff, Some(50.0));
        assert_eq!(verdict.failed_checks, vec![Check::EyebrowSymmetry]);
    }

    #[test]
    fn margin_is_overridable() {
        let policy = LivenessPolicy {
            eye_nose_margin: 60.0,
            ..LivenessPolicy::default()
        };
        assert!(!run(&live_heat(), &policy).is_live);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let policy = LivenessPolicy::default();
        assert_eq!(run(&live_heat(), &policy), run(&live_heat(), &policy));
    }

    // Security-relevant: a missing thermal camera silently disables the check.
    #[test]
    fn missing_thermal_fails_open() {
        let frames = FramePair::new(optical(0), None);
        let verdict = evaluate(
            &face(),
            &frames,
            &Calibration::default(),
            &LivenessPolicy::default(),
        );
        assert!(verdict.is_live);
        assert_eq!(
            verdict.outcome,
            Outcome::Skipped(SkipReason::ThermalUnavailable)
        );
        assert!(verdict.is_skipped());
    }

    #[test]
    fn missing_thermal_honours_closed_mode() {
        let policy = LivenessPolicy {
            on_thermal_unavailable: FailMode::Closed,
            ..LivenessPolicy::default()
        };
        let frames = FramePair::new(optical(0), None);
        let verdict = evaluate(&face(), &frames, &Calibration::default(), &policy);
        assert!(!verdict.is_live);
        assert!(verdict.is_skipped());
    }

    // Security-relevant: a desynchronized pair is waved through.
    #[test]
    fn desynchronized_pair_fails_open() {
        let frames = FramePair::new(optical(1_000), Some(thermal(&Heat::uniform(120), 1_501)));
        let verdict = evaluate(
            &face(),
            &frames,
            &Calibration::default(),
            &LivenessPolicy::default(),
        );
        assert!(verdict.is_live);
        assert_eq!(verdict.outcome, Outcome::Skipped(SkipReason::Desynchronized));
        assert_eq!(verdict.metrics.skew_ms, Some(501));
    }

    #[test]
    fn skew_at_limit_is_still_evaluated() {
        let frames = FramePair::new(optical(1_500), Some(thermal(&Heat::uniform(120), 1_000)));
        let verdict = evaluate(
            &face(),
            &frames,
            &Calibration::default(),
            &LivenessPolicy::default(),
        );
        assert_eq!(verdict.outcome, Outcome::Rejected);
    }

    #[test]
    fn unreadable_thermal_fails_open_with_diagnostic() {
        let unreadable = FrameBuffer::unreadable(THERMAL_W, THERMAL_H, 1_000).unwrap();
        let frames = FramePair::new(optical(1_000), Some(unreadable));
        let verdict = evaluate(
            &face(),
            &frames,
            &Calibration::default(),
            &LivenessPolicy::default(),
        );
        assert!(verdict.is_live);
        assert_eq!(verdict.outcome, Outcome::Skipped(SkipReason::ReadFailed));
    }

    #[test]
    fn offsets_shift_sample_points() {
        // Shifting every point one thermal pixel right moves the nose sample
        // off the painted spot onto the background.
        let calibration = Calibration {
            offset_x: 1.0,
            offset_y: 0.0,
            scale: None,
        };
        let frames = FramePair::new(optical(0), Some(thermal(&live_heat(), 0)));
        let verdict = evaluate(&face(), &frames, &calibration, &LivenessPolicy::default());
        assert_eq!(verdict.metrics.nose_temp, Some(40.0));
    }

    #[test]
    fn bad_calibration_clamps_and_reports() {
        let calibration = Calibration {
            offset_x: 5_000.0,
            offset_y: 0.0,
            scale: None,
        };
        let frames = FramePair::new(optical(0), Some(thermal(&live_heat(), 0)));
        let verdict = evaluate(&face(), &frames, &calibration, &LivenessPolicy::default());
        assert_eq!(verdict.metrics.clamped_points, 13);
    }

    #[test]
    fn tiny_face_rejected() {
        let policy = LivenessPolicy {
            min_interocular_px: 500.0,
            ..LivenessPolicy::default()
        };
        let verdict = run(&live_heat(), &policy);
        assert!(!verdict.is_live);
        assert_eq!(verdict.failed_checks, vec![Check::FaceTooSmall]);
    }

    #[test]
    fn ratio_rule_uses_nose_over_eyes() {
        let policy = LivenessPolicy {
            rule: AcceptanceRule::Ratio,
            ..LivenessPolicy::default()
        };
        let warm_nose = Heat {
            nose: 160,
            ..live_heat()
        };
        let verdict = run(&warm_nose, &policy);
        assert!(verdict.is_live);
        assert!(verdict.metrics.nose_eye_ratio.unwrap() > 1.0);

        let verdict = run(&live_heat(), &policy);
        assert!(!verdict.is_live);
        assert_eq!(verdict.failed_checks, vec![Check::NoseEyeRatio]);
    }

    #[test]
    fn ratio_rule_with_cold_eyes_is_undetermined() {
        let policy = LivenessPolicy {
            rule: AcceptanceRule::Ratio,
            ..LivenessPolicy::default()
        };
        let verdict = run(&Heat::uniform(0), &policy);
        assert!(verdict.is_live);
        assert_eq!(verdict.outcome, Outcome::Skipped(SkipReason::Undetermined));
    }

    #[test]
    fn ratio_rule_keeps_face_size_rejection_when_undetermined() {
        let policy = LivenessPolicy {
            rule: AcceptanceRule::Ratio,
            min_interocular_px: 1_000.0,
            ..LivenessPolicy::default()
        };
        let verdict = run(&Heat::uniform(0), &policy);
        assert!(!verdict.is_live);
        assert_eq!(verdict.outcome, Outcome::Rejected);
        assert_eq!(verdict.failed_checks, vec![Check::FaceTooSmall]);
        assert_eq!(verdict.metrics.nose_eye_ratio, None);
    }

    #[test]
    fn zone_texture_requires_structure() {
        let policy = LivenessPolicy {
            rule: AcceptanceRule::ZoneTexture,
            ..LivenessPolicy::default()
        };
        let verdict = run(&live_heat(), &policy);
        assert!(verdict.is_live, "{verdict:?}");
        assert!(verdict.metrics.zone_variance.unwrap() >= 25.0);

        let verdict = run(&Heat::uniform(120), &policy);
        assert!(!verdict.is_live);
        assert_eq!(
            verdict.failed_checks,
            vec![
                Check::EyeNoseMargin,
                Check::EyesWarmerThanNose,
                Check::ZoneTexture
            ]
        );
    }

    #[test]
    fn rule_and_mode_parse_from_strings() {
        assert_eq!(
            "zone-texture".parse::<AcceptanceRule>(),
            Ok(AcceptanceRule::ZoneTexture)
        );
        assert_eq!(" Ratio ".parse::<AcceptanceRule>(), Ok(AcceptanceRule::Ratio));
        assert!("median".parse::<AcceptanceRule>().is_err());
        assert_eq!("CLOSED".parse::<FailMode>(), Ok(FailMode::Closed));
        assert!("maybe".parse::<FailMode>().is_err());
    }

    #[test]
    fn policy_deserializes_partially() {
        let policy: LivenessPolicy =
            serde_json::from_str(r#"{"rule":"zone_texture","eye_nose_margin":4.5}"#).unwrap();
        assert_eq!(policy.rule, AcceptanceRule::ZoneTexture);
        assert_eq!(policy.eye_nose_margin, 4.5);
        assert_eq!(policy.max_sync_skew_ms, 500);
        assert_eq!(policy.on_read_failure, FailMode::Open);
    }
}
