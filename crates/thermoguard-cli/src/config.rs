use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;
use thermoguard_client::DEFAULT_BASE_URL;
use thermoguard_core::blink::{DEFAULT_BLINK_THRESHOLD, DEFAULT_HISTORY_LEN};
use thermoguard_core::{Calibration, LivenessPolicy};

/// Client configuration, loaded from environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Base URL of the registration/verification API.
    pub api_base_url: String,
    /// Timeout in seconds for one API call.
    pub api_timeout_secs: u64,
    /// Optical → thermal mapping for the active camera pair.
    pub calibration: Calibration,
    /// Whether the thermal liveness check runs at all. Only the exact value
    /// `0` disables it; any other value (including `false`) leaves it on.
    pub liveness_enabled: bool,
    pub policy: LivenessPolicy,
    /// Minimum per-eye EAR change counted as a blink.
    pub blink_threshold: f32,
    /// Number of frames in the blink history window.
    pub blink_window: usize,
    /// Whether register/verify additionally require an observed blink. Any
    /// value other than `0` turns this on, so `false` enables it too.
    pub require_blink: bool,
    /// Frames captured per register/verify attempt.
    pub frames_per_request: usize,
}

impl Config {
    /// Load configuration from `THERMOGUARD_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| var(key).and_then(|v| v.trim().parse::<f32>().ok());

        let scale = match (parse("THERMOGUARD_SCALE_X"), parse("THERMOGUARD_SCALE_Y")) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        };

        let defaults = LivenessPolicy::default();
        let policy = LivenessPolicy {
            rule: lookup(&var, "THERMOGUARD_RULE", defaults.rule),
            max_sync_skew_ms: lookup(&var, "THERMOGUARD_MAX_SYNC_SKEW_MS", defaults.max_sync_skew_ms),
            eye_nose_margin: lookup(&var, "THERMOGUARD_EYE_NOSE_MARGIN", defaults.eye_nose_margin),
            eyebrow_symmetry_bound: lookup(
                &var,
                "THERMOGUARD_EYEBROW_SYMMETRY_BOUND",
                defaults.eyebrow_symmetry_bound,
            ),
            nose_eye_ratio_min: lookup(
                &var,
                "THERMOGUARD_NOSE_EYE_RATIO_MIN",
                defaults.nose_eye_ratio_min,
            ),
            texture_variance_threshold: lookup(
                &var,
                "THERMOGUARD_TEXTURE_VARIANCE_THRESHOLD",
                defaults.texture_variance_threshold,
            ),
            min_interocular_px: lookup(
                &var,
                "THERMOGUARD_MIN_INTEROCULAR_PX",
                defaults.min_interocular_px,
            ),
            on_thermal_unavailable: lookup(
                &var,
                "THERMOGUARD_ON_THERMAL_UNAVAILABLE",
                defaults.on_thermal_unavailable,
            ),
            on_desynchronized: lookup(
                &var,
                "THERMOGUARD_ON_DESYNCHRONIZED",
                defaults.on_desynchronized,
            ),
            on_read_failure: lookup(&var, "THERMOGUARD_ON_READ_FAILURE", defaults.on_read_failure),
            on_undetermined: lookup(&var, "THERMOGUARD_ON_UNDETERMINED", defaults.on_undetermined),
        };

        Self {
            api_base_url: var("THERMOGUARD_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_timeout_secs: lookup(&var, "THERMOGUARD_API_TIMEOUT_SECS", 10),
            calibration: Calibration {
                offset_x: lookup(&var, "THERMOGUARD_OFFSET_X", 0.0),
                offset_y: lookup(&var, "THERMOGUARD_OFFSET_Y", 0.0),
                scale,
            },
            liveness_enabled: var("THERMOGUARD_LIVENESS_ENABLED")
                .map(|v| v != "0")
                .unwrap_or(true),
            policy,
            blink_threshold: lookup(&var, "THERMOGUARD_BLINK_THRESHOLD", DEFAULT_BLINK_THRESHOLD),
            blink_window: lookup(&var, "THERMOGUARD_BLINK_WINDOW", DEFAULT_HISTORY_LEN),
            require_blink: var("THERMOGUARD_REQUIRE_BLINK")
                .map(|v| v != "0")
                .unwrap_or(false),
            frames_per_request: lookup(&var, "THERMOGUARD_FRAMES_PER_REQUEST", 3),
        }
    }
}

fn lookup<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match var(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparseable setting, using default");
                default
            }
        },
        None => default,
    }
}

/// Read a liveness policy from a TOML file. Missing keys take their defaults.
pub fn load_policy(path: &Path) -> Result<LivenessPolicy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid policy file {}", path.display()))
}
