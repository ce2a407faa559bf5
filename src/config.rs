// Arm geometry, timing and pen configuration
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

// Arm geometry (drawing units, the same units G-code coordinates are given in)
// Horizontal offset of the shared shoulder axis from the drawing origin
pub const SHOULDER_OFFSET: f64 = 0.0;
// Height of the shoulder axis above the drawing origin
pub const SHOULDER_HEIGHT: f64 = 250.0;
// Length of each of the two equal link segments
pub const LINK_LENGTH: f64 = 200.0;

// 200 steps/rev * 16 microsteps * 4.5:1 pulley reduction / 360 deg
pub const STEPS_PER_DEGREE: f64 = 40.0;

// Step pacing: the busier motor steps at this interval
pub const MIN_STEP_DELAY_US: u64 = 250;

// Arcs are split into chords no longer than this
pub const MAX_CHORD_LENGTH: f64 = 2.0;
// Arc centre offsets beyond this are treated as malformed input
pub const ARC_OFFSET_LIMIT: f64 = 100.0;

// Pen servo (PWM duty cycle, 0-255) and settle time after each change
pub const PEN_UP_DUTY: u8 = 16;
pub const PEN_DOWN_DUTY: u8 = 24;
pub const PEN_SETTLE_MS: u64 = 250;

// Longest accepted command line, in bytes (excluding the newline)
pub const MAX_LINE_LEN: usize = 128;

// Step bridge serial link
pub const BRIDGE_BAUDRATE: u32 = 115_200;

/// Fixed arm geometry and motion limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub shoulder_offset: f64,
    pub shoulder_height: f64,
    pub link_length: f64,
    pub steps_per_degree: f64,
    pub min_step_delay_us: u64,
    pub max_chord_length: f64,
    pub arc_offset_limit: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            shoulder_offset: SHOULDER_OFFSET,
            shoulder_height: SHOULDER_HEIGHT,
            link_length: LINK_LENGTH,
            steps_per_degree: STEPS_PER_DEGREE,
            min_step_delay_us: MIN_STEP_DELAY_US,
            max_chord_length: MAX_CHORD_LENGTH,
            arc_offset_limit: ARC_OFFSET_LIMIT,
        }
    }
}

/// Pen lift servo settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenConfig {
    pub up_duty: u8,
    pub down_duty: u8,
    pub settle_ms: u64,
}

impl Default for PenConfig {
    fn default() -> Self {
        Self {
            up_duty: PEN_UP_DUTY,
            down_duty: PEN_DOWN_DUTY,
            settle_ms: PEN_SETTLE_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterConfig {
    pub geometry: GeometryConfig,
    pub pen: PenConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

fn require(ok: bool, field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason })
    }
}

impl GeometryConfig {
    /// Reject values the kinematics or arc segmentation cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            self.shoulder_offset.is_finite(),
            "shoulder_offset",
            "must be finite",
        )?;
        require(
            self.shoulder_height.is_finite(),
            "shoulder_height",
            "must be finite",
        )?;
        require(
            self.link_length.is_finite() && self.link_length > 0.0,
            "link_length",
            "must be positive",
        )?;
        require(
            self.steps_per_degree.is_finite() && self.steps_per_degree > 0.0,
            "steps_per_degree",
            "must be positive",
        )?;
        require(
            self.max_chord_length.is_finite() && self.max_chord_length > 0.0,
            "max_chord_length",
            "must be positive",
        )?;
        require(
            self.arc_offset_limit.is_finite() && self.arc_offset_limit >= 0.0,
            "arc_offset_limit",
            "must be zero or positive",
        )
    }
}

impl PlotterConfig {
    /// Load a config from a JSON file. Missing keys fall back to the defaults above.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.geometry.validate()?;
        Ok(config)
    }
}
