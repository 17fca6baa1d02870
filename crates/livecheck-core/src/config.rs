use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::challenge::ChallengeType;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must lie within [0, 1] (got {value})")]
    OutOfUnitRange { name: &'static str, value: f32 },
    #[error("{name} must be a finite positive number (got {value})")]
    NotPositive { name: &'static str, value: f32 },
    #[error("{open} ({open_value}) must be greater than {closed} ({closed_value})")]
    InvertedThresholds {
        open: &'static str,
        open_value: f32,
        closed: &'static str,
        closed_value: f32,
    },
    #[error("{name} must be non-zero")]
    ZeroCapacity { name: &'static str },
    #[error("session duration must be at least one second")]
    ZeroSessionDuration,
}

/// Immutable parameter bundle threaded through every component.
///
/// Deserializable from TOML/JSON with any subset of fields; missing fields
/// take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Session age after which the session is discarded and regenerated.
    pub max_session_duration_secs: u64,
    /// Minimum face width as a fraction of the guide oval width.
    pub min_face_size: f32,
    /// Maximum face width as a fraction of the guide oval width.
    pub max_face_size: f32,
    /// Allowed horizontal offset of the face centre, as a fraction of frame width.
    pub centering_tolerance_x: f32,
    /// Allowed vertical offset of the face centre, as a fraction of frame height.
    pub centering_tolerance_y: f32,
    pub eye_open_threshold: f32,
    pub eye_closed_threshold: f32,
    pub smile_neutral_threshold: f32,
    pub smile_threshold: f32,
    /// Head yaw (degrees) beyond which a turn challenge fires.
    pub head_turn_threshold: f32,
    /// Normalized mean luminance required for adequate lighting.
    pub min_lighting_threshold: f32,
    /// Luma value above which a sample counts as a bright pixel.
    pub bright_pixel_threshold: u8,
    pub min_bright_percentage: f32,
    pub max_bright_percentage: f32,
    /// Preferred camera zoom, passed through to the camera collaborator.
    pub camera_zoom: f32,
    /// Device-motion buffer capacity.
    pub max_motion_readings: usize,
    /// Head-yaw history capacity.
    pub max_head_angle_readings: usize,
    pub significant_head_angle_range: f32,
    pub min_device_movement_threshold: f32,
    /// Guide oval height as a fraction of viewport height.
    pub oval_height_ratio: f32,
    /// Guide oval width as a fraction of viewport width.
    pub oval_width_ratio: f32,
    /// Rendering hints for the overlay; not interpreted by the core.
    pub stroke_width: f32,
    pub guide_marker_ratio: f32,
    pub guide_marker_inner_ratio: f32,
    /// Fixed challenge order. Disables randomization when non-empty.
    pub challenge_types: Option<Vec<ChallengeType>>,
    pub number_of_random_challenges: usize,
    pub always_include_blink: bool,
    /// Per-type instruction overrides.
    pub challenge_instructions: BTreeMap<ChallengeType, String>,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            max_session_duration_secs: 120,
            min_face_size: 0.5,
            max_face_size: 1.0,
            centering_tolerance_x: 0.1,
            centering_tolerance_y: 0.1,
            eye_open_threshold: 0.7,
            eye_closed_threshold: 0.3,
            smile_neutral_threshold: 0.3,
            smile_threshold: 0.7,
            head_turn_threshold: 20.0,
            min_lighting_threshold: 0.25,
            bright_pixel_threshold: 230,
            min_bright_percentage: 0.05,
            max_bright_percentage: 0.30,
            camera_zoom: 1.0,
            max_motion_readings: 100,
            max_head_angle_readings: 30,
            significant_head_angle_range: 20.0,
            min_device_movement_threshold: 0.5,
            oval_height_ratio: 0.9,
            oval_width_ratio: 0.75,
            stroke_width: 4.0,
            guide_marker_ratio: 0.85,
            guide_marker_inner_ratio: 0.7,
            challenge_types: None,
            number_of_random_challenges: 3,
            always_include_blink: true,
            challenge_instructions: BTreeMap::new(),
        }
    }
}

impl LivenessConfig {
    pub fn max_session_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_session_duration_secs.min(u64::from(u32::MAX)) as i64)
    }

    /// Instruction shown for `kind`, honouring any override.
    pub fn instruction_for(&self, kind: ChallengeType) -> String {
        self.challenge_instructions
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.default_instruction().to_string())
    }

    /// Reject bundles that would make a classifier unsatisfiable or a
    /// buffer unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_session_duration_secs == 0 {
            return Err(ConfigError::ZeroSessionDuration);
        }

        for (name, value) in [
            ("eye_open_threshold", self.eye_open_threshold),
            ("eye_closed_threshold", self.eye_closed_threshold),
            ("smile_neutral_threshold", self.smile_neutral_threshold),
            ("smile_threshold", self.smile_threshold),
            ("min_lighting_threshold", self.min_lighting_threshold),
            ("min_bright_percentage", self.min_bright_percentage),
            ("max_bright_percentage", self.max_bright_percentage),
            ("oval_height_ratio", self.oval_height_ratio),
            ("oval_width_ratio", self.oval_width_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }

        for (name, value) in [
            ("head_turn_threshold", self.head_turn_threshold),
            ("min_face_size", self.min_face_size),
            ("max_face_size", self.max_face_size),
            ("centering_tolerance_x", self.centering_tolerance_x),
            ("centering_tolerance_y", self.centering_tolerance_y),
            ("significant_head_angle_range", self.significant_head_angle_range),
            ("min_device_movement_threshold", self.min_device_movement_threshold),
            ("camera_zoom", self.camera_zoom),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }

        if self.eye_open_threshold <= self.eye_closed_threshold {
            return Err(ConfigError::InvertedThresholds {
                open: "eye_open_threshold",
                open_value: self.eye_open_threshold,
                closed: "eye_closed_threshold",
                closed_value: self.eye_closed_threshold,
            });
        }
        if self.smile_threshold <= self.smile_neutral_threshold {
            return Err(ConfigError::InvertedThresholds {
                open: "smile_threshold",
                open_value: self.smile_threshold,
                closed: "smile_neutral_threshold",
                closed_value: self.smile_neutral_threshold,
            });
        }
        if self.max_face_size <= self.min_face_size {
            return Err(ConfigError::InvertedThresholds {
                open: "max_face_size",
                open_value: self.max_face_size,
                closed: "min_face_size",
                closed_value: self.min_face_size,
            });
        }
        if self.max_bright_percentage <= self.min_bright_percentage {
            return Err(ConfigError::InvertedThresholds {
                open: "max_bright_percentage",
                open_value: self.max_bright_percentage,
                closed: "min_bright_percentage",
                closed_value: self.min_bright_percentage,
            });
        }

        if self.max_motion_readings == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "max_motion_readings",
            });
        }
        if self.max_head_angle_readings == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "max_head_angle_readings",
            });
        }

        Ok(())
    }
}
