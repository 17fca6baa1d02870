use std::fmt;

use serde::Serialize;

use crate::config::LivenessConfig;
use crate::types::{BoundingBox, Viewport};

/// Single positioning hint shown while centering. Only one is active at a
/// time; variants are listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CenteringGuidance {
    MoveFarther,
    MoveCloser,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    HoldStill,
}

impl CenteringGuidance {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MoveFarther => "Move farther away",
            Self::MoveCloser => "Move closer",
            Self::MoveLeft => "Move left",
            Self::MoveRight => "Move right",
            Self::MoveUp => "Move up",
            Self::MoveDown => "Move down",
            Self::HoldStill => "Hold still",
        }
    }
}

impl fmt::Display for CenteringGuidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Face position relative to the guide oval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceAlignment {
    /// Signed horizontal offset of the face centre from the guide centre,
    /// as a fraction of viewport width, in the subject's mirror view.
    pub horizontal_offset: f32,
    /// Signed vertical offset, as a fraction of viewport height. Positive is down.
    pub vertical_offset: f32,
    /// Face width divided by guide oval width.
    pub size_ratio: f32,
    pub guidance: CenteringGuidance,
}

impl FaceAlignment {
    /// Evaluate `face` against the guide oval for `viewport`.
    ///
    /// Returns `None` for a degenerate viewport. When `mirrored` is set the
    /// horizontal axis is flipped first so guidance matches what the subject
    /// sees on a front-camera preview.
    pub fn evaluate(
        face: &BoundingBox,
        viewport: Viewport,
        mirrored: bool,
        config: &LivenessConfig,
    ) -> Option<Self> {
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return None;
        }

        let guide_width = viewport.width * config.oval_width_ratio;
        if guide_width <= 0.0 {
            return None;
        }

        let face_x = if mirrored {
            viewport.width - face.center_x()
        } else {
            face.center_x()
        };

        let horizontal_offset = (face_x - viewport.width / 2.0) / viewport.width;
        let vertical_offset = (face.center_y() - viewport.height / 2.0) / viewport.height;
        let size_ratio = face.width / guide_width;

        let guidance = if size_ratio > config.max_face_size {
            CenteringGuidance::MoveFarther
        } else if size_ratio < config.min_face_size {
            CenteringGuidance::MoveCloser
        } else if horizontal_offset.abs() > config.centering_tolerance_x {
            if horizontal_offset > 0.0 {
                CenteringGuidance::MoveLeft
            } else {
                CenteringGuidance::MoveRight
            }
        } else if vertical_offset.abs() > config.centering_tolerance_y {
            if vertical_offset > 0.0 {
                CenteringGuidance::MoveUp
            } else {
                CenteringGuidance::MoveDown
            }
        } else {
            CenteringGuidance::HoldStill
        };

        Some(Self {
            horizontal_offset,
            vertical_offset,
            size_ratio,
            guidance,
        })
    }

    /// The centering predicate: positioned and sized within tolerance.
    pub fn is_centered(&self) -> bool {
        self.guidance == CenteringGuidance::HoldStill
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Viewport = Viewport {
        width: 480.0,
        height: 640.0,
    };

    /// Guide oval is 360 px wide at default ratios.
    fn face_at(cx: f32, cy: f32, width: f32) -> BoundingBox {
        BoundingBox::new(cx - width / 2.0, cy - width / 2.0, width, width)
    }

    fn guidance(face: BoundingBox, mirrored: bool) -> CenteringGuidance {
        FaceAlignment::evaluate(&face, VIEW, mirrored, &LivenessConfig::default())
            .unwrap()
            .guidance
    }

    #[test]
    fn test_centered_face_holds_still() {
        let face = face_at(240.0, 320.0, 250.0);
        let alignment =
            FaceAlignment::evaluate(&face, VIEW, false, &LivenessConfig::default()).unwrap();
        assert!(alignment.is_centered());
        assert!(alignment.horizontal_offset.abs() < 1e-6);
        assert!((alignment.size_ratio - 250.0 / 360.0).abs() < 1e-6);
    }

    #[test]
    fn test_size_checks_take_precedence() {
        // Off-centre and too big: size wins.
        let big = face_at(400.0, 320.0, 400.0);
        assert_eq!(guidance(big, false), CenteringGuidance::MoveFarther);
        // Off-centre and too small: size wins.
        let small = face_at(400.0, 100.0, 100.0);
        assert_eq!(guidance(small, false), CenteringGuidance::MoveCloser);
    }

    #[test]
    fn test_horizontal_before_vertical() {
        let right_low = face_at(360.0, 500.0, 250.0);
        let left_low = face_at(120.0, 500.0, 250.0);
        assert_eq!(guidance(right_low, false), CenteringGuidance::MoveLeft);
        assert_eq!(guidance(left_low, false), CenteringGuidance::MoveRight);
    }

    #[test]
    fn test_vertical_offsets() {
        let low = face_at(240.0, 450.0, 250.0);
        let high = face_at(240.0, 180.0, 250.0);
        assert_eq!(guidance(low, false), CenteringGuidance::MoveUp);
        assert_eq!(guidance(high, false), CenteringGuidance::MoveDown);
    }

    #[test]
    fn test_mirrored_flips_horizontal_guidance() {
        let face = face_at(360.0, 320.0, 250.0);
        assert_eq!(guidance(face, false), CenteringGuidance::MoveLeft);
        assert_eq!(guidance(face, true), CenteringGuidance::MoveRight);
    }

    #[test]
    fn test_degenerate_viewport() {
        let face = face_at(10.0, 10.0, 5.0);
        let config = LivenessConfig::default();
        let empty = Viewport::new(0.0, 640.0);
        assert!(FaceAlignment::evaluate(&face, empty, false, &config).is_none());
    }
}
