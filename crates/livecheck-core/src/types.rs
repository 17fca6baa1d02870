use serde::{Deserialize, Serialize};

/// Face bounding box in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

/// Output of the external face detector for a single frame.
///
/// Every field is optional: detectors routinely omit classification
/// probabilities or Euler angles when the face is partially occluded. A
/// missing field means "no signal this frame", never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceObservation {
    pub bounding_box: Option<BoundingBox>,
    /// Left eye open probability in [0, 1].
    pub left_eye_open: Option<f32>,
    /// Right eye open probability in [0, 1].
    pub right_eye_open: Option<f32>,
    /// Smiling probability in [0, 1].
    pub smiling: Option<f32>,
    /// Head yaw (Euler Y) in degrees. Negative is the subject's left.
    pub head_yaw: Option<f32>,
    /// Head pitch (Euler X) in degrees.
    pub head_pitch: Option<f32>,
}

impl FaceObservation {
    /// Mean of both eye-open probabilities, or `None` if either is missing.
    pub fn eye_open_average(&self) -> Option<f32> {
        match (self.left_eye_open, self.right_eye_open) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            _ => None,
        }
    }
}

/// Frame or preview dimensions used for centering geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Per-frame camera data consumed by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Single-plane 8-bit luminance (Y plane). May be empty if the camera
    /// collaborator does not supply one.
    pub luminance: &'a [u8],
    pub viewport: Viewport,
    /// Whether the preview is horizontally mirrored (front camera). Supplied
    /// by the camera collaborator so centering math never branches on platform.
    pub mirrored: bool,
}

/// One device-orientation reading from the motion sensor stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl MotionSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
