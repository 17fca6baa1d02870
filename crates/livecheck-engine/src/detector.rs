use livecheck_core::{FaceObservation, Frame, Viewport};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("face detector failed: {0}")]
    Failed(String),
    #[error("face detector returned invalid {field}: {value}")]
    InvalidOutput { field: &'static str, value: f32 },
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera available")]
    NotFound,
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera initialization failed: {0}")]
    Init(String),
}

/// One captured frame, owned so it can cross to the engine thread.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Y plane, `width * height` samples for a full frame.
    pub luminance: Vec<u8>,
    /// Front-camera preview is mirrored.
    pub mirrored: bool,
}

impl CameraFrame {
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            luminance: &self.luminance,
            viewport: Viewport::new(self.width as f32, self.height as f32),
            mirrored: self.mirrored,
        }
    }
}

/// Face-landmark detector boundary. Called on the engine thread, one frame
/// at a time; may block for longer than a frame interval.
pub trait FaceDetector: Send + 'static {
    fn detect(&mut self, frame: &CameraFrame) -> Result<FaceObservation, DetectorError>;
}

/// Properties reported by an opened camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInfo {
    pub width: u32,
    pub height: u32,
    pub zoom: f32,
}

/// Camera lifecycle boundary. Frames themselves are pushed by the caller
/// through [`crate::PipelineHandle::submit`].
pub trait CameraSource: Send + 'static {
    fn open(&mut self, zoom: f32) -> Result<CameraInfo, CameraError>;
    fn close(&mut self);
}

/// Reject detector output that would poison classifier memory.
pub(crate) fn validate_observation(face: &FaceObservation) -> Result<(), DetectorError> {
    for (field, value) in [
        ("left_eye_open", face.left_eye_open),
        ("right_eye_open", face.right_eye_open),
        ("smiling", face.smiling),
    ] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(DetectorError::InvalidOutput { field, value: v });
            }
        }
    }

    for (field, value) in [("head_yaw", face.head_yaw), ("head_pitch", face.head_pitch)] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(DetectorError::InvalidOutput { field, value: v });
            }
        }
    }

    if let Some(bbox) = &face.bounding_box {
        for (field, value) in [
            ("bounding_box.left", bbox.left),
            ("bounding_box.top", bbox.top),
        ] {
            if !value.is_finite() {
                return Err(DetectorError::InvalidOutput { field, value });
            }
        }
        // Width and height feed the centering ratios.
        for (field, value) in [
            ("bounding_box.width", bbox.width),
            ("bounding_box.height", bbox.height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DetectorError::InvalidOutput { field, value });
            }
        }
    }

    Ok(())
}
