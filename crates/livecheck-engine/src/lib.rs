//! livecheck-engine: serialized frame pipeline around the liveness core.
//!
//! Owns the session orchestrator on a dedicated OS thread, runs the face
//! detector there, and admits at most one frame at a time: frames arriving
//! while another is being analysed are dropped, not queued.

pub mod detector;
pub mod engine;
pub mod env_config;

pub use detector::{
    CameraError, CameraFrame, CameraInfo, CameraSource, DetectorError, FaceDetector,
};
pub use engine::{spawn_pipeline, EngineError, PipelineHandle, Submission};
