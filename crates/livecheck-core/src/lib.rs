//! livecheck-core: active liveness decision layer.
//!
//! Turns a stream of per-frame face-detector output (eye-open and smile
//! probabilities, head yaw/pitch, bounding box), frame luminance and
//! device-motion samples into gesture events, session progress and a final
//! accept/reject verdict. Face detection, camera capture and rendering are
//! external collaborators; this crate only consumes their output.

pub mod challenge;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod event;
pub mod geometry;
pub mod lighting;
pub mod motion;
pub mod orchestrator;
pub mod session;
pub mod types;

pub use challenge::{Challenge, ChallengeSequencer, ChallengeType};
pub use classifier::SignalClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, LivenessConfig};
pub use event::{
    CompletionMetadata, FrameReport, ResetReason, SessionEvent, SessionStatus, SessionVerdict,
};
pub use geometry::{CenteringGuidance, FaceAlignment};
pub use lighting::LightingQualityMonitor;
pub use motion::{MotionCorrelationChecker, MotionCorrelationResult, MotionFeed};
pub use orchestrator::SessionOrchestrator;
pub use session::{LivenessSession, LivenessState};
pub use types::{BoundingBox, FaceObservation, Frame, MotionSample, Viewport};
