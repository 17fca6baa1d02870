//! `livecheck replay`: drives a recorded session through the pipeline.
//!
//! A trace is a JSON document holding the detector output and device
//! motion captured for each frame. Luminance is synthesized from a per-frame
//! brightness level so traces stay small.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use livecheck_core::{
    ChallengeSequencer, FaceObservation, FrameReport, LivenessConfig, ManualClock, MotionSample,
    SessionEvent, SessionOrchestrator, Viewport,
};
use livecheck_engine::{
    spawn_pipeline, CameraError, CameraFrame, CameraInfo, CameraSource, DetectorError,
    FaceDetector, Submission,
};
use serde::Deserialize;

/// Synthesized luminance plane side length.
const PLANE_SIDE: usize = 64;

#[derive(Debug, Deserialize)]
pub struct Trace {
    pub viewport: Viewport,
    #[serde(default)]
    pub mirrored: bool,
    pub frames: Vec<TraceFrame>,
}

#[derive(Debug, Deserialize)]
pub struct TraceFrame {
    /// Milliseconds since the session started.
    pub offset_ms: i64,
    /// Uniform luma level for the frame.
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    /// Share of pixels forced to full brightness, to exercise glare detection.
    #[serde(default)]
    pub glare_fraction: f32,
    #[serde(default)]
    pub face: FaceObservation,
    /// Device-motion samples received since the previous frame.
    #[serde(default)]
    pub motion: Vec<MotionSample>,
    /// Simulate a detector failure on this frame.
    #[serde(default)]
    pub detector_error: Option<String>,
}

fn default_brightness() -> u8 {
    128
}

impl TraceFrame {
    fn luminance(&self) -> Vec<u8> {
        let len = PLANE_SIDE * PLANE_SIDE;
        let mut plane = vec![self.brightness; len];
        let bright = ((self.glare_fraction.clamp(0.0, 1.0) * len as f32) as usize).min(len);
        plane[..bright].fill(u8::MAX);
        plane
    }
}

pub fn load_trace(path: &Path) -> Result<Trace> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid trace {}", path.display()))
}

struct ReplayCamera {
    viewport: Viewport,
}

impl CameraSource for ReplayCamera {
    fn open(&mut self, zoom: f32) -> Result<CameraInfo, CameraError> {
        if self.viewport.width <= 0.0 || self.viewport.height <= 0.0 {
            return Err(CameraError::Init("trace viewport is empty".to_string()));
        }
        Ok(CameraInfo {
            width: self.viewport.width as u32,
            height: self.viewport.height as u32,
            zoom,
        })
    }

    fn close(&mut self) {
        tracing::debug!("replay camera closed");
    }
}

struct ReplayDetector {
    results: VecDeque<Result<FaceObservation, String>>,
}

impl FaceDetector for ReplayDetector {
    fn detect(&mut self, _frame: &CameraFrame) -> Result<FaceObservation, DetectorError> {
        match self.results.pop_front() {
            Some(Ok(face)) => Ok(face),
            Some(Err(msg)) => Err(DetectorError::Failed(msg)),
            None => Err(DetectorError::Failed("trace exhausted".to_string())),
        }
    }
}

/// Summary of a replay, for the exit status.
pub struct ReplayOutcome {
    pub reports: Vec<FrameReport>,
    pub success: Option<bool>,
}

pub async fn run(config: LivenessConfig, trace: Trace, seed: Option<u64>) -> Result<ReplayOutcome> {
    let start = Utc::now();
    let clock = ManualClock::new(start);
    let sequencer = seed.map_or_else(ChallengeSequencer::new, ChallengeSequencer::from_seed);
    let orchestrator =
        SessionOrchestrator::with_parts(Arc::new(config), Box::new(clock.clone()), sequencer)
            .context("invalid liveness configuration")?;

    let detector = ReplayDetector {
        results: trace
            .frames
            .iter()
            .map(|f| match &f.detector_error {
                Some(msg) => Err(msg.clone()),
                None => Ok(f.face.clone()),
            })
            .collect(),
    };
    let camera = ReplayCamera {
        viewport: trace.viewport,
    };

    let handle =
        spawn_pipeline(orchestrator, camera, detector).context("failed to start pipeline")?;
    let motion = handle.motion_feed();

    let mut reports = Vec::new();
    let mut success = None;

    for (i, frame) in trace.frames.iter().enumerate() {
        for sample in &frame.motion {
            motion.push(*sample);
        }
        clock.set(start + Duration::milliseconds(frame.offset_ms));

        let camera_frame = CameraFrame {
            width: trace.viewport.width as u32,
            height: trace.viewport.height as u32,
            luminance: frame.luminance(),
            mirrored: trace.mirrored,
        };

        match handle.submit(camera_frame).await? {
            Submission::Processed(report) => {
                for event in &report.events {
                    match event {
                        SessionEvent::SessionCompleted(verdict) => success = Some(verdict.success),
                        SessionEvent::SessionReset { .. } => success = None,
                        _ => {}
                    }
                }
                reports.push(report);
            }
            Submission::Skipped(e) => tracing::warn!(frame = i, error = %e, "frame skipped"),
            Submission::Dropped => tracing::warn!(frame = i, "frame dropped"),
        }
    }

    Ok(ReplayOutcome { reports, success })
}

/// One-line human rendering of an event.
pub fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::StateChanged { state } => format!("state -> {state:?}"),
        SessionEvent::ChallengeCompleted { challenge, index } => {
            format!("challenge #{index} completed: {challenge}")
        }
        SessionEvent::SessionCompleted(verdict) => format!(
            "session {} completed: {} ({} ms)",
            verdict.session_id,
            if verdict.success { "PASS" } else { "FAIL" },
            verdict.metadata.session_duration_ms
        ),
        SessionEvent::SessionReset {
            reason,
            previous_session_id,
            session_id,
        } => format!("session {previous_session_id} reset ({reason:?}); new session {session_id}"),
    }
}
