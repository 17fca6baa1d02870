//! Per-frame driver for a liveness session.
//!
//! Each call to [`SessionOrchestrator::process_frame`] runs one fixed
//! pipeline: expiry check, lighting and glare, centering, then the active
//! challenge's classifier. Everything the UI needs comes back in the
//! returned [`FrameReport`]; nothing is pushed through callbacks.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::challenge::ChallengeSequencer;
use crate::classifier::SignalClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, LivenessConfig};
use crate::event::{
    CompletionMetadata, FrameReport, ResetReason, SessionEvent, SessionStatus, SessionVerdict,
};
use crate::geometry::{CenteringGuidance, FaceAlignment};
use crate::lighting::LightingQualityMonitor;
use crate::motion::{MotionCorrelationChecker, MotionFeed};
use crate::session::{LivenessSession, LivenessState};
use crate::types::{FaceObservation, Frame};

const STATUS_POSITION_FACE: &str = "Position your face in the oval";
const STATUS_POOR_LIGHTING: &str = "Poor lighting. Move to a brighter area";
const STATUS_NO_FACE: &str = "No face detected";
const STATUS_VERIFIED: &str = "Verification complete";
const STATUS_FAILED: &str = "Verification failed";

/// Owns the session and every monitor feeding it. Single owner, single
/// caller: frames are processed strictly one after another.
pub struct SessionOrchestrator {
    config: Arc<LivenessConfig>,
    clock: Box<dyn Clock>,
    sequencer: ChallengeSequencer,
    session: LivenessSession,
    classifier: SignalClassifier,
    lighting: LightingQualityMonitor,
    motion: MotionCorrelationChecker,
    status_message: String,
    guidance: Option<CenteringGuidance>,
}

impl SessionOrchestrator {
    /// Orchestrator on the wall clock with an entropy-seeded sequencer.
    pub fn new(config: Arc<LivenessConfig>) -> Result<Self, ConfigError> {
        Self::with_parts(config, Box::new(SystemClock), ChallengeSequencer::new())
    }

    /// Orchestrator with an injected clock and sequencer.
    pub fn with_parts(
        config: Arc<LivenessConfig>,
        clock: Box<dyn Clock>,
        mut sequencer: ChallengeSequencer,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let session = LivenessSession::new(sequencer.generate(&config), clock.now());
        tracing::info!(
            session_id = %session.session_id(),
            challenges = session.challenges().len(),
            "liveness session created"
        );

        Ok(Self {
            classifier: SignalClassifier::new(&config),
            lighting: LightingQualityMonitor::new(&config),
            motion: MotionCorrelationChecker::new(&config),
            config,
            clock,
            sequencer,
            session,
            status_message: STATUS_POSITION_FACE.to_string(),
            guidance: None,
        })
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    pub fn session(&self) -> &LivenessSession {
        &self.session
    }

    pub fn classifier(&self) -> &SignalClassifier {
        &self.classifier
    }

    pub fn lighting(&self) -> &LightingQualityMonitor {
        &self.lighting
    }

    /// Producer handle for the device-motion stream.
    pub fn motion_feed(&self) -> MotionFeed {
        self.motion.feed()
    }

    /// Process one frame's camera data and detector output.
    pub fn process_frame(&mut self, frame: &Frame<'_>, face: &FaceObservation) -> FrameReport {
        if let Some(reset) = self.expire_if_due() {
            return self.report(vec![reset]);
        }

        let mut events = Vec::new();
        let now = self.clock.now();

        if self.session.state() == LivenessState::Completed {
            return self.report(events);
        }

        self.update_lighting(frame.luminance);
        if !self.lighting.is_good_lighting() {
            self.status_message = STATUS_POOR_LIGHTING.to_string();
            return self.report(events);
        }

        if self.session.begin_centering() {
            events.push(SessionEvent::StateChanged {
                state: LivenessState::CenteringFace,
            });
        }

        let Some(bounding_box) = face.bounding_box else {
            self.guidance = None;
            self.status_message = STATUS_NO_FACE.to_string();
            return self.report(events);
        };

        let alignment =
            FaceAlignment::evaluate(&bounding_box, frame.viewport, frame.mirrored, &self.config);
        self.guidance = alignment.map(|a| a.guidance);

        match self.session.state() {
            LivenessState::CenteringFace => {
                let centered = alignment.is_some_and(|a| a.is_centered());
                if centered && self.session.begin_challenges() {
                    tracing::info!(session_id = %self.session.session_id(), "face centered");
                    events.push(SessionEvent::StateChanged {
                        state: LivenessState::PerformingChallenges,
                    });
                    if self.session.all_challenges_completed() {
                        self.finish_session(now, &mut events);
                    } else {
                        self.status_message = self.active_instruction();
                    }
                } else {
                    self.status_message = self
                        .guidance
                        .map(|g| g.message().to_string())
                        .unwrap_or_else(|| STATUS_POSITION_FACE.to_string());
                }
            }
            LivenessState::PerformingChallenges => self.evaluate_challenge(face, now, &mut events),
            LivenessState::Initial | LivenessState::Completed => {}
        }

        self.report(events)
    }

    /// Replace the session if it has outlived `max_session_duration`.
    ///
    /// Runs first in every frame cycle, ahead of the detector call, so an
    /// expired session never consumes detector output.
    pub fn expire_if_due(&mut self) -> Option<SessionEvent> {
        let now = self.clock.now();
        if !self
            .session
            .is_expired(now, self.config.max_session_duration())
        {
            return None;
        }

        tracing::info!(
            session_id = %self.session.session_id(),
            elapsed_ms = self.session.elapsed(now).num_milliseconds(),
            "session expired; regenerating"
        );
        Some(self.replace_session(ResetReason::Expired, now))
    }

    /// Discard the current session and start a fresh one.
    pub fn reset(&mut self) -> SessionEvent {
        let now = self.clock.now();
        tracing::info!(session_id = %self.session.session_id(), "session reset requested");
        self.replace_session(ResetReason::Requested, now)
    }

    /// Snapshot for the UI.
    pub fn status(&self) -> SessionStatus {
        let active_challenge = match self.session.state() {
            LivenessState::PerformingChallenges => self.session.current_challenge().map(|c| c.kind),
            _ => None,
        };

        SessionStatus {
            session_id: self.session.session_id(),
            state: self.session.state(),
            progress: self.session.progress(),
            status_message: self.status_message.clone(),
            guidance: self.guidance,
            active_challenge,
            lighting_value: self.lighting.lighting_value(),
            is_good_lighting: self.lighting.is_good_lighting(),
            glare_detected: self.lighting.glare_detected(),
        }
    }

    fn update_lighting(&mut self, luminance: &[u8]) {
        let had_glare = self.lighting.glare_detected();
        self.lighting.update_from_frame(luminance);

        // Advisory only; never gates the session.
        if self.lighting.detect_glare(luminance) && !had_glare {
            tracing::info!(
                session_id = %self.session.session_id(),
                "possible screen glare detected"
            );
        }
    }

    fn evaluate_challenge(
        &mut self,
        face: &FaceObservation,
        now: DateTime<Utc>,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(kind) = self.session.current_challenge().map(|c| c.kind) else {
            return;
        };

        if !self.classifier.observe(kind, face) {
            self.status_message = self.active_instruction();
            return;
        }

        let index = self.session.current_challenge_index();
        if let Some(done) = self.session.complete_current_challenge() {
            tracing::info!(
                session_id = %self.session.session_id(),
                challenge = %done,
                index,
                "challenge completed"
            );
            events.push(SessionEvent::ChallengeCompleted {
                challenge: done,
                index,
            });
        }

        if self.session.all_challenges_completed() {
            self.finish_session(now, events);
        } else {
            self.status_message = self.active_instruction();
        }
    }

    fn finish_session(&mut self, now: DateTime<Utc>, events: &mut Vec<SessionEvent>) {
        let correlation = self.motion.verify(self.classifier.head_angle_history());
        let success = correlation.is_consistent;

        if !self.session.finish(success) {
            return;
        }

        let metadata = CompletionMetadata {
            timestamp: now,
            verification_result: success,
            challenge_types: self
                .session
                .challenges()
                .iter()
                .map(|c| c.kind.to_string())
                .collect(),
            session_duration_ms: self.session.elapsed(now).num_milliseconds(),
            lighting_value: self.lighting.lighting_value(),
        };

        tracing::info!(
            session_id = %self.session.session_id(),
            success,
            head_range = correlation.head_range,
            device_range = correlation.device_range,
            duration_ms = metadata.session_duration_ms,
            "liveness session completed"
        );

        self.status_message = if success { STATUS_VERIFIED } else { STATUS_FAILED }.to_string();
        self.guidance = None;

        events.push(SessionEvent::StateChanged {
            state: LivenessState::Completed,
        });
        events.push(SessionEvent::SessionCompleted(SessionVerdict {
            session_id: self.session.session_id(),
            success,
            metadata,
        }));
    }

    fn replace_session(&mut self, reason: ResetReason, now: DateTime<Utc>) -> SessionEvent {
        let previous_session_id = self.session.session_id();

        self.classifier.reset();
        self.motion.reset();
        self.session = LivenessSession::new(self.sequencer.generate(&self.config), now);
        self.status_message = STATUS_POSITION_FACE.to_string();
        self.guidance = None;

        tracing::info!(
            ?reason,
            previous_session_id = %previous_session_id,
            session_id = %self.session.session_id(),
            "liveness session replaced"
        );

        SessionEvent::SessionReset {
            reason,
            previous_session_id,
            session_id: self.session.session_id(),
        }
    }

    fn active_instruction(&self) -> String {
        self.session
            .current_challenge()
            .map(|c| c.instruction.clone())
            .unwrap_or_default()
    }

    fn report(&self, events: Vec<SessionEvent>) -> FrameReport {
        FrameReport {
            events,
            status: self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeType;
    use crate::clock::ManualClock;
    use crate::types::{BoundingBox, MotionSample, Viewport};
    use chrono::Duration;

    const LUMA_OK: [u8; 64] = [128; 64];
    const LUMA_DARK: [u8; 64] = [20; 64];

    fn frame(luminance: &[u8]) -> Frame<'_> {
        Frame {
            luminance,
            viewport: Viewport::new(480.0, 640.0),
            mirrored: false,
        }
    }

    fn centered_box() -> BoundingBox {
        BoundingBox::new(115.0, 195.0, 250.0, 250.0)
    }

    fn face() -> FaceObservation {
        FaceObservation {
            bounding_box: Some(centered_box()),
            ..Default::default()
        }
    }

    fn eyes(avg: f32) -> FaceObservation {
        FaceObservation {
            left_eye_open: Some(avg),
            right_eye_open: Some(avg),
            ..face()
        }
    }

    fn smile(p: f32) -> FaceObservation {
        FaceObservation {
            smiling: Some(p),
            ..face()
        }
    }

    fn yaw(deg: f32) -> FaceObservation {
        FaceObservation {
            head_yaw: Some(deg),
            ..face()
        }
    }

    fn orchestrator(kinds: Vec<ChallengeType>) -> (SessionOrchestrator, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let config = LivenessConfig {
            challenge_types: Some(kinds),
            ..Default::default()
        };
        let orch = SessionOrchestrator::with_parts(
            Arc::new(config),
            Box::new(clock.clone()),
            ChallengeSequencer::from_seed(0),
        )
        .unwrap();
        (orch, clock)
    }

    fn run(orch: &mut SessionOrchestrator, face: FaceObservation) -> FrameReport {
        orch.process_frame(&frame(&LUMA_OK), &face)
    }

    #[test]
    fn test_first_centered_frame_reaches_challenges() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::Blink]);
        let report = run(&mut orch, face());
        assert_eq!(
            report.events,
            vec![
                SessionEvent::StateChanged {
                    state: LivenessState::CenteringFace
                },
                SessionEvent::StateChanged {
                    state: LivenessState::PerformingChallenges
                },
            ]
        );
        assert_eq!(report.status.active_challenge, Some(ChallengeType::Blink));
        assert_eq!(report.status.status_message, "Blink your eyes");
    }

    #[test]
    fn test_off_centre_face_stays_centering() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::Blink]);
        let off = FaceObservation {
            bounding_box: Some(BoundingBox::new(300.0, 195.0, 250.0, 250.0)),
            ..Default::default()
        };
        let report = run(&mut orch, off);
        assert_eq!(report.status.state, LivenessState::CenteringFace);
        assert_eq!(report.status.guidance, Some(CenteringGuidance::MoveLeft));
        assert_eq!(report.status.status_message, "Move left");
        assert!((report.status.progress - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_poor_lighting_suppresses_processing() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::Blink]);
        let report = orch.process_frame(&frame(&LUMA_DARK), &face());
        assert!(report.events.is_empty());
        assert_eq!(report.status.state, LivenessState::Initial);
        assert_eq!(report.status.status_message, STATUS_POOR_LIGHTING);
        assert!(!report.status.is_good_lighting);
    }

    #[test]
    fn test_poor_lighting_mid_challenge_does_not_evaluate() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::Blink]);
        run(&mut orch, face());
        run(&mut orch, eyes(0.9));
        // Closed eyes in the dark: suppressed, and memory is untouched.
        let report = orch.process_frame(&frame(&LUMA_DARK), &eyes(0.1));
        assert!(report.events.is_empty());
        let report = run(&mut orch, eyes(0.1));
        assert_eq!(
            report.events[0],
            SessionEvent::ChallengeCompleted {
                challenge: ChallengeType::Blink,
                index: 0
            }
        );
    }

    #[test]
    fn test_missing_face_reports_status() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::Blink]);
        let report = run(&mut orch, FaceObservation::default());
        assert_eq!(report.status.state, LivenessState::CenteringFace);
        assert_eq!(report.status.status_message, STATUS_NO_FACE);
        assert_eq!(report.status.guidance, None);
    }

    #[test]
    fn test_end_to_end_spoof_rejected_by_motion_check() {
        let (mut orch, _) = orchestrator(vec![
            ChallengeType::Blink,
            ChallengeType::Smile,
            ChallengeType::TurnRight,
        ]);
        let feed = orch.motion_feed();
        for y in [0.0, 0.05, 0.1, 0.02] {
            feed.push(MotionSample::new(0.0, y, 0.0));
        }

        run(&mut orch, face());

        run(&mut orch, eyes(0.9));
        let report = run(&mut orch, eyes(0.2));
        assert_eq!(orch.session().current_challenge_index(), 1);
        assert!(matches!(
            report.events[0],
            SessionEvent::ChallengeCompleted {
                challenge: ChallengeType::Blink,
                ..
            }
        ));

        run(&mut orch, smile(0.1));
        run(&mut orch, smile(0.9));
        assert_eq!(orch.session().current_challenge_index(), 2);
        assert!((orch.status().progress - 0.6).abs() < 1e-6);

        run(&mut orch, yaw(0.0));
        let report = run(&mut orch, yaw(25.0));
        assert_eq!(orch.session().current_challenge_index(), 3);
        assert_eq!(report.status.state, LivenessState::Completed);
        assert_eq!(report.status.progress, 1.0);

        let verdict = report.verdict().expect("session completed");
        assert!(!verdict.success);
        assert_eq!(verdict.session_id, orch.session().session_id());
        assert_eq!(
            verdict.metadata.challenge_types,
            vec!["blink", "smile", "turn_right"]
        );
        assert_eq!(report.status.status_message, STATUS_FAILED);
        assert!(orch.session().challenges().iter().all(|c| c.is_completed()));
    }

    #[test]
    fn test_end_to_end_live_subject_accepted() {
        let (mut orch, clock) = orchestrator(vec![ChallengeType::TurnLeft, ChallengeType::Nod]);
        let feed = orch.motion_feed();
        for y in [0.0, 0.4, 0.9] {
            feed.push(MotionSample::new(0.0, y, 0.0));
        }

        run(&mut orch, face());
        clock.advance(Duration::milliseconds(500));
        let report = run(&mut orch, yaw(-30.0));
        assert_eq!(report.events.len(), 1);

        let pitch = |p: f32| FaceObservation {
            head_pitch: Some(p),
            ..face()
        };
        run(&mut orch, pitch(-15.0));
        clock.advance(Duration::milliseconds(1500));
        let report = run(&mut orch, pitch(15.0));

        let verdict = report.verdict().expect("session completed");
        assert!(verdict.success);
        assert_eq!(verdict.metadata.session_duration_ms, 2000);
        assert!(verdict.metadata.verification_result);
        assert_eq!(report.status.status_message, STATUS_VERIFIED);
    }

    #[test]
    fn test_already_smiling_does_not_complete() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::Smile]);
        run(&mut orch, face());
        for _ in 0..5 {
            let report = run(&mut orch, smile(0.95));
            assert!(report.events.is_empty());
        }
        assert_eq!(orch.session().current_challenge_index(), 0);
    }

    #[test]
    fn test_frames_after_completion_are_ignored() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::TurnRight]);
        run(&mut orch, face());
        run(&mut orch, yaw(30.0));
        assert_eq!(orch.session().state(), LivenessState::Completed);
        let report = run(&mut orch, yaw(30.0));
        assert!(report.events.is_empty());
        assert_eq!(report.status.state, LivenessState::Completed);
    }

    #[test]
    fn test_expiry_resets_before_other_logic() {
        let (mut orch, clock) = orchestrator(vec![ChallengeType::Blink]);
        let feed = orch.motion_feed();
        feed.push(MotionSample::new(0.0, 1.0, 0.0));

        run(&mut orch, face());
        run(&mut orch, eyes(0.9));
        let old_id = orch.session().session_id();

        clock.advance(Duration::minutes(3));
        // Would complete the blink if evaluated.
        let report = run(&mut orch, eyes(0.1));
        assert_eq!(report.events.len(), 1);
        match &report.events[0] {
            SessionEvent::SessionReset {
                reason,
                previous_session_id,
                session_id,
            } => {
                assert_eq!(*reason, ResetReason::Expired);
                assert_eq!(*previous_session_id, old_id);
                assert_ne!(*session_id, old_id);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(report.status.state, LivenessState::Initial);
        assert!(feed.is_empty());
        assert!(orch.classifier().head_angle_history().is_empty());

        let report = run(&mut orch, face());
        assert!(report.events.contains(&SessionEvent::StateChanged {
            state: LivenessState::CenteringFace
        }));
    }

    #[test]
    fn test_expire_if_due() {
        let (mut orch, clock) = orchestrator(vec![ChallengeType::Blink]);
        let old_id = orch.session().session_id();
        assert_eq!(orch.expire_if_due(), None);

        clock.advance(Duration::minutes(2) + Duration::seconds(1));
        assert!(matches!(
            orch.expire_if_due(),
            Some(SessionEvent::SessionReset {
                reason: ResetReason::Expired,
                ..
            })
        ));
        assert_ne!(orch.session().session_id(), old_id);
        // The fresh session starts its own clock.
        assert_eq!(orch.expire_if_due(), None);
    }

    #[test]
    fn test_explicit_reset() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::TurnLeft, ChallengeType::Smile]);
        run(&mut orch, face());
        run(&mut orch, yaw(-30.0));
        let old_id = orch.session().session_id();

        let event = orch.reset();
        assert!(matches!(
            event,
            SessionEvent::SessionReset {
                reason: ResetReason::Requested,
                ..
            }
        ));
        assert_ne!(orch.session().session_id(), old_id);
        assert_eq!(orch.session().state(), LivenessState::Initial);
        assert_eq!(orch.session().current_challenge_index(), 0);
        assert!(orch.classifier().head_angle_history().is_empty());
    }

    #[test]
    fn test_glare_is_advisory() {
        let (mut orch, _) = orchestrator(vec![ChallengeType::TurnRight]);
        let mut luma = vec![128u8; 100];
        luma[..10].fill(250);
        let report = orch.process_frame(&frame(&luma), &face());
        assert!(report.status.glare_detected);
        assert_eq!(report.status.state, LivenessState::PerformingChallenges);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LivenessConfig {
            max_motion_readings: 0,
            ..Default::default()
        };
        assert!(SessionOrchestrator::new(Arc::new(config)).is_err());
    }
}
