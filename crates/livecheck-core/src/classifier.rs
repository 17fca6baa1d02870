//! Edge detectors that turn per-frame probabilities and Euler angles into
//! one-shot gesture detections.
//!
//! Blink, smile and nod fire on a transition between the previous sample and
//! the current one, so a subject who is already smiling when the smile
//! challenge starts must relax and smile again. Turns fire on level, and
//! every observed yaw is kept for the motion-correlation check.

use std::collections::VecDeque;

use crate::challenge::ChallengeType;
use crate::config::LivenessConfig;
use crate::types::FaceObservation;

/// Pitch (degrees) that must be crossed in both directions for a nod.
/// Kept separate from `head_turn_threshold`.
pub const NOD_PITCH_THRESHOLD: f32 = 10.0;

/// Per-session gesture classifier memory plus thresholds.
#[derive(Debug, Clone)]
pub struct SignalClassifier {
    eye_open_threshold: f32,
    eye_closed_threshold: f32,
    smile_neutral_threshold: f32,
    smile_threshold: f32,
    head_turn_threshold: f32,
    history_capacity: usize,

    last_eye_open: Option<f32>,
    last_smile: Option<f32>,
    last_pitch: Option<f32>,
    head_angles: VecDeque<f32>,
}

impl SignalClassifier {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            eye_open_threshold: config.eye_open_threshold,
            eye_closed_threshold: config.eye_closed_threshold,
            smile_neutral_threshold: config.smile_neutral_threshold,
            smile_threshold: config.smile_threshold,
            head_turn_threshold: config.head_turn_threshold,
            history_capacity: config.max_head_angle_readings,
            last_eye_open: None,
            last_smile: None,
            last_pitch: None,
            head_angles: VecDeque::with_capacity(config.max_head_angle_readings),
        }
    }

    /// Run the classifier for `kind` against the current frame's face sample.
    pub fn observe(&mut self, kind: ChallengeType, face: &FaceObservation) -> bool {
        match kind {
            ChallengeType::Blink => self.blink(face.eye_open_average()),
            ChallengeType::Smile => self.smile(face.smiling),
            ChallengeType::TurnLeft => self.turn_left(face.head_yaw),
            ChallengeType::TurnRight => self.turn_right(face.head_yaw),
            ChallengeType::Nod => self.nod(face.head_pitch),
        }
    }

    /// Open → closed transition of the averaged eye-open probability.
    pub fn blink(&mut self, eye_open: Option<f32>) -> bool {
        let Some(current) = eye_open else {
            return false;
        };
        let fired = self.last_eye_open.is_some_and(|prev| {
            prev > self.eye_open_threshold && current < self.eye_closed_threshold
        });
        self.last_eye_open = Some(current);
        fired
    }

    /// Neutral → smiling transition.
    pub fn smile(&mut self, smiling: Option<f32>) -> bool {
        let Some(current) = smiling else {
            return false;
        };
        let fired = self.last_smile.is_some_and(|prev| {
            prev < self.smile_neutral_threshold && current > self.smile_threshold
        });
        self.last_smile = Some(current);
        fired
    }

    pub fn turn_left(&mut self, yaw: Option<f32>) -> bool {
        let Some(yaw) = yaw else {
            return false;
        };
        self.record_head_angle(yaw);
        yaw < -self.head_turn_threshold
    }

    pub fn turn_right(&mut self, yaw: Option<f32>) -> bool {
        let Some(yaw) = yaw else {
            return false;
        };
        self.record_head_angle(yaw);
        yaw > self.head_turn_threshold
    }

    /// Pitch crossing the ±10° band between consecutive samples.
    pub fn nod(&mut self, pitch: Option<f32>) -> bool {
        let Some(current) = pitch else {
            return false;
        };
        let fired = self.last_pitch.is_some_and(|prev| {
            (prev < -NOD_PITCH_THRESHOLD && current > NOD_PITCH_THRESHOLD)
                || (prev > NOD_PITCH_THRESHOLD && current < -NOD_PITCH_THRESHOLD)
        });
        self.last_pitch = Some(current);
        fired
    }

    /// Recorded head yaw samples, oldest first.
    pub fn head_angle_history(&self) -> &VecDeque<f32> {
        &self.head_angles
    }

    /// Clear all edge memory and the yaw history.
    pub fn reset(&mut self) {
        self.last_eye_open = None;
        self.last_smile = None;
        self.last_pitch = None;
        self.head_angles.clear();
    }

    fn record_head_angle(&mut self, yaw: f32) {
        if self.head_angles.len() == self.history_capacity {
            self.head_angles.pop_front();
        }
        self.head_angles.push_back(yaw);
    }
}
