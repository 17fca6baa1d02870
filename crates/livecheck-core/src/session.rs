use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::challenge::{Challenge, ChallengeType};

/// Session lifecycle. Strictly forward-moving; going back means replacing
/// the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    Initial,
    CenteringFace,
    PerformingChallenges,
    Completed,
}

/// Progress reported while centering.
const CENTERING_PROGRESS: f32 = 0.2;
/// Share of the progress bar allotted to challenges.
const CHALLENGE_PROGRESS_SPAN: f32 = 0.6;

/// One end-to-end verification attempt.
#[derive(Debug, Clone)]
pub struct LivenessSession {
    session_id: Uuid,
    start_time: DateTime<Utc>,
    challenges: Vec<Challenge>,
    current_challenge_index: usize,
    state: LivenessState,
    successful: Option<bool>,
}

impl LivenessSession {
    pub fn new(challenges: Vec<Challenge>, start_time: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            start_time,
            challenges,
            current_challenge_index: 0,
            state: LivenessState::Initial,
            successful: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn current_challenge_index(&self) -> usize {
        self.current_challenge_index
    }

    /// The challenge awaiting completion, if any remain.
    pub fn current_challenge(&self) -> Option<&Challenge> {
        self.challenges.get(self.current_challenge_index)
    }

    pub fn completed_count(&self) -> usize {
        self.challenges.iter().filter(|c| c.is_completed()).count()
    }

    pub fn all_challenges_completed(&self) -> bool {
        self.current_challenge_index == self.challenges.len()
    }

    /// Final verdict; `None` until the session reaches `Completed`.
    pub fn successful(&self) -> Option<bool> {
        self.successful
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }

    pub fn is_expired(&self, now: DateTime<Utc>, max_duration: Duration) -> bool {
        self.elapsed(now) > max_duration
    }

    /// Progress in [0, 1] for display.
    pub fn progress(&self) -> f32 {
        match self.state {
            LivenessState::Initial => 0.0,
            LivenessState::CenteringFace => CENTERING_PROGRESS,
            LivenessState::PerformingChallenges => {
                if self.challenges.is_empty() {
                    return CENTERING_PROGRESS;
                }
                let done = self.completed_count() as f32 / self.challenges.len() as f32;
                CENTERING_PROGRESS + CHALLENGE_PROGRESS_SPAN * done
            }
            LivenessState::Completed => 1.0,
        }
    }

    /// Initial → CenteringFace. Returns whether the transition happened.
    pub fn begin_centering(&mut self) -> bool {
        self.advance_from(LivenessState::Initial, LivenessState::CenteringFace)
    }

    /// CenteringFace → PerformingChallenges.
    pub fn begin_challenges(&mut self) -> bool {
        self.advance_from(LivenessState::CenteringFace, LivenessState::PerformingChallenges)
    }

    /// Mark the active challenge done and move to the next one.
    ///
    /// Only valid while performing challenges; returns the completed type.
    pub fn complete_current_challenge(&mut self) -> Option<ChallengeType> {
        if self.state != LivenessState::PerformingChallenges {
            return None;
        }
        let challenge = self.challenges.get_mut(self.current_challenge_index)?;
        challenge.complete();
        self.current_challenge_index += 1;
        Some(challenge.kind)
    }

    /// PerformingChallenges → Completed with the final verdict. Requires
    /// every challenge to be done.
    pub fn finish(&mut self, successful: bool) -> bool {
        if !self.all_challenges_completed() {
            return false;
        }
        if self.advance_from(LivenessState::PerformingChallenges, LivenessState::Completed) {
            self.successful = Some(successful);
            true
        } else {
            false
        }
    }

    fn advance_from(&mut self, from: LivenessState, to: LivenessState) -> bool {
        if self.state != from {
            return false;
        }
        tracing::debug!(session_id = %self.session_id, ?from, ?to, "session state transition");
        self.state = to;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(kinds: &[ChallengeType]) -> LivenessSession {
        let challenges = kinds
            .iter()
            .map(|&k| Challenge::new(k, k.default_instruction()))
            .collect();
        LivenessSession::new(challenges, Utc::now())
    }

    fn three() -> LivenessSession {
        session(&[ChallengeType::Blink, ChallengeType::Smile, ChallengeType::TurnRight])
    }

    #[test]
    fn test_new_session_is_initial() {
        let s = three();
        assert_eq!(s.state(), LivenessState::Initial);
        assert_eq!(s.current_challenge_index(), 0);
        assert_eq!(s.progress(), 0.0);
        assert_eq!(s.successful(), None);
    }

    #[test]
    fn test_progress_boundaries() {
        let mut s = three();
        s.begin_centering();
        assert!((s.progress() - 0.2).abs() < 1e-6);

        s.begin_challenges();
        assert!((s.progress() - 0.2).abs() < 1e-6);

        s.complete_current_challenge();
        s.complete_current_challenge();
        assert!((s.progress() - 0.6).abs() < 1e-6);

        s.complete_current_challenge();
        assert!(s.finish(true));
        assert_eq!(s.progress(), 1.0);
    }

    #[test]
    fn test_transitions_are_forward_only() {
        let mut s = three();
        assert!(!s.begin_challenges());
        assert!(s.begin_centering());
        assert!(!s.begin_centering());
        assert!(s.begin_challenges());
        assert!(!s.begin_centering());
        assert_eq!(s.state(), LivenessState::PerformingChallenges);
    }

    #[test]
    fn test_cannot_complete_challenge_outside_performing() {
        let mut s = three();
        assert_eq!(s.complete_current_challenge(), None);
        s.begin_centering();
        assert_eq!(s.complete_current_challenge(), None);
        assert_eq!(s.current_challenge_index(), 0);
    }

    #[test]
    fn test_challenge_index_advances_in_order() {
        let mut s = three();
        s.begin_centering();
        s.begin_challenges();
        assert_eq!(s.complete_current_challenge(), Some(ChallengeType::Blink));
        assert_eq!(s.current_challenge().map(|c| c.kind), Some(ChallengeType::Smile));
        assert!(s.challenges()[0].is_completed());
        assert_eq!(s.complete_current_challenge(), Some(ChallengeType::Smile));
        assert_eq!(s.complete_current_challenge(), Some(ChallengeType::TurnRight));
        assert!(s.all_challenges_completed());
        assert_eq!(s.current_challenge(), None);
        assert_eq!(s.complete_current_challenge(), None);
        assert_eq!(s.current_challenge_index(), 3);
    }

    #[test]
    fn test_finish_requires_all_challenges() {
        let mut s = three();
        s.begin_centering();
        s.begin_challenges();
        s.complete_current_challenge();
        assert!(!s.finish(true));
        assert_eq!(s.state(), LivenessState::PerformingChallenges);
    }

    #[test]
    fn test_finish_records_verdict() {
        let mut s = session(&[ChallengeType::Nod]);
        s.begin_centering();
        s.begin_challenges();
        s.complete_current_challenge();
        assert!(s.finish(false));
        assert_eq!(s.state(), LivenessState::Completed);
        assert_eq!(s.successful(), Some(false));
        assert!(!s.finish(true));
        assert_eq!(s.successful(), Some(false));
    }

    #[test]
    fn test_expiry() {
        let start = Utc::now();
        let s = LivenessSession::new(Vec::new(), start);
        let max = Duration::minutes(2);
        assert!(!s.is_expired(start + Duration::seconds(119), max));
        assert!(!s.is_expired(start + max, max));
        assert!(s.is_expired(start + Duration::minutes(3), max));
    }

    #[test]
    fn test_sessions_have_unique_ids() {
        assert_ne!(three().session_id(), three().session_id());
    }
}
