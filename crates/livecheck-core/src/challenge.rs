use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::LivenessConfig;

/// A gesture the subject must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Blink,
    TurnLeft,
    TurnRight,
    Smile,
    Nod,
}

impl ChallengeType {
    pub const ALL: [ChallengeType; 5] = [
        ChallengeType::Blink,
        ChallengeType::TurnLeft,
        ChallengeType::TurnRight,
        ChallengeType::Smile,
        ChallengeType::Nod,
    ];

    /// Every type except [`ChallengeType::Blink`].
    pub const NON_BLINK: [ChallengeType; 4] = [
        ChallengeType::TurnLeft,
        ChallengeType::TurnRight,
        ChallengeType::Smile,
        ChallengeType::Nod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blink => "blink",
            Self::TurnLeft => "turn_left",
            Self::TurnRight => "turn_right",
            Self::Smile => "smile",
            Self::Nod => "nod",
        }
    }

    pub fn default_instruction(&self) -> &'static str {
        match self {
            Self::Blink => "Blink your eyes",
            Self::TurnLeft => "Turn your head left",
            Self::TurnRight => "Turn your head right",
            Self::Smile => "Smile",
            Self::Nod => "Nod your head",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One required gesture within a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Challenge {
    pub kind: ChallengeType,
    pub instruction: String,
    is_completed: bool,
}

impl Challenge {
    pub fn new(kind: ChallengeType, instruction: impl Into<String>) -> Self {
        Self {
            kind,
            instruction: instruction.into(),
            is_completed: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Mark the challenge done. Completion is irreversible.
    pub(crate) fn complete(&mut self) {
        self.is_completed = true;
    }
}

/// Produces the ordered challenge list for each new session.
pub struct ChallengeSequencer {
    rng: StdRng,
}

impl ChallengeSequencer {
    /// Sequencer seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequencer, for replays and tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate the challenge list for a session.
    ///
    /// A non-empty `config.challenge_types` is used verbatim. Otherwise one
    /// blink (when `always_include_blink` is set) plus a sample drawn without
    /// replacement from the remaining types, shuffled as a whole.
    pub fn generate(&mut self, config: &LivenessConfig) -> Vec<Challenge> {
        let kinds = match config.challenge_types.as_deref() {
            Some(fixed) if !fixed.is_empty() => fixed.to_vec(),
            _ => self.random_kinds(config),
        };

        tracing::debug!(challenges = ?kinds, "challenge sequence generated");

        kinds
            .into_iter()
            .map(|kind| Challenge::new(kind, config.instruction_for(kind)))
            .collect()
    }

    fn random_kinds(&mut self, config: &LivenessConfig) -> Vec<ChallengeType> {
        let mut kinds = Vec::with_capacity(ChallengeType::ALL.len());

        if config.always_include_blink {
            let extra = config
                .number_of_random_challenges
                .saturating_sub(1)
                .min(ChallengeType::NON_BLINK.len());
            kinds.push(ChallengeType::Blink);
            kinds.extend(
                ChallengeType::NON_BLINK
                    .choose_multiple(&mut self.rng, extra)
                    .copied(),
            );
        } else {
            let count = config
                .number_of_random_challenges
                .clamp(1, ChallengeType::ALL.len());
            kinds.extend(ChallengeType::ALL.choose_multiple(&mut self.rng, count).copied());
        }

        kinds.shuffle(&mut self.rng);
        kinds
    }
}

impl Default for ChallengeSequencer {
    fn default() -> Self {
        Self::new()
    }
}
