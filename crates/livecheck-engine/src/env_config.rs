use livecheck_core::{ChallengeType, LivenessConfig};

/// Load configuration from `LIVECHECK_*` environment variables over the defaults.
pub fn from_env() -> LivenessConfig {
    let mut config = LivenessConfig::default();
    apply_env(&mut config);
    config
}

/// Override fields of `config` from `LIVECHECK_*` environment variables.
/// Unset or unparsable variables leave the field unchanged.
pub fn apply_env(config: &mut LivenessConfig) {
    apply_vars(config, |key| std::env::var(key).ok());
}

/// Same as [`apply_env`] with an explicit variable lookup.
pub fn apply_vars<F>(config: &mut LivenessConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    env.u64("LIVECHECK_MAX_SESSION_SECS", &mut config.max_session_duration_secs);
    env.f32("LIVECHECK_MIN_FACE_SIZE", &mut config.min_face_size);
    env.f32("LIVECHECK_MAX_FACE_SIZE", &mut config.max_face_size);
    env.f32("LIVECHECK_CENTERING_TOLERANCE_X", &mut config.centering_tolerance_x);
    env.f32("LIVECHECK_CENTERING_TOLERANCE_Y", &mut config.centering_tolerance_y);
    env.f32("LIVECHECK_EYE_OPEN_THRESHOLD", &mut config.eye_open_threshold);
    env.f32("LIVECHECK_EYE_CLOSED_THRESHOLD", &mut config.eye_closed_threshold);
    env.f32("LIVECHECK_SMILE_NEUTRAL_THRESHOLD", &mut config.smile_neutral_threshold);
    env.f32("LIVECHECK_SMILE_THRESHOLD", &mut config.smile_threshold);
    env.f32("LIVECHECK_HEAD_TURN_THRESHOLD", &mut config.head_turn_threshold);
    env.f32("LIVECHECK_MIN_LIGHTING", &mut config.min_lighting_threshold);
    env.u8("LIVECHECK_BRIGHT_PIXEL_THRESHOLD", &mut config.bright_pixel_threshold);
    env.f32("LIVECHECK_MIN_BRIGHT_PERCENTAGE", &mut config.min_bright_percentage);
    env.f32("LIVECHECK_MAX_BRIGHT_PERCENTAGE", &mut config.max_bright_percentage);
    env.f32("LIVECHECK_CAMERA_ZOOM", &mut config.camera_zoom);
    env.usize("LIVECHECK_MAX_MOTION_READINGS", &mut config.max_motion_readings);
    env.usize("LIVECHECK_MAX_HEAD_ANGLE_READINGS", &mut config.max_head_angle_readings);
    env.f32("LIVECHECK_HEAD_ANGLE_RANGE", &mut config.significant_head_angle_range);
    env.f32("LIVECHECK_MIN_DEVICE_MOVEMENT", &mut config.min_device_movement_threshold);
    env.usize("LIVECHECK_RANDOM_CHALLENGES", &mut config.number_of_random_challenges);
    env.bool("LIVECHECK_ALWAYS_INCLUDE_BLINK", &mut config.always_include_blink);

    if let Some(list) = (env.lookup)("LIVECHECK_CHALLENGES") {
        match parse_challenge_list(&list) {
            Some(kinds) => config.challenge_types = Some(kinds),
            None => tracing::warn!(value = %list, "ignoring invalid LIVECHECK_CHALLENGES"),
        }
    }
}

/// Parse a comma-separated list such as `blink,turn_left,smile`.
pub fn parse_challenge_list(list: &str) -> Option<Vec<ChallengeType>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            ChallengeType::ALL
                .into_iter()
                .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
        })
        .collect()
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = (self.lookup)(key)?;
        match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable config override");
                None
            }
        }
    }

    fn f32(&self, key: &str, field: &mut f32) {
        if let Some(v) = self.parsed(key) {
            *field = v;
        }
    }

    fn u8(&self, key: &str, field: &mut u8) {
        if let Some(v) = self.parsed(key) {
            *field = v;
        }
    }

    fn u64(&self, key: &str, field: &mut u64) {
        if let Some(v) = self.parsed(key) {
            *field = v;
        }
    }

    fn usize(&self, key: &str, field: &mut usize) {
        if let Some(v) = self.parsed(key) {
            *field = v;
        }
    }

    fn bool(&self, key: &str, field: &mut bool) {
        if let Some(v) = (self.lookup)(key) {
            *field = v != "0";
        }
    }
}
