//! Anti-spoofing cross-check between head motion and device motion.
//!
//! A live subject turning their head in front of a handheld phone produces
//! some device movement as well: hands are never perfectly still while the
//! user watches the screen. A photo or video panned in front of a phone
//! resting on a table produces large apparent head rotation while the device
//! orientation stays flat.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photos or replayed video moved in front of a
//!   stationary device during the head-turn challenges.
//! - **Does not block:** Attacks where the device itself is moved in step
//!   with the presented media, or sessions with no turn challenge (the
//!   check fails open without yaw history).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::LivenessConfig;
use crate::types::MotionSample;

/// Outcome of a motion-correlation check.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCorrelationResult {
    /// Whether the head and device motion are consistent with a live subject.
    pub is_consistent: bool,
    /// Spread (max − min) of recorded head yaw, in degrees.
    pub head_range: f32,
    /// Spread of the device Y-axis orientation over the buffered window.
    pub device_range: f32,
    /// Number of device samples the check ran against.
    pub device_samples: usize,
}

#[derive(Debug)]
struct MotionBuffer {
    samples: VecDeque<MotionSample>,
    capacity: usize,
}

/// Producer-side handle onto the device-motion buffer.
///
/// Cloned into the motion-sensor subscription, which keeps pushing samples
/// for as long as it runs, independent of session boundaries.
#[derive(Debug, Clone)]
pub struct MotionFeed {
    buffer: Arc<Mutex<MotionBuffer>>,
}

impl MotionFeed {
    /// Append a reading, evicting the oldest once at capacity.
    pub fn push(&self, sample: MotionSample) {
        let mut buffer = lock(&self.buffer);
        if buffer.samples.len() == buffer.capacity {
            buffer.samples.pop_front();
        }
        buffer.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        lock(&self.buffer).samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compares head-yaw spread against device-orientation spread.
#[derive(Debug, Clone)]
pub struct MotionCorrelationChecker {
    feed: MotionFeed,
    significant_head_angle_range: f32,
    min_device_movement_threshold: f32,
}

impl MotionCorrelationChecker {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            feed: MotionFeed {
                buffer: Arc::new(Mutex::new(MotionBuffer {
                    samples: VecDeque::with_capacity(config.max_motion_readings),
                    capacity: config.max_motion_readings,
                })),
            },
            significant_head_angle_range: config.significant_head_angle_range,
            min_device_movement_threshold: config.min_device_movement_threshold,
        }
    }

    /// Handle for the motion-sensor producer.
    pub fn feed(&self) -> MotionFeed {
        self.feed.clone()
    }

    pub fn add_motion_sample(&self, sample: MotionSample) {
        self.feed.push(sample);
    }

    /// Copy of the buffered device samples, oldest first.
    pub fn snapshot(&self) -> Vec<MotionSample> {
        lock(&self.feed.buffer).samples.iter().copied().collect()
    }

    /// Drop every buffered device sample.
    pub fn reset(&self) {
        lock(&self.feed.buffer).samples.clear();
    }

    /// Check a head-yaw history against the buffered device motion.
    ///
    /// Returns `is_consistent = true` when either series is empty, since
    /// there is nothing to correlate. Flags the session only when the head
    /// swept more than `significant_head_angle_range` while the device Y
    /// axis moved less than `min_device_movement_threshold`.
    pub fn verify<'a, I>(&self, head_yaw_history: I) -> MotionCorrelationResult
    where
        I: IntoIterator<Item = &'a f32>,
    {
        let device = self.snapshot();
        let head_range = spread(head_yaw_history.into_iter().copied());
        let device_range = spread(device.iter().map(|s| s.y));

        let (Some(head_range), Some(device_range)) = (head_range, device_range) else {
            return MotionCorrelationResult {
                is_consistent: true, // nothing to correlate
                head_range: head_range.unwrap_or(0.0),
                device_range: device_range.unwrap_or(0.0),
                device_samples: device.len(),
            };
        };

        let suspicious = head_range > self.significant_head_angle_range
            && device_range < self.min_device_movement_threshold;

        if suspicious {
            tracing::warn!(
                head_range,
                device_range,
                device_samples = device.len(),
                "head motion without device motion; possible presentation attack"
            );
        }

        MotionCorrelationResult {
            is_consistent: !suspicious,
            head_range,
            device_range,
            device_samples: device.len(),
        }
    }
}

/// max − min, or `None` for an empty series.
fn spread(values: impl Iterator<Item = f32>) -> Option<f32> {
    values
        .fold(None, |acc: Option<(f32, f32)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .map(|(lo, hi)| hi - lo)
}

/// The buffer holds plain samples, so a panic mid-push cannot leave it
/// logically inconsistent; recover from poisoning rather than propagate it.
fn lock(buffer: &Mutex<MotionBuffer>) -> MutexGuard<'_, MotionBuffer> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
