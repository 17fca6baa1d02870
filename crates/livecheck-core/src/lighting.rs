use crate::config::LivenessConfig;

/// Largest 8-bit luma value, used to normalize brightness to [0, 1].
const MAX_LUMA: f32 = 255.0;

/// Frame brightness and screen-glare heuristics over the luma plane.
#[derive(Debug, Clone)]
pub struct LightingQualityMonitor {
    min_lighting_threshold: f32,
    bright_pixel_threshold: u8,
    min_bright_percentage: f32,
    max_bright_percentage: f32,

    lighting_value: f32,
    is_good_lighting: bool,
    glare_detected: bool,
}

impl LightingQualityMonitor {
    pub fn new(config: &LivenessConfig) -> Self {
        Self {
            min_lighting_threshold: config.min_lighting_threshold,
            bright_pixel_threshold: config.bright_pixel_threshold,
            min_bright_percentage: config.min_bright_percentage,
            max_bright_percentage: config.max_bright_percentage,
            lighting_value: 0.0,
            // No frame seen yet; do not block on an unknown.
            is_good_lighting: true,
            glare_detected: false,
        }
    }

    /// Recompute normalized mean brightness. An empty plane leaves the last
    /// judgement in place.
    pub fn update_from_frame(&mut self, luminance: &[u8]) {
        if luminance.is_empty() {
            tracing::trace!("empty luminance plane; lighting unchanged");
            return;
        }

        let sum: u64 = luminance.iter().map(|&v| u64::from(v)).sum();
        let mean = sum as f64 / luminance.len() as f64;
        self.lighting_value = (mean as f32) / MAX_LUMA;
        self.is_good_lighting = self.lighting_value > self.min_lighting_threshold;
    }

    /// True when the share of near-saturated pixels falls in the band typical
    /// of a specular highlight on a glossy screen. Too few is no glare, too
    /// many is simply a bright scene.
    pub fn detect_glare(&mut self, luminance: &[u8]) -> bool {
        if luminance.is_empty() {
            self.glare_detected = false;
            return false;
        }

        let bright = luminance
            .iter()
            .filter(|&&v| v > self.bright_pixel_threshold)
            .count();
        let fraction = bright as f32 / luminance.len() as f32;

        self.glare_detected =
            fraction > self.min_bright_percentage && fraction < self.max_bright_percentage;
        self.glare_detected
    }

    /// Last normalized brightness in [0, 1].
    pub fn lighting_value(&self) -> f32 {
        self.lighting_value
    }

    pub fn is_good_lighting(&self) -> bool {
        self.is_good_lighting
    }

    pub fn glare_detected(&self) -> bool {
        self.glare_detected
    }
}
