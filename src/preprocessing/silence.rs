//! Silence detection

const EPSILON: f32 = 1e-10;

/// Silence detection configuration
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    /// Threshold in dBFS (default: -80.0)
    pub threshold_db: f32,

    /// Frame size for the RMS scan (default: 2048)
    pub frame_size: usize,
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self {
            threshold_db: -80.0,
            frame_size: 2048,
        }
    }
}

impl SilenceDetector {
    /// Check whether every frame of `samples` is below the threshold
    ///
    /// An empty buffer is silent.
    pub fn is_silent(&self, samples: &[f32]) -> bool {
        if samples.is_empty() {
            return true;
        }

        let threshold_linear = 10.0_f32.powf(self.threshold_db / 20.0);
        let frame_size = self.frame_size.max(1);

        let loudest = samples
            .chunks(frame_size)
            .map(|chunk| {
                let sum_sq: f32 = chunk.iter().map(|&x| x * x).sum();
                (sum_sq / chunk.len() as f32).sqrt()
            })
            .fold(0.0f32, f32::max);

        log::debug!(
            "Silence scan: loudest frame RMS={:.3e}, threshold={:.3e} ({:.1} dB)",
            loudest,
            threshold_linear,
            self.threshold_db
        );

        loudest <= threshold_linear.max(EPSILON)
    }
}
