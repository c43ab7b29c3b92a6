//! Onset detection modules
//!
//! Turns mono samples into a frame-rate onset envelope:
//! - Energy flux (half-wave rectified RMS difference)

pub mod energy_flux;

/// Normalized, smoothed onset strength sampled at the frame rate
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    /// Per-frame onset strength in [0, 1]
    pub samples: Vec<f32>,

    /// Frames per second (`sample_rate / hop_size`)
    pub frame_rate: f32,
}

impl OnsetEnvelope {
    /// Number of frames
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the envelope has no frames
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Beat period in (fractional) frames for `bpm`, if meaningful
    pub fn period_frames(&self, bpm: f32) -> Option<f32> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return None;
        }
        let period = 60.0 * self.frame_rate / bpm;
        period.is_finite().then_some(period)
    }

    /// Envelope duration in seconds
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.frame_rate
    }
}
