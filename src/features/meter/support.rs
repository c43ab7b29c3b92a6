//! Tempo support score
//!
//! Re-scores a candidate BPM directly against the autocorrelation of every
//! analysis window: the best normalized autocorrelation within a small lag
//! jitter around the candidate's period, clamped at zero and averaged over
//! the usable windows.

use crate::config::TempoConfig;
use crate::features::onset::OnsetEnvelope;
use crate::features::period::multi_window::{analyze_window, resolve_windows, WindowAnalysis};

/// Support of `bpm` in one window
///
/// Returns `0.0` for a non-finite or non-positive BPM, or when its period lies
/// outside the autocorrelation.
pub fn window_support(
    envelope: &OnsetEnvelope,
    scores: &[f32],
    bpm: f32,
    lag_jitter: usize,
) -> f32 {
    let Some(period) = envelope.period_frames(bpm) else {
        return 0.0;
    };
    let center = period.round();
    if !(center >= 1.0) || center as usize >= scores.len() {
        return 0.0;
    }
    let center = center as usize;
    let lo = center.saturating_sub(lag_jitter).max(1);
    let hi = (center + lag_jitter).min(scores.len() - 1);

    scores[lo..=hi]
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max)
}

/// Average support of `bpm` over precomputed windows
pub fn support_over_windows(windows: &[WindowAnalysis], bpm: f32, lag_jitter: usize) -> f32 {
    if windows.is_empty() || !(bpm.is_finite() && bpm > 0.0) {
        return 0.0;
    }
    let total: f32 = windows
        .iter()
        .map(|w| window_support(&w.envelope, &w.scores, bpm, lag_jitter))
        .sum();
    total / windows.len() as f32
}

/// Support score of `bpm` computed from raw samples
///
/// Rebuilds the onset envelope and autocorrelation of every configured window
/// (skipping windows too short or silent to analyze) and averages the best
/// score within `support.lag_jitter` frames of the BPM's period. The estimator
/// itself computes the windows once per analysis and reuses them through
/// [`MeterScorer`](super::MeterScorer); this form is for one-off queries.
///
/// # Example
///
/// ```no_run
/// use tempo_dsp::config::TempoConfig;
/// use tempo_dsp::features::meter::support::tempo_support_score;
///
/// let samples = vec![0.0f32; 44100 * 60];
/// let support = tempo_support_score(&samples, 44100, 128.0, &TempoConfig::default());
/// assert_eq!(support, 0.0);
/// ```
pub fn tempo_support_score(
    samples: &[f32],
    sample_rate: u32,
    bpm: f32,
    config: &TempoConfig,
) -> f32 {
    if sample_rate == 0 || samples.is_empty() {
        return 0.0;
    }
    let duration = samples.len() as f32 / sample_rate as f32;
    let windows: Vec<WindowAnalysis> = resolve_windows(&config.windows, duration)
        .into_iter()
        .filter_map(|w| analyze_window(samples, sample_rate, w, config))
        .collect();
    support_over_windows(&windows, bpm, config.support.lag_jitter)
}
