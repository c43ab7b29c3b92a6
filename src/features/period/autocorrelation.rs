//! Autocorrelation-based BPM candidates
//!
//! Finds periodicity in an onset envelope using FFT-accelerated,
//! variance-normalized autocorrelation.
//!
//! # Algorithm
//!
//! 1. Mean-center the envelope
//! 2. Compute autocorrelation using FFT acceleration: `ACF = IFFT(|FFT(signal)|²)`
//! 3. Normalize by `ACF[0]` (the signal energy), so scores lie in `[-1, 1]`
//! 4. Convert the BPM range to a lag range: `lag = 60 * frame_rate / BPM`
//! 5. Peak-pick, refine each peak with parabolic interpolation, convert back to
//!    BPM and fold into range
//!
//! # Reference
//!
//! Ellis, D. P. W., & Pikrakis, A. (2006). Real-time Beat Induction.
//! *Proceedings of the International Conference on Music Information Retrieval*.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::peak_picking::{find_peaks, parabolic_offset};
use super::{fold_bpm, BpmCandidate};
use crate::config::CandidateConfig;
use crate::features::onset::OnsetEnvelope;

/// Signal energy below this is treated as "no usable signal"
const MIN_DENOMINATOR: f64 = 1e-12;

/// Normalized autocorrelation of an onset envelope, indexed by lag in frames
///
/// Returns `None` for an empty or constant (zero-variance) envelope.
pub fn autocorrelation_scores(envelope: &OnsetEnvelope) -> Option<Vec<f32>> {
    let n = envelope.len();
    if n < 2 {
        return None;
    }

    let mean = envelope.samples.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
    let centered: Vec<f32> = envelope
        .samples
        .iter()
        .map(|&x| (x as f64 - mean) as f32)
        .collect();

    let denom = centered.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>();
    if denom <= MIN_DENOMINATOR {
        log::debug!("Autocorrelation: zero-variance envelope ({} frames)", n);
        return None;
    }

    let acf = compute_autocorrelation_fft(&centered);
    let scale = (1.0 / denom) as f32;
    Some(acf.into_iter().map(|v| v * scale).collect())
}

/// Lag range (inclusive, in frames) covering `[min_bpm, max_bpm]`
pub fn lag_range(frame_rate: f32, min_bpm: f32, max_bpm: f32) -> (usize, usize) {
    let lag_min = (60.0 * frame_rate / max_bpm).floor().max(1.0) as usize;
    let lag_max = (60.0 * frame_rate / min_bpm).floor().max(1.0) as usize;
    (lag_min, lag_max)
}

/// Ranked BPM candidates for one onset envelope
///
/// # Arguments
///
/// * `envelope` - Onset envelope of one analysis window
/// * `min_bpm`, `max_bpm` - Search range; candidates are folded into it
/// * `config` - Peak floor, top-K and separation
///
/// # Returns
///
/// `None` when the envelope has no variance or no peak survives; otherwise the
/// candidates ranked by score (highest first).
///
/// # Example
///
/// ```
/// use tempo_dsp::config::CandidateConfig;
/// use tempo_dsp::features::onset::OnsetEnvelope;
/// use tempo_dsp::features::period::autocorrelation::find_bpm_candidates;
///
/// // A spike every 50 frames at 100 frames/s is 120 BPM
/// let mut samples = vec![0.0f32; 1000];
/// for i in (0..1000).step_by(50) {
///     samples[i] = 1.0;
/// }
/// let envelope = OnsetEnvelope { samples, frame_rate: 100.0 };
/// let config = CandidateConfig::default();
/// let candidates = find_bpm_candidates(&envelope, 60.0, 200.0, &config).unwrap();
/// assert!((candidates[0].bpm - 120.0).abs() < 1.0);
/// ```
pub fn find_bpm_candidates(
    envelope: &OnsetEnvelope,
    min_bpm: f32,
    max_bpm: f32,
    config: &CandidateConfig,
) -> Option<Vec<BpmCandidate>> {
    let scores = autocorrelation_scores(envelope)?;
    candidates_from_scores(&scores, envelope.frame_rate, min_bpm, max_bpm, config)
}

/// Peak-pick precomputed autocorrelation scores into BPM candidates
pub fn candidates_from_scores(
    scores: &[f32],
    frame_rate: f32,
    min_bpm: f32,
    max_bpm: f32,
    config: &CandidateConfig,
) -> Option<Vec<BpmCandidate>> {
    let (lag_min, lag_max) = lag_range(frame_rate, min_bpm, max_bpm);

    let peaks = find_peaks(
        scores,
        lag_min,
        lag_max,
        config.min_peak_score,
        config.top_k,
        config.min_lag_separation,
    );

    let candidates: Vec<BpmCandidate> = peaks
        .into_iter()
        .filter_map(|(lag, score)| {
            let offset = parabolic_offset(scores[lag - 1], scores[lag], scores[lag + 1]);
            let refined_lag = lag as f32 + offset;
            let bpm = fold_bpm(60.0 * frame_rate / refined_lag, min_bpm, max_bpm)?;
            Some(BpmCandidate { bpm, score })
        })
        .collect();

    log::debug!(
        "Autocorrelation: lags [{}, {}], {} candidates{}",
        lag_min,
        lag_max,
        candidates.len(),
        candidates
            .first()
            .map(|c| format!(", best {:.2} BPM ({:.3})", c.bpm, c.score))
            .unwrap_or_default()
    );

    if candidates.is_empty() {
        None
    } else {
        Some(candidates)
    }
}

/// Compute autocorrelation using FFT acceleration
///
/// Uses the identity: ACF = IFFT(|FFT(signal)|²), zero-padded to at least
/// `2n` so the result is the linear (not circular) autocorrelation.
///
/// # Returns
///
/// Autocorrelation function (same length as input), unnormalized
fn compute_autocorrelation_fft(signal: &[f32]) -> Vec<f32> {
    let n = signal.len();
    let fft_size = (2 * n).next_power_of_two();

    let mut buffer: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    buffer.resize(fft_size, Complex::new(0.0, 0.0));

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut buffer);

    for x in buffer.iter_mut() {
        *x = Complex::new(x.norm_sqr(), 0.0);
    }

    let ifft = planner.plan_fft_inverse(fft_size);
    ifft.process(&mut buffer);

    let scale = 1.0 / fft_size as f32;
    buffer[..n].iter().map(|x| x.re * scale).collect()
}
