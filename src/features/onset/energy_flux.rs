//! Energy flux onset envelope
//!
//! Algorithm:
//! 1. Divide audio into overlapping frames (window_size, hop_size)
//! 2. Compute RMS energy per frame
//! 3. Compute energy derivative (flux): E_flux[n] = max(0, E[n] - E[n-1])
//! 4. Normalize by the maximum flux
//! 5. Smooth with a symmetric moving average of `2 * half_width + 1` frames
//!
//! Half-wave rectification keeps energy increases (attacks) and discards
//! decays, so the envelope peaks on onsets.
//!
//! The RMS frames also give the window's onset clarity: how far the quiet
//! frames sit below the loudest one. A noise floor raises the quiet frames
//! long before it disturbs the envelope peaks.
//!
//! # Example
//!
//! ```
//! use tempo_dsp::config::OnsetConfig;
//! use tempo_dsp::features::onset::energy_flux::extract_onset_envelope;
//!
//! let samples = vec![0.0f32; 44100 * 4];
//! let envelope = extract_onset_envelope(&samples, 44100, &OnsetConfig::default());
//! assert!(envelope.is_some()); // silent, but long enough
//! ```

use super::OnsetEnvelope;
use crate::config::OnsetConfig;

/// Numerical stability epsilon
const EPSILON: f32 = 1e-10;

/// Build the onset envelope of a contiguous slice of mono samples
///
/// # Reference
///
/// Bello, J. P., Daudet, L., Abdallah, S., Duxbury, C., Davies, M., & Sandler, M. B. (2005).
/// A Tutorial on Onset Detection in Music Signals.
/// *IEEE Transactions on Speech and Audio Processing*, 13(5), 1035-1047.
///
/// # Arguments
///
/// * `samples` - Audio samples (mono)
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Frame, hop and smoothing parameters
///
/// # Returns
///
/// `None` when the slice yields fewer than `config.min_frames` frames, or the
/// parameters are degenerate (zero hop/window/sample rate). A silent slice
/// still produces an (all-zero) envelope; rejecting it is the job of the
/// autocorrelation stage.
pub fn extract_onset_envelope(
    samples: &[f32],
    sample_rate: u32,
    config: &OnsetConfig,
) -> Option<OnsetEnvelope> {
    if sample_rate == 0 {
        return None;
    }
    let frame_energies = frame_rms(samples, config)?;
    Some(envelope_from_rms(&frame_energies, sample_rate, config))
}

/// RMS energy per frame (steps 1-2)
///
/// `None` under the same conditions as [`extract_onset_envelope`], except the
/// sample rate, which framing does not need.
pub fn frame_rms(samples: &[f32], config: &OnsetConfig) -> Option<Vec<f32>> {
    let frame_size = config.window_size;
    let hop_size = config.hop_size;

    if frame_size == 0 || hop_size == 0 || samples.len() < frame_size {
        return None;
    }

    let num_frames = (samples.len() - frame_size) / hop_size + 1;
    if num_frames < config.min_frames.max(2) {
        log::debug!(
            "Onset envelope: {} frames below minimum {}",
            num_frames,
            config.min_frames
        );
        return None;
    }

    Some(
        (0..num_frames)
            .map(|i| {
                let start = i * hop_size;
                let frame = &samples[start..start + frame_size];
                let sum_sq: f32 = frame.iter().map(|&x| x * x).sum();
                (sum_sq / frame_size as f32).sqrt()
            })
            .collect(),
    )
}

/// Onset envelope from per-frame RMS energies (steps 3-5)
pub fn envelope_from_rms(
    frame_energies: &[f32],
    sample_rate: u32,
    config: &OnsetConfig,
) -> OnsetEnvelope {
    // Step 3: rectified flux; the first frame has no predecessor
    let mut flux = Vec::with_capacity(frame_energies.len());
    flux.push(0.0f32);
    flux.extend(
        frame_energies
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).max(0.0)),
    );

    // Step 4: normalize
    let max_flux = flux.iter().copied().fold(0.0f32, f32::max);
    let scale = 1.0 / max_flux.max(EPSILON);
    for value in flux.iter_mut() {
        *value *= scale;
    }

    // Step 5: smooth
    let smoothed = moving_average(&flux, config.smoothing_half_width);
    let frame_rate = sample_rate as f32 / config.hop_size.max(1) as f32;

    log::debug!(
        "Onset envelope: {} frames, max flux={:.6}, frame rate={:.2} Hz",
        smoothed.len(),
        max_flux,
        frame_rate
    );

    OnsetEnvelope {
        samples: smoothed,
        frame_rate,
    }
}

/// Quantile of the frame energies treated as the window's floor
const CLARITY_FLOOR_QUANTILE: f32 = 0.2;

/// Onset clarity of a window: `1 - floor / peak` of its frame energies
///
/// 1.0 when the quiet frames are silent, falling toward 0.0 as a noise floor
/// approaches the loudest frame. 0.0 for silence or an empty slice.
pub fn onset_clarity(frame_energies: &[f32]) -> f32 {
    let mut sorted: Vec<f32> = frame_energies.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f32::total_cmp);

    let peak = sorted[sorted.len() - 1];
    if peak <= EPSILON {
        return 0.0;
    }
    let floor_idx = (CLARITY_FLOOR_QUANTILE * (sorted.len() - 1) as f32) as usize;
    (1.0 - sorted[floor_idx] / peak).clamp(0.0, 1.0)
}

/// Symmetric moving average; edges average over the frames available
fn moving_average(signal: &[f32], half_width: usize) -> Vec<f32> {
    if half_width == 0 || signal.is_empty() {
        return signal.to_vec();
    }

    // Prefix sums keep this O(n) regardless of the smoothing width
    let mut prefix = Vec::with_capacity(signal.len() + 1);
    prefix.push(0.0f64);
    for &x in signal {
        let last = *prefix.last().unwrap_or(&0.0);
        prefix.push(last + x as f64);
    }

    (0..signal.len())
        .map(|i| {
            let start = i.saturating_sub(half_width);
            let end = (i + half_width + 1).min(signal.len());
            ((prefix[end] - prefix[start]) / (end - start) as f64) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_signals::{add_noise, click_track};

    #[test]
    fn test_envelope_step_function() {
        // Silence then a sustained tone: one onset, no decay response
        let mut samples = vec![0.0f32; 44100];
        for (i, s) in samples.iter_mut().enumerate().skip(20000) {
            *s = (i as f32 * 0.05).sin() * 0.5;
        }

        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();
        let (peak_idx, peak) = env
            .samples
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });

        assert!(peak > 0.0);
        let peak_time = peak_idx as f32 / env.frame_rate;
        assert!(
            (peak_time - 20000.0 / 44100.0).abs() < 0.05,
            "Onset should be near the step, got {:.3}s",
            peak_time
        );
    }

    #[test]
    fn test_envelope_is_normalized() {
        let samples = click_track(4.0, 120.0, 44100, 0.0, 0.8);
        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();

        let max = env.samples.iter().copied().fold(0.0f32, f32::max);
        assert!(max <= 1.0 + 1e-6);
        assert!(env.samples.iter().all(|&v| v >= 0.0));
        assert!((env.frame_rate - 44100.0 / 256.0).abs() < 1e-3);
    }

    #[test]
    fn test_envelope_peaks_follow_beats() {
        let samples = click_track(4.0, 120.0, 44100, 0.0, 0.8);
        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();

        // Energy at the beat positions dominates energy between beats
        let period = env.period_frames(120.0).unwrap();
        let on: f32 = (1..7)
            .map(|k| {
                let idx = (k as f32 * period).round() as usize;
                env.samples[idx.saturating_sub(3)..(idx + 4).min(env.len())]
                    .iter()
                    .copied()
                    .fold(0.0f32, f32::max)
            })
            .sum();
        let off: f32 = (1..7)
            .map(|k| env.samples[((k as f32 + 0.5) * period).round() as usize])
            .sum();
        assert!(on > 4.0 * off, "on={:.3} off={:.3}", on, off);
    }

    #[test]
    fn test_envelope_too_short() {
        let samples = vec![0.5f32; 1000];
        assert!(extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).is_none());

        // Longer than one frame but under the frame minimum
        let samples = vec![0.5f32; 1024 + 256 * 10];
        assert!(extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).is_none());
    }

    #[test]
    fn test_envelope_silent_audio_is_all_zero() {
        let samples = vec![0.0f32; 44100];
        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();
        assert!(env.samples.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_envelope_invalid_parameters() {
        let samples = vec![0.5f32; 44100];
        let config = OnsetConfig {
            hop_size: 0,
            ..OnsetConfig::default()
        };
        assert!(extract_onset_envelope(&samples, 44100, &config).is_none());
        assert!(extract_onset_envelope(&samples, 0, &OnsetConfig::default()).is_none());
    }

    #[test]
    fn test_split_stages_match_envelope() {
        let config = OnsetConfig::default();
        let samples = click_track(4.0, 120.0, 44100, 0.0, 0.8);
        let rms = frame_rms(&samples, &config).unwrap();
        let env = extract_onset_envelope(&samples, 44100, &config).unwrap();
        assert_eq!(envelope_from_rms(&rms, 44100, &config), env);
    }

    #[test]
    fn test_clarity_falls_with_noise_floor() {
        let config = OnsetConfig::default();
        let clean = click_track(10.0, 128.0, 44100, 0.0, 0.8);
        let clarity = |noise: f32| {
            let mut samples = clean.clone();
            if noise > 0.0 {
                add_noise(&mut samples, noise, 0x1234_5678);
            }
            onset_clarity(&frame_rms(&samples, &config).unwrap())
        };

        assert!(clarity(0.0) > 0.99);
        let mut previous = clarity(0.0);
        for noise in [0.05f32, 0.1, 0.2, 0.4, 0.8] {
            let c = clarity(noise);
            assert!(c < previous, "clarity {:.3} at noise {:.2} (was {:.3})", c, noise, previous);
            previous = c;
        }
        assert!(previous < 0.3);
    }

    #[test]
    fn test_clarity_degenerate_inputs() {
        assert_eq!(onset_clarity(&[]), 0.0);
        assert_eq!(onset_clarity(&[0.0; 100]), 0.0);
        // Constant energy has no quiet frames at all
        assert_eq!(onset_clarity(&[0.5; 100]), 0.0);
    }

    #[test]
    fn test_moving_average_edges() {
        let smoothed = moving_average(&[0.0, 0.0, 3.0, 0.0, 0.0], 1);
        assert_eq!(smoothed.len(), 5);
        assert!((smoothed[0] - 0.0).abs() < 1e-6);
        assert!((smoothed[1] - 1.0).abs() < 1e-6);
        assert!((smoothed[2] - 1.0).abs() < 1e-6);
        assert!((smoothed[4] - 0.0).abs() < 1e-6);
    }
}
