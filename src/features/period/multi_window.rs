//! Multi-window hypothesis building
//!
//! Runs onset extraction and autocorrelation over several fixed windows of the
//! track, then expands every candidate into harmonic-variant hypotheses so
//! later stages can recover from a peak that locked onto the wrong harmonic.
//!
//! # Algorithm
//!
//! 1. Resolve the configured windows against the track duration
//! 2. For each window: onset envelope → autocorrelation → ranked candidates
//! 3. Emit each candidate plus its folded harmonic variants at decayed weights
//! 4. After `preliminary_after_windows` windows, cluster what has been gathered
//!    and report a preliminary estimate to the host
//! 5. Yield to the host once per window; a `Break` cancels the analysis
//!
//! Windows whose envelope has no usable signal are skipped, never retried.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use super::autocorrelation::{autocorrelation_scores, candidates_from_scores};
use super::candidate_filter::cluster_hypotheses;
use super::{fold_bpm, BpmCandidate};
use crate::analysis::host::{AnalysisHost, WindowProgress};
use crate::analysis::result::PreliminaryEstimate;
use crate::config::{HarmonicVariant, TempoConfig};
use crate::error::AnalysisError;
use crate::features::onset::energy_flux::{envelope_from_rms, frame_rms, onset_clarity};
use crate::features::onset::OnsetEnvelope;

/// Resolved windows starting closer than this to an earlier one are duplicates
const DUPLICATE_START_SECONDS: f32 = 1.0;

/// A span of track time analyzed on its own
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    /// Start offset in seconds
    pub start_seconds: f32,
    /// Length in seconds
    pub length_seconds: f32,
}

impl AnalysisWindow {
    /// Create a new window
    pub const fn new(start_seconds: f32, length_seconds: f32) -> Self {
        Self {
            start_seconds,
            length_seconds,
        }
    }

    /// End offset in seconds
    pub fn end_seconds(&self) -> f32 {
        self.start_seconds + self.length_seconds
    }

    /// Fit the window inside a track of `duration_seconds`
    ///
    /// A window running past the end is shifted earlier and, if the track is
    /// shorter than the window, truncated to the whole track.
    pub fn resolve(&self, duration_seconds: f32) -> Option<Self> {
        if !(duration_seconds > 0.0) {
            return None;
        }
        if self.end_seconds() <= duration_seconds {
            return Some(*self);
        }
        let start = (duration_seconds - self.length_seconds).max(0.0);
        Some(Self::new(start, duration_seconds - start))
    }

    /// Sample range `[start, end)` covered by the window
    pub fn sample_range(&self, sample_rate: u32, num_samples: usize) -> (usize, usize) {
        let sr = sample_rate as f64;
        let start = ((self.start_seconds as f64 * sr).round() as usize).min(num_samples);
        let end = ((self.end_seconds() as f64 * sr).round() as usize).min(num_samples);
        (start, end.max(start))
    }
}

/// Resolve every window against the track duration, dropping duplicates
///
/// # Example
///
/// ```
/// use tempo_dsp::features::period::multi_window::{resolve_windows, AnalysisWindow};
///
/// let windows = [AnalysisWindow::new(5.0, 20.0), AnalysisWindow::new(30.0, 20.0)];
/// // On a 12 s track both windows collapse onto the whole track
/// let resolved = resolve_windows(&windows, 12.0);
/// assert_eq!(resolved, vec![AnalysisWindow::new(0.0, 12.0)]);
/// ```
pub fn resolve_windows(windows: &[AnalysisWindow], duration_seconds: f32) -> Vec<AnalysisWindow> {
    let mut resolved: Vec<AnalysisWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        let Some(w) = window.resolve(duration_seconds) else {
            continue;
        };
        let duplicate = resolved
            .iter()
            .any(|r| (r.start_seconds - w.start_seconds).abs() < DUPLICATE_START_SECONDS);
        if !duplicate {
            resolved.push(w);
        }
    }
    resolved
}

/// Everything computed for one usable analysis window
#[derive(Debug, Clone)]
pub struct WindowAnalysis {
    /// Resolved window
    pub window: AnalysisWindow,
    /// Onset envelope of the window
    pub envelope: OnsetEnvelope,
    /// Normalized autocorrelation, indexed by lag in frames
    pub scores: Vec<f32>,
    /// Ranked candidates (may be empty when no peak cleared the floor)
    pub candidates: Vec<BpmCandidate>,
    /// Onset clarity of the window's frame energies, in [0, 1]
    pub clarity: f32,
}

/// Analyze one window: envelope, autocorrelation and candidates
///
/// Returns `None` when the window is too short or has no variance.
pub fn analyze_window(
    samples: &[f32],
    sample_rate: u32,
    window: AnalysisWindow,
    config: &TempoConfig,
) -> Option<WindowAnalysis> {
    let (start, end) = window.sample_range(sample_rate, samples.len());
    if sample_rate == 0 {
        return None;
    }
    let frame_energies = frame_rms(&samples[start..end], &config.onset)?;
    let clarity = onset_clarity(&frame_energies);
    let envelope = envelope_from_rms(&frame_energies, sample_rate, &config.onset);
    let scores = match autocorrelation_scores(&envelope) {
        Some(scores) => scores,
        None => {
            log::warn!(
                "Window {:.1}s+{:.1}s has {} frames but no usable signal",
                window.start_seconds,
                window.length_seconds,
                envelope.len()
            );
            return None;
        }
    };
    let candidates = candidates_from_scores(
        &scores,
        envelope.frame_rate,
        config.min_bpm,
        config.max_bpm,
        &config.candidates,
    )
    .unwrap_or_default();

    Some(WindowAnalysis {
        window,
        envelope,
        scores,
        candidates,
        clarity,
    })
}

/// A weighted tempo reading contributed by one window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoHypothesis {
    /// Tempo in BPM
    pub bpm: f32,
    /// Evidence weight
    pub weight: f32,
    /// Index of the contributing window in the pool
    pub window: usize,
    /// True for a harmonic reinterpretation rather than a direct candidate
    pub is_variant: bool,
}

/// Expand a candidate into itself plus its folded harmonic variants
///
/// A variant that folds back within `tolerance_bpm` of the candidate adds no
/// information and is dropped.
pub fn expand_candidate(
    candidate: &BpmCandidate,
    window: usize,
    variants: &[HarmonicVariant],
    min_bpm: f32,
    max_bpm: f32,
    tolerance_bpm: f32,
) -> Vec<TempoHypothesis> {
    let mut hypotheses = Vec::with_capacity(variants.len() + 1);
    hypotheses.push(TempoHypothesis {
        bpm: candidate.bpm,
        weight: candidate.score,
        window,
        is_variant: false,
    });

    for variant in variants {
        let Some(bpm) = fold_bpm(candidate.bpm * variant.ratio, min_bpm, max_bpm) else {
            continue;
        };
        if (bpm - candidate.bpm).abs() <= tolerance_bpm {
            continue;
        }
        hypotheses.push(TempoHypothesis {
            bpm,
            weight: candidate.score * variant.weight,
            window,
            is_variant: true,
        });
    }
    hypotheses
}

/// Hypotheses gathered over every usable window
#[derive(Debug, Clone, Default)]
pub struct HypothesisPool {
    /// Usable windows, in processing order
    pub windows: Vec<WindowAnalysis>,
    /// All hypotheses; `TempoHypothesis::window` indexes `windows`
    pub hypotheses: Vec<TempoHypothesis>,
    /// Resolved windows attempted, usable or not
    pub windows_attempted: usize,
}

impl HypothesisPool {
    /// True when no window produced a hypothesis
    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    /// Number of windows skipped for lack of signal
    pub fn windows_skipped(&self) -> usize {
        self.windows_attempted - self.windows.len()
    }
}

/// Build the hypothesis pool across all analysis windows
///
/// # Arguments
///
/// * `samples` - Sanitized mono samples
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Analysis configuration
/// * `host` - Receives one `on_window` call per window and at most one
///   preliminary estimate
///
/// # Errors
///
/// Returns `AnalysisError::Cancelled` when the host breaks at a window boundary
pub fn build_hypotheses(
    samples: &[f32],
    sample_rate: u32,
    config: &TempoConfig,
    host: &mut dyn AnalysisHost,
) -> Result<HypothesisPool, AnalysisError> {
    let duration = samples.len() as f32 / sample_rate as f32;
    let windows = resolve_windows(&config.windows, duration);
    let total = windows.len();

    log::debug!(
        "Building hypotheses: {:.1}s of audio, {} windows ({} configured)",
        duration,
        total,
        config.windows.len()
    );

    let mut pool = HypothesisPool::default();
    let mut preliminary_sent = false;

    for (index, window) in windows.into_iter().enumerate() {
        pool.windows_attempted += 1;
        let analysis = analyze_window(samples, sample_rate, window, config);
        let usable = analysis.is_some();

        if let Some(analysis) = analysis {
            let slot = pool.windows.len();
            for candidate in &analysis.candidates {
                pool.hypotheses.extend(expand_candidate(
                    candidate,
                    slot,
                    &config.harmonic_variants,
                    config.min_bpm,
                    config.max_bpm,
                    config.cluster.tolerance_bpm,
                ));
            }
            log::debug!(
                "Window {} ({:.1}s+{:.1}s): {} candidates",
                index,
                window.start_seconds,
                window.length_seconds,
                analysis.candidates.len()
            );
            pool.windows.push(analysis);
        }

        if !preliminary_sent && index + 1 == config.preliminary_after_windows {
            preliminary_sent = true;
            if let Some(best) = cluster_hypotheses(&pool.hypotheses, &config.cluster).first() {
                log::debug!("Preliminary estimate: {:.2} BPM", best.center);
                host.on_preliminary(PreliminaryEstimate {
                    bpm: best.center,
                    confidence: config.preliminary_confidence,
                });
            }
        }

        let progress = WindowProgress {
            index,
            total,
            window,
            usable,
            hypotheses: pool.hypotheses.len(),
        };
        if let ControlFlow::Break(()) = host.on_window(&progress) {
            log::debug!("Host cancelled after window {}", index);
            return Err(AnalysisError::Cancelled);
        }
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::host::NoopHost;
    use crate::config::{OCTAVE_WEIGHT, TRIPLET_WEIGHT};
    use crate::test_signals::click_track;

    struct Recorder {
        windows: Vec<WindowProgress>,
        preliminary: Vec<PreliminaryEstimate>,
        stop_after: Option<usize>,
    }

    impl Recorder {
        fn new(stop_after: Option<usize>) -> Self {
            Self {
                windows: vec![],
                preliminary: vec![],
                stop_after,
            }
        }
    }

    impl AnalysisHost for Recorder {
        fn on_window(&mut self, progress: &WindowProgress) -> ControlFlow<()> {
            self.windows.push(*progress);
            match self.stop_after {
                Some(n) if self.windows.len() >= n => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }

        fn on_preliminary(&mut self, estimate: PreliminaryEstimate) {
            self.preliminary.push(estimate);
        }
    }

    #[test]
    fn test_resolve_window_inside_track() {
        let w = AnalysisWindow::new(5.0, 20.0);
        assert_eq!(w.resolve(100.0), Some(w));
    }

    #[test]
    fn test_resolve_window_shifted_and_truncated() {
        let w = AnalysisWindow::new(80.0, 20.0);
        assert_eq!(w.resolve(60.0), Some(AnalysisWindow::new(40.0, 20.0)));
        assert_eq!(w.resolve(8.0), Some(AnalysisWindow::new(0.0, 8.0)));
        assert_eq!(w.resolve(0.0), None);
    }

    #[test]
    fn test_resolve_windows_drops_duplicates() {
        let config = TempoConfig::default();
        let resolved = resolve_windows(&config.windows, 60.0);
        let starts: Vec<f32> = resolved.iter().map(|w| w.start_seconds).collect();
        assert_eq!(starts, vec![5.0, 30.0, 40.0]);
    }

    #[test]
    fn test_expand_candidate_variants() {
        let variants = TempoConfig::default().harmonic_variants;
        let candidate = BpmCandidate {
            bpm: 120.0,
            score: 0.8,
        };
        let hyps = expand_candidate(&candidate, 3, &variants, 60.0, 200.0, 4.5);

        assert_eq!(hyps[0].bpm, 120.0);
        assert!(!hyps[0].is_variant);
        assert!(hyps.iter().all(|h| h.window == 3));

        // x2 folds back onto 120 and is dropped; x0.5 = 60 is in range
        assert!(!hyps[1..].iter().any(|h| (h.bpm - 120.0).abs() < 1.0));
        let half = hyps.iter().find(|h| (h.bpm - 60.0).abs() < 1e-3).unwrap();
        assert!((half.weight - 0.8 * OCTAVE_WEIGHT).abs() < 1e-6);
        let triplet = hyps.iter().find(|h| (h.bpm - 180.0).abs() < 1e-3).unwrap();
        assert!((triplet.weight - 0.8 * TRIPLET_WEIGHT).abs() < 1e-6);
        assert!(hyps[1..].iter().all(|h| h.is_variant));
    }

    #[test]
    fn test_build_hypotheses_click_track() {
        let samples = click_track(60.0, 128.0, 44100, 0.0, 0.8);
        let config = TempoConfig::default();
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();

        assert_eq!(pool.windows_attempted, 3);
        assert_eq!(pool.windows.len(), 3);
        assert_eq!(pool.windows_skipped(), 0);
        assert!(!pool.is_empty());
        assert!(pool
            .hypotheses
            .iter()
            .any(|h| !h.is_variant && (h.bpm - 128.0).abs() < 1.5));
        assert!(pool.hypotheses.iter().all(|h| h.window < pool.windows.len()));
    }

    #[test]
    fn test_build_hypotheses_silence_is_empty() {
        let samples = vec![0.0f32; 44100 * 30];
        let config = TempoConfig::default();
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();
        assert!(pool.is_empty());
        assert!(pool.windows.is_empty());
        assert_eq!(pool.windows_skipped(), pool.windows_attempted);
    }

    #[test]
    fn test_host_sees_every_window_and_one_preliminary() {
        let samples = click_track(100.0, 128.0, 44100, 0.0, 0.8);
        let config = TempoConfig::default();
        let mut host = Recorder::new(None);
        build_hypotheses(&samples, 44100, &config, &mut host).unwrap();

        assert_eq!(host.windows.len(), 4);
        assert!(host.windows.iter().all(|p| p.total == 4 && p.usable));
        assert_eq!(host.preliminary.len(), 1);
        assert_eq!(host.preliminary[0].confidence, config.preliminary_confidence);
    }

    #[test]
    fn test_host_cancellation_stops_at_window_boundary() {
        let samples = click_track(100.0, 128.0, 44100, 0.0, 0.8);
        let config = TempoConfig::default();
        let mut host = Recorder::new(Some(1));
        let result = build_hypotheses(&samples, 44100, &config, &mut host);

        assert_eq!(result.unwrap_err(), AnalysisError::Cancelled);
        assert_eq!(host.windows.len(), 1);
        assert!(host.preliminary.is_empty());
    }
}
