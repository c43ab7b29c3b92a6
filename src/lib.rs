//! # Tempo DSP
//!
//! A tempo and meter estimation engine for DJ applications: BPM, straight vs.
//! breakbeat classification and a confidence score from decoded mono audio.
//!
//! ## Features
//!
//! - **Multi-window analysis**: energy-flux onset envelopes and normalized
//!   autocorrelation over several windows of the track
//! - **Harmonic disambiguation**: hypothesis clustering, harmonic refinement
//!   and gated octave/meter promotion
//! - **Meter evidence**: on-beat dominance and off-beat ratio
//! - **Cooperative staging**: one host suspension point per window, with an
//!   early preliminary estimate and cancellation
//!
//! ## Quick Start
//!
//! ```no_run
//! use tempo_dsp::{estimate_tempo, BeatMode};
//!
//! // Load audio samples (mono, f32)
//! let samples: Vec<f32> = vec![]; // Your audio data
//! let sample_rate = 44100;
//!
//! if let Some(result) = estimate_tempo(&samples, sample_rate, BeatMode::Auto, None)? {
//!     println!("BPM: {:.2} (confidence: {:.0})", result.bpm, result.confidence);
//!     println!("Beat type: {:?}", result.beat_type_auto);
//! }
//! # Ok::<(), tempo_dsp::AnalysisError>(())
//! ```
//!
//! ## Architecture
//!
//! The analysis pipeline follows this flow:
//!
//! ```text
//! Samples → Preprocessing → Windows (onset → autocorrelation → hypotheses)
//!         → Clustering → Harmonic refinement → Promotion → Confidence → Result
//! ```
//!
//! Silence, too-short input and input without periodicity are not errors:
//! they yield `Ok(None)`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod features;
pub mod preprocessing;

#[cfg(test)]
mod test_signals;

use std::borrow::Cow;

// Re-export main types
pub use analysis::host::{AnalysisHost, NoopHost, ProgressFn, WindowProgress};
pub use analysis::metadata::TempoMetadata;
pub use analysis::result::{AnalysisFlag, BeatMode, BeatType, PreliminaryEstimate, TempoResult};
pub use config::TempoConfig;
pub use error::AnalysisError;

use analysis::beat_mode::estimate_for_mode;
use analysis::metadata::ALGORITHM_VERSION;
use features::meter::MeterScorer;
use features::period::candidate_filter::cluster_hypotheses;
use features::period::multi_window::build_hypotheses;
use preprocessing::sanitize::sanitize_samples;
use preprocessing::silence::SilenceDetector;

/// Estimate tempo and meter with the default configuration
///
/// # Arguments
///
/// * `samples` - Mono audio samples
/// * `sample_rate` - Sample rate in Hz (typically 44100 or 48000)
/// * `beat_mode` - Requested mode; `Auto` runs straight and breakbeat and keeps the better
/// * `on_progress` - Optional sink for the one preliminary estimate
///
/// # Returns
///
/// `Ok(None)` for silent, too-short or aperiodic input
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate
///
/// # Example
///
/// ```no_run
/// use tempo_dsp::{estimate_tempo, BeatMode};
///
/// let samples = vec![0.0f32; 44100 * 30]; // 30 seconds of silence
/// let result = estimate_tempo(&samples, 44100, BeatMode::from("straight"), None)?;
/// assert!(result.is_none());
/// # Ok::<(), tempo_dsp::AnalysisError>(())
/// ```
pub fn estimate_tempo(
    samples: &[f32],
    sample_rate: u32,
    beat_mode: BeatMode,
    on_progress: Option<&mut dyn FnMut(PreliminaryEstimate)>,
) -> Result<Option<TempoResult>, AnalysisError> {
    let config = TempoConfig::default();
    match on_progress {
        Some(callback) => {
            estimate_tempo_with(samples, sample_rate, beat_mode, &config, &mut ProgressFn(callback))
        }
        None => estimate_tempo_with(samples, sample_rate, beat_mode, &config, &mut NoopHost),
    }
}

/// Estimate tempo and meter with an explicit configuration and host
///
/// The host is called once after every analysis window and may cancel there.
///
/// # Errors
///
/// Returns `AnalysisError::InvalidInput` for a zero sample rate or an invalid
/// configuration, and `AnalysisError::Cancelled` when the host stops the analysis
pub fn estimate_tempo_with(
    samples: &[f32],
    sample_rate: u32,
    beat_mode: BeatMode,
    config: &TempoConfig,
    host: &mut dyn AnalysisHost,
) -> Result<Option<TempoResult>, AnalysisError> {
    log::debug!(
        "Starting tempo analysis: {} samples at {} Hz, mode {}",
        samples.len(),
        sample_rate,
        beat_mode
    );

    if sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("Invalid sample rate".to_string()));
    }
    config.validate()?;

    if samples.is_empty() {
        log::debug!("Empty input, no tempo");
        return Ok(None);
    }

    // Preprocessing
    let samples: Cow<'_, [f32]> = match sanitize_samples(samples) {
        Some(clean) => Cow::Owned(clean),
        None => Cow::Borrowed(samples),
    };

    let silence = SilenceDetector {
        threshold_db: config.silence_threshold_db,
        ..SilenceDetector::default()
    };
    if silence.is_silent(&samples) {
        log::debug!("Input below {:.0} dBFS, no tempo", config.silence_threshold_db);
        return Ok(None);
    }

    // Hypotheses and consensus
    let pool = build_hypotheses(&samples, sample_rate, config, host)?;
    if pool.is_empty() {
        log::debug!("No hypotheses from {} windows, no tempo", pool.windows_attempted);
        return Ok(None);
    }
    let clusters = cluster_hypotheses(&pool.hypotheses, &config.cluster);
    let scorer = MeterScorer::new(&pool.windows, &config.support);

    // Refinement, promotion and confidence per mode
    let Some(outcome) = estimate_for_mode(beat_mode, &clusters, &scorer, config) else {
        return Ok(None);
    };

    let mut flags = Vec::new();
    if pool.windows_attempted < config.windows.len() {
        flags.push(AnalysisFlag::ShortInput);
    }
    if pool.windows_skipped() > 0 {
        flags.push(AnalysisFlag::SkippedWindows);
    }
    if outcome.confidence.is_ambiguous() {
        flags.push(AnalysisFlag::AmbiguousHarmonic);
    }
    if !outcome.promotions.is_empty() {
        flags.push(AnalysisFlag::Promoted);
    }

    let evidence = outcome.evidence;
    log::debug!(
        "Tempo: {:.2} BPM ({}), confidence {:.1}, {:?} (breakbeat score {:.3})",
        evidence.bpm,
        outcome.mode,
        outcome.confidence.total,
        evidence.beat_type,
        evidence.breakbeat_score
    );

    Ok(Some(TempoResult {
        bpm: evidence.bpm,
        confidence: outcome.confidence.total,
        beat_type_auto: evidence.beat_type,
        breakbeat_score: evidence.breakbeat_score,
        beat_mode,
        selected_mode: outcome.mode,
        support: evidence.support,
        metadata: TempoMetadata {
            algorithm_version: ALGORITHM_VERSION.to_string(),
            windows_analyzed: pool.windows.len(),
            hypothesis_count: pool.hypotheses.len(),
            cluster_count: clusters.len(),
            promotions: outcome.promotions,
            flags,
        },
    }))
}
