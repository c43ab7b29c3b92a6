//! Period estimation modules
//!
//! Convert onset envelopes to BPM candidates and tempo hypotheses using:
//! - Autocorrelation
//! - Peak picking with parabolic refinement
//! - Multi-window hypothesis building
//! - Hypothesis clustering

pub mod autocorrelation;
pub mod candidate_filter;
pub mod multi_window;
pub mod peak_picking;

use serde::{Deserialize, Serialize};

/// Upper bound on doubling/halving steps when folding into range
const MAX_FOLD_STEPS: usize = 32;

/// BPM candidate with its autocorrelation score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmCandidate {
    /// BPM estimate
    pub bpm: f32,

    /// Normalized autocorrelation at the candidate lag
    pub score: f32,
}

/// Fold `bpm` into `[min_bpm, max_bpm]` by repeated doubling/halving
///
/// Returns `None` for non-finite or non-positive input, or when the range is
/// narrower than an octave and no power-of-two multiple lands inside it.
///
/// # Example
///
/// ```
/// use tempo_dsp::features::period::fold_bpm;
///
/// assert_eq!(fold_bpm(45.0, 60.0, 200.0), Some(90.0));
/// assert_eq!(fold_bpm(260.0, 60.0, 200.0), Some(130.0));
/// assert_eq!(fold_bpm(f32::NAN, 60.0, 200.0), None);
/// ```
pub fn fold_bpm(bpm: f32, min_bpm: f32, max_bpm: f32) -> Option<f32> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return None;
    }

    let mut folded = bpm;
    for _ in 0..MAX_FOLD_STEPS {
        if folded < min_bpm {
            folded *= 2.0;
        } else if folded > max_bpm {
            folded *= 0.5;
        } else {
            return Some(folded);
        }
    }
    None
}
