//! Confidence scoring module
//!
//! Scores how trustworthy a final tempo is, independently of how it was found.
//!
//! # Confidence Components
//!
//! 1. **Agreement**: how many analysis windows corroborate the final tempo in
//!    its cluster. A window with a direct candidate counts fully, one matched
//!    only through harmonic variants counts half.
//! 2. **Margin**: support gap between the final tempo and its strongest
//!    weighted harmonic alternative (half, double, 3/2, 2/3), scaled by the
//!    mean onset clarity of the windows. Breakbeat readings skip the double
//!    alternative: their off-beats already sit on that grid.
//! 3. **Prior**: small bonus inside the plausible bands of the reading's meter
//!
//! `confidence = clamp(agreement + margin + prior, 0, 99)`

use serde::{Deserialize, Serialize};

use crate::config::TempoConfig;
use crate::features::meter::beat_type::BeatType;
use crate::features::meter::MeterScorer;
use crate::features::period::candidate_filter::{nearest_cluster, TempoCluster};
use crate::preprocessing::sanitize::finite_or;

/// Upper bound of the confidence scale
pub const MAX_CONFIDENCE: f32 = 99.0;

/// Credit for a window matched only through harmonic variants
const VARIANT_CREDIT: f32 = 0.5;

/// Breakdown of a tempo confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoConfidence {
    /// Window agreement term
    pub agreement: f32,
    /// Support margin term
    pub margin: f32,
    /// Plausible-band bonus
    pub prior: f32,
    /// Clamped total (0-99)
    pub total: f32,
}

impl TempoConfidence {
    /// True when some harmonic alternative is as well supported as the tempo
    pub fn is_ambiguous(&self) -> bool {
        self.margin <= 0.0
    }
}

/// Compute the confidence of a final tempo
///
/// # Arguments
///
/// * `bpm` - Final tempo
/// * `beat_type` - Meter of the final reading; selects bands and alternatives
/// * `clusters` - Ranked hypothesis clusters
/// * `scorer` - Support over the analysis windows
/// * `config` - Analysis configuration
pub fn compute_tempo_confidence(
    bpm: f32,
    beat_type: BeatType,
    clusters: &[TempoCluster],
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> TempoConfidence {
    let cfg = &config.confidence;

    let agreement =
        cfg.agreement_weight * window_agreement(bpm, clusters, scorer.window_count(), config);

    let support = scorer.support(bpm);
    let best_alternative = cfg
        .alternatives_for(beat_type)
        .iter()
        .map(|alt| alt.weight * scorer.support(bpm * alt.ratio))
        .fold(0.0f32, f32::max);
    let clarity = if cfg.clarity_scaled_margin { scorer.clarity() } else { 1.0 };
    let margin =
        (cfg.margin_scale * (support - best_alternative).max(0.0)).min(cfg.margin_cap) * clarity;

    let prior = if cfg.plausible_bands_for(beat_type).iter().any(|band| band.contains(bpm)) {
        cfg.prior_bonus
    } else {
        0.0
    };

    let total = finite_or(agreement + margin + prior, 0.0).clamp(0.0, MAX_CONFIDENCE);

    log::debug!(
        "Confidence {:.2} BPM {:?}: agreement={:.1} margin={:.1} \
         (support {:.3} vs {:.3}, clarity {:.2}) prior={:.1} -> {:.1}",
        bpm,
        beat_type,
        agreement,
        margin,
        support,
        best_alternative,
        clarity,
        prior,
        total
    );

    TempoConfidence {
        agreement,
        margin,
        prior,
        total,
    }
}

/// Fraction of windows corroborating `bpm` in the cluster nearest it
fn window_agreement(
    bpm: f32,
    clusters: &[TempoCluster],
    window_count: usize,
    config: &TempoConfig,
) -> f32 {
    if window_count == 0 {
        return 0.0;
    }
    let Some(idx) = nearest_cluster(clusters, bpm, config.cluster.tolerance_bpm) else {
        return 0.0;
    };

    let tolerance = config.confidence.agreement_tolerance_bpm;
    let mut credit = vec![0.0f32; window_count];
    for member in &clusters[idx].members {
        if (member.bpm - bpm).abs() > tolerance || member.window >= window_count {
            continue;
        }
        let value = if member.is_variant { VARIANT_CREDIT } else { 1.0 };
        credit[member.window] = credit[member.window].max(value);
    }

    credit.iter().sum::<f32>() / window_count as f32
}
