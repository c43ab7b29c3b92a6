//! Harmonic refinement
//!
//! Explores harmonic reinterpretations of a seed tempo. Each branch is folded
//! into range and locally searched against the support score; the branch
//! score combines support, on-beat dominance, the off-grid penalty and the
//! mode's musical priors:
//!
//! ```text
//! score = support * branch_weight
//!       + dominance_weight(mode) * ln(1 + dominance)
//!       - offgrid_weight * offgrid_ratio
//!       + prior(mode, bpm)
//! ```
//!
//! The off-grid term keeps a third or a quarter of the pulse from winning on
//! dominance alone: at such a reading the off-beat falls between hits.

use crate::analysis::result::{BeatMode, MeterEvidence};
use crate::config::{HarmonicVariant, TempoConfig};
use crate::features::meter::MeterScorer;
use crate::features::period::fold_bpm;

/// Branches folding within this distance of an earlier branch are duplicates
const BRANCH_DEDUP_BPM: f32 = 1.0;

/// Minimum score gain for a local-search trial to replace the current best
const MIN_IMPROVEMENT: f32 = 1e-6;

/// How much harmonic second-guessing a refinement may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineScope {
    /// Try every configured harmonic branch
    Full,
    /// Support-only local search around the seed, no harmonic swapping
    FineTune,
}

/// Best-supported BPM near `center`
///
/// Trials are visited outward from the center (`0, +step, -step, +2*step, ...`)
/// up to `radius`; trials outside `[min_bpm, max_bpm]` are skipped. A trial
/// replaces the best only on a strict improvement, so a flat support plateau
/// keeps the seed.
///
/// # Returns
///
/// `(bpm, score)` of the best trial
pub fn local_search<F>(
    center: f32,
    radius: f32,
    step: f32,
    min_bpm: f32,
    max_bpm: f32,
    score: F,
) -> (f32, f32)
where
    F: Fn(f32) -> f32,
{
    let mut best_bpm = center;
    let mut best_score = score(center);
    if !(step > 0.0) || !(radius > 0.0) {
        return (best_bpm, best_score);
    }

    let steps = (radius / step).floor() as usize;
    for i in 1..=steps {
        for direction in [1.0f32, -1.0] {
            let trial = center + direction * i as f32 * step;
            if trial < min_bpm || trial > max_bpm {
                continue;
            }
            let s = score(trial);
            if s > best_score + MIN_IMPROVEMENT {
                best_bpm = trial;
                best_score = s;
            }
        }
    }
    (best_bpm, best_score)
}

/// Full meter evidence for `bpm` scored as a branch of weight `weight`
pub fn evaluate_tempo(
    bpm: f32,
    support: f32,
    weight: f32,
    mode: BeatMode,
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> MeterEvidence {
    let onbeat_dominance = scorer.onbeat_dominance(bpm);
    let (beat_type, breakbeat_score) = scorer.classify(bpm);
    let offgrid_penalty = if config.refine.offgrid_weight > 0.0 {
        config.refine.offgrid_weight * scorer.offgrid_ratio(bpm)
    } else {
        0.0
    };
    let dominance_term = config.refine.dominance_weight_for(mode) * onbeat_dominance.ln_1p();
    let prior = config.priors.bonus(mode, bpm);
    let score = support * weight + dominance_term - offgrid_penalty + prior;

    MeterEvidence {
        bpm,
        support,
        onbeat_dominance,
        beat_type,
        breakbeat_score,
        score,
    }
}

/// Refine a seed tempo for a concrete beat mode
///
/// # Arguments
///
/// * `seed` - Starting tempo (typically the winning cluster center)
/// * `mode` - Straight or breakbeat; selects the priors
/// * `scope` - `Full` explores every configured branch, `FineTune` only the seed
/// * `scorer` - Support and meter evidence for this analysis
/// * `config` - Analysis configuration
///
/// # Returns
///
/// Evidence for the highest-scoring branch, or `None` if no branch folds into range
pub fn refine_harmonics(
    seed: f32,
    mode: BeatMode,
    scope: RefineScope,
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> Option<MeterEvidence> {
    let primary = [HarmonicVariant::new(1.0, 1.0)];
    let (branches, radius): (&[HarmonicVariant], f32) = match scope {
        RefineScope::Full => (&config.refine.branches, config.refine.search_radius_bpm),
        RefineScope::FineTune => (&primary, config.refine.fine_tune_radius_bpm),
    };

    let mut visited: Vec<f32> = Vec::with_capacity(branches.len());
    let mut best: Option<MeterEvidence> = None;

    for branch in branches {
        let Some(target) = fold_bpm(seed * branch.ratio, config.min_bpm, config.max_bpm) else {
            continue;
        };
        if visited.iter().any(|&v| (v - target).abs() < BRANCH_DEDUP_BPM) {
            continue;
        }
        visited.push(target);

        let (bpm, support) = local_search(
            target,
            radius,
            config.refine.search_step_bpm,
            config.min_bpm,
            config.max_bpm,
            |b| scorer.support(b),
        );
        let evidence = evaluate_tempo(bpm, support, branch.weight, mode, scorer, config);

        log::debug!(
            "Refine {:?} x{:.3}: {:.2} BPM support={:.3} dominance={:.2} {:?} score={:.3}",
            mode,
            branch.ratio,
            evidence.bpm,
            evidence.support,
            evidence.onbeat_dominance,
            evidence.beat_type,
            evidence.score
        );

        if best.map_or(true, |b| evidence.score > b.score) {
            best = Some(evidence);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::host::NoopHost;
    use crate::features::meter::beat_type::BeatType;
    use crate::features::period::multi_window::build_hypotheses;
    use crate::test_signals::{backbeat_track, click_track};

    #[test]
    fn test_local_search_finds_peak() {
        let (bpm, score) = local_search(120.0, 8.0, 0.25, 60.0, 200.0, |b| -(b - 123.5).abs());
        assert!((bpm - 123.5).abs() < 1e-4);
        assert!(score.abs() < 1e-4);
    }

    #[test]
    fn test_local_search_plateau_keeps_seed() {
        let plateau = |b: f32| if (b - 120.0).abs() < 3.0 { 1.0 } else { 0.0 };
        let (bpm, _) = local_search(120.0, 8.0, 0.25, 60.0, 200.0, plateau);
        assert_eq!(bpm, 120.0);
    }

    #[test]
    fn test_local_search_respects_range() {
        let (bpm, _) = local_search(198.0, 8.0, 0.25, 60.0, 200.0, |b| b);
        assert_eq!(bpm, 200.0);
        let (bpm, _) = local_search(61.0, 8.0, 0.5, 60.0, 200.0, |b| -b);
        assert_eq!(bpm, 60.0);
    }

    #[test]
    fn test_local_search_degenerate_step() {
        let (bpm, _) = local_search(120.0, 8.0, 0.0, 60.0, 200.0, |b| b);
        assert_eq!(bpm, 120.0);
    }

    #[test]
    fn test_refine_recovers_from_triplet_seed() {
        let config = TempoConfig::default();
        let samples = click_track(60.0, 128.0, 44100, 0.0, 0.8);
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();
        let scorer = MeterScorer::new(&pool.windows, &config.support);

        // 128 * 2/3: the x1.5 branch should find the true tempo
        let scope = RefineScope::Full;
        let evidence =
            refine_harmonics(85.33, BeatMode::Straight, scope, &scorer, &config).unwrap();
        assert!((evidence.bpm - 128.0).abs() < 1.5, "refined to {:.2}", evidence.bpm);
        assert_eq!(evidence.beat_type, BeatType::Straight);
        assert!(evidence.support > 0.5);
    }

    #[test]
    fn test_backbeat_triplet_seed_refines_to_beat() {
        // Equal hits every half beat of 120 BPM; 80 is a third of the hit rate
        let config = TempoConfig::default();
        let samples = backbeat_track(60.0, 120.0, 44100);
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();
        let scorer = MeterScorer::new(&pool.windows, &config.support);

        for mode in [BeatMode::Straight, BeatMode::Breakbeat] {
            let evidence =
                refine_harmonics(80.0, mode, RefineScope::Full, &scorer, &config).unwrap();
            let bpm = evidence.bpm;
            assert!((bpm - 120.0).abs() < 1.5, "{:?} refined to {:.2}", mode, bpm);
            assert_eq!(evidence.beat_type, BeatType::Breakbeat);
        }

        // Without the off-grid penalty the dominant triplet reading wins
        let mut plain = TempoConfig::default();
        plain.refine.offgrid_weight = 0.0;
        let evidence =
            refine_harmonics(80.0, BeatMode::Straight, RefineScope::Full, &scorer, &plain).unwrap();
        assert!((evidence.bpm - 80.0).abs() < 1.5, "refined to {:.2}", evidence.bpm);
    }

    #[test]
    fn test_fine_tune_stays_near_seed() {
        let config = TempoConfig::default();
        let samples = click_track(60.0, 128.0, 44100, 0.0, 0.8);
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();
        let scorer = MeterScorer::new(&pool.windows, &config.support);

        let scope = RefineScope::FineTune;
        let evidence =
            refine_harmonics(85.33, BeatMode::Straight, scope, &scorer, &config).unwrap();
        assert!((evidence.bpm - 85.33).abs() <= config.refine.fine_tune_radius_bpm + 1e-3);
    }

    #[test]
    fn test_refine_with_no_windows() {
        let config = TempoConfig::default();
        let scorer = MeterScorer::new(&[], &config.support);
        let scope = RefineScope::Full;
        let evidence =
            refine_harmonics(120.0, BeatMode::Straight, scope, &scorer, &config).unwrap();
        assert_eq!(evidence.support, 0.0);
        assert_eq!(evidence.beat_type, BeatType::Unknown);
    }
}
