//! Beat-mode orchestration
//!
//! A concrete mode runs refinement, promotion and confidence once. `Auto` runs
//! the straight and breakbeat passes over the same hypothesis clusters and
//! keeps the more confident one, breaking ties on raw support.

use std::cmp::Ordering;

use crate::analysis::confidence::{compute_tempo_confidence, TempoConfidence};
use crate::analysis::promotion::apply_promotions;
use crate::analysis::refinement::{refine_harmonics, RefineScope};
use crate::analysis::result::{BeatMode, MeterEvidence};
use crate::config::TempoConfig;
use crate::features::meter::MeterScorer;
use crate::features::period::candidate_filter::TempoCluster;

/// Outcome of one concrete-mode pass
#[derive(Debug, Clone, PartialEq)]
pub struct ModeOutcome {
    /// Mode of the pass (never `Auto`)
    pub mode: BeatMode,
    /// Evidence at the final tempo
    pub evidence: MeterEvidence,
    /// Refined tempo before promotions
    pub refined_bpm: f32,
    /// Confidence breakdown at the final tempo
    pub confidence: TempoConfidence,
    /// Promotion rules that fired
    pub promotions: Vec<String>,
}

/// Run one concrete mode from the winning cluster
///
/// Returns `None` when there are no clusters or `mode` is `Auto`.
pub fn run_mode(
    mode: BeatMode,
    clusters: &[TempoCluster],
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> Option<ModeOutcome> {
    if mode == BeatMode::Auto {
        return None;
    }
    let seed = clusters.first()?.center;

    let refined = refine_harmonics(seed, mode, RefineScope::Full, scorer, config)?;
    let promoted = apply_promotions(refined, mode, scorer, config);
    let final_reading = &promoted.evidence;
    let confidence = compute_tempo_confidence(
        final_reading.bpm,
        final_reading.beat_type,
        clusters,
        scorer,
        config,
    );

    log::debug!(
        "{} pass: seed {:.2} -> refined {:.2} -> final {:.2} BPM, confidence {:.1}",
        mode,
        seed,
        refined.bpm,
        promoted.evidence.bpm,
        confidence.total
    );

    Some(ModeOutcome {
        mode,
        evidence: promoted.evidence,
        refined_bpm: refined.bpm,
        confidence,
        promotions: promoted.applied,
    })
}

/// Keep the more confident outcome; on a tie the better supported one, then `a`
pub fn select_outcome(a: ModeOutcome, b: ModeOutcome) -> ModeOutcome {
    let order = b
        .confidence
        .total
        .partial_cmp(&a.confidence.total)
        .unwrap_or(Ordering::Equal)
        .then(
            b.evidence
                .support
                .partial_cmp(&a.evidence.support)
                .unwrap_or(Ordering::Equal),
        );
    if order == Ordering::Greater {
        b
    } else {
        a
    }
}

/// Run the requested mode, resolving `Auto` into both concrete passes
pub fn estimate_for_mode(
    beat_mode: BeatMode,
    clusters: &[TempoCluster],
    scorer: &MeterScorer<'_>,
    config: &TempoConfig,
) -> Option<ModeOutcome> {
    match beat_mode {
        BeatMode::Auto => {
            let straight = run_mode(BeatMode::Straight, clusters, scorer, config);
            let breakbeat = run_mode(BeatMode::Breakbeat, clusters, scorer, config);
            match (straight, breakbeat) {
                (Some(s), Some(b)) => {
                    let winner = select_outcome(s, b);
                    log::debug!("Auto mode selected {}", winner.mode);
                    Some(winner)
                }
                (s, b) => s.or(b),
            }
        }
        mode => run_mode(mode, clusters, scorer, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::host::NoopHost;
    use crate::features::meter::beat_type::BeatType;
    use crate::features::period::candidate_filter::cluster_hypotheses;
    use crate::features::period::multi_window::build_hypotheses;
    use crate::test_signals::{backbeat_track, click_track};

    fn outcome(mode: BeatMode, confidence: f32, support: f32) -> ModeOutcome {
        ModeOutcome {
            mode,
            evidence: MeterEvidence {
                bpm: 120.0,
                support,
                onbeat_dominance: 1.0,
                beat_type: BeatType::Straight,
                breakbeat_score: 0.0,
                score: support,
            },
            refined_bpm: 120.0,
            confidence: TempoConfidence {
                agreement: confidence,
                margin: 0.0,
                prior: 0.0,
                total: confidence,
            },
            promotions: vec![],
        }
    }

    #[test]
    fn test_select_higher_confidence() {
        let a = outcome(BeatMode::Straight, 70.0, 0.9);
        let b = outcome(BeatMode::Breakbeat, 80.0, 0.1);
        assert_eq!(select_outcome(a, b).mode, BeatMode::Breakbeat);
    }

    #[test]
    fn test_select_tie_on_support() {
        let a = outcome(BeatMode::Straight, 70.0, 0.4);
        let b = outcome(BeatMode::Breakbeat, 70.0, 0.6);
        assert_eq!(select_outcome(a, b).mode, BeatMode::Breakbeat);

        let a = outcome(BeatMode::Straight, 70.0, 0.6);
        let b = outcome(BeatMode::Breakbeat, 70.0, 0.6);
        assert_eq!(select_outcome(a, b).mode, BeatMode::Straight);
    }

    #[test]
    fn test_auto_is_argmax_of_modes() {
        let config = TempoConfig::default();
        let samples = click_track(60.0, 172.0, 44100, 0.0, 0.8);
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();
        let clusters = cluster_hypotheses(&pool.hypotheses, &config.cluster);
        let scorer = MeterScorer::new(&pool.windows, &config.support);

        let straight = estimate_for_mode(BeatMode::Straight, &clusters, &scorer, &config).unwrap();
        let breakbeat =
            estimate_for_mode(BeatMode::Breakbeat, &clusters, &scorer, &config).unwrap();
        let auto = estimate_for_mode(BeatMode::Auto, &clusters, &scorer, &config).unwrap();

        assert_eq!(straight.mode, BeatMode::Straight);
        assert_eq!(breakbeat.mode, BeatMode::Breakbeat);
        assert!(auto.confidence.total >= straight.confidence.total);
        assert!(auto.confidence.total >= breakbeat.confidence.total);
        assert_ne!(auto.mode, BeatMode::Auto);
    }

    #[test]
    fn test_slow_backbeat_resolves_in_breakbeat_mode() {
        // Equal hits every half beat of 90 BPM read straight as a 180 pulse
        let config = TempoConfig::default();
        let samples = backbeat_track(60.0, 90.0, 44100);
        let pool = build_hypotheses(&samples, 44100, &config, &mut NoopHost).unwrap();
        let clusters = cluster_hypotheses(&pool.hypotheses, &config.cluster);
        let scorer = MeterScorer::new(&pool.windows, &config.support);

        let breakbeat = run_mode(BeatMode::Breakbeat, &clusters, &scorer, &config).unwrap();
        let bpm = breakbeat.evidence.bpm;
        assert!((bpm - 90.0).abs() < 2.0, "breakbeat read {:.2}", bpm);
        assert_eq!(breakbeat.evidence.beat_type, BeatType::Breakbeat);

        let auto = estimate_for_mode(BeatMode::Auto, &clusters, &scorer, &config).unwrap();
        assert_eq!(auto.mode, BeatMode::Breakbeat);
        assert!((auto.evidence.bpm - 90.0).abs() < 2.0, "auto read {:.2}", auto.evidence.bpm);
    }

    #[test]
    fn test_no_clusters_no_outcome() {
        let config = TempoConfig::default();
        let scorer = MeterScorer::new(&[], &config.support);
        assert!(estimate_for_mode(BeatMode::Auto, &[], &scorer, &config).is_none());
        assert!(run_mode(BeatMode::Auto, &[], &scorer, &config).is_none());
    }
}
