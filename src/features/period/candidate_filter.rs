//! Hypothesis clustering
//!
//! Merges nearby tempo hypotheses into weighted clusters to find the consensus
//! tempo across windows and harmonic variants.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::multi_window::TempoHypothesis;
use crate::config::ClusterConfig;

/// Integer tempo ratios accepted by the optional harmonic merge
const HARMONIC_RATIOS: [f32; 6] = [2.0, 3.0, 0.5, 1.0 / 3.0, 1.5, 2.0 / 3.0];

/// Weighted group of hypotheses around a common tempo
///
/// `center` is always the weighted mean of the member tempi, updated
/// incrementally as members are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoCluster {
    /// Weighted mean BPM of the members
    pub center: f32,
    /// Members in insertion order
    pub members: Vec<TempoHypothesis>,
    /// Sum of member weights
    pub weight_sum: f32,
}

impl TempoCluster {
    fn new(hypothesis: TempoHypothesis) -> Self {
        Self {
            center: hypothesis.bpm,
            members: vec![hypothesis],
            weight_sum: hypothesis.weight,
        }
    }

    fn add(&mut self, hypothesis: TempoHypothesis) {
        let total = self.weight_sum + hypothesis.weight;
        if total > f32::EPSILON {
            self.center =
                (self.center * self.weight_sum + hypothesis.bpm * hypothesis.weight) / total;
        }
        self.weight_sum = total;
        self.members.push(hypothesis);
    }

    /// Ranking score: total weight plus a small bonus per member
    pub fn rank_score(&self, member_bonus: f32) -> f32 {
        self.weight_sum + self.members.len() as f32 * member_bonus
    }

    /// Number of distinct windows contributing to the cluster
    pub fn window_count(&self) -> usize {
        let mut windows: Vec<usize> = self.members.iter().map(|m| m.window).collect();
        windows.sort_unstable();
        windows.dedup();
        windows.len()
    }
}

/// Cluster hypotheses by tempo proximity
///
/// # Arguments
///
/// * `hypotheses` - Hypothesis pool (order does not matter)
/// * `config` - Merge tolerance, optional harmonic merge and ranking bonus
///
/// # Returns
///
/// Clusters ranked by `weight_sum + members * member_bonus` (highest first)
///
/// # Example
///
/// ```
/// use tempo_dsp::config::ClusterConfig;
/// use tempo_dsp::features::period::candidate_filter::cluster_hypotheses;
/// use tempo_dsp::features::period::multi_window::TempoHypothesis;
///
/// let h = |bpm, weight| TempoHypothesis { bpm, weight, window: 0, is_variant: false };
/// let hyps = [h(128.0, 0.9), h(127.0, 0.8), h(96.0, 0.5)];
/// let clusters = cluster_hypotheses(&hyps, &ClusterConfig::default());
/// assert_eq!(clusters.len(), 2);
/// assert!((clusters[0].center - 127.53).abs() < 0.01);
/// ```
pub fn cluster_hypotheses(
    hypotheses: &[TempoHypothesis],
    config: &ClusterConfig,
) -> Vec<TempoCluster> {
    // Process heaviest first so the result does not depend on input order
    let mut ordered: Vec<TempoHypothesis> = hypotheses
        .iter()
        .copied()
        .filter(|h| h.bpm.is_finite() && h.weight.is_finite() && h.weight > 0.0)
        .collect();
    ordered.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then(a.bpm.partial_cmp(&b.bpm).unwrap_or(Ordering::Equal))
            .then(a.window.cmp(&b.window))
    });

    let mut clusters: Vec<TempoCluster> = Vec::new();
    for hypothesis in ordered {
        if let Some(idx) = nearest_cluster(&clusters, hypothesis.bpm, config.tolerance_bpm) {
            clusters[idx].add(hypothesis);
            continue;
        }

        if config.harmonic_merge {
            if let Some((idx, rescaled)) = harmonic_match(&clusters, hypothesis.bpm, config) {
                clusters[idx].add(TempoHypothesis {
                    bpm: rescaled,
                    weight: hypothesis.weight * config.harmonic_merge_weight,
                    is_variant: true,
                    ..hypothesis
                });
                continue;
            }
        }

        clusters.push(TempoCluster::new(hypothesis));
    }

    clusters.sort_by(|a, b| {
        b.rank_score(config.member_bonus)
            .partial_cmp(&a.rank_score(config.member_bonus))
            .unwrap_or(Ordering::Equal)
            .then(a.center.partial_cmp(&b.center).unwrap_or(Ordering::Equal))
    });

    if let Some(best) = clusters.first() {
        log::debug!(
            "Clustering: {} hypotheses -> {} clusters, best {:.2} BPM (weight {:.3}, {} members)",
            hypotheses.len(),
            clusters.len(),
            best.center,
            best.weight_sum,
            best.members.len()
        );
    }

    clusters
}

/// Index of the cluster whose center is nearest `bpm`, within `tolerance`
pub fn nearest_cluster(clusters: &[TempoCluster], bpm: f32, tolerance: f32) -> Option<usize> {
    clusters
        .iter()
        .enumerate()
        .map(|(i, c)| (i, (c.center - bpm).abs()))
        .filter(|&(_, d)| d <= tolerance)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

/// Find a cluster related to `bpm` by an integer ratio; returns the rescaled tempo
fn harmonic_match(
    clusters: &[TempoCluster],
    bpm: f32,
    config: &ClusterConfig,
) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32, f32)> = None;
    for ratio in HARMONIC_RATIOS {
        let rescaled = bpm / ratio;
        if let Some(idx) = nearest_cluster(clusters, rescaled, config.harmonic_tolerance_bpm) {
            let distance = (clusters[idx].center - rescaled).abs();
            if best.map_or(true, |(_, _, d)| distance < d) {
                best = Some((idx, rescaled, distance));
            }
        }
    }
    best.map(|(idx, rescaled, _)| (idx, rescaled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyp(bpm: f32, weight: f32, window: usize) -> TempoHypothesis {
        TempoHypothesis {
            bpm,
            weight,
            window,
            is_variant: false,
        }
    }

    #[test]
    fn test_center_is_weighted_mean() {
        let hyps = [hyp(120.0, 1.0, 0), hyp(124.0, 3.0, 1)];
        let clusters = cluster_hypotheses(&hyps, &ClusterConfig::default());
        assert_eq!(clusters.len(), 1);
        assert!((clusters[0].center - 123.0).abs() < 1e-4);
        assert!((clusters[0].weight_sum - 4.0).abs() < 1e-6);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[test]
    fn test_far_hypotheses_form_separate_clusters() {
        let hyps = [hyp(120.0, 0.9, 0), hyp(140.0, 0.8, 0), hyp(90.0, 0.7, 1)];
        let clusters = cluster_hypotheses(&hyps, &ClusterConfig::default());
        assert_eq!(clusters.len(), 3);
        assert!((clusters[0].center - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_member_bonus_breaks_near_ties() {
        // One heavy hypothesis vs. three lighter corroborating ones of equal total weight
        let hyps = [
            hyp(100.0, 0.9, 0),
            hyp(150.0, 0.3, 0),
            hyp(150.5, 0.3, 1),
            hyp(149.5, 0.3, 2),
        ];
        let clusters = cluster_hypotheses(&hyps, &ClusterConfig::default());
        assert!((clusters[0].center - 150.0).abs() < 0.1);
        assert_eq!(clusters[0].window_count(), 3);
    }

    #[test]
    fn test_order_insensitive() {
        let mut hyps = vec![
            hyp(128.0, 0.9, 0),
            hyp(126.0, 0.4, 1),
            hyp(64.0, 0.7, 0),
            hyp(85.3, 0.5, 2),
            hyp(129.5, 0.6, 2),
        ];
        let a = cluster_hypotheses(&hyps, &ClusterConfig::default());
        hyps.reverse();
        let b = cluster_hypotheses(&hyps, &ClusterConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_harmonic_merge_optional() {
        let hyps = [hyp(120.0, 1.0, 0), hyp(240.5, 0.5, 1)];

        let plain = cluster_hypotheses(&hyps, &ClusterConfig::default());
        assert_eq!(plain.len(), 2);

        let config = ClusterConfig {
            harmonic_merge: true,
            ..ClusterConfig::default()
        };
        let merged = cluster_hypotheses(&hyps, &config);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].members[1].is_variant);
        assert!((merged[0].members[1].bpm - 120.25).abs() < 1e-3);
        assert!((merged[0].weight_sum - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_hypotheses_ignored() {
        let hyps = [hyp(f32::NAN, 1.0, 0), hyp(120.0, 0.0, 0), hyp(125.0, 0.5, 0)];
        let clusters = cluster_hypotheses(&hyps, &ClusterConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].center, 125.0);
    }

    #[test]
    fn test_empty_pool() {
        assert!(cluster_hypotheses(&[], &ClusterConfig::default()).is_empty());
    }
}
