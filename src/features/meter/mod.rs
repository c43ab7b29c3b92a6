//! Tempo support and meter evidence
//!
//! The single source of truth for "how good is this candidate":
//! - Support score (autocorrelation at the candidate period)
//! - On-beat dominance, off-beat and off-grid ratios
//! - Beat-type classification
//! - Onset clarity of the analyzed windows

pub mod beat_type;
pub mod support;

use beat_type::{classify_beat_type, offgrid_ratio_for_tempo, onbeat_dominance_for_tempo, BeatType};
use support::support_over_windows;

use crate::config::SupportConfig;
use crate::features::period::multi_window::WindowAnalysis;

/// Scores candidate tempi against the windows of one analysis
///
/// Envelopes and autocorrelations are computed once by the hypothesis builder;
/// every scoring call is a pure function of them.
#[derive(Debug, Clone, Copy)]
pub struct MeterScorer<'a> {
    windows: &'a [WindowAnalysis],
    config: &'a SupportConfig,
}

impl<'a> MeterScorer<'a> {
    /// Create a scorer over the usable windows of an analysis
    pub fn new(windows: &'a [WindowAnalysis], config: &'a SupportConfig) -> Self {
        Self { windows, config }
    }

    /// Number of windows scored
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Average support of `bpm` across windows (0.0 for a degenerate BPM)
    pub fn support(&self, bpm: f32) -> f32 {
        support_over_windows(self.windows, bpm, self.config.lag_jitter)
    }

    /// Average on-beat dominance of `bpm` across windows
    pub fn onbeat_dominance(&self, bpm: f32) -> f32 {
        mean(
            self.windows
                .iter()
                .filter_map(|w| onbeat_dominance_for_tempo(&w.envelope, bpm, self.config)),
        )
    }

    /// Average off-grid ratio of `bpm` across windows, in [0, 1]
    pub fn offgrid_ratio(&self, bpm: f32) -> f32 {
        mean(
            self.windows
                .iter()
                .filter_map(|w| offgrid_ratio_for_tempo(&w.envelope, bpm, self.config)),
        )
    }

    /// Mean onset clarity of the windows (0.0 without windows)
    pub fn clarity(&self) -> f32 {
        mean(self.windows.iter().map(|w| w.clarity))
    }

    /// Beat type and breakbeat score of `bpm`
    pub fn classify(&self, bpm: f32) -> (BeatType, f32) {
        classify_beat_type(self.windows.iter().map(|w| &w.envelope), bpm, self.config)
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}
