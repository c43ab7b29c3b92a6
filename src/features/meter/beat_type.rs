//! On-beat / off-beat energy and beat-type classification
//!
//! Samples the onset envelope on the beat grid of a candidate tempo and at the
//! half-beat offset. Straight (four-on-the-floor) material concentrates energy
//! on the beat; breakbeat material carries comparable energy on the off-beat.
//!
//! The grid phase is not known, so the envelope is split into blocks of
//! `onbeat_cycles` beats and each block uses the phase that maximizes its
//! on-beat energy. Short blocks keep slow tempo drift from smearing the grid.
//!
//! The same grid is also sampled at the third- and quarter-beat positions.
//! Strong onsets there mean the reading is a sub-multiple of the real pulse.

use serde::{Deserialize, Serialize};

use crate::config::SupportConfig;
use crate::features::onset::OnsetEnvelope;

const EPSILON: f32 = 1e-6;

/// Meter classification of a tempo reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatType {
    /// Energy concentrated on the beat
    Straight,
    /// Strong energy on the half-beat offset
    Breakbeat,
    /// No window produced a usable envelope
    Unknown,
}

/// Mean envelope value on the beat grid and at its subdivisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEnergy {
    /// Mean on-beat value
    pub on_mean: f32,
    /// Mean off-beat value
    pub off_mean: f32,
    /// Mean value at one and two thirds of the beat
    pub third_mean: f32,
    /// Mean value at one and three quarters of the beat
    pub quarter_mean: f32,
    /// Number of beats sampled
    pub beats: usize,
}

/// Running sums for one grid phase
#[derive(Debug, Clone, Copy, Default)]
struct GridSums {
    on: f32,
    off: f32,
    beats: usize,
    third: f32,
    quarter: f32,
    subdivided: usize,
}

impl GridSums {
    fn on_mean(&self) -> f32 {
        self.on / self.beats as f32
    }

    fn merge(&mut self, other: &GridSums) {
        self.on += other.on;
        self.off += other.off;
        self.beats += other.beats;
        self.third += other.third;
        self.quarter += other.quarter;
        self.subdivided += other.subdivided;
    }
}

/// Sample the envelope on the beat grid of `bpm`
///
/// Returns `None` when the BPM is degenerate or the envelope is shorter than
/// one and a half beats.
pub fn beat_energy(envelope: &OnsetEnvelope, bpm: f32, cycles: usize) -> Option<BeatEnergy> {
    let period = envelope.period_frames(bpm)?;
    let n = envelope.len();
    if period < 2.0 || (n as f32) < 1.5 * period + 1.0 {
        return None;
    }

    let samples = &envelope.samples;
    let cycles = cycles.max(1);
    let phases = period.round() as usize;
    let block_frames = cycles as f32 * period;
    let at = |pos: f32| local_max(samples, pos.round() as usize);

    let mut total = GridSums::default();
    let mut block_start = 0.0f32;

    while block_start + 0.5 * period < n as f32 {
        let mut best: Option<GridSums> = None;

        for phase in 0..phases {
            let mut sums = GridSums::default();
            for k in 0..cycles {
                let pos = block_start + phase as f32 + k as f32 * period;
                if (pos + 0.5 * period).round() as usize >= n {
                    break;
                }
                sums.on += at(pos);
                sums.off += at(pos + 0.5 * period);
                sums.beats += 1;

                if ((pos + 0.75 * period).round() as usize) < n {
                    sums.third += 0.5 * (at(pos + period / 3.0) + at(pos + 2.0 * period / 3.0));
                    sums.quarter += 0.5 * (at(pos + 0.25 * period) + at(pos + 0.75 * period));
                    sums.subdivided += 1;
                }
            }
            if sums.beats == 0 {
                continue;
            }
            if best.map_or(true, |b| sums.on_mean() > b.on_mean()) {
                best = Some(sums);
            }
        }

        if let Some(sums) = best {
            total.merge(&sums);
        }
        block_start += block_frames;
    }

    if total.beats == 0 {
        return None;
    }
    let subdivided = total.subdivided.max(1) as f32;
    Some(BeatEnergy {
        on_mean: total.on / total.beats as f32,
        off_mean: total.off / total.beats as f32,
        third_mean: total.third / subdivided,
        quarter_mean: total.quarter / subdivided,
        beats: total.beats,
    })
}

/// On-beat dominance of `bpm`: `on / (off + floor)`, clamped to `max_dominance`
pub fn onbeat_dominance_for_tempo(
    envelope: &OnsetEnvelope,
    bpm: f32,
    config: &SupportConfig,
) -> Option<f32> {
    let energy = beat_energy(envelope, bpm, config.onbeat_cycles)?;
    let dominance = energy.on_mean / (energy.off_mean + config.dominance_floor.max(EPSILON));
    Some(dominance.clamp(0.0, config.max_dominance))
}

/// Off-beat ratio of `bpm`: `off / on`
///
/// Returns `None` when the on-beat grid carries no energy.
pub fn offbeat_ratio_for_tempo(
    envelope: &OnsetEnvelope,
    bpm: f32,
    config: &SupportConfig,
) -> Option<f32> {
    let energy = beat_energy(envelope, bpm, config.onbeat_cycles)?;
    if energy.on_mean <= EPSILON {
        return None;
    }
    Some(energy.off_mean / energy.on_mean)
}

/// Off-grid ratio of `bpm`: strongest subdivision over on-beat energy, at most 1
///
/// High when onsets land on the third- or quarter-beat positions, i.e. when
/// `bpm` is a third or a quarter of the pulse. Returns `None` when the
/// on-beat grid carries no energy.
pub fn offgrid_ratio_for_tempo(
    envelope: &OnsetEnvelope,
    bpm: f32,
    config: &SupportConfig,
) -> Option<f32> {
    let energy = beat_energy(envelope, bpm, config.onbeat_cycles)?;
    if energy.on_mean <= EPSILON {
        return None;
    }
    Some((energy.third_mean.max(energy.quarter_mean) / energy.on_mean).min(1.0))
}

/// Classify the meter of `bpm` from the first `classify_windows` usable envelopes
///
/// # Returns
///
/// `(beat_type, breakbeat_score)` where the score is the averaged off-beat
/// ratio. `Unknown` with a score of `0.0` when no envelope is usable.
///
/// # Example
///
/// ```
/// use tempo_dsp::config::SupportConfig;
/// use tempo_dsp::features::meter::beat_type::{classify_beat_type, BeatType};
/// use tempo_dsp::features::onset::OnsetEnvelope;
///
/// // Pulse every 50 frames (120 BPM at 100 frames/s), nothing in between
/// let samples = (0..2000).map(|i| if i % 50 == 0 { 1.0 } else { 0.0 }).collect();
/// let envelope = OnsetEnvelope { samples, frame_rate: 100.0 };
/// let (beat_type, score) = classify_beat_type([&envelope], 120.0, &SupportConfig::default());
/// assert_eq!(beat_type, BeatType::Straight);
/// assert!(score < 0.1);
/// ```
pub fn classify_beat_type<'a, I>(envelopes: I, bpm: f32, config: &SupportConfig) -> (BeatType, f32)
where
    I: IntoIterator<Item = &'a OnsetEnvelope>,
{
    let ratios: Vec<f32> = envelopes
        .into_iter()
        .filter_map(|env| offbeat_ratio_for_tempo(env, bpm, config))
        .take(config.classify_windows.max(1))
        .collect();

    if ratios.is_empty() {
        return (BeatType::Unknown, 0.0);
    }

    let score = ratios.iter().sum::<f32>() / ratios.len() as f32;
    let beat_type = if score >= config.breakbeat_threshold {
        BeatType::Breakbeat
    } else {
        BeatType::Straight
    };
    (beat_type, score)
}

/// Largest envelope value within one frame of `idx`
fn local_max(samples: &[f32], idx: usize) -> f32 {
    let lo = idx.saturating_sub(1);
    let hi = (idx + 1).min(samples.len().saturating_sub(1));
    if lo > hi {
        return 0.0;
    }
    samples[lo..=hi].iter().copied().fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OnsetConfig;
    use crate::features::onset::energy_flux::extract_onset_envelope;
    use crate::test_signals::{backbeat_track, click_track};

    fn pulses(period: usize, offset: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i >= offset && (i - offset) % period == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    fn envelope(samples: Vec<f32>) -> OnsetEnvelope {
        OnsetEnvelope {
            samples,
            frame_rate: 100.0,
        }
    }

    #[test]
    fn test_beat_energy_finds_phase() {
        // Pulses offset by 17 frames; the phase search must still land on them
        let env = envelope(pulses(50, 17, 2000));
        let energy = beat_energy(&env, 120.0, 8).unwrap();
        assert!((energy.on_mean - 1.0).abs() < 1e-6);
        assert_eq!(energy.off_mean, 0.0);
        assert!(energy.beats >= 38);
    }

    #[test]
    fn test_dominance_straight_vs_offbeat() {
        let config = SupportConfig::default();
        let straight = envelope(pulses(50, 0, 2000));
        let dominance = onbeat_dominance_for_tempo(&straight, 120.0, &config).unwrap();
        assert_eq!(dominance, config.max_dominance);

        // Equal pulses every half beat: on and off carry the same energy
        let syncopated = envelope(pulses(25, 0, 2000));
        let dominance = onbeat_dominance_for_tempo(&syncopated, 120.0, &config).unwrap();
        assert!((dominance - 1.0 / 1.05).abs() < 1e-3);
        let ratio = offbeat_ratio_for_tempo(&syncopated, 120.0, &config).unwrap();
        assert!((ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_offgrid_ratio_flags_sub_multiple_readings() {
        let config = SupportConfig::default();
        // Pulse every 50 frames is 120 BPM; 40 BPM puts pulses on the thirds
        let env = envelope(pulses(50, 17, 2000));
        let third = offgrid_ratio_for_tempo(&env, 40.0, &config).unwrap();
        assert!(third > 0.9, "third-beat ratio {}", third);
        // 30 BPM puts them on the quarters
        let quarter = offgrid_ratio_for_tempo(&env, 30.0, &config).unwrap();
        assert!(quarter > 0.9, "quarter-beat ratio {}", quarter);

        let energy = beat_energy(&env, 120.0, 8).unwrap();
        assert_eq!(energy.third_mean, 0.0);
        assert_eq!(energy.quarter_mean, 0.0);
        assert_eq!(offgrid_ratio_for_tempo(&env, 120.0, &config), Some(0.0));
    }

    #[test]
    fn test_backbeat_triplet_reading_is_off_grid() {
        // Equal hits every half beat of 120 BPM: the pulse is 240, 80 is a third of it
        let samples = backbeat_track(20.0, 120.0, 44100);
        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();
        let config = SupportConfig::default();
        let triplet = offgrid_ratio_for_tempo(&env, 80.0, &config).unwrap();
        let true_tempo = offgrid_ratio_for_tempo(&env, 120.0, &config).unwrap();
        assert!(triplet > 0.8, "triplet reading ratio {}", triplet);
        assert!(true_tempo < 0.2, "true tempo ratio {}", true_tempo);
    }

    #[test]
    fn test_flat_envelope_has_no_ratio() {
        let config = SupportConfig::default();
        let flat = envelope(vec![0.0; 2000]);
        assert!(offbeat_ratio_for_tempo(&flat, 120.0, &config).is_none());
        assert!(offgrid_ratio_for_tempo(&flat, 120.0, &config).is_none());
        assert_eq!(onbeat_dominance_for_tempo(&flat, 120.0, &config), Some(0.0));
        assert_eq!(classify_beat_type([&flat], 120.0, &config), (BeatType::Unknown, 0.0));
    }

    #[test]
    fn test_degenerate_tempo() {
        let env = envelope(pulses(50, 0, 2000));
        assert!(beat_energy(&env, f32::NAN, 8).is_none());
        assert!(beat_energy(&env, 0.0, 8).is_none());
        // Period longer than the envelope
        assert!(beat_energy(&env, 2.0, 8).is_none());
    }

    #[test]
    fn test_classify_click_track_straight() {
        let samples = click_track(20.0, 120.0, 44100, 0.0, 0.8);
        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();
        let (beat_type, score) = classify_beat_type([&env], 120.0, &SupportConfig::default());
        assert_eq!(beat_type, BeatType::Straight);
        assert!(score < 0.3, "off-beat ratio {}", score);
    }

    #[test]
    fn test_classify_backbeat_breakbeat() {
        let samples = backbeat_track(20.0, 120.0, 44100);
        let env = extract_onset_envelope(&samples, 44100, &OnsetConfig::default()).unwrap();
        let config = SupportConfig::default();
        let (beat_type, score) = classify_beat_type([&env], 120.0, &config);
        assert_eq!(beat_type, BeatType::Breakbeat);
        assert!(score >= config.breakbeat_threshold);
    }

    #[test]
    fn test_classify_uses_first_usable_windows() {
        let config = SupportConfig {
            classify_windows: 1,
            ..SupportConfig::default()
        };
        let flat = envelope(vec![0.0; 2000]);
        let syncopated = envelope(pulses(25, 0, 2000));
        let straight = envelope(pulses(50, 0, 2000));

        // The flat envelope is skipped; only the first usable one counts
        let (beat_type, _) = classify_beat_type([&flat, &syncopated, &straight], 120.0, &config);
        assert_eq!(beat_type, BeatType::Breakbeat);
    }
}
