//! Configuration parameters for tempo analysis
//!
//! Every tunable constant of the engine lives here: frame sizes, the window
//! layout, harmonic decays, clustering tolerances, musical priors, the
//! octave-promotion table and the confidence weights. Behavior changes are
//! data changes; the algorithms only read these values.

use serde::{Deserialize, Serialize};

use crate::analysis::result::BeatMode;
use crate::error::AnalysisError;
use crate::features::meter::beat_type::BeatType;
use crate::features::period::multi_window::AnalysisWindow;

/// Inclusive BPM interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmBand {
    /// Lower bound (inclusive)
    pub low: f32,
    /// Upper bound (inclusive)
    pub high: f32,
}

impl BpmBand {
    /// Create a new band
    pub const fn new(low: f32, high: f32) -> Self {
        Self { low, high }
    }

    /// Check whether `bpm` lies inside the band
    pub fn contains(&self, bpm: f32) -> bool {
        bpm.is_finite() && bpm >= self.low && bpm <= self.high
    }
}

/// Onset envelope extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// Hop between RMS frames in samples (default: 256)
    pub hop_size: usize,

    /// RMS frame length in samples (default: 1024)
    pub window_size: usize,

    /// Half width of the moving-average smoother in frames (default: 2)
    pub smoothing_half_width: usize,

    /// Minimum number of frames for a usable envelope (default: 24)
    pub min_frames: usize,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            hop_size: 256,
            window_size: 1024,
            smoothing_half_width: 2,
            min_frames: 24,
        }
    }
}

/// Autocorrelation peak-picking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Maximum number of peaks kept per window (default: 6)
    pub top_k: usize,

    /// Peaks scoring below this normalized autocorrelation are noise (default: 0.05)
    pub min_peak_score: f32,

    /// Minimum lag distance between two selected peaks, in frames (default: 3)
    pub min_lag_separation: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            min_peak_score: 0.05,
            min_lag_separation: 3,
        }
    }
}

/// A harmonic reinterpretation of a tempo: `bpm * ratio`, down-weighted by `weight`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicVariant {
    /// Tempo multiple
    pub ratio: f32,
    /// Weight applied to scores of the reinterpreted tempo
    pub weight: f32,
}

impl HarmonicVariant {
    /// Create a new variant
    pub const fn new(ratio: f32, weight: f32) -> Self {
        Self { ratio, weight }
    }
}

/// Decay for octave (x2, x0.5) reinterpretations
pub const OCTAVE_WEIGHT: f32 = 0.88;

/// Decay for triplet (x3/2, x2/3, x3/4, x4/3) reinterpretations
pub const TRIPLET_WEIGHT: f32 = 0.80;

fn default_harmonic_variants() -> Vec<HarmonicVariant> {
    vec![
        HarmonicVariant::new(0.5, OCTAVE_WEIGHT),
        HarmonicVariant::new(2.0, OCTAVE_WEIGHT),
        HarmonicVariant::new(2.0 / 3.0, TRIPLET_WEIGHT),
        HarmonicVariant::new(1.5, TRIPLET_WEIGHT),
        HarmonicVariant::new(0.75, TRIPLET_WEIGHT),
        HarmonicVariant::new(4.0 / 3.0, TRIPLET_WEIGHT),
    ]
}

/// Hypothesis clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Merge radius around a cluster center (default: 4.5 BPM)
    pub tolerance_bpm: f32,

    /// Also merge hypotheses related to a center by an integer ratio (default: false)
    pub harmonic_merge: bool,

    /// Merge radius used for harmonic matches, measured after rescaling (default: 6.0 BPM)
    pub harmonic_tolerance_bpm: f32,

    /// Weight multiplier for hypotheses merged through a harmonic match (default: 0.5)
    pub harmonic_merge_weight: f32,

    /// Ranking bonus per member (default: 0.05)
    pub member_bonus: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tolerance_bpm: 4.5,
            harmonic_merge: false,
            harmonic_tolerance_bpm: 6.0,
            harmonic_merge_weight: 0.5,
            member_bonus: 0.05,
        }
    }
}

/// Support and meter evidence parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Lag tolerance around a candidate period, in frames (default: 2)
    pub lag_jitter: usize,

    /// Beats per phase-alignment block when sampling on/off-beat energy (default: 8)
    pub onbeat_cycles: usize,

    /// Floor added to off-beat energy before dividing (default: 0.05)
    pub dominance_floor: f32,

    /// Upper clamp for on-beat dominance (default: 8.0)
    pub max_dominance: f32,

    /// Average off-beat ratio at or above which a meter is breakbeat (default: 0.85)
    pub breakbeat_threshold: f32,

    /// Number of windows averaged for beat-type classification (default: 3)
    pub classify_windows: usize,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            lag_jitter: 2,
            onbeat_cycles: 8,
            dominance_floor: 0.05,
            max_dominance: 8.0,
            breakbeat_threshold: 0.85,
            classify_windows: 3,
        }
    }
}

/// Harmonic refinement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Local search radius around each branch (default: 8 BPM)
    pub search_radius_bpm: f32,

    /// Local search step (default: 0.25 BPM)
    pub search_step_bpm: f32,

    /// Radius of the support-only fine-tune after a promotion (default: 3 BPM)
    pub fine_tune_radius_bpm: f32,

    /// Weight of `ln(1 + onbeat_dominance)` in the straight branch score (default: 0.1)
    pub dominance_weight: f32,

    /// Weight of `ln(1 + onbeat_dominance)` in the breakbeat branch score (default: 0.0)
    ///
    /// Breakbeat readings carry strong off-beats, which on-beat dominance
    /// rewards at the doubled tempo.
    pub breakbeat_dominance_weight: f32,

    /// Penalty per unit of off-grid ratio in the branch score (default: 0.5)
    ///
    /// Readings whose beat divides into thirds or quarters of strong onsets
    /// are sub-multiples of the true pulse.
    pub offgrid_weight: f32,

    /// Harmonic branches explored around the seed; the first entry is the primary
    pub branches: Vec<HarmonicVariant>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        let mut branches = vec![HarmonicVariant::new(1.0, 1.0)];
        branches.extend(default_harmonic_variants());
        Self {
            search_radius_bpm: 8.0,
            search_step_bpm: 0.25,
            fine_tune_radius_bpm: 3.0,
            dominance_weight: 0.1,
            breakbeat_dominance_weight: 0.0,
            offgrid_weight: 0.5,
            branches,
        }
    }
}

impl RefineConfig {
    /// Dominance weight used by `mode` (`Auto` never scores directly)
    pub fn dominance_weight_for(&self, mode: BeatMode) -> f32 {
        match mode {
            BeatMode::Breakbeat => self.breakbeat_dominance_weight,
            BeatMode::Straight | BeatMode::Auto => self.dominance_weight,
        }
    }
}

/// Additive score adjustment for tempi inside a band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorBand {
    /// Band the adjustment applies to
    pub band: BpmBand,
    /// Bonus (positive) or penalty (negative)
    pub bonus: f32,
}

/// Musical plausibility priors per beat mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModePriors {
    /// Priors for four-on-the-floor material
    pub straight: Vec<PriorBand>,
    /// Priors for syncopated material
    pub breakbeat: Vec<PriorBand>,
}

/// Tempo band where half-time and 3/2 readings are easily confused
pub const PHANTOM_BAND: BpmBand = BpmBand::new(100.0, 115.0);

impl Default for ModePriors {
    fn default() -> Self {
        let phantom = PriorBand {
            band: PHANTOM_BAND,
            bonus: -0.03,
        };
        Self {
            straight: vec![
                PriorBand {
                    band: BpmBand::new(118.0, 150.0),
                    bonus: 0.03,
                },
                phantom,
            ],
            breakbeat: vec![
                PriorBand {
                    band: BpmBand::new(160.0, 180.0),
                    bonus: 0.03,
                },
                phantom,
            ],
        }
    }
}

impl ModePriors {
    /// Sum of the bonuses of every band containing `bpm` for `mode`
    ///
    /// `Auto` has no priors of its own: it is resolved into the concrete modes
    /// before any refinement runs.
    pub fn bonus(&self, mode: BeatMode, bpm: f32) -> f32 {
        let bands = match mode {
            BeatMode::Straight => &self.straight,
            BeatMode::Breakbeat => &self.breakbeat,
            BeatMode::Auto => return 0.0,
        };
        bands
            .iter()
            .filter(|p| p.band.contains(bpm))
            .map(|p| p.bonus)
            .sum()
    }
}

/// Meter agreement required before a promotion rule may fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterGate {
    /// No meter requirement
    Any,
    /// The slow or the fast reading classifies as breakbeat
    EitherBreakbeat,
    /// Both readings classify as breakbeat
    BothBreakbeat,
}

/// Looser support ratio used when the fast reading is clearly more syncopated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxedRatio {
    /// Required increase of the breakbeat score from slow to fast
    pub min_breakbeat_gain: f32,
    /// Support ratio used once the gain is met
    pub ratio: f32,
}

/// One gated octave/meter correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRule {
    /// Name recorded in the result metadata when the rule fires
    pub name: String,

    /// Tempi this rule considers too slow
    pub slow_band: BpmBand,

    /// Multiple applied to the slow tempo
    pub factor: f32,

    /// The promoted tempo must land here, if set
    pub fast_band: Option<BpmBand>,

    /// Minimum `support(fast) / support(slow)`
    pub min_support_ratio: f32,

    /// Meter condition on top of the support ratio
    pub meter_gate: MeterGate,

    /// Optional relaxed ratio for clearly more syncopated fast readings
    pub relaxed: Option<RelaxedRatio>,

    /// Stop evaluating further rules once this one fires
    pub lock: bool,
}

/// Promotion rules per beat mode, evaluated in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionTable {
    /// Rules for straight material
    pub straight: Vec<PromotionRule>,
    /// Rules for breakbeat material
    pub breakbeat: Vec<PromotionRule>,
}

impl PromotionTable {
    /// Rules for a concrete mode (`Auto` has none)
    pub fn rules_for(&self, mode: BeatMode) -> &[PromotionRule] {
        match mode {
            BeatMode::Straight => &self.straight,
            BeatMode::Breakbeat => &self.breakbeat,
            BeatMode::Auto => &[],
        }
    }
}

// The 3/2 ratios (0.55/0.50/0.45) have drifted between tuning rounds and
// should be re-validated against an annotated set before tightening.
impl Default for PromotionTable {
    fn default() -> Self {
        let phantom = PromotionRule {
            name: "phantom_half_time".to_string(),
            slow_band: PHANTOM_BAND,
            factor: 1.5,
            fast_band: None,
            min_support_ratio: 0.60,
            meter_gate: MeterGate::Any,
            relaxed: None,
            lock: true,
        };
        let double = PromotionRule {
            name: "double_tempo".to_string(),
            slow_band: BpmBand::new(68.0, 88.0),
            factor: 2.0,
            fast_band: Some(BpmBand::new(132.0, 180.0)),
            min_support_ratio: 0.90,
            meter_gate: MeterGate::Any,
            relaxed: None,
            lock: false,
        };
        let three_halves = |ratio: f32| PromotionRule {
            name: "three_halves".to_string(),
            slow_band: BpmBand::new(85.0, 130.0),
            factor: 1.5,
            fast_band: Some(BpmBand::new(135.0, 195.0)),
            min_support_ratio: ratio,
            meter_gate: MeterGate::Any,
            relaxed: Some(RelaxedRatio {
                min_breakbeat_gain: 0.15,
                ratio: 0.45,
            }),
            lock: false,
        };

        Self {
            straight: vec![
                phantom.clone(),
                PromotionRule {
                    name: "low_band_three_halves".to_string(),
                    slow_band: BpmBand::new(85.0, 100.0),
                    factor: 1.5,
                    fast_band: Some(BpmBand::new(128.0, 150.0)),
                    min_support_ratio: 0.70,
                    meter_gate: MeterGate::Any,
                    relaxed: None,
                    lock: false,
                },
                PromotionRule {
                    name: "double_tempo_high".to_string(),
                    slow_band: BpmBand::new(88.0, 100.0),
                    factor: 2.0,
                    fast_band: Some(BpmBand::new(176.0, 200.0)),
                    min_support_ratio: 0.80,
                    meter_gate: MeterGate::Any,
                    relaxed: None,
                    lock: false,
                },
                double.clone(),
                three_halves(0.55),
            ],
            breakbeat: vec![
                phantom,
                PromotionRule {
                    name: "breakbeat_half_time".to_string(),
                    slow_band: BpmBand::new(105.0, 130.0),
                    factor: 1.5,
                    fast_band: Some(BpmBand::new(155.0, 190.0)),
                    min_support_ratio: 0.93,
                    meter_gate: MeterGate::EitherBreakbeat,
                    relaxed: None,
                    lock: false,
                },
                double,
                three_halves(0.50),
            ],
        }
    }
}

/// Confidence scoring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Points awarded when every window corroborates the tempo (default: 60)
    pub agreement_weight: f32,

    /// Points per unit of support margin over the best harmonic alternative (default: 150)
    pub margin_scale: f32,

    /// Upper bound of the margin term (default: 39)
    pub margin_cap: f32,

    /// Bonus for tempi inside a plausible band (default: 5)
    pub prior_bonus: f32,

    /// Bands considered musically plausible for straight readings
    pub plausible_bands: Vec<BpmBand>,

    /// Bands considered musically plausible for breakbeat readings
    pub breakbeat_plausible_bands: Vec<BpmBand>,

    /// Distance to a cluster center that counts as corroboration (default: 3 BPM)
    pub agreement_tolerance_bpm: f32,

    /// Alternatives the final tempo must beat; support is weighted by `weight`
    pub alternatives: Vec<HarmonicVariant>,

    /// Alternatives for breakbeat readings, whose doubled tempo is the off-beat grid
    pub breakbeat_alternatives: Vec<HarmonicVariant>,

    /// Scale the margin by the mean onset clarity of the windows (default: true)
    pub clarity_scaled_margin: bool,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            agreement_weight: 60.0,
            margin_scale: 150.0,
            margin_cap: 39.0,
            prior_bonus: 5.0,
            plausible_bands: vec![BpmBand::new(115.0, 150.0), BpmBand::new(160.0, 180.0)],
            breakbeat_plausible_bands: vec![BpmBand::new(85.0, 115.0), BpmBand::new(160.0, 180.0)],
            agreement_tolerance_bpm: 3.0,
            alternatives: vec![
                HarmonicVariant::new(0.5, OCTAVE_WEIGHT),
                HarmonicVariant::new(2.0, OCTAVE_WEIGHT),
                HarmonicVariant::new(1.5, TRIPLET_WEIGHT),
                HarmonicVariant::new(2.0 / 3.0, TRIPLET_WEIGHT),
            ],
            breakbeat_alternatives: vec![
                HarmonicVariant::new(0.5, OCTAVE_WEIGHT),
                HarmonicVariant::new(1.5, TRIPLET_WEIGHT),
                HarmonicVariant::new(2.0 / 3.0, TRIPLET_WEIGHT),
            ],
            clarity_scaled_margin: true,
        }
    }
}

impl ConfidenceConfig {
    /// Plausible bands for a reading of the given meter
    pub fn plausible_bands_for(&self, beat_type: BeatType) -> &[BpmBand] {
        match beat_type {
            BeatType::Breakbeat => &self.breakbeat_plausible_bands,
            BeatType::Straight | BeatType::Unknown => &self.plausible_bands,
        }
    }

    /// Harmonic alternatives for a reading of the given meter
    pub fn alternatives_for(&self, beat_type: BeatType) -> &[HarmonicVariant] {
        match beat_type {
            BeatType::Breakbeat => &self.breakbeat_alternatives,
            BeatType::Straight | BeatType::Unknown => &self.alternatives,
        }
    }
}

/// Tempo analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Onset envelope parameters
    pub onset: OnsetConfig,

    /// Minimum BPM to consider (default: 60.0)
    pub min_bpm: f32,

    /// Maximum BPM to consider (default: 200.0)
    /// Must be at least twice `min_bpm` so octave folding always lands in range
    pub max_bpm: f32,

    /// Analysis windows, in track time
    pub windows: Vec<AnalysisWindow>,

    /// Peak-picking parameters
    pub candidates: CandidateConfig,

    /// Harmonic variants seeded for every candidate
    pub harmonic_variants: Vec<HarmonicVariant>,

    /// Hypothesis clustering parameters
    pub cluster: ClusterConfig,

    /// Support and meter evidence parameters
    pub support: SupportConfig,

    /// Harmonic refinement parameters
    pub refine: RefineConfig,

    /// Musical priors per mode
    pub priors: ModePriors,

    /// Octave/meter promotion rules
    pub promotions: PromotionTable,

    /// Confidence scoring parameters
    pub confidence: ConfidenceConfig,

    /// Windows processed before the preliminary estimate is reported (default: 2)
    pub preliminary_after_windows: usize,

    /// Confidence reported with the preliminary estimate (default: 35)
    pub preliminary_confidence: f32,

    /// Signals whose peak is below this level are silent (default: -80 dBFS)
    pub silence_threshold_db: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            onset: OnsetConfig::default(),
            min_bpm: 60.0,
            max_bpm: 200.0,
            windows: vec![
                AnalysisWindow::new(5.0, 20.0),
                AnalysisWindow::new(30.0, 20.0),
                AnalysisWindow::new(55.0, 20.0),
                AnalysisWindow::new(80.0, 20.0),
            ],
            candidates: CandidateConfig::default(),
            harmonic_variants: default_harmonic_variants(),
            cluster: ClusterConfig::default(),
            support: SupportConfig::default(),
            refine: RefineConfig::default(),
            priors: ModePriors::default(),
            promotions: PromotionTable::default(),
            confidence: ConfidenceConfig::default(),
            preliminary_after_windows: 2,
            preliminary_confidence: 35.0,
            silence_threshold_db: -80.0,
        }
    }
}

impl TempoConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AnalysisError::InvalidInput(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::InvalidInput` describing the first problem found
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.onset.hop_size == 0 || self.onset.window_size == 0 {
            return Err(AnalysisError::InvalidInput(
                "Hop size and window size must be > 0".to_string(),
            ));
        }

        if !(self.min_bpm.is_finite() && self.max_bpm.is_finite()) || self.min_bpm <= 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid BPM range: [{:.1}, {:.1}]",
                self.min_bpm, self.max_bpm
            )));
        }

        if self.max_bpm < 2.0 * self.min_bpm {
            return Err(AnalysisError::InvalidInput(format!(
                "BPM range [{:.1}, {:.1}] must span at least one octave",
                self.min_bpm, self.max_bpm
            )));
        }

        if self.windows.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "At least one analysis window is required".to_string(),
            ));
        }

        if let Some(w) = self
            .windows
            .iter()
            .find(|w| !(w.start_seconds >= 0.0 && w.length_seconds > 0.0))
        {
            return Err(AnalysisError::InvalidInput(format!(
                "Invalid analysis window: start={:.2}s length={:.2}s",
                w.start_seconds, w.length_seconds
            )));
        }

        if self.candidates.top_k == 0 {
            return Err(AnalysisError::InvalidInput(
                "top_k must be at least 1".to_string(),
            ));
        }

        if !(self.refine.search_step_bpm > 0.0) || self.refine.branches.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "Refinement needs a positive step and at least one branch".to_string(),
            ));
        }

        if !(self.cluster.tolerance_bpm > 0.0) {
            return Err(AnalysisError::InvalidInput(
                "Cluster tolerance must be > 0".to_string(),
            ));
        }

        // Promotions must only move up so evaluation terminates
        if let Some(rule) = self
            .promotions
            .straight
            .iter()
            .chain(self.promotions.breakbeat.iter())
            .find(|r| !(r.factor > 1.0))
        {
            return Err(AnalysisError::InvalidInput(format!(
                "Promotion rule {} has factor {:.3}; factors must be > 1",
                rule.name, rule.factor
            )));
        }

        Ok(())
    }
}
