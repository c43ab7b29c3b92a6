//! Analysis result types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use crate::features::meter::beat_type::BeatType;

use super::metadata::TempoMetadata;

/// Caller intent biasing which priors and promotion rules apply
///
/// Parsing is lenient: anything unrecognized is `Auto`.
///
/// # Example
///
/// ```
/// use tempo_dsp::analysis::result::BeatMode;
///
/// assert_eq!(BeatMode::from_str_lossy("Breakbeat"), BeatMode::Breakbeat);
/// assert_eq!(BeatMode::from(" straight "), BeatMode::Straight);
/// assert_eq!(BeatMode::from("swing"), BeatMode::Auto);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BeatMode {
    /// Run both straight and breakbeat analyses and keep the more confident one
    #[default]
    Auto,
    /// Four-on-the-floor material
    Straight,
    /// Syncopated material
    Breakbeat,
}

impl BeatMode {
    /// Parse a mode name, falling back to `Auto`
    pub fn from_str_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "straight" => BeatMode::Straight,
            "breakbeat" => BeatMode::Breakbeat,
            _ => BeatMode::Auto,
        }
    }

    /// Lowercase mode name
    pub fn as_str(&self) -> &'static str {
        match self {
            BeatMode::Auto => "auto",
            BeatMode::Straight => "straight",
            BeatMode::Breakbeat => "breakbeat",
        }
    }
}

impl From<&str> for BeatMode {
    fn from(name: &str) -> Self {
        Self::from_str_lossy(name)
    }
}

impl From<String> for BeatMode {
    fn from(name: String) -> Self {
        Self::from_str_lossy(&name)
    }
}

impl FromStr for BeatMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_str_lossy(s))
    }
}

impl fmt::Display for BeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence gathered for one refined tempo reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterEvidence {
    /// Tempo in BPM
    pub bpm: f32,
    /// Average autocorrelation support
    pub support: f32,
    /// Average on-beat dominance
    pub onbeat_dominance: f32,
    /// Meter classification
    pub beat_type: BeatType,
    /// Averaged off-beat ratio used for the classification
    pub breakbeat_score: f32,
    /// Combined branch score (support, dominance and priors)
    pub score: f32,
}

/// Early low-fidelity estimate reported mid-analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreliminaryEstimate {
    /// Clustering-only tempo in BPM
    pub bpm: f32,
    /// Fixed confidence ceiling for preliminary estimates
    pub confidence: f32,
}

/// Analysis flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisFlag {
    /// Track shorter than the configured window layout; fewer windows analyzed
    ShortInput,
    /// Some windows had no usable signal and were skipped
    SkippedWindows,
    /// A harmonic alternative is as well supported as the final tempo
    AmbiguousHarmonic,
    /// An octave/meter correction changed the refined tempo
    Promoted,
}

/// Tempo estimation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoResult {
    /// Tempo in BPM
    pub bpm: f32,

    /// Confidence (0-99)
    pub confidence: f32,

    /// Meter classification at the final tempo
    pub beat_type_auto: BeatType,

    /// Averaged off-beat ratio at the final tempo
    pub breakbeat_score: f32,

    /// Mode requested by the caller
    pub beat_mode: BeatMode,

    /// Concrete mode whose pass produced this result
    pub selected_mode: BeatMode,

    /// Raw support score of the final tempo
    pub support: f32,

    /// Analysis metadata
    pub metadata: TempoMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_mode_lossy_parse() {
        assert_eq!(BeatMode::from_str_lossy("auto"), BeatMode::Auto);
        assert_eq!(BeatMode::from_str_lossy("STRAIGHT"), BeatMode::Straight);
        assert_eq!(BeatMode::from_str_lossy("breakbeat"), BeatMode::Breakbeat);
        assert_eq!(BeatMode::from_str_lossy(""), BeatMode::Auto);
        assert_eq!(BeatMode::from_str_lossy("half-time"), BeatMode::Auto);
        assert_eq!("breakbeat".parse::<BeatMode>(), Ok(BeatMode::Breakbeat));
    }

    #[test]
    fn test_beat_mode_serde() {
        assert_eq!(serde_json::to_string(&BeatMode::Breakbeat).unwrap(), "\"breakbeat\"");
        let mode: BeatMode = serde_json::from_str("\"Straight\"").unwrap();
        assert_eq!(mode, BeatMode::Straight);
        let mode: BeatMode = serde_json::from_str("\"dnb\"").unwrap();
        assert_eq!(mode, BeatMode::Auto);
    }

    #[test]
    fn test_beat_type_serde() {
        assert_eq!(serde_json::to_string(&BeatType::Unknown).unwrap(), "\"unknown\"");
    }

    #[test]
    fn test_beat_mode_display() {
        assert_eq!(BeatMode::Straight.to_string(), "straight");
        assert_eq!(BeatMode::default(), BeatMode::Auto);
    }
}
