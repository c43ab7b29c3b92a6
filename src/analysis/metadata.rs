//! Analysis metadata structures

use serde::{Deserialize, Serialize};

use super::result::AnalysisFlag;

/// Version tag identifying the estimation algorithm
///
/// Hosts caching results should key on this alongside content identity and
/// beat mode.
pub const ALGORITHM_VERSION: &str = concat!("tempo-dsp-", env!("CARGO_PKG_VERSION"));

/// Tempo analysis metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMetadata {
    /// Algorithm version
    pub algorithm_version: String,

    /// Windows that produced a usable onset envelope
    pub windows_analyzed: usize,

    /// Hypotheses in the pool
    pub hypothesis_count: usize,

    /// Clusters formed from the pool
    pub cluster_count: usize,

    /// Names of the promotion rules that fired, in order
    pub promotions: Vec<String>,

    /// Analysis flags
    pub flags: Vec<AnalysisFlag>,
}

impl Default for TempoMetadata {
    fn default() -> Self {
        Self {
            algorithm_version: ALGORITHM_VERSION.to_string(),
            windows_analyzed: 0,
            hypothesis_count: 0,
            cluster_count: 0,
            promotions: vec![],
            flags: vec![],
        }
    }
}
