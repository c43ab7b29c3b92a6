//! Feature extraction modules
//!
//! - Onset detection (energy flux envelope)
//! - Period estimation (autocorrelation, multi-window hypotheses, clustering)
//! - Meter evidence (tempo support, on/off-beat energy, beat type)

pub mod meter;
pub mod onset;
pub mod period;
