//! Analysis and result aggregation modules
//!
//! Turns hypothesis clusters into a final tempo:
//! - Harmonic refinement
//! - Octave/meter promotion
//! - Confidence scoring
//! - Beat-mode orchestration
//! - Host staging, result types and metadata

pub mod beat_mode;
pub mod confidence;
pub mod host;
pub mod metadata;
pub mod promotion;
pub mod refinement;
pub mod result;
