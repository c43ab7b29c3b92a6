//! Audio preprocessing modules
//!
//! Input hygiene applied before any analysis:
//! - Sanitizing non-finite samples
//! - Silence detection

pub mod sanitize;
pub mod silence;
