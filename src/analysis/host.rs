//! Cooperative staging between the engine and its host
//!
//! The engine yields to the host exactly once per analysis window. A host can
//! interleave other work there, display the preliminary estimate, or cancel
//! by returning `ControlFlow::Break`. Nothing inside a window is interruptible.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use super::result::PreliminaryEstimate;
use crate::features::period::multi_window::AnalysisWindow;

/// Progress reported at each window boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowProgress {
    /// Zero-based index of the window just processed
    pub index: usize,
    /// Number of resolved windows
    pub total: usize,
    /// The window just processed
    pub window: AnalysisWindow,
    /// Whether the window produced a usable envelope
    pub usable: bool,
    /// Hypotheses gathered so far
    pub hypotheses: usize,
}

/// Receives the engine's suspension points
pub trait AnalysisHost {
    /// Called after every analysis window; `Break` cancels the analysis
    fn on_window(&mut self, _progress: &WindowProgress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called at most once with a clustering-only estimate
    fn on_preliminary(&mut self, _estimate: PreliminaryEstimate) {}
}

/// Host that never cancels and ignores progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl AnalysisHost for NoopHost {}

/// Host forwarding the preliminary estimate to a closure
///
/// # Example
///
/// ```
/// use tempo_dsp::analysis::host::{AnalysisHost, ProgressFn};
/// use tempo_dsp::analysis::result::PreliminaryEstimate;
///
/// let mut seen = Vec::new();
/// let mut host = ProgressFn(|e: PreliminaryEstimate| seen.push(e.bpm));
/// host.on_preliminary(PreliminaryEstimate { bpm: 128.0, confidence: 35.0 });
/// drop(host);
/// assert_eq!(seen, vec![128.0]);
/// ```
pub struct ProgressFn<F>(pub F);

impl<F> AnalysisHost for ProgressFn<F>
where
    F: FnMut(PreliminaryEstimate),
{
    fn on_preliminary(&mut self, estimate: PreliminaryEstimate) {
        (self.0)(estimate)
    }
}
