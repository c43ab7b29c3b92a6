//! Robust peak detection utilities
//!
//! Local-maximum detection over autocorrelation scores, greedy selection with
//! a minimum separation, and parabolic sub-sample refinement.

/// Find the strongest local maxima of `signal` inside `[lo, hi]`
///
/// # Arguments
///
/// * `signal` - Signal to find peaks in (indexed by lag)
/// * `lo`, `hi` - Inclusive index range to search
/// * `min_value` - Peaks below this value are ignored
/// * `max_peaks` - Maximum number of peaks returned
/// * `min_distance` - Minimum index distance between two returned peaks
///
/// # Returns
///
/// Vector of (index, value) pairs, sorted by value (highest first)
///
/// # Algorithm
///
/// 1. Find all strict local maxima (value > left neighbor && value > right neighbor)
/// 2. Filter by `min_value`
/// 3. Sort by value
/// 4. Greedily keep peaks at least `min_distance` away from every kept peak
///
/// # Example
///
/// ```
/// use tempo_dsp::features::period::peak_picking::find_peaks;
///
/// let signal = vec![0.0, 0.5, 1.0, 0.7, 0.3, 0.9, 0.2];
/// let peaks = find_peaks(&signal, 0, 6, 0.1, 4, 2);
/// assert_eq!(peaks[0].0, 2);
/// assert_eq!(peaks[1].0, 5);
/// ```
pub fn find_peaks(
    signal: &[f32],
    lo: usize,
    hi: usize,
    min_value: f32,
    max_peaks: usize,
    min_distance: usize,
) -> Vec<(usize, f32)> {
    if signal.len() < 3 || max_peaks == 0 {
        return vec![];
    }

    // Both neighbors must exist
    let lo = lo.max(1);
    let hi = hi.min(signal.len() - 2);
    if lo > hi {
        return vec![];
    }

    let mut peaks: Vec<(usize, f32)> = (lo..=hi)
        .filter(|&i| {
            let value = signal[i];
            value.is_finite()
                && value >= min_value
                && value > signal[i - 1]
                && value > signal[i + 1]
        })
        .map(|i| (i, signal[i]))
        .collect();

    peaks.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let mut selected: Vec<(usize, f32)> = Vec::with_capacity(max_peaks);
    for (idx, value) in peaks {
        let too_close = selected
            .iter()
            .any(|&(kept, _)| idx.abs_diff(kept) < min_distance);
        if !too_close {
            selected.push((idx, value));
            if selected.len() == max_peaks {
                break;
            }
        }
    }

    log::trace!("Selected {} peaks in [{}, {}]", selected.len(), lo, hi);

    selected
}

/// Sub-sample offset of a peak from its two neighbors
///
/// Fits a parabola through `(−1, left)`, `(0, center)`, `(1, right)` and
/// returns the abscissa of its vertex, clamped to `[-0.5, 0.5]`. A flat
/// neighborhood yields `0.0`.
pub fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if !denom.is_finite() || denom.abs() < 1e-12 {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}
