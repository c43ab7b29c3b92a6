//! Non-finite sample handling

/// Replace NaN and infinite samples with silence
///
/// Returns `None` when the input is already clean so callers can keep
/// borrowing the original buffer.
pub fn sanitize_samples(samples: &[f32]) -> Option<Vec<f32>> {
    let bad = samples.iter().filter(|s| !s.is_finite()).count();
    if bad == 0 {
        return None;
    }

    log::warn!("Replacing {} non-finite samples with 0.0", bad);
    Some(
        samples
            .iter()
            .map(|&s| finite_or(s, 0.0))
            .collect(),
    )
}

/// Map a non-finite value to `fallback`
pub fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input_is_borrowed() {
        assert!(sanitize_samples(&[0.0, 0.5, -0.5]).is_none());
    }

    #[test]
    fn test_non_finite_replaced() {
        let cleaned = sanitize_samples(&[0.1, f32::NAN, f32::INFINITY, -0.2]).unwrap();
        assert_eq!(cleaned, vec![0.1, 0.0, 0.0, -0.2]);
    }

    #[test]
    fn test_finite_or() {
        assert_eq!(finite_or(f32::NAN, 0.0), 0.0);
        assert_eq!(finite_or(1.5, 0.0), 1.5);
    }
}
