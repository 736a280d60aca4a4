//! Linear gap filling for regularly spaced series
//!
//! Missing points are interpolated along the straight line between the
//! nearest known neighbours. Leading and trailing gaps take the nearest
//! known value, so nothing is ever extrapolated beyond the known anchors.

use crate::{MathError, Result};

/// Fill missing entries of an evenly spaced series.
///
/// Returns `InsufficientData` when no entry is known.
pub fn fill_gaps(values: &[Option<f64>]) -> Result<Vec<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    let (first_idx, first_val) = *known.first().ok_or_else(|| {
        MathError::InsufficientData("Cannot fill gaps without any known value".to_string())
    })?;
    let (last_idx, last_val) = known[known.len() - 1];

    let mut filled = Vec::with_capacity(values.len());
    filled.extend(std::iter::repeat(first_val).take(first_idx));

    for pair in known.windows(2) {
        let (left_idx, left_val) = pair[0];
        let (right_idx, right_val) = pair[1];
        let span = (right_idx - left_idx) as f64;

        filled.push(left_val);
        for step in 1..(right_idx - left_idx) {
            let t = step as f64 / span;
            filled.push(left_val + (right_val - left_val) * t);
        }
    }

    filled.push(last_val);
    filled.extend(std::iter::repeat(last_val).take(values.len() - last_idx - 1));

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_gap_takes_midpoint() {
        let filled = fill_gaps(&[Some(10.0), None, Some(20.0)]).unwrap();
        assert_eq!(filled.len(), 3);
        assert_relative_eq!(filled[1], 15.0);
    }

    #[test]
    fn longer_gap_is_linear() {
        let filled = fill_gaps(&[Some(0.0), None, None, None, Some(8.0)]).unwrap();
        assert_eq!(filled, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn edges_are_extended_flat() {
        let filled = fill_gaps(&[None, None, Some(5.0), None, Some(7.0), None]).unwrap();
        assert_eq!(filled, vec![5.0, 5.0, 5.0, 6.0, 7.0, 7.0]);
    }

    #[test]
    fn fully_known_series_is_unchanged() {
        let filled = fill_gaps(&[Some(1.0), Some(2.0), Some(4.0)]).unwrap();
        assert_eq!(filled, vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn all_missing_is_an_error() {
        assert!(matches!(
            fill_gaps(&[None, None]),
            Err(MathError::InsufficientData(_))
        ));
        assert!(fill_gaps(&[]).is_err());
    }
}
