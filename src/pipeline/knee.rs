//! Elbow detection on a convex, decreasing curve (Kneedle, offline mode)

/// Locate the knee of a convex, decreasing curve.
///
/// Both axes are normalized to [0, 1] and the difference curve `(1 - y) - x` is
/// scanned for local maxima. A maximum is accepted as the knee once the difference
/// curve falls below `max - sensitivity * mean(Δx)` before the next local maximum.
/// Local minima reset the threshold to zero.
///
/// Returns the x value of the knee, or `None` for flat, linear or too-short curves.
pub fn find_knee(x: &[f64], y: &[f64], sensitivity: f64) -> Option<f64> {
    let n = x.len();
    if n < 3 || y.len() != n {
        return None;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let x_norm = normalize(x)?;
    let y_norm = normalize(y)?;

    let diff: Vec<f64> = y_norm
        .iter()
        .zip(x_norm.iter())
        .map(|(yn, xn)| (1.0 - yn) - xn)
        .collect();

    // A straight line leaves only rounding noise in the difference curve
    let peak = diff.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if peak <= 1e-12 {
        return None;
    }

    let maxima = relative_extrema(&diff, |a, b| a >= b);
    let minima = relative_extrema(&diff, |a, b| a <= b);
    let first_max = *maxima.first()?;

    let mean_step = x_norm.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (n - 1) as f64;
    let offset = sensitivity * mean_step.abs();

    let mut threshold = 0.0;
    let mut threshold_index = first_max;
    for i in first_max..n - 1 {
        if x_norm[i] == 1.0 {
            break;
        }
        if maxima.contains(&i) {
            threshold = diff[i] - offset;
            threshold_index = i;
        }
        if minima.contains(&i) {
            threshold = 0.0;
        }
        if diff[i + 1] < threshold {
            return Some(x[threshold_index]);
        }
    }

    None
}

fn normalize(values: &[f64]) -> Option<Vec<f64>> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= 0.0 {
        return None;
    }
    Some(values.iter().map(|v| (v - min) / range).collect())
}

/// Indices whose value compares true against both neighbors; endpoints compare
/// against themselves on the missing side.
fn relative_extrema(values: &[f64], cmp: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let n = values.len();
    (0..n)
        .filter(|&i| {
            let left = values[i.saturating_sub(1)];
            let right = values[(i + 1).min(n - 1)];
            cmp(values[i], left) && cmp(values[i], right)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ks(n: usize) -> Vec<f64> {
        (1..=n).map(|k| k as f64).collect()
    }

    #[test]
    fn test_sharp_elbow() {
        let y = [100.0, 20.0, 15.0, 12.0, 10.0, 9.0, 8.5, 8.0];
        assert_eq!(find_knee(&ks(y.len()), &y, 1.0), Some(2.0));
    }

    #[test]
    fn test_gradual_elbow() {
        let y = [100.0, 80.0, 70.0, 65.0, 63.0, 62.0, 61.5, 61.2, 61.0, 60.9];
        assert_eq!(find_knee(&ks(y.len()), &y, 1.0), Some(4.0));
    }

    #[test]
    fn test_linear_curve_has_no_knee() {
        let y: Vec<f64> = (0..10).map(|i| 100.0 - 10.0 * i as f64).collect();
        assert_eq!(find_knee(&ks(10), &y, 1.0), None);
    }

    #[test]
    fn test_flat_curve_has_no_knee() {
        assert_eq!(find_knee(&ks(5), &[3.0; 5], 1.0), None);
    }

    #[test]
    fn test_too_short() {
        assert_eq!(find_knee(&ks(2), &[10.0, 1.0], 1.0), None);
    }
}
