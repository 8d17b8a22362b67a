//! Regression scores used to rank candidates

/// Coefficient of determination.
///
/// A constant `y_true` has no variance to explain: a perfect prediction scores
/// 1.0 and anything else 0.0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_true.len();
    if n == 0 || n != y_pred.len() {
        return f64::NAN;
    }
    let mean = y_true.iter().sum::<f64>() / n as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Adjust an R² for `n` samples and `p` features: `1 - (1 - R²)(n - 1)/(n - p - 1)`.
///
/// Falls back to the plain R² when `n - p - 1 <= 0`.
pub fn adjust_r2(r2: f64, n: usize, p: usize) -> f64 {
    if n <= p + 1 {
        return r2;
    }
    1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - p as f64 - 1.0)
}

/// Adjusted R² of a prediction with `n_features` regressors
pub fn adjusted_r2_score(y_true: &[f64], y_pred: &[f64], n_features: usize) -> f64 {
    adjust_r2(r2_score(y_true, y_pred), y_true.len(), n_features)
}

/// Total order for scores where NaN ranks below every number
pub fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}
