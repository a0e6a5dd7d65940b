/// Divides `numerator` by `denominator`, mapping every non-finite result
/// (division by zero, infinities, NaN inputs) to `0.0`.
///
/// All ratio math in the pipeline goes through this helper so that a single
/// zero-output policy applies to velocities, new-code ratios and baselines.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    let value = numerator / denominator;
    if value.is_finite() { value } else { 0.0 }
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() {
        return None;
    }

    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
