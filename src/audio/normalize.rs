/// Spans narrower than this are treated as constant.
const MIN_SPAN: f32 = 1e-10;

/// Rescale a series to `[0, 1]` by its own minimum and maximum.
///
/// A constant (or empty) series maps to all zeros rather than dividing by a
/// vanishing span.
pub fn min_max(values: &[f32]) -> Vec<f32> {
    let (lo, hi) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    if span.is_nan() || span < MIN_SPAN {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|&v| ((v - lo) / span).clamp(0.0, 1.0))
        .collect()
}
