use serde::Serialize;

use crate::models::ScoreSample;

pub const MIN_SLOPE: f64 = -10.0;
pub const MAX_SLOPE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub slope: f64,
    /// Growth-trend score. Slopes beyond the ±10 domain land outside 0..=100.
    pub normalized: f64,
}

/// Least-squares slope of percentage over ordinal, with a flat trend when
/// there is not enough history.
pub fn estimate_trend(series: &[ScoreSample]) -> Trend {
    let slope = least_squares_slope(series);
    Trend {
        slope,
        normalized: normalize_gts(slope),
    }
}

pub fn normalize_gts(slope: f64) -> f64 {
    (slope - MIN_SLOPE) / (MAX_SLOPE - MIN_SLOPE) * 100.0
}

fn least_squares_slope(series: &[ScoreSample]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }

    let n = series.len() as f64;
    let sum_x: f64 = series.iter().map(|s| s.ordinal as f64).sum();
    let sum_y: f64 = series.iter().map(|s| s.percentage).sum();
    let sum_xy: f64 = series
        .iter()
        .map(|s| s.ordinal as f64 * s.percentage)
        .sum();
    let sum_xx: f64 = series.iter().map(|s| (s.ordinal as f64).powi(2)).sum();

    let denominator = n * sum_xx - sum_x.powi(2);
    if denominator == 0.0 {
        return 0.0;
    }

    (n * sum_xy - sum_x * sum_y) / denominator
}
