//! Least-squares health trend

use chrono::{DateTime, Utc};

/// Slope of `value` against time, in units per hour.
///
/// Returns 0 with fewer than two points or when every point shares one
/// timestamp.
pub fn slope_per_hour(points: &[(DateTime<Utc>, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let origin = points[0].0;
    let xs: Vec<f64> = points
        .iter()
        .map(|(t, _)| (*t - origin).num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    let n = points.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, v)| v).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, (_, y)) in xs.iter().zip(points) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx <= f64::EPSILON {
        return 0.0;
    }
    sxy / sxx
}
