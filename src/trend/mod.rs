//! Trailing-window trend estimation.
//!
//! For each maturity we fit yield against a 0-based step index over the most
//! recent `window` non-missing observations. Using a step index rather than
//! the calendar date keeps spacing uniform across weekends and holidays.
//!
//! The estimator is a pure function of the window: no I/O, no clock.

use crate::domain::{Series, TrendResult};
use crate::math::fit_line;

/// Tolerance below which a sum of squares counts as zero (constant series).
const SS_EPS: f64 = 1e-12;

/// Estimate the trend over the trailing `window` non-missing observations.
///
/// Fewer than two usable observations, or a regression the solver cannot
/// handle, produce `TrendResult::Insufficient` rather than an error; the
/// ranker treats that as zero trend penalty.
pub fn estimate(series: &Series, window: usize) -> TrendResult {
    let ys = series.tail_yields(window);
    let n = ys.len();
    if n < 2 {
        return TrendResult::Insufficient { sample_count: n };
    }

    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let Some(line) = fit_line(&xs, &ys) else {
        return TrendResult::Insufficient { sample_count: n };
    };

    let mean = ys.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = ys.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| {
            let fitted = line.intercept + line.slope * x;
            (y - fitted).powi(2)
        })
        .sum();

    let r_squared = if ss_tot <= SS_EPS {
        // Constant series: a zero-residual fit explains it perfectly; any
        // residual on a flat series means the regression is degenerate.
        if ss_res <= SS_EPS {
            1.0
        } else {
            return TrendResult::Insufficient { sample_count: n };
        }
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    if !(line.slope.is_finite() && r_squared.is_finite()) {
        return TrendResult::Insufficient { sample_count: n };
    }

    TrendResult::Fit {
        slope: line.slope,
        r_squared,
        sample_count: n,
    }
}
