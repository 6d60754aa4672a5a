//! Least squares solver for the trend fit.
//!
//! The trend estimator regresses yield against a 0-based step index, so every
//! problem here is a two-column design matrix `[1, x]`. We solve it via SVD:
//! the matrix is tall (window length rows, 2 columns) and SVD stays robust
//! when the window is short or the yields are nearly constant.

use nalgebra::{DMatrix, DVector};

/// Intercept and slope of a fitted line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub intercept: f64,
    pub slope: f64,
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if the strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = intercept + slope * x` by ordinary least squares.
///
/// `xs` and `ys` must have equal length >= 2; returns `None` otherwise or when
/// the solve is degenerate.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<Line> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len();
    let mut design = DMatrix::zeros(n, 2);
    for (i, &x) in xs.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = x;
    }
    let y = DVector::from_column_slice(ys);

    let beta = solve_least_squares(&design, &y)?;
    Some(Line {
        intercept: beta[0],
        slope: beta[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_recovers_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [4.0, 4.1, 4.2, 4.3];
        let line = fit_line(&xs, &ys).unwrap();
        assert!((line.intercept - 4.0).abs() < 1e-9);
        assert!((line.slope - 0.1).abs() < 1e-9);
    }

    #[test]
    fn fit_line_on_constant_series_has_zero_slope() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [5.3, 5.3, 5.3];
        let line = fit_line(&xs, &ys).unwrap();
        assert!(line.slope.abs() < 1e-9);
        assert!((line.intercept - 5.3).abs() < 1e-9);
    }

    #[test]
    fn fit_line_rejects_short_input() {
        assert!(fit_line(&[0.0], &[1.0]).is_none());
        assert!(fit_line(&[0.0, 1.0], &[1.0]).is_none());
    }
}
