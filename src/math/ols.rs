//! Least squares solvers.
//!
//! Both linear models in the bank reduce to small dense problems:
//!
//! ```text
//! ordinary:  minimize ‖y - Xβ‖²
//! ridge:     minimize ‖y - Xβ‖² + α Σ_{j≥1} β_j²
//! ```
//!
//! The one-hot state block plus an intercept column is rank deficient by
//! construction, so the ordinary solve goes through SVD (minimum-norm solution)
//! rather than the normal equations. Ridge with `α > 0` is positive definite on
//! the penalized block and is solved by Cholesky, falling back to SVD.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Columns that are identically zero get a zero coefficient and are left out
/// of the decomposition; nalgebra's SVD does not return the minimum-norm
/// solution when the design contains one.
///
/// Returns `None` if no finite solution is found at any tolerance.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let active: Vec<usize> = (0..x.ncols())
        .filter(|&j| x.column(j).iter().any(|v| *v != 0.0))
        .collect();
    if active.is_empty() {
        return Some(DVector::zeros(x.ncols()));
    }

    let reduced = x.select_columns(&active);
    let beta = solve_svd(reduced, y)?;

    let mut full = DVector::zeros(x.ncols());
    for (k, &j) in active.iter().enumerate() {
        full[j] = beta[k];
    }
    Some(full)
}

fn solve_svd(x: DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.svd(true, true);

    // Singular values below the tolerance are treated as zero, which yields the
    // minimum-norm solution for collinear columns.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve a ridge problem where column 0 is an unpenalized intercept.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Option<DVector<f64>> {
    let p = x.ncols();
    let xt = x.transpose();
    let mut gram = &xt * x;
    for j in 1..p {
        gram[(j, j)] += alpha;
    }
    let rhs = &xt * y;

    if let Some(chol) = gram.clone().cholesky() {
        let beta = chol.solve(&rhs);
        if beta.iter().all(|v| v.is_finite()) {
            return Some(beta);
        }
    }

    solve_least_squares(&gram, &rhs)
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
    fn least_squares_handles_duplicate_columns() {
        // Columns 1 and 2 are identical; the min-norm solution splits the slope.
        let x = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0, 3.0, 5.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        let fitted = &x * &beta;
        for (f, t) in fitted.iter().zip(y.iter()) {
            assert!((f - t).abs() < 1e-8);
        }
        assert!((beta[1] - beta[2]).abs() < 1e-8);
    }

    #[test]
    fn least_squares_ignores_all_zero_columns() {
        // Intercept, a one-hot pair, an unused indicator and a slope:
        // y = 10 + 4 [group b] + 2 x
        let rows = [
            [1.0, 1.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0, 0.0, 3.0],
            [1.0, 0.0, 1.0, 0.0, 0.5],
            [1.0, 0.0, 1.0, 0.0, 2.0],
            [1.0, 0.0, 1.0, 0.0, 4.0],
        ];
        let x = DMatrix::from_fn(rows.len(), 5, |i, j| rows[i][j]);
        let y = DVector::from_iterator(
            rows.len(),
            rows.iter().map(|r| 10.0 + 4.0 * r[2] + 2.0 * r[4]),
        );

        let beta = solve_least_squares(&x, &y).unwrap();
        assert_eq!(beta.len(), 5);
        assert_eq!(beta[3], 0.0);
        let residual = (&y - &x * &beta).norm();
        assert!(residual < 1e-8, "residual={residual}");
        assert!((beta[4] - 2.0).abs() < 1e-8);
        assert!((beta[2] - beta[1] - 4.0).abs() < 1e-8);
    }

    #[test]
    fn ridge_shrinks_slope_but_not_intercept() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, -1.5, 1.0, -0.5, 1.0, 0.5, 1.0, 1.5]);
        let y = DVector::from_row_slice(&[7.0, 9.0, 11.0, 13.0]);

        let ols = solve_least_squares(&x, &y).unwrap();
        let ridge = solve_ridge(&x, &y, 5.0).unwrap();

        // Centered column: intercept is the mean regardless of alpha.
        assert!((ridge[0] - 10.0).abs() < 1e-10);
        assert!(ridge[1].abs() < ols[1].abs());
        assert!(ridge[1] > 0.0);
    }
}
