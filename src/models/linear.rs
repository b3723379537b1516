//! Linear and ridge regression on the encoded feature matrix.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::math::{solve_least_squares, solve_ridge};

/// `y = intercept + Σ coef_j x_j`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Ridge strength used for the fit (`None` for ordinary least squares).
    pub alpha: Option<f64>,
}

impl LinearModel {
    /// Ordinary least squares (minimum-norm for collinear columns).
    pub fn fit_ols(x: &DMatrix<f64>, y: &[f64]) -> Result<Self, PipelineError> {
        let (design, target) = with_intercept(x, y)?;
        let beta = solve_least_squares(&design, &target)
            .ok_or_else(|| PipelineError::Fit("least squares solve failed".into()))?;
        Ok(Self::from_beta(&beta, None))
    }

    /// Ridge regression with an unpenalized intercept.
    pub fn fit_ridge(x: &DMatrix<f64>, y: &[f64], alpha: f64) -> Result<Self, PipelineError> {
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(PipelineError::Fit(format!("ridge alpha must be > 0, got {alpha}")));
        }
        let (design, target) = with_intercept(x, y)?;
        let beta = solve_ridge(&design, &target, alpha)
            .ok_or_else(|| PipelineError::Fit("ridge solve failed".into()))?;
        Ok(Self::from_beta(&beta, Some(alpha)))
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }

    /// Check a deserialized model against the encoder width.
    pub fn check_width(&self, width: usize) -> Result<(), String> {
        if self.coefficients.len() != width {
            return Err(format!(
                "linear model has {} coefficients for {width} encoded columns",
                self.coefficients.len()
            ));
        }
        Ok(())
    }

    fn from_beta(beta: &DVector<f64>, alpha: Option<f64>) -> Self {
        Self {
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
            alpha,
        }
    }
}

fn with_intercept(x: &DMatrix<f64>, y: &[f64]) -> Result<(DMatrix<f64>, DVector<f64>), PipelineError> {
    if x.nrows() == 0 || x.nrows() != y.len() {
        return Err(PipelineError::Fit(format!(
            "design has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    let design = x.clone().insert_column(0, 1.0);
    Ok((design, DVector::from_column_slice(y)))
}
