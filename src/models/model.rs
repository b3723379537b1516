//! Fitted estimators behind one prediction interface.
//!
//! The bank stores every model as an [`Estimator`] so evaluation and prediction
//! can stay generic over the strategy.

use serde::{Deserialize, Serialize};

use crate::models::forest::RandomForest;
use crate::models::linear::LinearModel;

/// Predicts the training mean regardless of features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanModel {
    pub mean: f64,
}

impl MeanModel {
    pub fn fit(y: &[f64]) -> Option<Self> {
        if y.is_empty() {
            return None;
        }
        Some(Self {
            mean: y.iter().sum::<f64>() / y.len() as f64,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    Mean(MeanModel),
    Linear(LinearModel),
    Forest(RandomForest),
}

impl Estimator {
    /// Predict from an already-encoded feature vector.
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Estimator::Mean(m) => m.mean,
            Estimator::Linear(m) => m.predict(features),
            Estimator::Forest(m) => m.predict(features),
        }
    }

    /// Check that the estimator reads exactly `width` encoded columns.
    pub fn check_width(&self, width: usize) -> Result<(), String> {
        match self {
            Estimator::Mean(_) => Ok(()),
            Estimator::Linear(m) => m.check_width(width),
            Estimator::Forest(m) => m.check_width(width),
        }
    }

    /// Per-column importances, when the estimator provides them.
    pub fn importances(&self) -> Option<&[f64]> {
        match self {
            Estimator::Forest(m) => Some(m.importances()),
            Estimator::Mean(_) | Estimator::Linear(_) => None,
        }
    }
}
