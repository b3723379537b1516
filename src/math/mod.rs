//! Mathematical utilities: least squares solvers and regression metrics.

pub mod metrics;
pub mod ols;

pub use metrics::*;
pub use ols::*;
