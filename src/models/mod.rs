//! Regression model implementations.
//!
//! Models are fitted on the encoded design matrix produced by the shared
//! [`FeatureEncoder`]; each one predicts from a single encoded row.

pub mod encoder;
pub mod forest;
pub mod linear;
pub mod model;

pub use encoder::*;
pub use forest::*;
pub use linear::*;
pub use model::*;
