//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the row schemas (`WeatherRecord`, `SeasonalFeature`, `YieldRecord`, `TrainingRow`)
//! - run configuration (`PipelineConfig`, `SplitPolicy`)
//! - model identifiers and metrics (`ModelKind`, `Metrics`)

pub mod types;

pub use types::*;
