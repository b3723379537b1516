//! `corn-yield` library crate.
//!
//! Builds a state-year corn yield dataset from monthly weather and annual
//! yields, fits a bank of regression models, ranks them on held-out data and
//! serves predictions. The binary (`cy`) is a thin wrapper around this library
//! so that:
//!
//! - core logic is testable without spawning processes
//! - the pipeline stages are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod predictor;
pub mod prep;
pub mod report;
