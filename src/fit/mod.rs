//! Model fitting orchestration.
//!
//! Responsibilities:
//!
//! - partition the merged table into training / evaluation rows
//! - fit every model in the bank (parallel) through one shared encoder
//! - score and rank the fitted models on the evaluation rows

pub mod bank;
pub mod selection;
pub mod split;

pub use bank::*;
pub use selection::*;
pub use split::*;
