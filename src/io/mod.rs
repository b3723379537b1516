//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - dataset / comparison / prediction CSV exports (`export`)
//! - model bundle JSON read/write (`bundle`)

pub mod bundle;
pub mod export;
pub mod ingest;

pub use bundle::*;
pub use export::*;
pub use ingest::*;
