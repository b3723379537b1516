//! Feature preparation: unit conversion, seasonal aggregation, and the join
//! that produces the modeling table.

pub mod merge;
pub mod season;
pub mod units;

pub use merge::*;
pub use season::*;
pub use units::*;
