//! Readers turning text inputs into dynamic graphs and query schedules.

pub mod errors;
pub mod konect;
pub mod queries;

pub use errors::{ReadError, ReadResult};
pub use konect::KonectReader;
pub use queries::QueryReader;
