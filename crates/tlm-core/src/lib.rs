pub mod dataset;
pub mod timeseries;
pub mod units;

pub mod errors;

pub use errors::{TLMError, TLMResult};
