//! Output generation.
//!
//! - [`json`]: writes one `ip_data_<address>.json` file per aggregation run

pub mod json;
