//! Finds store bundles by walking a range of SKUs, probing each detail page and
//! appending the bundles that exist to a per game csv. A second pass fills in
//! prices the first one couldn't get.

mod error;
mod macros;

pub mod backfill;
pub mod candidates;
pub mod config;
pub mod logging;
pub mod model;
pub mod parse;
pub mod probe;
pub mod process;
pub mod request;
pub mod store;

pub use error::{Error, Result};
