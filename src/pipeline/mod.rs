//! Pipeline entry points for the command line.
//!
//! - `run_search`: Load a site and search it once
//! - `run_validate`: Check a site definition without sending requests

pub mod search;
pub mod validate;

pub use search::{build_engine, run_search};
pub use validate::{ValidationReport, run_validate};
