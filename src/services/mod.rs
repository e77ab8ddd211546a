//! Service layer for the search engine.
//!
//! This module contains the parts a search runs through:
//! - Value filters (`filters`)
//! - Field extraction (`extractor`)
//! - Row extraction (`rows`)
//! - Record assembly (`RecordAssembler`)
//! - The request gateway (`RequestGateway`)
//! - The per-site search pipeline (`SiteEngine`)

mod assembler;
mod engine;
pub mod extractor;
pub mod filters;
mod gateway;
mod hooks;
pub mod rows;

#[cfg(test)]
pub(crate) mod stub;

pub use assembler::RecordAssembler;
pub use engine::SiteEngine;
pub use extractor::Root;
pub use gateway::RequestGateway;
pub use hooks::{SiteHooks, parse_tags};
pub use rows::{MergedRow, Row};
