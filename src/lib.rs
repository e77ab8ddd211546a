// src/lib.rs

//! Declarative search-result extraction for torrent sites.
//!
//! A site is described by data: where its search form lives, which rows
//! hold results and how each record field is read from a row. The
//! [`services::SiteEngine`] turns such a description into normalized
//! [`models::Record`]s.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
