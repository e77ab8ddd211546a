//! Utility functions and helpers.

pub mod http;
pub mod parse;
pub mod path;
pub mod url;

pub use self::url::fix_link;
