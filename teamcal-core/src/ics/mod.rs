//! ICS feed parsing.

mod parse;

pub use parse::parse_components;
