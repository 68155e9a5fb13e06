//! Helper functions shared by the normalizer and the templates

mod date;

pub use date::*;
