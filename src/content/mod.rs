//! Content module - post models, normalization and reading time

mod normalize;
mod post;
pub mod reading_time;

pub use normalize::{ContentError, Normalized, Normalizer, Shape};
pub use post::{ContentBlock, Post, PostDetail};
