//! Data format types for distknn.
//!
//! This module provides the rating matrix, the query vector and the text
//! loader that reads a matrix from disk.

mod loader;
mod matrix;
mod query;

pub use loader::{load_matrix, parse_matrix, read_matrix};
pub use matrix::RatingMatrix;
pub use query::QueryVector;
