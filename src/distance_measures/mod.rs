//! Distance computation between the query and viewer rows.
//!
//! The only measure is L1 (Manhattan) distance taken over every column except
//! the target column. Lower means more similar; zero means the viewer rated
//! every non-target item exactly as the query did.

mod engine;

pub use engine::{DistanceEngine, DEFAULT_PARALLEL_THRESHOLD};

use crate::types::Rating;

/// L1 distance between `query` and `row`, skipping `target_col` in `row`.
///
/// `query` has one entry per non-target column, so `query.len()` must be
/// `row.len() - 1`; extra entries on either side are ignored.
#[inline]
pub fn l1_excluding(query: &[Rating], row: &[Rating], target_col: usize) -> f64 {
    let (before, rest) = row.split_at(target_col.min(row.len()));
    let after = rest.get(1..).unwrap_or(&[]);

    before
        .iter()
        .chain(after)
        .zip(query)
        .map(|(&r, &q)| (q - r).abs())
        .sum()
}
