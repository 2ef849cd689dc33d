//! Text loader for rating matrices.
//!
//! The format is a header `n m` followed by `n * m` whitespace-separated
//! floating-point values in row-major order.

use crate::data_format::matrix::RatingMatrix;
use crate::error::{KnnError, Result};
use log::{debug, info};
use std::io::Read;
use std::path::Path;
use std::str::SplitWhitespace;

/// Load a rating matrix from a file.
pub fn load_matrix(path: impl AsRef<Path>) -> Result<RatingMatrix> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        KnnError::invalid_argument(format!("cannot read {}: {}", path.display(), e))
    })?;
    let matrix = parse_matrix(&text)?;
    info!(
        "loaded {} x {} rating matrix from {}",
        matrix.num_rows(),
        matrix.num_cols(),
        path.display()
    );
    Ok(matrix)
}

/// Read a rating matrix from any reader.
pub fn read_matrix<R: Read>(mut reader: R) -> Result<RatingMatrix> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| KnnError::invalid_argument(format!("cannot read matrix: {e}")))?;
    parse_matrix(&text)
}

/// Parse a rating matrix from its text form.
pub fn parse_matrix(text: &str) -> Result<RatingMatrix> {
    let mut tokens = text.split_whitespace();

    let num_rows = header_value(&mut tokens, "row count")?;
    let num_cols = header_value(&mut tokens, "column count")?;
    let expected = num_rows.checked_mul(num_cols).ok_or_else(|| {
        KnnError::invalid_argument(format!("dimensions {num_rows} x {num_cols} overflow"))
    })?;
    debug!("matrix header: {} rows, {} columns", num_rows, num_cols);

    let mut data = Vec::with_capacity(expected.min(1 << 24));
    for i in 0..expected {
        let token = tokens.next().ok_or_else(|| {
            KnnError::invalid_argument(format!(
                "expected {} values but the input ends after {}",
                expected, i
            ))
        })?;
        let value = token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                KnnError::invalid_argument(format!(
                    "non-numeric value {:?} at row {}, column {}",
                    token,
                    i / num_cols,
                    i % num_cols
                ))
            })?;
        data.push(value);
    }

    if let Some(extra) = tokens.next() {
        return Err(KnnError::invalid_argument(format!(
            "unexpected trailing value {:?} after {} x {} ratings",
            extra, num_rows, num_cols
        )));
    }

    RatingMatrix::from_flat(data, num_cols)
}

fn header_value(tokens: &mut SplitWhitespace<'_>, what: &str) -> Result<usize> {
    let token = tokens
        .next()
        .ok_or_else(|| KnnError::invalid_argument(format!("missing {what} in header")))?;
    token
        .parse()
        .map_err(|_| KnnError::invalid_argument(format!("invalid {what} {token:?} in header")))
}
