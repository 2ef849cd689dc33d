//! Human-readable output for a finished run.

use crate::coordinator::RunReport;
use crate::data_format::RatingMatrix;
use crate::error::{KnnError, Result};
use crate::predictor::{RatingDistribution, RatingPosterior};
use std::io::Write;

const RULE: &str = "---------------------------------";

/// Write the table of nearest viewers followed by the prediction.
///
/// Viewer ids and the column number are shown 1-based.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &RunReport,
    matrix: &RatingMatrix,
) -> Result<()> {
    writeln!(out, "Viewer ID      Target   Distance")?;
    writeln!(out, "{RULE}")?;
    for neighbor in report.nearest() {
        let rating = matrix
            .rating(neighbor.viewer_id, report.target_col)
            .ok_or_else(|| {
                KnnError::out_of_range(format!(
                    "viewer {} is not in the matrix",
                    neighbor.viewer_id
                ))
            })?;
        writeln!(
            out,
            "{:9}   {:9.1}   {:8.1}",
            neighbor.viewer_id + 1,
            rating,
            neighbor.distance
        )?;
    }
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "The predicted rating for column {} is {:.1}.",
        report.target_col + 1,
        report.prediction.value
    )?;
    Ok(())
}

/// Write the probability of each rating level and the most likely level.
pub fn write_distribution<W: Write>(out: &mut W, dist: &RatingDistribution) -> Result<()> {
    for (level, p) in dist.iter() {
        writeln!(out, "P(rating = {:.1}) = {:.6}", level, p)?;
    }
    if let Some((level, p)) = dist.mode() {
        writeln!(out, "Most likely rating: {:.1} (p = {:.6})", level, p)?;
    }
    Ok(())
}

/// Write the posterior of each rating level given the user's ratings.
pub fn write_posterior<W: Write>(out: &mut W, posterior: &RatingPosterior) -> Result<()> {
    for (level, p) in posterior.iter() {
        writeln!(out, "P(rating = {:.1} | your ratings) = {:.6}", level, p)?;
    }
    if let Some((level, p)) = posterior.mode() {
        writeln!(out, "Most likely rating given your ratings: {:.1} (p = {:.6})", level, p)?;
    }
    Ok(())
}
