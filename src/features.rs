use serde::{Deserialize, Serialize};

use crate::{config::FeatureConfig, error::PipelineError, types::SubmissionRecord};

/// Authoritative column order for model input and the processed tables.
pub const FEATURE_COLUMNS: [&str; 4] =
    ["solved_count", "avg_rating", "avg_time_taken", "hard_ratio"];
pub const TARGET_COLUMN: &str = "future_rating";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub solved_count: u64,
    pub avg_rating: f64,
    /// Mean gap in seconds between consecutive accepted solves.
    pub avg_time_taken: f64,
    pub hard_ratio: f64,
}

impl FeatureVector {
    pub const DIM: usize = FEATURE_COLUMNS.len();

    /// Values in `FEATURE_COLUMNS` order.
    pub fn to_row(&self) -> [f64; Self::DIM] {
        [
            self.solved_count as f64,
            self.avg_rating,
            self.avg_time_taken,
            self.hard_ratio,
        ]
    }
}

/// Summarizes accepted, rated submissions into a feature vector.
///
/// Records that are not accepted or carry no problem rating are ignored.
/// Returns `NoData` when nothing survives that filter.
pub fn extract(
    records: &[SubmissionRecord],
    cfg: &FeatureConfig,
) -> Result<FeatureVector, PipelineError> {
    let solved: Vec<(i32, i64)> = records
        .iter()
        .filter(|r| r.is_accepted())
        .filter_map(|r| r.rating.map(|rating| (rating, r.created_at)))
        .collect();

    if solved.is_empty() {
        return Err(PipelineError::NoData);
    }

    let n = solved.len();
    let rating_sum: i64 = solved.iter().map(|(rating, _)| i64::from(*rating)).sum();
    let hard = solved.iter().filter(|(rating, _)| *rating >= cfg.hard_threshold).count();

    let mut timestamps: Vec<i64> = solved.iter().map(|(_, t)| *t).collect();
    timestamps.sort_unstable();

    Ok(FeatureVector {
        solved_count: n as u64,
        avg_rating: rating_sum as f64 / n as f64,
        avg_time_taken: mean_gap(&timestamps),
        hard_ratio: hard as f64 / n as f64,
    })
}

// Expects `sorted` ascending. Consecutive gaps telescope to last - first,
// widened so extreme timestamps cannot overflow.
fn mean_gap(sorted: &[i64]) -> f64 {
    match (sorted.first(), sorted.last()) {
        (Some(&first), Some(&last)) if sorted.len() >= 2 => {
            (i128::from(last) - i128::from(first)) as f64 / (sorted.len() - 1) as f64
        }
        _ => 0.0,
    }
}
