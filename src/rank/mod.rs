//! Heuristic "best value" ranking.
//!
//! Score per maturity:
//!
//! ```text
//! score = latest_yield - penalty_weight * max(slope, 0) * confidence
//! ```
//!
//! Higher current yield is good; a confidently rising yield is penalized
//! (buying into a rising-rate maturity is paying tomorrow's price today); a
//! falling or flat trend contributes no penalty. Confidence is r² mapped
//! linearly, with an inestimable trend counting as 0 (no penalty either way).
//!
//! The ordering is score descending; exact ties go to the shorter maturity.
//! Scores are comparable only within one run.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::domain::{Maturity, RankedMaturity, Series, TrendResult};
use crate::trend;

/// Score a single maturity. Pure; exposed for tests and reports.
pub fn score(latest_yield: f64, trend: &TrendResult, penalty_weight: f64) -> f64 {
    let rising = trend.slope().unwrap_or(0.0).max(0.0);
    latest_yield - penalty_weight * rising * trend.confidence()
}

/// Rank all maturities with at least one non-missing observation.
///
/// Per-maturity trend estimation runs in parallel; the final order is fixed
/// by sorting and cannot depend on completion order. Maturities with zero
/// observations over the period are omitted, not scored as worst.
pub fn rank_maturities(
    series_by_maturity: &BTreeMap<Maturity, Series>,
    window: usize,
    penalty_weight: f64,
) -> Vec<RankedMaturity> {
    let mut ranked: Vec<RankedMaturity> = series_by_maturity
        .par_iter()
        .filter_map(|(&maturity, series)| {
            let (latest_date, latest_yield) = series.latest()?;
            let trend = trend::estimate(series, window);
            Some(RankedMaturity {
                maturity,
                latest_date,
                latest_yield,
                score: score(latest_yield, &trend, penalty_weight),
                trend,
            })
        })
        .collect();

    ranked.sort_by(compare);
    ranked
}

/// Score descending, then time-to-maturity ascending.
fn compare(a: &RankedMaturity, b: &RankedMaturity) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.maturity.cmp(&b.maturity))
}
