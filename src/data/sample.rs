//! Synthetic feed generation for offline runs.
//!
//! `--sample` swaps the HTTP source for a deterministic generator: business
//! days of the month, a downward-sloping base curve, and a small seeded
//! random walk per maturity. The output goes through the same XML document
//! shape as the live feed, so the full parse -> trend -> rank pipeline is
//! exercised end to end without a network.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::treasury::CurveSource;
use crate::domain::{Maturity, MonthKey};
use crate::error::AppError;

/// Daily random-walk step, in yield percentage points.
const DAILY_STEP_SIGMA: f64 = 0.02;

/// Probability that a quote is withheld for a day (exercises missing-value
/// handling downstream).
const MISSING_PROB: f64 = 0.02;

/// Offline source producing a deterministic month of synthetic quotes.
pub struct SampleCurveSource {
    seed: u64,
}

impl SampleCurveSource {
    pub fn new(seed: u64) -> SampleCurveSource {
        SampleCurveSource { seed }
    }
}

impl CurveSource for SampleCurveSource {
    fn fetch_month(&self, month: MonthKey) -> Result<String, AppError> {
        generate_month_xml(month, self.seed)
    }
}

/// Base curve level for a maturity: mildly inverted at the short end, so
/// sample rankings look like recent real data.
fn base_yield(maturity: Maturity) -> f64 {
    4.05 + 1.3 * (-maturity.years() / 2.0).exp()
}

/// Seed the month's RNG from the caller seed and the month key, so the same
/// invocation always reproduces the same feed.
fn month_seed(month: MonthKey, seed: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    month.year.hash(&mut hasher);
    month.month.hash(&mut hasher);
    hasher.finish()
}

/// Weekdays of the month, ascending. Holidays are not modeled; the pipeline
/// only needs plausible trading-day spacing.
pub fn business_days(month: MonthKey) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let Some(mut day) = NaiveDate::from_ymd_opt(month.year, month.month, 1) else {
        return days;
    };
    while month.contains(day) {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        let Some(next) = day.succ_opt() else { break };
        day = next;
    }
    days
}

/// Build one month of feed XML in the live document shape.
pub fn generate_month_xml(month: MonthKey, seed: u64) -> Result<String, AppError> {
    let mut rng = StdRng::seed_from_u64(month_seed(month, seed));
    let step = Normal::new(0.0, DAILY_STEP_SIGMA)
        .map_err(|e| AppError::Io(format!("Noise distribution error: {e}")))?;

    let mut levels: Vec<(Maturity, f64)> = Maturity::ALL
        .iter()
        .map(|&m| (m, base_yield(m)))
        .collect();

    let mut body = String::new();
    for date in business_days(month) {
        body.push_str("<entry><content type=\"application/xml\"><m:properties>");
        let _ = write!(body, "<d:NEW_DATE>{date}T00:00:00</d:NEW_DATE>");
        for (maturity, level) in levels.iter_mut() {
            *level = (*level + step.sample(&mut rng)).max(0.01);
            if rng.r#gen::<f64>() < MISSING_PROB {
                let _ = write!(body, "<d:{} m:null=\"true\"/>", maturity.xml_field());
            } else {
                let _ = write!(
                    body,
                    "<d:{field}>{level:.2}</d:{field}>",
                    field = maturity.xml_field()
                );
            }
        }
        body.push_str("</m:properties></content></entry>");
    }

    Ok(format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<feed xmlns=\"http://www.w3.org/2005/Atom\" ",
            "xmlns:m=\"http://schemas.microsoft.com/ado/2007/08/dataservices/metadata\" ",
            "xmlns:d=\"http://schemas.microsoft.com/ado/2007/08/dataservices\">",
            "{}</feed>"
        ),
        body
    ))
}
