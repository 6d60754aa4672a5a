//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during trend estimation and ranking
//! - exported to JSON/CSV artifacts
//! - reloaded later from the cached CSV without refetching

use std::fmt;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Fixed set of Treasury constant-maturity buckets, ordered by time to
/// maturity. The derived `Ord` follows declaration order, which is the
/// tie-break order used by the ranker (shorter maturity wins on equal score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Maturity {
    #[serde(rename = "1M")]
    M1,
    #[serde(rename = "2M")]
    M2,
    #[serde(rename = "3M")]
    M3,
    #[serde(rename = "6M")]
    M6,
    #[serde(rename = "1Y")]
    Y1,
    #[serde(rename = "2Y")]
    Y2,
    #[serde(rename = "3Y")]
    Y3,
    #[serde(rename = "5Y")]
    Y5,
    #[serde(rename = "7Y")]
    Y7,
    #[serde(rename = "10Y")]
    Y10,
    #[serde(rename = "20Y")]
    Y20,
    #[serde(rename = "30Y")]
    Y30,
}

impl Maturity {
    pub const ALL: [Maturity; 12] = [
        Maturity::M1,
        Maturity::M2,
        Maturity::M3,
        Maturity::M6,
        Maturity::Y1,
        Maturity::Y2,
        Maturity::Y3,
        Maturity::Y5,
        Maturity::Y7,
        Maturity::Y10,
        Maturity::Y20,
        Maturity::Y30,
    ];

    /// Short label used in reports and CSV headers.
    pub fn label(self) -> &'static str {
        match self {
            Maturity::M1 => "1M",
            Maturity::M2 => "2M",
            Maturity::M3 => "3M",
            Maturity::M6 => "6M",
            Maturity::Y1 => "1Y",
            Maturity::Y2 => "2Y",
            Maturity::Y3 => "3Y",
            Maturity::Y5 => "5Y",
            Maturity::Y7 => "7Y",
            Maturity::Y10 => "10Y",
            Maturity::Y20 => "20Y",
            Maturity::Y30 => "30Y",
        }
    }

    /// Years to maturity (used for ranking tie-breaks and reports).
    pub fn years(self) -> f64 {
        match self {
            Maturity::M1 => 1.0 / 12.0,
            Maturity::M2 => 2.0 / 12.0,
            Maturity::M3 => 3.0 / 12.0,
            Maturity::M6 => 6.0 / 12.0,
            Maturity::Y1 => 1.0,
            Maturity::Y2 => 2.0,
            Maturity::Y3 => 3.0,
            Maturity::Y5 => 5.0,
            Maturity::Y7 => 7.0,
            Maturity::Y10 => 10.0,
            Maturity::Y20 => 20.0,
            Maturity::Y30 => 30.0,
        }
    }

    /// Field name carried by the Treasury daily yield-curve XML feed.
    pub fn xml_field(self) -> &'static str {
        match self {
            Maturity::M1 => "BC_1MONTH",
            Maturity::M2 => "BC_2MONTH",
            Maturity::M3 => "BC_3MONTH",
            Maturity::M6 => "BC_6MONTH",
            Maturity::Y1 => "BC_1YEAR",
            Maturity::Y2 => "BC_2YEAR",
            Maturity::Y3 => "BC_3YEAR",
            Maturity::Y5 => "BC_5YEAR",
            Maturity::Y7 => "BC_7YEAR",
            Maturity::Y10 => "BC_10YEAR",
            Maturity::Y20 => "BC_20YEAR",
            Maturity::Y30 => "BC_30YEAR",
        }
    }

    pub fn from_xml_field(name: &str) -> Option<Maturity> {
        Maturity::ALL.iter().copied().find(|m| m.xml_field() == name)
    }

    pub fn from_label(label: &str) -> Option<Maturity> {
        Maturity::ALL.iter().copied().find(|m| m.label() == label)
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A calendar month key in the form `YYYYMM`.
///
/// The cache policy, artifact filenames, and the Treasury feed query are all
/// keyed by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<MonthKey, AppError> {
        if !(1..=12).contains(&month) || !(1900..=9999).contains(&year) {
            return Err(AppError::Usage(format!(
                "Invalid month key: year={year} month={month}."
            )));
        }
        Ok(MonthKey { year, month })
    }

    /// Parse a `YYYYMM` string (the CLI `--month` format).
    pub fn parse(s: &str) -> Result<MonthKey, AppError> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::Usage(format!(
                "Month must be in YYYYMM format, got '{s}'."
            )));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| AppError::Usage(format!("Invalid year in '{s}'.")))?;
        let month: u32 = s[4..]
            .parse()
            .map_err(|_| AppError::Usage(format!("Invalid month in '{s}'.")))?;
        MonthKey::new(year, month)
    }

    pub fn from_date(date: NaiveDate) -> MonthKey {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// January through this month of the same year, ascending.
    pub fn months_ytd(self) -> Vec<MonthKey> {
        (1..=self.month)
            .map(|month| MonthKey {
                year: self.year,
                month,
            })
            .collect()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// One trading day's quote for one maturity. A missing quote (field blank in
/// the feed) is `None`, never coerced to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub yield_pct: Option<f64>,
}

/// Date-ordered observations for one maturity with unique dates.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    maturity: Maturity,
    observations: Vec<Observation>,
}

impl Series {
    pub fn new(maturity: Maturity) -> Series {
        Series {
            maturity,
            observations: Vec::new(),
        }
    }

    pub fn maturity(&self) -> Maturity {
        self.maturity
    }

    /// Insert keeping date order. A second observation for an existing date is
    /// dropped (first row wins), preserving the unique-date invariant.
    pub fn insert(&mut self, obs: Observation) {
        match self
            .observations
            .binary_search_by_key(&obs.date, |o| o.date)
        {
            Ok(_) => {}
            Err(idx) => self.observations.insert(idx, obs),
        }
    }

    /// Append another month's observations (YTD concatenation by the caller;
    /// the parser itself is single-month).
    pub fn extend_from(&mut self, other: &Series) {
        for obs in &other.observations {
            self.insert(*obs);
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn non_missing_count(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| o.yield_pct.is_some())
            .count()
    }

    /// Most recent non-missing observation, if any.
    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        self.observations
            .iter()
            .rev()
            .find_map(|o| o.yield_pct.map(|y| (o.date, y)))
    }

    /// The trailing `window` non-missing yields in date order.
    pub fn tail_yields(&self, window: usize) -> Vec<f64> {
        let mut tail: Vec<f64> = self
            .observations
            .iter()
            .rev()
            .filter_map(|o| o.yield_pct)
            .take(window)
            .collect();
        tail.reverse();
        tail
    }
}

/// Outcome of the trailing-window linear fit for one maturity.
///
/// `Insufficient` is a representable state, not an error: fewer than two
/// usable observations (or a degenerate regression) rank with zero trend
/// penalty rather than aborting the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendResult {
    Fit {
        /// Signed, in yield percentage points per step of the sequential
        /// day index (positive = rising yields).
        slope: f64,
        /// Coefficient of determination, in [0, 1].
        r_squared: f64,
        sample_count: usize,
    },
    Insufficient {
        sample_count: usize,
    },
}

impl TrendResult {
    pub fn sample_count(&self) -> usize {
        match *self {
            TrendResult::Fit { sample_count, .. } => sample_count,
            TrendResult::Insufficient { sample_count } => sample_count,
        }
    }

    pub fn slope(&self) -> Option<f64> {
        match *self {
            TrendResult::Fit { slope, .. } => Some(slope),
            TrendResult::Insufficient { .. } => None,
        }
    }

    /// Confidence weight used by the ranker: r² for a fit, 0 when the trend
    /// could not be estimated.
    pub fn confidence(&self) -> f64 {
        match *self {
            TrendResult::Fit { r_squared, .. } => r_squared,
            TrendResult::Insufficient { .. } => 0.0,
        }
    }
}

/// One row of the value ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMaturity {
    pub maturity: Maturity,
    pub latest_date: NaiveDate,
    pub latest_yield: f64,
    pub trend: TrendResult,
    pub score: f64,
}

/// Default trailing-window length for trend estimation (business days).
pub const DEFAULT_TREND_WINDOW: usize = 20;

/// Default penalty weight for a confident rising trend.
///
/// With per-step slopes over a roughly 20-day window this reproduces the
/// original heuristic's magnitude (half of the bps-per-month move, applied in
/// percent). Tunable via `--penalty-weight`; the formula shape is fixed.
pub const DEFAULT_PENALTY_WEIGHT: f64 = 15.0;

/// Engine tuning derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub out_dir: PathBuf,
    pub insecure: bool,
    pub trend_window: usize,
    pub penalty_weight: f64,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.trend_window < 2 {
            return Err(AppError::Usage("Trend window must be >= 2.".into()));
        }
        if !(self.penalty_weight.is_finite() && self.penalty_weight >= 0.0) {
            return Err(AppError::Usage("Penalty weight must be >= 0.".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_parses_and_displays() {
        let key = MonthKey::parse("202507").unwrap();
        assert_eq!(key, MonthKey { year: 2025, month: 7 });
        assert_eq!(key.to_string(), "202507");

        assert!(MonthKey::parse("2025-7").is_err());
        assert!(MonthKey::parse("202513").is_err());
        assert!(MonthKey::parse("20257").is_err());
    }

    #[test]
    fn months_ytd_runs_january_through_key() {
        let key = MonthKey::parse("202503").unwrap();
        let months: Vec<String> = key.months_ytd().iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["202501", "202502", "202503"]);
    }

    #[test]
    fn maturity_order_is_time_to_maturity() {
        assert!(Maturity::M1 < Maturity::Y2);
        assert!(Maturity::Y2 < Maturity::Y30);
        assert_eq!(Maturity::from_xml_field("BC_10YEAR"), Some(Maturity::Y10));
        assert_eq!(Maturity::from_label("6M"), Some(Maturity::M6));
    }

    #[test]
    fn series_keeps_dates_unique_and_sorted() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 7, day).unwrap();
        let mut series = Series::new(Maturity::Y10);
        series.insert(Observation { date: d(3), yield_pct: Some(4.2) });
        series.insert(Observation { date: d(1), yield_pct: Some(4.0) });
        series.insert(Observation { date: d(2), yield_pct: None });
        // Duplicate date: first row wins.
        series.insert(Observation { date: d(1), yield_pct: Some(9.9) });

        let dates: Vec<u32> = series
            .observations()
            .iter()
            .map(|o| o.date.day())
            .collect();
        assert_eq!(dates, vec![1, 2, 3]);
        assert_eq!(series.observations()[0].yield_pct, Some(4.0));
        assert_eq!(series.non_missing_count(), 2);
        assert_eq!(series.latest(), Some((d(3), 4.2)));
    }

    #[test]
    fn tail_yields_skips_missing_and_respects_window() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 7, day).unwrap();
        let mut series = Series::new(Maturity::Y2);
        for (day, y) in [(1, Some(4.0)), (2, None), (3, Some(4.1)), (4, Some(4.2))] {
            series.insert(Observation { date: d(day), yield_pct: y });
        }
        assert_eq!(series.tail_yields(2), vec![4.1, 4.2]);
        assert_eq!(series.tail_yields(10), vec![4.0, 4.1, 4.2]);
    }
}
