//! Plain-text summary and ranking table formatting.
//!
//! The same text is printed to the terminal and written to the month's
//! `summary_YYYYMM.txt` artifact. The core never renders charts; callers
//! chart from the series CSV if they want visuals.

use crate::domain::{EngineConfig, MonthKey, RankedMaturity, TrendResult};

/// Full month summary: headline picks plus the ranking table and per-maturity
/// trend notes.
pub fn format_summary(
    month: MonthKey,
    ranking: &[RankedMaturity],
    config: &EngineConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== treas - Treasury Yield Value Summary ===\n");
    out.push_str(&format!("Month: {month}"));
    if let Some(latest) = ranking.iter().map(|r| r.latest_date).max() {
        out.push_str(&format!(" (latest data {latest})"));
    }
    out.push('\n');
    out.push_str(&format!(
        "Trend window: {} business days | penalty weight: {:.2}\n",
        config.trend_window, config.penalty_weight
    ));
    out.push('\n');

    if let Some(best) = ranking.first() {
        out.push_str(&format!(
            "Best value: {} (score {:.2})\n",
            best.maturity, best.score
        ));
    }
    if let Some(top_yield) = ranking
        .iter()
        .max_by(|a, b| {
            a.latest_yield
                .partial_cmp(&b.latest_yield)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    {
        out.push_str(&format!(
            "Highest current yield: {} (@ {:.2}%)\n",
            top_yield.maturity, top_yield.latest_yield
        ));
    }
    out.push('\n');

    out.push_str(&format_ranking(ranking));

    out.push_str("\nTrend notes (bp/day, higher = rising yields):\n");
    let mut by_tenor: Vec<&RankedMaturity> = ranking.iter().collect();
    by_tenor.sort_by(|a, b| a.maturity.cmp(&b.maturity));
    for r in by_tenor {
        out.push_str(&format!(
            " - {:>4}: {} (R2={}), curr {:.2}%\n",
            r.maturity.label(),
            fmt_trend(&r.trend),
            fmt_r2(&r.trend),
            r.latest_yield
        ));
    }

    out
}

/// The ranking table alone (used by the `rank` subcommand).
pub fn format_ranking(ranking: &[RankedMaturity]) -> String {
    let mut out = String::new();

    out.push_str("Ranking (best value first):\n");
    out.push_str(&format!(
        "{:>4} {:>8} {:>8} {:>12} {:>6} {:>8}\n",
        "rank", "maturity", "yield%", "trend", "r2", "score"
    ));
    out.push_str(&format!(
        "{:->4} {:->8} {:->8} {:->12} {:->6} {:->8}\n",
        "", "", "", "", "", ""
    ));

    for (i, r) in ranking.iter().enumerate() {
        out.push_str(&format!(
            "{:>4} {:>8} {:>8.2} {:>12} {:>6} {:>8.2}\n",
            i + 1,
            r.maturity.label(),
            r.latest_yield,
            fmt_trend(&r.trend),
            fmt_r2(&r.trend),
            r.score
        ));
    }

    out
}

fn fmt_trend(trend: &TrendResult) -> String {
    match trend {
        // Slope is percent per step; report in basis points per day.
        TrendResult::Fit { slope, .. } => format!("{:+.1}bp/d", slope * 100.0),
        TrendResult::Insufficient { .. } => "n/a".to_string(),
    }
}

fn fmt_r2(trend: &TrendResult) -> String {
    match trend {
        TrendResult::Fit { r_squared, .. } => format!("{r_squared:.2}"),
        TrendResult::Insufficient { .. } => "n/a".to_string(),
    }
}
