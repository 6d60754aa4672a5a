//! Cached-artifact serialization: series CSV and ranking JSON.
//!
//! The CSV is both an export for spreadsheets and the flat cache the
//! pipeline reloads when a month is still fresh. Missing quotes are empty
//! cells, never zeros, so a round trip preserves missing-ness.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{Maturity, Observation, RankedMaturity, Series};
use crate::error::AppError;

/// Write one CSV with a `date` column plus one column per maturity.
pub fn write_series_csv(
    path: &Path,
    series_by_maturity: &BTreeMap<Maturity, Series>,
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::Io(format!("Failed to create series CSV '{}': {e}", path.display()))
    })?;

    let mut header = String::from("date");
    for &maturity in &Maturity::ALL {
        header.push(',');
        header.push_str(maturity.label());
    }
    writeln!(file, "{header}")
        .map_err(|e| AppError::Io(format!("Failed to write series CSV header: {e}")))?;

    let dates: BTreeSet<NaiveDate> = series_by_maturity
        .values()
        .flat_map(|s| s.observations().iter().map(|o| o.date))
        .collect();

    for date in dates {
        let mut line = date.to_string();
        for &maturity in &Maturity::ALL {
            line.push(',');
            let value = series_by_maturity.get(&maturity).and_then(|s| {
                s.observations()
                    .iter()
                    .find(|o| o.date == date)
                    .and_then(|o| o.yield_pct)
            });
            if let Some(v) = value {
                line.push_str(&format!("{v:.2}"));
            }
        }
        writeln!(file, "{line}")
            .map_err(|e| AppError::Io(format!("Failed to write series CSV row: {e}")))?;
    }

    Ok(())
}

/// Reload a series CSV written by `write_series_csv`.
///
/// Row-level problems (bad date, garbled cell) are skipped the same way the
/// feed parser skips malformed rows; the error is reserved for an unreadable
/// or headerless file.
pub fn read_series_csv(path: &Path) -> Result<BTreeMap<Maturity, Series>, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::Io(format!("Failed to read series CSV '{}': {e}", path.display()))
    })?;

    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| AppError::Io(format!("Series CSV '{}' is empty.", path.display())))?;

    // Column index -> maturity, tolerating reordered or extra columns.
    let columns: Vec<Option<Maturity>> = header
        .split(',')
        .map(|name| Maturity::from_label(name.trim()))
        .collect();

    let mut out: BTreeMap<Maturity, Series> = columns
        .iter()
        .flatten()
        .map(|&m| (m, Series::new(m)))
        .collect();

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut cells = line.split(',');
        let Some(date) = cells
            .next()
            .and_then(|c| NaiveDate::parse_from_str(c.trim(), "%Y-%m-%d").ok())
        else {
            continue;
        };
        for (column, cell) in columns.iter().skip(1).zip(cells) {
            let Some(maturity) = column else { continue };
            let yield_pct = {
                let trimmed = cell.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
                }
            };
            if let Some(series) = out.get_mut(maturity) {
                series.insert(Observation { date, yield_pct });
            }
        }
    }

    if out.values().all(|s| s.is_empty()) {
        return Err(AppError::Io(format!(
            "Series CSV '{}' contains no data rows.",
            path.display()
        )));
    }

    Ok(out)
}

/// Write the ranking artifact as pretty JSON.
pub fn write_ranking_json(path: &Path, ranking: &[RankedMaturity]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::Io(format!("Failed to create ranking JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, ranking)
        .map_err(|e| AppError::Io(format!("Failed to write ranking JSON: {e}")))
}
