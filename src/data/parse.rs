//! Treasury daily yield-curve feed parsing.
//!
//! The feed is an Atom document: one `entry` per trading day, with the date
//! (`NEW_DATE`) and one `BC_*` field per maturity under
//! `content/properties`. Namespace prefixes vary between snapshots of the
//! feed, so elements are matched by local name only.
//!
//! Two extraction strategies:
//!
//! - primary: walk the expected `entry -> content -> properties` structure
//! - fallback: if the primary walk finds zero day-rows (schema drift), scan
//!   the whole document flat, treating each `NEW_DATE` as a row boundary
//!
//! A malformed row (bad or absent date) is skipped; a blank or garbled yield
//! field becomes a missing observation. `AppError::Parse` is returned only
//! when both strategies produce zero day-rows for the month.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::domain::{Maturity, MonthKey, Observation, Series};
use crate::error::AppError;

/// One extracted day-row: the trading date plus whatever maturity fields the
/// row carried (absent fields are simply not listed).
#[derive(Debug, Clone)]
struct DayRow {
    date: NaiveDate,
    yields: Vec<(Maturity, Option<f64>)>,
}

/// Parse one month's feed into per-maturity series.
///
/// The output always contains all twelve maturities; a maturity the feed
/// never quoted has a series of missing observations and is dropped later by
/// the ranker. Rows dated outside `month` are skipped, keeping the parser
/// single-month pure.
pub fn parse_feed(xml: &str, month: MonthKey) -> Result<BTreeMap<Maturity, Series>, AppError> {
    let mut rows = collect_rows_structured(xml);
    if rows.is_empty() {
        rows = collect_rows_flat(xml);
    }
    rows.retain(|row| month.contains(row.date));

    if rows.is_empty() {
        return Err(AppError::Parse(format!(
            "No day-rows found for {month}; feed structure may have changed."
        )));
    }

    let mut out: BTreeMap<Maturity, Series> = Maturity::ALL
        .iter()
        .map(|&m| (m, Series::new(m)))
        .collect();

    for row in &rows {
        for &maturity in &Maturity::ALL {
            let yield_pct = row
                .yields
                .iter()
                .find(|(m, _)| *m == maturity)
                .and_then(|(_, v)| *v);
            if let Some(series) = out.get_mut(&maturity) {
                series.insert(Observation {
                    date: row.date,
                    yield_pct,
                });
            }
        }
    }

    Ok(out)
}

/// What the current text node belongs to while walking the document.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Date,
    Yield(Maturity),
}

/// Primary strategy: honor the `entry -> content -> properties` nesting and
/// close a row at `</entry>`.
fn collect_rows_structured(xml: &str) -> Vec<DayRow> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut entry_depth = 0usize;
    let mut in_content = false;
    let mut in_properties = false;
    let mut current: Option<Field> = None;
    let mut pending_date: Option<NaiveDate> = None;
    let mut pending_yields: Vec<(Maturity, Option<f64>)> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_slice() {
                    b"entry" => entry_depth += 1,
                    b"content" if entry_depth > 0 => in_content = true,
                    b"properties" if in_content => in_properties = true,
                    _ if in_properties => current = classify_field(&name, &mut pending_yields),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                // Self-closing field, e.g. `<d:BC_30YEAR m:null="true"/>`:
                // present in the row but with no quote.
                if in_properties {
                    let name = local_name(e.name().as_ref());
                    classify_field(&name, &mut pending_yields);
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = current {
                    let text = t.unescape().unwrap_or(Cow::Borrowed(""));
                    apply_text(field, &text, &mut pending_date, &mut pending_yields);
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                current = None;
                match name.as_slice() {
                    b"entry" => {
                        entry_depth = entry_depth.saturating_sub(1);
                        finalize_row(&mut pending_date, &mut pending_yields, &mut rows);
                    }
                    b"content" => in_content = false,
                    b"properties" => in_properties = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            // Malformed XML past this point: keep the rows we already have.
            Err(_) => break,
            Ok(_) => {}
        }
    }

    rows
}

/// Fallback strategy: ignore nesting entirely and treat every `NEW_DATE`
/// element as the start of a new row. Tolerates wrapper-element drift as long
/// as the date and maturity fields still appear as siblings somewhere.
fn collect_rows_flat(xml: &str) -> Vec<DayRow> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut rows = Vec::new();
    let mut current: Option<Field> = None;
    let mut pending_date: Option<NaiveDate> = None;
    let mut pending_yields: Vec<(Maturity, Option<f64>)> = Vec::new();
    let mut row_open = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                if name.as_slice() == b"NEW_DATE" {
                    if row_open {
                        finalize_row(&mut pending_date, &mut pending_yields, &mut rows);
                    }
                    row_open = true;
                    current = Some(Field::Date);
                } else if row_open {
                    current = classify_field(&name, &mut pending_yields);
                } else {
                    current = None;
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(field) = current {
                    let text = t.unescape().unwrap_or(Cow::Borrowed(""));
                    apply_text(field, &text, &mut pending_date, &mut pending_yields);
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(_) => break,
            Ok(_) => {}
        }
    }

    if row_open {
        finalize_row(&mut pending_date, &mut pending_yields, &mut rows);
    }

    rows
}

/// Strip a namespace prefix: `d:BC_10YEAR` -> `BC_10YEAR`.
fn local_name(name: &[u8]) -> Vec<u8> {
    match name.iter().rposition(|&b| b == b':') {
        Some(idx) => name[idx + 1..].to_vec(),
        None => name.to_vec(),
    }
}

/// Register a field element. A maturity field is recorded as missing up
/// front so a blank element still produces a missing observation.
fn classify_field(name: &[u8], yields: &mut Vec<(Maturity, Option<f64>)>) -> Option<Field> {
    if name == b"NEW_DATE" {
        return Some(Field::Date);
    }
    let label = std::str::from_utf8(name).ok()?;
    let maturity = Maturity::from_xml_field(label)?;
    if !yields.iter().any(|(m, _)| *m == maturity) {
        yields.push((maturity, None));
    }
    Some(Field::Yield(maturity))
}

fn apply_text(
    field: Field,
    text: &str,
    pending_date: &mut Option<NaiveDate>,
    pending_yields: &mut [(Maturity, Option<f64>)],
) {
    match field {
        Field::Date => *pending_date = parse_date_text(text),
        Field::Yield(maturity) => {
            if let Some(slot) = pending_yields.iter_mut().find(|(m, _)| *m == maturity) {
                slot.1 = parse_yield_text(text);
            }
        }
    }
}

fn finalize_row(
    pending_date: &mut Option<NaiveDate>,
    pending_yields: &mut Vec<(Maturity, Option<f64>)>,
    rows: &mut Vec<DayRow>,
) {
    let yields = std::mem::take(pending_yields);
    // A row without a parseable date is malformed: skip it, keep the month.
    if let Some(date) = pending_date.take() {
        rows.push(DayRow { date, yields });
    }
}

/// The feed carries timestamps like `2025-07-01T00:00:00`; the date prefix is
/// all we need.
fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let prefix = trimmed.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

fn parse_yield_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
