//! Data acquisition: Treasury feed fetch, XML parsing, synthetic samples.
//!
//! - `treasury` — HTTP fetch of the monthly daily-yield-curve XML (`CurveSource`)
//! - `parse` — feed XML -> per-maturity `Series` (primary + fallback strategies)
//! - `sample` — deterministic offline feed for `--sample` runs and tests

pub mod parse;
pub mod sample;
pub mod treasury;

pub use parse::*;
pub use sample::*;
pub use treasury::*;
