//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the fixed maturity bucket set (`Maturity`)
//! - month keys and observations (`MonthKey`, `Observation`, `Series`)
//! - trend and ranking outputs (`TrendResult`, `RankedMaturity`)
//! - engine tuning knobs (`EngineConfig`)

pub mod types;

pub use types::*;
