//! `treas-trend` library crate.
//!
//! The binary (`treas`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable (e.g., a future web front-end can consume the
//!   ranking and series directly)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cache;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod rank;
pub mod report;
pub mod trend;
