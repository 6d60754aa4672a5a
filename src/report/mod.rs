//! Reporting utilities: formatted terminal/file output.
//!
//! We keep formatting code in one place so:
//! - the parsing/trend/ranking code stays clean and testable
//! - output changes are localized

pub mod format;

pub use format::*;
