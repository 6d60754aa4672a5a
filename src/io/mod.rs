//! Input/output helpers for cached artifacts.
//!
//! - series CSV write/read (`export`) — the flat cache representation that
//!   lets a fresh month be served without refetching

pub mod export;

pub use export::*;
