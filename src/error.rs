//! Error taxonomy for the yield-trend pipeline.
//!
//! The variants mirror how failures propagate through the pipeline:
//!
//! - `Fetch` — the Treasury feed could not be retrieved; the cache entry for
//!   the month (if any) is preserved and may be served as stale.
//! - `Parse` — the feed yielded zero usable day-rows under both extraction
//!   strategies. Individual malformed rows never produce this; they are
//!   skipped at the row level.
//! - `Io` — reading/writing cached artifacts failed.
//! - `Usage` — bad CLI input (month format, tuning values).

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Usage(String),
}

impl AppError {
    /// Process exit code for the binary (usage/IO errors 2, data/network 4).
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Usage(_) | AppError::Io(_) => 2,
            AppError::Fetch(_) | AppError::Parse(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(AppError::Usage("bad month".into()).exit_code(), 2);
        assert_eq!(AppError::Fetch("timeout".into()).exit_code(), 4);
        assert_eq!(AppError::Parse("empty feed".into()).exit_code(), 4);
    }
}
