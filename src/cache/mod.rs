//! Freshness-window cache policy and cached-artifact bookkeeping.
//!
//! The Treasury publishes each day's curve around midday Eastern, so a
//! month's artifacts generated before today can only be improved after the
//! daily cutoff. The policy is a pure function over an explicit timestamp
//! (`cache_state`); the clock is read only at the program edge
//! (`now_eastern`), which keeps every transition testable with injected
//! times.
//!
//! Transitions, per month key:
//!
//! - no marker or missing artifacts        -> `Absent` (generate)
//! - generated today (any hour)            -> `Fresh`  (serve cache)
//! - generated on an earlier day, now past
//!   the 12:00 ET cutoff                   -> `Stale`  (regenerate)
//! - generated on an earlier day, before
//!   the cutoff                            -> `Fresh`
//!
//! A force flag bypasses the policy entirely. Generation is all-or-nothing
//! from the cache's viewpoint: the marker is written last, so artifacts
//! without a marker count as `Absent` and a failed run leaves the previous
//! entry untouched.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::MonthKey;
use crate::error::AppError;

/// Hour (ET) after which a prior day's artifacts are considered stale.
pub const CUTOFF_HOUR: u32 = 12;

/// Current time in America/New_York.
pub fn now_eastern() -> DateTime<Tz> {
    Utc::now().with_timezone(&New_York)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Absent,
    Fresh,
    Stale,
}

/// One month's generation record. Superseded by regeneration, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    pub month: MonthKey,
    pub generated_at: DateTime<Tz>,
}

/// Pure freshness decision for one month key at an explicit evaluation time.
pub fn cache_state(entry: Option<&CacheEntry>, now: DateTime<Tz>) -> CacheState {
    let Some(entry) = entry else {
        return CacheState::Absent;
    };

    let generated_day = entry.generated_at.date_naive();
    let today = now.date_naive();

    // Same-day artifacts already reflect anything published today.
    if generated_day >= today {
        return CacheState::Fresh;
    }

    let cutoff = NaiveTime::from_hms_opt(CUTOFF_HOUR, 0, 0)
        .unwrap_or(NaiveTime::MIN);
    if now.time() >= cutoff {
        CacheState::Stale
    } else {
        CacheState::Fresh
    }
}

/// On-disk marker format (`.generated_YYYYMM.json`).
#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    month: String,
    generated_at: String,
}

/// Flat-file artifact layout for one output directory.
///
/// The store answers "does a valid entry exist for month M" and "record a new
/// entry for month M"; the artifact bytes themselves are written by the
/// pipeline/export code.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    out_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(out_dir: impl Into<PathBuf>) -> ArtifactStore {
        ArtifactStore {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn ensure_out_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.out_dir).map_err(|e| {
            AppError::Io(format!(
                "Failed to create output directory '{}': {e}",
                self.out_dir.display()
            ))
        })
    }

    pub fn series_csv_path(&self, month: MonthKey) -> PathBuf {
        self.out_dir.join(format!("yields_{month}.csv"))
    }

    pub fn ytd_csv_path(&self, year: i32) -> PathBuf {
        self.out_dir.join(format!("yields_ytd_{year}.csv"))
    }

    pub fn ranking_json_path(&self, month: MonthKey) -> PathBuf {
        self.out_dir.join(format!("ranking_{month}.json"))
    }

    pub fn summary_path(&self, month: MonthKey) -> PathBuf {
        self.out_dir.join(format!("summary_{month}.txt"))
    }

    fn marker_path(&self, month: MonthKey) -> PathBuf {
        self.out_dir.join(format!(".generated_{month}.json"))
    }

    /// Required artifacts for a month (the YTD CSV is best-effort and not
    /// part of validity).
    fn required_artifacts(&self, month: MonthKey) -> [PathBuf; 3] {
        [
            self.series_csv_path(month),
            self.ranking_json_path(month),
            self.summary_path(month),
        ]
    }

    /// Load the month's cache entry, or `None` when the marker is missing,
    /// corrupt, or any required artifact has disappeared.
    pub fn load_entry(&self, month: MonthKey) -> Option<CacheEntry> {
        if !self
            .required_artifacts(month)
            .iter()
            .all(|p| p.exists())
        {
            return None;
        }

        let text = fs::read_to_string(self.marker_path(month)).ok()?;
        let marker: MarkerFile = serde_json::from_str(&text).ok()?;
        if marker.month != month.to_string() {
            return None;
        }
        let generated_at = DateTime::parse_from_rfc3339(&marker.generated_at)
            .ok()?
            .with_timezone(&New_York);
        Some(CacheEntry {
            month,
            generated_at,
        })
    }

    /// Commit a new entry. Called only after every artifact write succeeded,
    /// making the marker the all-or-nothing commit point.
    pub fn write_entry(&self, month: MonthKey, generated_at: DateTime<Tz>) -> Result<(), AppError> {
        let marker = MarkerFile {
            month: month.to_string(),
            generated_at: generated_at.to_rfc3339(),
        };
        let text = serde_json::to_string_pretty(&marker)
            .map_err(|e| AppError::Io(format!("Failed to encode cache marker: {e}")))?;
        fs::write(self.marker_path(month), text).map_err(|e| {
            AppError::Io(format!(
                "Failed to write cache marker for {month}: {e}"
            ))
        })
    }
}

/// Per-month-key mutual exclusion for regeneration.
///
/// Guards against duplicate concurrent fetches for the same month: the second
/// caller blocks on the month's mutex, then re-evaluates freshness and is
/// served the newly written cache. Different months never contend.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    locks: Mutex<HashMap<MonthKey, Arc<Mutex<()>>>>,
}

impl InflightRegistry {
    pub fn new() -> InflightRegistry {
        InflightRegistry::default()
    }

    /// The mutex for a month key, created on first use. Hold the returned
    /// `Arc` and lock it for the duration of the generation attempt.
    pub fn month_lock(&self, month: MonthKey) -> Arc<Mutex<()>> {
        let mut locks = lock_unpoisoned(&self.locks);
        locks.entry(month).or_default().clone()
    }
}

/// A poisoned lock only means another thread panicked mid-generation; the
/// protected region holds no data, so continuing is safe.
pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn et(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn entry_at(when: DateTime<Tz>) -> CacheEntry {
        CacheEntry {
            month: MonthKey::parse("202507").unwrap(),
            generated_at: when,
        }
    }

    #[test]
    fn missing_entry_is_absent() {
        assert_eq!(cache_state(None, et(2025, 7, 10, 9, 0)), CacheState::Absent);
    }

    #[test]
    fn same_day_entry_stays_fresh_across_the_cutoff() {
        let entry = entry_at(et(2025, 7, 10, 9, 0));
        assert_eq!(
            cache_state(Some(&entry), et(2025, 7, 10, 11, 59)),
            CacheState::Fresh
        );
        // Generated earlier the same calendar day: still fresh after noon.
        assert_eq!(
            cache_state(Some(&entry), et(2025, 7, 10, 12, 1)),
            CacheState::Fresh
        );
    }

    #[test]
    fn prior_day_entry_goes_stale_at_the_cutoff() {
        let entry = entry_at(et(2025, 7, 10, 9, 0));
        assert_eq!(
            cache_state(Some(&entry), et(2025, 7, 11, 8, 0)),
            CacheState::Fresh
        );
        assert_eq!(
            cache_state(Some(&entry), et(2025, 7, 11, 12, 0)),
            CacheState::Stale
        );
        // Any later day behaves the same way.
        assert_eq!(
            cache_state(Some(&entry), et(2025, 7, 14, 15, 30)),
            CacheState::Stale
        );
    }

    #[test]
    fn store_round_trips_marker_after_artifacts_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let month = MonthKey::parse("202507").unwrap();
        let when = et(2025, 7, 10, 13, 0);

        // Marker without artifacts does not count as a valid entry.
        store.write_entry(month, when).unwrap();
        assert!(store.load_entry(month).is_none());

        for path in [
            store.series_csv_path(month),
            store.ranking_json_path(month),
            store.summary_path(month),
        ] {
            std::fs::write(path, "stub").unwrap();
        }
        let entry = store.load_entry(month).unwrap();
        assert_eq!(entry.month, month);
        assert_eq!(entry.generated_at, when);
    }

    #[test]
    fn corrupt_marker_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let month = MonthKey::parse("202507").unwrap();
        for path in [
            store.series_csv_path(month),
            store.ranking_json_path(month),
            store.summary_path(month),
        ] {
            std::fs::write(path, "stub").unwrap();
        }
        std::fs::write(store.marker_path(month), "{not json").unwrap();
        assert!(store.load_entry(month).is_none());
    }

    #[test]
    fn inflight_registry_serializes_one_month_key() {
        let registry = Arc::new(InflightRegistry::new());
        let month = MonthKey::parse("202507").unwrap();
        let generations = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            let generations = Arc::clone(&generations);
            let done = Arc::clone(&done);
            handles.push(std::thread::spawn(move || {
                let lock = registry.month_lock(month);
                let _guard = lock_unpoisoned(&lock);
                // Double-checked pattern as used by the pipeline: only the
                // first holder regenerates, later holders see the result.
                if done.load(Ordering::SeqCst) == 0 {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    generations.fetch_add(1, Ordering::SeqCst);
                    done.store(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(generations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_month_keys_do_not_share_a_lock() {
        let registry = InflightRegistry::new();
        let a = registry.month_lock(MonthKey::parse("202506").unwrap());
        let b = registry.month_lock(MonthKey::parse("202507").unwrap());
        let _ga = lock_unpoisoned(&a);
        // Would deadlock if both months mapped to one mutex.
        let _gb = lock_unpoisoned(&b);
    }
}
