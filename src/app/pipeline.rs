//! The generation pipeline: cache decision -> fetch -> parse -> trend ->
//! rank -> artifacts.
//!
//! `Engine` is the single entry point used by the CLI (and any future HTTP
//! front-end): `generate(month, force, now)` and `get_series(month, now)`.
//! Time is always passed in explicitly so the freshness policy stays
//! deterministic under test.

use std::collections::BTreeMap;
use std::fs;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::cache::{
    ArtifactStore, CacheState, InflightRegistry, cache_state, lock_unpoisoned,
};
use crate::data::parse::parse_feed;
use crate::data::treasury::CurveSource;
use crate::domain::{EngineConfig, Maturity, MonthKey, RankedMaturity, Series};
use crate::error::AppError;
use crate::io::export::{read_series_csv, write_ranking_json, write_series_csv};
use crate::rank::rank_maturities;
use crate::report;

/// All computed outputs of one `generate` call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub month: MonthKey,
    pub series: BTreeMap<Maturity, Series>,
    pub ranking: Vec<RankedMaturity>,
    /// False when the call was served from fresh cached artifacts.
    pub regenerated: bool,
    /// Set when regeneration failed and prior (stale but usable) artifacts
    /// were served instead; carries the failure reason.
    pub stale_reason: Option<String>,
}

pub struct Engine {
    source: Box<dyn CurveSource>,
    store: ArtifactStore,
    inflight: InflightRegistry,
    config: EngineConfig,
}

impl Engine {
    pub fn new(source: Box<dyn CurveSource>, config: EngineConfig) -> Result<Engine, AppError> {
        config.validate()?;
        let store = ArtifactStore::new(&config.out_dir);
        Ok(Engine {
            source,
            store,
            inflight: InflightRegistry::new(),
            config,
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Produce the month's ranking, regenerating artifacts only when the
    /// freshness policy requires it (or `force` is set).
    ///
    /// At most one regeneration per month key runs at a time: concurrent
    /// callers block on the month's lock, then see the committed marker and
    /// are served from cache.
    pub fn generate(
        &self,
        month: MonthKey,
        force: bool,
        now: DateTime<Tz>,
    ) -> Result<Generation, AppError> {
        let month_lock = self.inflight.month_lock(month);
        let _guard = lock_unpoisoned(&month_lock);

        let entry = self.store.load_entry(month);
        let had_prior = entry.is_some();

        if !force && cache_state(entry.as_ref(), now) == CacheState::Fresh {
            match self.serve_cached(month, None) {
                Ok(generation) => return Ok(generation),
                Err(err) => {
                    eprintln!(
                        "Warning: cached artifacts for {month} unreadable ({err}); regenerating."
                    );
                }
            }
        }

        match self.regenerate(month, now) {
            Ok(generation) => Ok(generation),
            Err(err) if had_prior => {
                // Prior artifacts are untouched (the marker is only written
                // on success); serve them as stale-but-usable.
                let reason = err.to_string();
                self.serve_cached(month, Some(reason)).map_err(move |_| err)
            }
            Err(err) => Err(err),
        }
    }

    /// The per-maturity series for a month, through the same cache-or-fetch
    /// path as `generate`.
    pub fn get_series(
        &self,
        month: MonthKey,
        now: DateTime<Tz>,
    ) -> Result<BTreeMap<Maturity, Series>, AppError> {
        Ok(self.generate(month, false, now)?.series)
    }

    fn serve_cached(
        &self,
        month: MonthKey,
        stale_reason: Option<String>,
    ) -> Result<Generation, AppError> {
        let series = read_series_csv(&self.store.series_csv_path(month))?;
        let ranking = rank_maturities(
            &series,
            self.config.trend_window,
            self.config.penalty_weight,
        );
        Ok(Generation {
            month,
            series,
            ranking,
            regenerated: false,
            stale_reason,
        })
    }

    fn regenerate(&self, month: MonthKey, now: DateTime<Tz>) -> Result<Generation, AppError> {
        // Fetch and parse first: the failure-prone steps happen before any
        // artifact is touched.
        let xml = self.source.fetch_month(month)?;
        let series = parse_feed(&xml, month)?;
        let ranking = rank_maturities(
            &series,
            self.config.trend_window,
            self.config.penalty_weight,
        );

        self.store.ensure_out_dir()?;
        write_series_csv(&self.store.series_csv_path(month), &series)?;
        write_ranking_json(&self.store.ranking_json_path(month), &ranking)?;

        let summary = report::format_summary(month, &ranking, &self.config);
        fs::write(self.store.summary_path(month), summary).map_err(|e| {
            AppError::Io(format!("Failed to write summary for {month}: {e}"))
        })?;

        self.write_ytd_csv(month, &series);

        // Commit point: only now does the cache consider the month generated.
        self.store.write_entry(month, now)?;

        Ok(Generation {
            month,
            series,
            ranking,
            regenerated: true,
            stale_reason: None,
        })
    }

    /// Best-effort year-to-date view: concatenate January through `month`,
    /// reusing the already-parsed current month. A month that fails to fetch
    /// or parse is skipped with a warning; the YTD CSV is not part of cache
    /// validity.
    fn write_ytd_csv(&self, month: MonthKey, current: &BTreeMap<Maturity, Series>) {
        let mut merged: BTreeMap<Maturity, Series> = Maturity::ALL
            .iter()
            .map(|&m| (m, Series::new(m)))
            .collect();

        for prior in month.months_ytd() {
            let month_series = if prior == month {
                Ok(current.clone())
            } else {
                self.source
                    .fetch_month(prior)
                    .and_then(|xml| parse_feed(&xml, prior))
            };
            match month_series {
                Ok(series_by_maturity) => {
                    for (maturity, series) in &series_by_maturity {
                        if let Some(target) = merged.get_mut(maturity) {
                            target.extend_from(series);
                        }
                    }
                }
                Err(err) => {
                    eprintln!("Warning: skipping {prior} in YTD view: {err}");
                }
            }
        }

        if merged.values().all(|s| s.is_empty()) {
            return;
        }
        if let Err(err) = write_series_csv(&self.store.ytd_csv_path(month.year), &merged) {
            eprintln!("Warning: could not write YTD CSV: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::generate_month_xml;
    use chrono::{Datelike, TimeZone};
    use chrono_tz::America::New_York;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted source: counts fetches and can be told to start failing.
    struct ScriptedSource {
        fetches: AtomicUsize,
        fail: Mutex<bool>,
        seed: u64,
    }

    impl ScriptedSource {
        fn new(seed: u64) -> ScriptedSource {
            ScriptedSource {
                fetches: AtomicUsize::new(0),
                fail: Mutex::new(false),
                seed,
            }
        }
    }

    impl CurveSource for ScriptedSource {
        fn fetch_month(&self, month: MonthKey) -> Result<String, AppError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if *lock_unpoisoned(&self.fail) {
                return Err(AppError::Fetch("scripted network failure".into()));
            }
            generate_month_xml(month, self.seed)
        }
    }

    fn et(d: u32, h: u32) -> chrono::DateTime<chrono_tz::Tz> {
        New_York.with_ymd_and_hms(2025, 1, d, h, 0, 0).unwrap()
    }

    struct SharedSource(Arc<ScriptedSource>);

    impl CurveSource for SharedSource {
        fn fetch_month(&self, month: MonthKey) -> Result<String, AppError> {
            self.0.fetch_month(month)
        }
    }

    fn engine_in(dir: &Path) -> (Engine, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::new(7));
        let config = EngineConfig {
            out_dir: dir.to_path_buf(),
            insecure: false,
            trend_window: 20,
            penalty_weight: 15.0,
        };
        let engine = Engine::new(Box::new(SharedSource(Arc::clone(&source))), config).unwrap();
        (engine, source)
    }

    #[test]
    fn first_generation_writes_artifacts_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());
        let month = MonthKey::parse("202501").unwrap();

        let generation = engine.generate(month, false, et(15, 13)).unwrap();
        assert!(generation.regenerated);
        assert!(generation.stale_reason.is_none());
        assert!(!generation.ranking.is_empty());

        assert!(engine.store().series_csv_path(month).exists());
        assert!(engine.store().ranking_json_path(month).exists());
        assert!(engine.store().summary_path(month).exists());
        assert!(engine.store().load_entry(month).is_some());
    }

    #[test]
    fn fresh_entry_is_served_without_refetching() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, source) = engine_in(dir.path());
        let month = MonthKey::parse("202501").unwrap();

        engine.generate(month, false, et(15, 13)).unwrap();
        let fetches_after_first = source.fetches.load(Ordering::SeqCst);

        // Same day, later hour: fresh, no fetch.
        let second = engine.generate(month, false, et(15, 16)).unwrap();
        assert!(!second.regenerated);
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches_after_first);
    }

    #[test]
    fn stale_entry_regenerates_next_day_after_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, source) = engine_in(dir.path());
        let month = MonthKey::parse("202501").unwrap();

        engine.generate(month, false, et(15, 13)).unwrap();
        let fetches_after_first = source.fetches.load(Ordering::SeqCst);

        // Next day before the cutoff: still fresh.
        let before = engine.generate(month, false, et(16, 8)).unwrap();
        assert!(!before.regenerated);
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches_after_first);

        // Next day after the cutoff: stale, refetched.
        let after = engine.generate(month, false, et(16, 13)).unwrap();
        assert!(after.regenerated);
        assert!(source.fetches.load(Ordering::SeqCst) > fetches_after_first);
    }

    #[test]
    fn force_always_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, source) = engine_in(dir.path());
        let month = MonthKey::parse("202501").unwrap();

        engine.generate(month, false, et(15, 13)).unwrap();
        let fetches_after_first = source.fetches.load(Ordering::SeqCst);

        let forced = engine.generate(month, true, et(15, 14)).unwrap();
        assert!(forced.regenerated);
        assert!(source.fetches.load(Ordering::SeqCst) > fetches_after_first);
    }

    #[test]
    fn failed_regeneration_serves_stale_artifacts_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, source) = engine_in(dir.path());
        let month = MonthKey::parse("202501").unwrap();

        engine.generate(month, false, et(15, 13)).unwrap();
        let entry_before = engine.store().load_entry(month).unwrap();

        *lock_unpoisoned(&source.fail) = true;
        let stale = engine.generate(month, true, et(16, 13)).unwrap();
        assert!(!stale.regenerated);
        let reason = stale.stale_reason.unwrap();
        assert!(reason.contains("scripted network failure"));
        assert!(!stale.ranking.is_empty());

        // The prior entry was not superseded.
        let entry_after = engine.store().load_entry(month).unwrap();
        assert_eq!(entry_before, entry_after);
    }

    #[test]
    fn failure_with_no_prior_artifacts_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, source) = engine_in(dir.path());
        *lock_unpoisoned(&source.fail) = true;

        let err = engine
            .generate(MonthKey::parse("202501").unwrap(), false, et(15, 13))
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }

    #[test]
    fn get_series_returns_all_maturities() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());
        let month = MonthKey::parse("202501").unwrap();

        let series = engine.get_series(month, et(15, 13)).unwrap();
        assert_eq!(series.len(), Maturity::ALL.len());
        assert!(series[&Maturity::Y10].non_missing_count() > 0);
    }

    #[test]
    fn ytd_csv_merges_prior_months_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, _) = engine_in(dir.path());
        let month = MonthKey::parse("202502").unwrap();

        engine.generate(month, false, et(28, 13)).unwrap();
        let ytd = read_series_csv(&engine.store().ytd_csv_path(2025)).unwrap();
        // January and February both contribute rows.
        let y10 = &ytd[&Maturity::Y10];
        assert!(y10.observations().iter().any(|o| o.date.month() == 1));
        assert!(y10.observations().iter().any(|o| o.date.month() == 2));
    }
}
