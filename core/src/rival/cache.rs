use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// test id -> rival elapsed ms, for one suite.
pub type SuiteTimes = BTreeMap<String, f64>;

/// On-disk layout of the sidecar: suite path -> [`SuiteTimes`].
pub type CacheFile = BTreeMap<String, SuiteTimes>;

/// In-memory rival timings of the active suite, shared by all workers.
/// Lookups and inserts never touch the file system.
#[derive(Debug, Default)]
pub struct RivalCache {
    suite: String,
    times: Mutex<SuiteTimes>,
}

impl RivalCache {
    pub fn new(suite: impl Into<String>) -> Self {
        Self::with_times(suite, SuiteTimes::new())
    }

    pub fn with_times(suite: impl Into<String>, times: SuiteTimes) -> Self {
        Self {
            suite: suite.into(),
            times: Mutex::new(times),
        }
    }

    /// Reads the entries of `suite` from the sidecar. A missing sidecar is an empty cache.
    pub fn load(sidecar: impl AsRef<Path>, suite: impl Into<String>) -> fsutil::Result<Self> {
        let suite = suite.into();
        let mut file: CacheFile = fsutil::read_json_or_default(sidecar)?;
        let times = file.remove(&suite).unwrap_or_default();
        log::debug!("Loaded {} rival timings for suite {:?}", times.len(), suite);
        Ok(Self::with_times(suite, times))
    }

    fn lock(&self) -> MutexGuard<'_, SuiteTimes> {
        self.times.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, test_id: &str) -> Option<f64> {
        self.lock().get(test_id).copied()
    }

    pub fn put(&self, test_id: impl Into<String>, ms: f64) {
        self.lock().insert(test_id.into(), ms);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> SuiteTimes {
        self.lock().clone()
    }

    /// Merges the active suite into the sidecar and rewrites it atomically.
    /// Entries of other suites are kept as they are on disk.
    pub fn persist(&self, sidecar: impl AsRef<Path>) -> fsutil::Result<()> {
        let sidecar = sidecar.as_ref();
        let mut file: CacheFile = fsutil::read_json_or_default(sidecar)?;
        let times = self.snapshot();
        log::debug!(
            "Storing {} rival timings for suite {:?} into {}",
            times.len(),
            self.suite,
            sidecar.display()
        );
        file.entry(self.suite.clone()).or_default().extend(times);
        fsutil::write_json_atomic(sidecar, &file)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn get_after_put() {
        let cache = RivalCache::new("tests/functional");
        assert_eq!(cache.get("fib"), None);
        cache.put("fib", 12.5);
        assert_eq!(cache.get("fib"), Some(12.5));
        cache.put("fib", 10.0);
        assert_eq!(cache.get("fib"), Some(10.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_distinct_puts_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("gcc/gcc.json");
        let cache = Arc::new(RivalCache::new("suite"));

        std::thread::scope(|s| {
            for i in 0..16 {
                let cache = Arc::clone(&cache);
                s.spawn(move || cache.put(format!("t{:02}", i), i as f64));
            }
        });
        cache.persist(&sidecar).unwrap();

        let reloaded = RivalCache::load(&sidecar, "suite").unwrap();
        assert_eq!(reloaded.len(), 16);
        for i in 0..16 {
            assert_eq!(reloaded.get(&format!("t{:02}", i)), Some(i as f64));
        }
    }

    #[test]
    fn missing_sidecar_is_empty_and_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("nope.json");
        let cache = RivalCache::load(&sidecar, "suite").unwrap();
        assert!(cache.is_empty());
        assert!(!sidecar.exists());
    }

    #[test]
    fn persist_keeps_other_suites() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("rival.json");
        fsutil::write(
            &sidecar,
            r#"{"other": {"x": 1.0}, "suite": {"a": 2.0, "b": 3.0}}"#,
        )
        .unwrap();

        let cache = RivalCache::load(&sidecar, "suite").unwrap();
        assert_eq!(cache.get("a"), Some(2.0));
        assert_eq!(cache.get("x"), None);
        cache.put("b", 4.0);
        cache.persist(&sidecar).unwrap();

        let file: CacheFile = fsutil::read_json_with_deserialize(&sidecar).unwrap();
        assert_eq!(file["other"]["x"], 1.0);
        assert_eq!(file["suite"]["a"], 2.0);
        assert_eq!(file["suite"]["b"], 4.0);
    }

    #[test]
    fn persisting_twice_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("rival.json");

        let cache = RivalCache::new("suite");
        cache.put("a", 1.5);
        cache.persist(&sidecar).unwrap();
        let first = fsutil::read_to_string(&sidecar).unwrap();

        let cache = RivalCache::load(&sidecar, "suite").unwrap();
        cache.put("a", 1.5);
        cache.persist(&sidecar).unwrap();
        let second = fsutil::read_to_string(&sidecar).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let cache = Arc::new(RivalCache::new("suite"));
        cache.put("a", 1.0);
        let c = Arc::clone(&cache);
        let _ = std::thread::spawn(move || {
            let _guard = c.times.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert_eq!(cache.get("a"), Some(1.0));
    }
}
