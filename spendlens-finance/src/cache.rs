//! Explicit memo tables for the dashboard: loaded datasets keyed by path and
//! filter results keyed by `(dataset id, month, category set)`.

use log::debug;
use spendlens_core::YearMonth;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dataset::{load_dataset, Dataset, DatasetError, Expense};
use crate::filter::filter_expenses;

#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached dataset for `path`; the file is only read on the first call.
    pub fn load(&mut self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        if let Some(ds) = self.entries.get(path) {
            return Ok(Arc::clone(ds));
        }
        self.reload(path)
    }

    /// Re-read `path` and replace any cached copy.
    pub fn reload(&mut self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        let ds = Arc::new(load_dataset(path)?);
        debug!("loaded {} as dataset #{}", path.display(), ds.id);
        self.entries.insert(path.to_path_buf(), Arc::clone(&ds));
        Ok(ds)
    }

    pub fn invalidate(&mut self, path: &Path) -> Option<Arc<Dataset>> {
        self.entries.remove(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FilterKey {
    dataset: u64,
    month: YearMonth,
    categories: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct FilterCache {
    entries: HashMap<FilterKey, Arc<Vec<Expense>>>,
    hits: u64,
    misses: u64,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        dataset: &Dataset,
        month: YearMonth,
        categories: &BTreeSet<String>,
    ) -> Arc<Vec<Expense>> {
        let key = FilterKey {
            dataset: dataset.id,
            month,
            categories: categories.clone(),
        };
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return Arc::clone(hit);
        }
        self.misses += 1;
        let rows = Arc::new(filter_expenses(&dataset.expenses, month, categories));
        self.entries.insert(key, Arc::clone(&rows));
        rows
    }

    /// Drop every cached result computed from dataset `id`.
    pub fn invalidate_dataset(&mut self, id: u64) {
        self.entries.retain(|k, _| k.dataset != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// Both caches, kept consistent on reload.
#[derive(Debug, Default)]
pub struct Memo {
    pub datasets: DatasetCache,
    pub filters: FilterCache,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        self.datasets.load(path)
    }

    /// Re-read `path`, dropping filter results computed from the old copy.
    pub fn reload(&mut self, path: &Path) -> Result<Arc<Dataset>, DatasetError> {
        if let Some(old) = self.datasets.invalidate(path) {
            self.filters.invalidate_dataset(old.id);
        }
        self.datasets.reload(path)
    }

    pub fn filter(
        &mut self,
        dataset: &Dataset,
        month: YearMonth,
        categories: &BTreeSet<String>,
    ) -> Arc<Vec<Expense>> {
        self.filters.get_or_compute(dataset, month, categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const V1: &str = "id,date,amount,description,category\n\
                      1,2024-03-01,50.0,SUPERMARKET,Groceries\n\
                      2,2024-03-02,30.0,SUPERMARKET,Groceries\n";
    const V2: &str = "id,date,amount,description,category\n\
                      1,2024-03-01,50.0,SUPERMARKET,Groceries\n";

    #[test]
    fn test_load_is_memoized_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("finances.csv");
        fs::write(&p, V1).unwrap();

        let mut cache = DatasetCache::new();
        let first = cache.load(&p).unwrap();

        // Changing the file must not be observed until reload.
        fs::write(&p, V2).unwrap();
        let second = cache.load(&p).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.expenses.len(), 2);

        let third = cache.reload(&p).unwrap();
        assert_eq!(third.expenses.len(), 1);
        assert_ne!(third.id, first.id);
    }

    #[test]
    fn test_load_does_not_touch_disk_when_cached() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("finances.csv");
        fs::write(&p, V1).unwrap();

        let mut cache = DatasetCache::new();
        cache.load(&p).unwrap();
        fs::remove_file(&p).unwrap();
        assert!(cache.load(&p).is_ok());
        assert!(cache.reload(&p).is_err());
    }

    #[test]
    fn test_filter_cache_hits_on_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("finances.csv");
        fs::write(&p, V1).unwrap();

        let mut memo = Memo::new();
        let ds = memo.load(&p).unwrap();
        let month: YearMonth = "2024-03".parse().unwrap();
        let all = BTreeSet::new();

        let a = memo.filter(&ds, month, &all);
        let b = memo.filter(&ds, month, &all);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(memo.filters.stats(), (1, 1));

        let only_health: BTreeSet<String> = ["Health".to_string()].into_iter().collect();
        let c = memo.filter(&ds, month, &only_health);
        assert!(c.is_empty());
        assert_eq!(memo.filters.len(), 2);
    }

    #[test]
    fn test_reload_invalidates_filters() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("finances.csv");
        fs::write(&p, V1).unwrap();

        let mut memo = Memo::new();
        let ds = memo.load(&p).unwrap();
        let month: YearMonth = "2024-03".parse().unwrap();
        let all = BTreeSet::new();
        assert_eq!(memo.filter(&ds, month, &all).len(), 2);

        fs::write(&p, V2).unwrap();
        let ds2 = memo.reload(&p).unwrap();
        assert!(memo.filters.is_empty());
        assert_eq!(memo.filter(&ds2, month, &all).len(), 1);
    }
}
