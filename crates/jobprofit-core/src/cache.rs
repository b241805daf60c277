//! Memoised pipeline runs
//!
//! A run is identified by a SHA-256 digest of its inputs: every cell of the
//! three tables, their column names, the column mapping and the allocation
//! mode. Identical inputs return the same shared outputs without recomputing.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::{build_fact_tables, Cell, FactOutputs, PipelineOptions, RawTable};

/// Content digest of one pipeline invocation
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(
        timesheet: &RawTable,
        revrec: Option<&RawTable>,
        quotes: Option<&RawTable>,
        options: &PipelineOptions,
    ) -> Self {
        let mut hasher = Sha256::new();
        hash_table(&mut hasher, b"timesheet", Some(timesheet));
        hash_table(&mut hasher, b"revrec", revrec);
        hash_table(&mut hasher, b"quotes", quotes);
        for (field, column) in options.columns.fields() {
            hash_str(&mut hasher, field);
            hash_str(&mut hasher, column);
        }
        hash_str(&mut hasher, options.allocation.as_str());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Length-prefixed so adjacent fields cannot run together
fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_cell(hasher: &mut Sha256, cell: &Cell) {
    match cell {
        Cell::Empty => hasher.update([0u8]),
        Cell::Number(n) => {
            hasher.update([1u8]);
            hasher.update(n.to_bits().to_le_bytes());
        }
        Cell::Text(s) => {
            hasher.update([2u8]);
            hash_str(hasher, s);
        }
        Cell::Bool(b) => hasher.update([3u8, u8::from(*b)]),
        Cell::Date(d) => {
            hasher.update([4u8]);
            hash_str(hasher, &d.to_string());
        }
    }
}

fn hash_table(hasher: &mut Sha256, tag: &[u8], table: Option<&RawTable>) {
    hasher.update(tag);
    let Some(table) = table else {
        hasher.update([0u8]);
        return;
    };
    hasher.update([1u8]);
    hasher.update((table.columns().len() as u64).to_le_bytes());
    for column in table.columns() {
        hash_str(hasher, column);
    }
    hasher.update((table.len() as u64).to_le_bytes());
    for row in table.rows() {
        hasher.update((row.len() as u64).to_le_bytes());
        for cell in row {
            hash_cell(hasher, cell);
        }
    }
}

/// Bounded cache of pipeline outputs, evicting the oldest entry first
#[derive(Debug)]
pub struct PipelineCache {
    capacity: usize,
    entries: HashMap<CacheKey, Arc<FactOutputs>>,
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

impl Default for PipelineCache {
    fn default() -> Self {
        Self::new(8)
    }
}

impl PipelineCache {
    /// A cache holding at most `capacity` runs (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached outputs for these inputs, building them on a miss.
    pub fn get_or_build(
        &mut self,
        timesheet: &RawTable,
        revrec: Option<&RawTable>,
        quotes: Option<&RawTable>,
        options: &PipelineOptions,
    ) -> Arc<FactOutputs> {
        let key = CacheKey::compute(timesheet, revrec, quotes, options);
        if let Some(outputs) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(key = %key, "pipeline cache hit");
            return Arc::clone(outputs);
        }

        self.misses += 1;
        tracing::debug!(key = %key, "pipeline cache miss");
        let outputs = Arc::new(build_fact_tables(timesheet, revrec, quotes, options));

        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&outputs));
        outputs
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AllocationMode;

    fn timesheet(hours: f64) -> RawTable {
        RawTable::new(["[Job] Job No.", "[Job Task] Name", "[Time] Date", "[Time] Actual Hrs"]).with_row(vec![
            Cell::from("1"),
            Cell::from("A"),
            Cell::from("2024-03-01"),
            Cell::from(hours),
        ])
    }

    #[test]
    fn key_is_stable_and_input_sensitive() {
        let options = PipelineOptions::default();
        let a = CacheKey::compute(&timesheet(1.0), None, None, &options);
        let b = CacheKey::compute(&timesheet(1.0), None, None, &options);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);

        assert_ne!(a, CacheKey::compute(&timesheet(2.0), None, None, &options));
        assert_ne!(
            a,
            CacheKey::compute(&timesheet(1.0), None, None, &options.clone().allocation(AllocationMode::Cost))
        );
        // absent and empty tables are different inputs
        let empty = RawTable::default();
        assert_ne!(a, CacheKey::compute(&timesheet(1.0), Some(&empty), None, &options));
    }

    #[test]
    fn text_and_number_do_not_collide() {
        let options = PipelineOptions::default();
        let text = RawTable::new(["x"]).with_row(vec![Cell::from("1")]);
        let number = RawTable::new(["x"]).with_row(vec![Cell::from(1.0)]);
        assert_ne!(
            CacheKey::compute(&text, None, None, &options),
            CacheKey::compute(&number, None, None, &options)
        );
    }

    #[test]
    fn hits_share_outputs() {
        let mut cache = PipelineCache::new(4);
        let options = PipelineOptions::default();
        let first = cache.get_or_build(&timesheet(1.0), None, None, &options);
        let second = cache.get_or_build(&timesheet(1.0), None, None, &options);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let mut cache = PipelineCache::new(2);
        let options = PipelineOptions::default();
        for hours in [1.0, 2.0, 3.0] {
            cache.get_or_build(&timesheet(hours), None, None, &options);
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&CacheKey::compute(&timesheet(1.0), None, None, &options)));
        assert!(cache.contains(&CacheKey::compute(&timesheet(3.0), None, None, &options)));

        cache.clear();
        assert!(cache.is_empty());
    }
}
