use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::CoreError;
use crate::models::history::PriceHistoryEntry;
use crate::models::stock::StockId;

/// Append-only per-stock price log with bounded retention.
///
/// Entries for one stock are appended in timestamp order; eviction always
/// removes the oldest. Implementations may be backed by memory or a database.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a new price for a stock.
    async fn append(&self, entry: PriceHistoryEntry) -> Result<(), CoreError>;

    /// Keep only the `keep` most recent entries for `stock_id`.
    /// Returns the number of entries evicted.
    async fn prune(&self, stock_id: StockId, keep: usize) -> Result<usize, CoreError>;

    /// Up to `limit` most recent entries, newest first.
    async fn recent(&self, stock_id: StockId, limit: usize)
        -> Result<Vec<PriceHistoryEntry>, CoreError>;

    /// Number of entries stored for `stock_id`.
    async fn count(&self, stock_id: StockId) -> Result<usize, CoreError>;

    /// Every stored entry, grouped by stock and oldest first within a stock.
    async fn export(&self) -> Result<Vec<PriceHistoryEntry>, CoreError>;
}

/// In-memory [`HistoryStore`]: one `VecDeque` per stock behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<HashMap<StockId, VecDeque<PriceHistoryEntry>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from exported entries. Entries are re-sorted by
    /// timestamp per stock so the append-order invariant holds.
    pub fn from_entries(entries: Vec<PriceHistoryEntry>) -> Self {
        let mut by_stock: HashMap<StockId, Vec<PriceHistoryEntry>> = HashMap::new();
        for entry in entries {
            by_stock.entry(entry.stock_id).or_default().push(entry);
        }
        let map = by_stock
            .into_iter()
            .map(|(id, mut list)| {
                list.sort_by_key(|e| e.timestamp);
                (id, VecDeque::from(list))
            })
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }

    /// Total rows across all stocks.
    pub fn total_entries(&self) -> usize {
        self.entries.lock().values().map(|v| v.len()).sum()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: PriceHistoryEntry) -> Result<(), CoreError> {
        self.entries
            .lock()
            .entry(entry.stock_id)
            .or_default()
            .push_back(entry);
        Ok(())
    }

    async fn prune(&self, stock_id: StockId, keep: usize) -> Result<usize, CoreError> {
        let mut entries = self.entries.lock();
        let Some(log) = entries.get_mut(&stock_id) else {
            return Ok(0);
        };
        let excess = log.len().saturating_sub(keep);
        log.drain(..excess);
        Ok(excess)
    }

    async fn recent(
        &self,
        stock_id: StockId,
        limit: usize,
    ) -> Result<Vec<PriceHistoryEntry>, CoreError> {
        Ok(self
            .entries
            .lock()
            .get(&stock_id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, stock_id: StockId) -> Result<usize, CoreError> {
        Ok(self.entries.lock().get(&stock_id).map_or(0, VecDeque::len))
    }

    async fn export(&self) -> Result<Vec<PriceHistoryEntry>, CoreError> {
        let entries = self.entries.lock();
        let mut ids: Vec<&StockId> = entries.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .flat_map(|id| entries[id].iter().cloned())
            .collect())
    }
}
