use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::history::PriceHistoryEntry;
use crate::models::market::PriceUpdate;
use crate::models::stock::{floor_price, Stock, StockId};
use crate::services::history_store::HistoryStore;

/// A listed stock plus the gate that serializes writers of its price.
pub struct StockCell {
    stock: RwLock<Stock>,
    write_gate: tokio::sync::Mutex<()>,
}

impl StockCell {
    fn new(stock: Stock) -> Self {
        Self {
            stock: RwLock::new(stock),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Copy of the stock's current state.
    #[must_use]
    pub fn snapshot(&self) -> Stock {
        self.stock.read().clone()
    }

    #[must_use]
    pub fn price(&self) -> f64 {
        self.stock.read().price
    }

    #[must_use]
    pub fn id(&self) -> StockId {
        self.stock.read().id
    }
}

#[derive(Default)]
struct StockTable {
    cells: Vec<Arc<StockCell>>,
    by_symbol: HashMap<String, usize>,
    by_id: HashMap<StockId, usize>,
    next_id: StockId,
}

/// All listed stocks and the single write path for their prices.
///
/// Every price mutation goes through [`StockBook::apply_price_change`], which
/// writes the price, appends a history row and prunes the log, in that order.
pub struct StockBook {
    table: RwLock<StockTable>,
    history: Arc<dyn HistoryStore>,
    retention: usize,
}

impl StockBook {
    pub fn new(history: Arc<dyn HistoryStore>, retention: usize) -> Self {
        Self {
            table: RwLock::new(StockTable {
                next_id: 1,
                ..StockTable::default()
            }),
            history,
            retention,
        }
    }

    /// Handle to the price log.
    #[must_use]
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// List a new stock. Symbols are unique (case-insensitive).
    pub fn list(&self, name: &str, symbol: &str, price: f64) -> Result<Stock, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() || symbol.len() > 10 {
            return Err(CoreError::ValidationError(format!(
                "Invalid symbol '{symbol}': must be 1 to 10 characters"
            )));
        }
        if name.trim().is_empty() {
            return Err(CoreError::ValidationError("Stock name is required".into()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Price must be positive, got {price}"
            )));
        }

        let mut table = self.table.write();
        if table.by_symbol.contains_key(&symbol) {
            return Err(CoreError::ValidationError(format!(
                "Symbol {symbol} is already listed"
            )));
        }
        let stock = Stock::new(table.next_id, name.trim(), &symbol, price);
        table.next_id += 1;
        Self::insert(&mut table, stock.clone());
        Ok(stock)
    }

    /// Put back previously persisted stocks, keeping their ids.
    pub fn restore(&self, stocks: Vec<Stock>) -> Result<(), CoreError> {
        let mut table = self.table.write();
        for stock in stocks {
            if table.by_symbol.contains_key(&stock.symbol) {
                return Err(CoreError::Deserialization(format!(
                    "Duplicate symbol {} in snapshot",
                    stock.symbol
                )));
            }
            if table.by_id.contains_key(&stock.id) {
                return Err(CoreError::Deserialization(format!(
                    "Duplicate stock id {} in snapshot",
                    stock.id
                )));
            }
            table.next_id = table.next_id.max(stock.id + 1);
            Self::insert(&mut table, stock);
        }
        Ok(())
    }

    fn insert(table: &mut StockTable, stock: Stock) {
        let idx = table.cells.len();
        table.by_symbol.insert(stock.symbol.clone(), idx);
        table.by_id.insert(stock.id, idx);
        table.cells.push(Arc::new(StockCell::new(stock)));
    }

    /// Look up a stock by symbol (case-insensitive).
    pub fn cell(&self, symbol: &str) -> Result<Arc<StockCell>, CoreError> {
        let key = symbol.trim().to_uppercase();
        let table = self.table.read();
        table
            .by_symbol
            .get(&key)
            .map(|&idx| Arc::clone(&table.cells[idx]))
            .ok_or(CoreError::StockNotFound(key))
    }

    /// Look up a stock by id.
    #[must_use]
    pub fn cell_by_id(&self, id: StockId) -> Option<Arc<StockCell>> {
        let table = self.table.read();
        table.by_id.get(&id).map(|&idx| Arc::clone(&table.cells[idx]))
    }

    /// All stocks in listing order.
    #[must_use]
    pub fn cells(&self) -> Vec<Arc<StockCell>> {
        self.table.read().cells.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current price of every stock, read once.
    #[must_use]
    pub fn price_map(&self) -> HashMap<StockId, f64> {
        self.table
            .read()
            .cells
            .iter()
            .map(|c| {
                let s = c.stock.read();
                (s.id, s.price)
            })
            .collect()
    }

    /// Mutate a stock's price through `compute` and record it.
    ///
    /// `compute` works on a copy of the stock while the write gate is held
    /// and returns the candidate price, which is floored before it is stored.
    /// No stock lock is held while it runs, so it may take other locks.
    /// The history append is part of the write: if it fails the old price is
    /// restored. Pruning is best-effort; failures are logged and swallowed.
    pub async fn apply_price_change<F>(
        &self,
        cell: &StockCell,
        compute: F,
    ) -> Result<PriceUpdate, CoreError>
    where
        F: FnOnce(&mut Stock) -> f64 + Send,
    {
        let _gate = cell.write_gate.lock().await;

        let mut working = cell.snapshot();
        let old_price = working.price;
        let new_price = floor_price(compute(&mut working));
        working.price = new_price;
        let (stock_id, symbol) = (working.id, working.symbol.clone());
        *cell.stock.write() = working;

        if let Err(e) = self
            .history
            .append(PriceHistoryEntry::new(stock_id, new_price))
            .await
        {
            cell.stock.write().price = old_price;
            return Err(e);
        }

        match self.history.prune(stock_id, self.retention).await {
            Ok(0) => {}
            Ok(evicted) => debug!(symbol = %symbol, evicted, "pruned price history"),
            Err(e) => warn!(symbol = %symbol, error = %e, "price history prune failed"),
        }

        Ok(PriceUpdate {
            symbol,
            old_price,
            new_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::history_store::MemoryHistoryStore;

    fn book(retention: usize) -> StockBook {
        StockBook::new(Arc::new(MemoryHistoryStore::new()), retention)
    }

    #[test]
    fn list_rejects_duplicate_symbol_case_insensitively() {
        let book = book(10);
        book.list("Corn Collective", "CORN", 10.0).unwrap();
        let err = book.list("Other Corn", "corn", 5.0).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn list_rejects_non_positive_price() {
        let book = book(10);
        assert!(book.list("Corn", "CORN", 0.0).is_err());
        assert!(book.list("Corn", "CORN", f64::NAN).is_err());
    }

    #[test]
    fn ids_are_sequential() {
        let book = book(10);
        let a = book.list("A", "AAA", 1.0).unwrap();
        let b = book.list("B", "BBB", 1.0).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(book.cell("bbb").unwrap().id(), 2);
    }

    #[tokio::test]
    async fn price_change_is_floored_and_recorded() {
        let book = book(10);
        book.list("Corn", "CORN", 10.0).unwrap();
        let cell = book.cell("CORN").unwrap();

        let update = book.apply_price_change(&cell, |_| -3.0).await.unwrap();
        assert_eq!(update.old_price, 10.0);
        assert_eq!(update.new_price, 0.1);
        assert_eq!(cell.price(), 0.1);
        assert_eq!(book.history().count(cell.id()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn history_is_capped_at_retention() {
        let book = book(3);
        book.list("Corn", "CORN", 10.0).unwrap();
        let cell = book.cell("CORN").unwrap();
        for i in 1..=7 {
            book.apply_price_change(&cell, move |_| i as f64).await.unwrap();
        }
        let recent = book.history().recent(cell.id(), 10).await.unwrap();
        let prices: Vec<f64> = recent.iter().map(|e| e.price).collect();
        assert_eq!(prices, vec![7.0, 6.0, 5.0]);
    }

    #[test]
    fn id_lookup_uses_index() {
        let book = book(10);
        book.restore(vec![Stock::new(4, "Rye", "RYE", 3.0), Stock::new(9, "Oat", "OAT", 2.0)])
            .unwrap();
        assert_eq!(book.cell_by_id(9).unwrap().snapshot().symbol, "OAT");
        assert!(book.cell_by_id(5).is_none());
        assert_eq!(book.list("Corn", "CORN", 1.0).unwrap().id, 10);
        assert_eq!(book.cell_by_id(10).unwrap().snapshot().symbol, "CORN");
    }

    #[test]
    fn restore_rejects_duplicate_id() {
        let book = book(10);
        let err = book
            .restore(vec![Stock::new(1, "Rye", "RYE", 3.0), Stock::new(1, "Oat", "OAT", 2.0)])
            .unwrap_err();
        assert!(matches!(err, CoreError::Deserialization(_)));
    }

    #[tokio::test]
    async fn compute_runs_without_holding_the_stock_lock() {
        let book = book(10);
        book.list("Corn", "CORN", 10.0).unwrap();
        let cell = book.cell("CORN").unwrap();
        let update = book
            .apply_price_change(&cell, |stock| {
                // Readers of the same stock and the table must not block here.
                let seen = cell.price();
                let prices = book.price_map();
                stock.volatility_min = Some(-0.1);
                seen + prices.len() as f64
            })
            .await
            .unwrap();
        assert_eq!(update.new_price, 11.0);
        let stored = cell.snapshot();
        assert_eq!(stored.price, 11.0);
        assert_eq!(stored.volatility_min, Some(-0.1));
    }
}
