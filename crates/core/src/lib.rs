pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use errors::CoreError;
use models::{
    account::{Account, Holding, UserId},
    config::MarketConfig,
    event::{ImpactLevel, MarketEvent, MarketEventApplication, MarketWideKind},
    history::direction,
    leaderboard::LeaderboardEntry,
    market::{
        EventOutcome, HistoryPoint, LatestEvent, MarketWideOutcome, PriceUpdate, StockDetail,
        StockListing, TickerItem,
    },
    portfolio::{PortfolioHolding, PortfolioView, UserBalance},
    stock::{round_cents, Stock, StockId},
    trade::{LoanGrant, LoanStatus, TradeReceipt},
};
use services::{
    event_catalog::EventCatalog,
    history_store::{HistoryStore, MemoryHistoryStore},
    leaderboard::LeaderboardService,
    ledger::{validate_shares, Ledger, Quote},
    price_model::PriceModel,
    stock_book::{StockBook, StockCell},
};
use storage::manager::{MarketSnapshot, SnapshotManager};

/// Most history points a single chart query may return.
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Most applied-event records kept; older ones are dropped first.
pub const EVENT_LOG_CAPACITY: usize = 1000;

/// Range prices are reset into by [`StockMarket::rebase_prices`].
const REBASE_RANGE: (f64, f64) = (2.0, 55.0);

/// Main entry point for the stock market core library.
///
/// Owns the listed stocks, the price log, the event catalog and the trading
/// ledger, and exposes every operation the request layer and the scheduler
/// call. All methods take `&self`; share it behind an `Arc`.
#[must_use]
pub struct StockMarket {
    config: MarketConfig,
    stocks: StockBook,
    catalog: EventCatalog,
    ledger: Ledger,
    price_model: PriceModel,
    leaderboard: LeaderboardService,
    applications: RwLock<VecDeque<MarketEventApplication>>,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for StockMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockMarket")
            .field("stocks", &self.stocks.len())
            .field("accounts", &self.ledger.len())
            .field("events", &self.catalog.events().len())
            .field("applications", &self.applications.read().len())
            .field("config", &self.config)
            .finish()
    }
}

impl StockMarket {
    /// Create an empty market with the built-in event catalog and an
    /// in-memory price log.
    pub fn new(config: MarketConfig) -> Result<Self, CoreError> {
        let catalog = EventCatalog::default_catalog()?;
        Self::with_parts(config, catalog, Arc::new(MemoryHistoryStore::new()))
    }

    /// Create an empty market from explicit parts.
    pub fn with_parts(
        config: MarketConfig,
        catalog: EventCatalog,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            stocks: StockBook::new(history, config.history_retention),
            ledger: Ledger::new(config.loan.clone()),
            catalog,
            price_model: PriceModel::new(),
            leaderboard: LeaderboardService::new(),
            applications: RwLock::new(VecDeque::new()),
            rng: Mutex::new(rng),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn history_store(&self) -> &Arc<dyn HistoryStore> {
        self.stocks.history()
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Capture the whole market. Stocks and accounts are read row by row, so
    /// the snapshot is not atomic with respect to concurrent writers.
    ///
    /// A seeded market records a seed drawn from a copy of its live RNG, so a
    /// reloaded market continues deterministically instead of replaying the
    /// price path from the configured seed.
    pub async fn snapshot(&self) -> Result<MarketSnapshot, CoreError> {
        let rng_resume_seed = self
            .config
            .seed
            .map(|_| self.rng.lock().clone().random::<u64>());
        let stocks: Vec<Stock> = self.stocks.cells().iter().map(|c| c.snapshot()).collect();
        let history = self.stocks.history().export().await?;
        let (accounts, holdings): (Vec<Account>, Vec<Vec<Holding>>) =
            self.ledger.snapshot().into_iter().unzip();

        Ok(MarketSnapshot {
            config: self.config.clone(),
            stocks,
            history,
            events: self.catalog.events().to_vec(),
            applications: self.applications.read().iter().cloned().collect(),
            accounts,
            holdings: holdings.into_iter().flatten().collect(),
            rng_resume_seed,
        })
    }

    /// Rebuild a market from a snapshot, with an in-memory price log.
    pub fn from_snapshot(snapshot: MarketSnapshot) -> Result<Self, CoreError> {
        let catalog = EventCatalog::new(snapshot.events)?;
        let history = Arc::new(MemoryHistoryStore::from_entries(snapshot.history));
        let market = Self::with_parts(snapshot.config, catalog, history)?;
        market.stocks.restore(snapshot.stocks)?;
        market.ledger.restore(snapshot.accounts, snapshot.holdings)?;

        let mut applications = VecDeque::from(snapshot.applications);
        let excess = applications.len().saturating_sub(EVENT_LOG_CAPACITY);
        applications.drain(..excess);
        *market.applications.write() = applications;

        if let Some(seed) = snapshot.rng_resume_seed {
            *market.rng.lock() = StdRng::seed_from_u64(seed);
        }
        Ok(market)
    }

    /// Serialize the market to SMKT bytes.
    pub async fn save_to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let snapshot = self.snapshot().await?;
        SnapshotManager::save_to_bytes(&snapshot)
    }

    /// Load a market from SMKT bytes.
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        Self::from_snapshot(SnapshotManager::load_from_bytes(data)?)
    }

    pub async fn save_to_file(&self, path: &str) -> Result<(), CoreError> {
        let snapshot = self.snapshot().await?;
        SnapshotManager::save_to_file(&snapshot, path)
    }

    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        Self::from_snapshot(SnapshotManager::load_from_file(path)?)
    }

    // ── Seeding ─────────────────────────────────────────────────────

    /// List a new stock. No history row is written until its first price change.
    pub fn list_stock(&self, name: &str, symbol: &str, price: f64) -> Result<StockListing, CoreError> {
        let stock = self.stocks.list(name, symbol, price)?;
        info!(symbol = %stock.symbol, price = stock.price, "stock listed");
        Ok(listing(&stock))
    }

    /// Open a trading account funded with the configured starting balance.
    pub fn open_account(&self, name: &str, email: &str) -> Result<Account, CoreError> {
        self.ledger
            .open_account(name, email, self.config.starting_balance)
    }

    pub fn account(&self, user_id: UserId) -> Result<Account, CoreError> {
        self.ledger.account(user_id)
    }

    pub fn holdings(&self, user_id: UserId) -> Result<Vec<Holding>, CoreError> {
        self.ledger.holdings(user_id)
    }

    /// Look up an account by email (case-insensitive).
    pub fn find_account(&self, email: &str) -> Result<Account, CoreError> {
        let user_id = self
            .ledger
            .find_by_email(email)
            .ok_or_else(|| CoreError::UserNotFound(email.trim().to_lowercase()))?;
        self.ledger.account(user_id)
    }

    // ── Scheduler Entry Points ──────────────────────────────────────

    /// Advance every stock by one mean-reverting random step.
    ///
    /// A stock whose update fails is logged and skipped; the rest still tick.
    pub async fn tick_all_stocks(&self) -> Vec<PriceUpdate> {
        let cells = self.stocks.cells();
        let mut updates = Vec::with_capacity(cells.len());
        for cell in cells {
            let result = self
                .stocks
                .apply_price_change(&cell, |stock| {
                    self.price_model.next_price(stock, &mut *self.rng.lock())
                })
                .await;
            match result {
                Ok(update) => {
                    debug!(symbol = %update.symbol, old = update.old_price, new = update.new_price, "tick");
                    updates.push(update);
                }
                Err(e) => warn!(stock_id = cell.id(), error = %e, "tick failed"),
            }
        }
        updates
    }

    /// Roll a weighted tier, pick an event within it and a stock uniformly,
    /// and apply the event.
    pub async fn apply_random_event(&self) -> Result<EventOutcome, CoreError> {
        let cells = self.stocks.cells();
        if cells.is_empty() {
            return Err(CoreError::NoStocks);
        }
        let (event, cell) = {
            let mut rng = self.rng.lock();
            let event = self.catalog.select(&self.config.tier_weights, &mut *rng)?.clone();
            let cell = Arc::clone(&cells[rng.random_range(0..cells.len())]);
            (event, cell)
        };
        self.apply_event(&event, &cell).await
    }

    // ── Admin ───────────────────────────────────────────────────────

    /// Apply a random event of the given tier, to `symbol` if given or to a
    /// random stock otherwise.
    pub async fn force_event(
        &self,
        level: ImpactLevel,
        symbol: Option<&str>,
    ) -> Result<EventOutcome, CoreError> {
        // Resolve candidates before locking the RNG; the table lock is never
        // taken while it is held.
        let candidates = match symbol {
            Some(symbol) => vec![self.stocks.cell(symbol)?],
            None => self.stocks.cells(),
        };
        if candidates.is_empty() {
            return Err(CoreError::NoStocks);
        }
        let (event, cell) = {
            let mut rng = self.rng.lock();
            let event = self.catalog.pick_in_tier(level, &mut *rng)?.clone();
            let idx = match symbol {
                Some(_) => 0,
                None => rng.random_range(0..candidates.len()),
            };
            (event, Arc::clone(&candidates[idx]))
        };
        self.apply_event(&event, &cell).await
    }

    async fn apply_event(&self, event: &MarketEvent, cell: &StockCell) -> Result<EventOutcome, CoreError> {
        let update = self
            .stocks
            .apply_price_change(cell, |stock| {
                self.catalog
                    .impact_price(event, stock.price, &mut *self.rng.lock())
            })
            .await?;

        let stock = cell.snapshot();
        let application = MarketEventApplication::new(event.id, stock.id);
        let application_id = application.id;
        {
            let mut log = self.applications.write();
            if log.len() == EVENT_LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(application);
        }

        info!(
            event_id = event.id,
            level = %event.impact_level,
            symbol = %update.symbol,
            old = update.old_price,
            new = update.new_price,
            "market event applied"
        );

        Ok(EventOutcome {
            application_id,
            event_id: event.id,
            text: event.text.clone(),
            rendered_text: event.render(&stock.name),
            impact_level: event.impact_level,
            symbol: update.symbol,
            old_price: update.old_price,
            new_price: update.new_price,
        })
    }

    /// Override a stock's price. Values below the floor are raised to it.
    pub async fn set_price(&self, symbol: &str, price: f64) -> Result<PriceUpdate, CoreError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Price must be positive, got {price}"
            )));
        }
        let cell = self.stocks.cell(symbol)?;
        let update = self.stocks.apply_price_change(&cell, |_| price).await?;
        info!(symbol = %update.symbol, old = update.old_price, new = update.new_price, "price set");
        Ok(update)
    }

    /// Shock every stock with an independent impact in the market-wide range,
    /// up for a boom and down for a crisis.
    pub async fn trigger_market_wide_event(
        &self,
        kind: MarketWideKind,
    ) -> Result<MarketWideOutcome, CoreError> {
        let cells = self.stocks.cells();
        if cells.is_empty() {
            return Err(CoreError::NoStocks);
        }

        let mut updates = Vec::with_capacity(cells.len());
        for cell in cells {
            let result = self
                .stocks
                .apply_price_change(&cell, |stock| {
                    self.catalog
                        .market_wide_price(kind, stock.price, &mut *self.rng.lock())
                })
                .await;
            match result {
                Ok(update) => updates.push(update),
                Err(e) => warn!(stock_id = cell.id(), error = %e, %kind, "market-wide update failed"),
            }
        }

        info!(%kind, stocks_affected = updates.len(), "market-wide event triggered");
        Ok(MarketWideOutcome {
            kind,
            event_name: kind.display_name().to_string(),
            stocks_affected: updates.len(),
            updates,
        })
    }

    /// Reset every stock to a fresh random price, rounded to cents.
    pub async fn rebase_prices(&self) -> Result<Vec<PriceUpdate>, CoreError> {
        let mut updates = Vec::new();
        for cell in self.stocks.cells() {
            let update = self
                .stocks
                .apply_price_change(&cell, |_| {
                    round_cents(
                        self.rng
                            .lock()
                            .random_range(REBASE_RANGE.0..=REBASE_RANGE.1),
                    )
                })
                .await?;
            updates.push(update);
        }
        info!(stocks = updates.len(), "prices rebased");
        Ok(updates)
    }

    /// Trim every stock's history to its `keep` most recent entries.
    /// Returns the number of entries deleted.
    pub async fn compact_history(&self, keep: usize) -> Result<usize, CoreError> {
        if keep == 0 {
            return Err(CoreError::ValidationError(
                "Must keep at least one history entry per stock".into(),
            ));
        }
        let mut deleted = 0;
        for cell in self.stocks.cells() {
            deleted += self.stocks.history().prune(cell.id(), keep).await?;
        }
        info!(keep, deleted, "price history compacted");
        Ok(deleted)
    }

    /// Credit money to a user unconditionally.
    pub fn add_money(&self, user_id: UserId, amount: f64) -> Result<Account, CoreError> {
        self.ledger.add_money(user_id, amount)
    }

    /// All users with their balances, ordered by email.
    #[must_use]
    pub fn list_users_with_balances(&self) -> Vec<UserBalance> {
        self.ledger.list_balances()
    }

    // ── Market Data ─────────────────────────────────────────────────

    /// Every stock with its price and last move, in listing order.
    pub async fn ticker_snapshot(&self) -> Result<Vec<TickerItem>, CoreError> {
        let mut items = Vec::new();
        for cell in self.stocks.cells() {
            let stock = cell.snapshot();
            items.push(TickerItem {
                direction: self.direction_of(stock.id).await?,
                price: round_cents(stock.price),
                symbol: stock.symbol,
            });
        }
        Ok(items)
    }

    /// All stocks, ordered by symbol.
    #[must_use]
    pub fn stock_list(&self) -> Vec<StockListing> {
        let mut list: Vec<StockListing> = self
            .stocks
            .cells()
            .iter()
            .map(|c| listing(&c.snapshot()))
            .collect();
        list.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        list
    }

    pub async fn stock_detail(&self, symbol: &str) -> Result<StockDetail, CoreError> {
        let stock = self.stocks.cell(symbol)?.snapshot();
        let latest = self.stocks.history().recent(stock.id, 1).await?;
        Ok(StockDetail {
            price: round_cents(stock.price),
            latest_timestamp: latest.first().map(|e| e.timestamp),
            name: stock.name,
            symbol: stock.symbol,
        })
    }

    /// The most recent price points for `symbol`, oldest first.
    /// `limit` defaults to, and is capped at, [`MAX_HISTORY_LIMIT`].
    pub async fn stock_history(
        &self,
        symbol: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryPoint>, CoreError> {
        let limit = limit.unwrap_or(MAX_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        if limit == 0 {
            return Err(CoreError::ValidationError(
                "History limit must be at least 1".into(),
            ));
        }
        let id = self.stocks.cell(symbol)?.id();
        let mut entries = self.stocks.history().recent(id, limit).await?;
        entries.reverse();
        Ok(entries
            .into_iter()
            .map(|e| HistoryPoint {
                timestamp: e.timestamp,
                price: round_cents(e.price),
            })
            .collect())
    }

    /// The last event applied to any stock, if any. Records are appended in
    /// application order, so this is the back of the log.
    #[must_use]
    pub fn latest_event_application(&self) -> Option<LatestEvent> {
        let application = self.applications.read().back().cloned()?;
        let event = self.catalog.get(application.event_id)?.clone();
        let stock = self.stocks.cell_by_id(application.stock_id)?.snapshot();
        Some(LatestEvent {
            application_id: application.id,
            rendered_text: event.render(&stock.name),
            event,
            created_at: application.created_at,
            stock: listing(&stock),
        })
    }

    async fn direction_of(&self, stock_id: StockId) -> Result<i8, CoreError> {
        let recent = self.stocks.history().recent(stock_id, 2).await?;
        Ok(direction(&recent))
    }

    // ── Trading ─────────────────────────────────────────────────────

    fn quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let stock = self.stocks.cell(symbol)?.snapshot();
        Ok(Quote {
            stock_id: stock.id,
            symbol: stock.symbol,
            price: stock.price,
        })
    }

    /// Buy `amount` shares of `symbol` at the current price.
    pub fn buy(&self, user_id: UserId, symbol: &str, amount: i64) -> Result<TradeReceipt, CoreError> {
        validate_shares(amount)?;
        let quote = self.quote(symbol)?;
        self.ledger.buy(user_id, &quote, amount)
    }

    /// Sell `amount` shares of `symbol` at the current price.
    pub fn sell(&self, user_id: UserId, symbol: &str, amount: i64) -> Result<TradeReceipt, CoreError> {
        validate_shares(amount)?;
        let quote = self.quote(symbol)?;
        self.ledger.sell(user_id, &quote, amount)
    }

    pub fn take_loan(&self, user_id: UserId) -> Result<LoanGrant, CoreError> {
        self.ledger.take_loan(user_id, &self.stocks.price_map())
    }

    /// Loan position for a user. Repays an outstanding loan first if the
    /// balance has reached the auto-repay threshold; there is no background
    /// sweep, so repayment waits until the user checks.
    pub fn check_loan_status(&self, user_id: UserId) -> Result<LoanStatus, CoreError> {
        self.ledger
            .check_loan_status(user_id, &self.stocks.price_map())
    }

    // ── Standings ───────────────────────────────────────────────────

    /// Top accounts by portfolio worth.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let prices = self.stocks.price_map();
        let rows = self.ledger.snapshot();
        self.leaderboard
            .rank(&rows, &prices, self.config.leaderboard_size)
    }

    /// A user's cash, positions (ordered by symbol) and total worth.
    pub async fn portfolio(&self, user_id: UserId) -> Result<PortfolioView, CoreError> {
        let account = self.ledger.account(user_id)?;
        let holdings = self.ledger.holdings(user_id)?;

        let mut lines = Vec::with_capacity(holdings.len());
        let mut stocks_total = 0.0;
        for holding in holdings {
            let Some(cell) = self.stocks.cell_by_id(holding.stock_id) else {
                warn!(stock_id = holding.stock_id, user = %user_id, "holding references unknown stock");
                continue;
            };
            let stock = cell.snapshot();
            let total = stock.price * holding.shares as f64;
            stocks_total += total;
            lines.push(PortfolioHolding {
                direction: self.direction_of(stock.id).await?,
                price: round_cents(stock.price),
                shares: holding.shares,
                total: round_cents(total),
                name: stock.name,
                symbol: stock.symbol,
            });
        }
        lines.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        Ok(PortfolioView {
            user_id,
            name: account.display_name().to_string(),
            balance: round_cents(account.cash_balance),
            holdings: lines,
            stocks_total: round_cents(stocks_total),
            portfolio_worth: round_cents(account.cash_balance + stocks_total),
        })
    }
}

fn listing(stock: &Stock) -> StockListing {
    StockListing {
        id: stock.id,
        name: stock.name.clone(),
        symbol: stock.symbol.clone(),
        price: round_cents(stock.price),
    }
}
