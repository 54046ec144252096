use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::errors::CoreError;
use crate::models::account::{Account, Holding, UserId};
use crate::models::config::LoanPolicy;
use crate::models::portfolio::UserBalance;
use crate::models::stock::StockId;
use crate::models::trade::{LoanGrant, LoanStatus, TradeReceipt, TradeSide};

/// A stock's price as read once at the start of a trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub stock_id: StockId,
    pub symbol: String,
    pub price: f64,
}

/// An account and all of its holdings: the unit of mutual exclusion.
#[derive(Debug, Clone)]
struct AccountRow {
    account: Account,
    holdings: BTreeMap<StockId, Holding>,
}

#[derive(Default)]
struct AccountTable {
    rows: Vec<Arc<Mutex<AccountRow>>>,
    by_user: HashMap<UserId, usize>,
    by_email: HashMap<String, UserId>,
}

/// Cash balances, holdings, and every operation that moves them.
///
/// Each operation runs as one transaction against a single account row:
/// the row is locked, a copy is staged, the operation runs on the copy, and
/// the copy replaces the row only if the operation returned `Ok`. A rejected
/// trade therefore leaves no partial effects, and two trades for the same
/// user cannot interleave. Different users never contend.
pub struct Ledger {
    table: RwLock<AccountTable>,
    loan: LoanPolicy,
}

impl Ledger {
    pub fn new(loan: LoanPolicy) -> Self {
        Self {
            table: RwLock::new(AccountTable::default()),
            loan,
        }
    }

    // ── Accounts ────────────────────────────────────────────────────

    /// Open a new account with `starting_balance` in cash. Emails are unique.
    pub fn open_account(
        &self,
        name: &str,
        email: &str,
        starting_balance: f64,
    ) -> Result<Account, CoreError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(CoreError::ValidationError(format!(
                "Invalid email address '{email}'"
            )));
        }
        if !starting_balance.is_finite() || starting_balance < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Starting balance must be non-negative, got {starting_balance}"
            )));
        }

        let mut table = self.table.write();
        if table.by_email.contains_key(&email) {
            return Err(CoreError::ValidationError(format!(
                "An account for {email} already exists"
            )));
        }
        let account = Account::new(name.trim(), &email, starting_balance);
        Self::insert(&mut table, account.clone(), BTreeMap::new());
        info!(user = %account.user_id, email = %account.email, "account opened");
        Ok(account)
    }

    /// Put back persisted accounts and holdings. Zero-share holdings are dropped.
    pub fn restore(&self, accounts: Vec<Account>, holdings: Vec<Holding>) -> Result<(), CoreError> {
        let mut grouped: HashMap<UserId, BTreeMap<StockId, Holding>> = HashMap::new();
        for holding in holdings.into_iter().filter(|h| h.shares > 0) {
            grouped
                .entry(holding.user_id)
                .or_default()
                .insert(holding.stock_id, holding);
        }

        let mut table = self.table.write();
        for account in accounts {
            if table.by_user.contains_key(&account.user_id)
                || table.by_email.contains_key(&account.email)
            {
                return Err(CoreError::Deserialization(format!(
                    "Duplicate account {} in snapshot",
                    account.email
                )));
            }
            let holdings = grouped.remove(&account.user_id).unwrap_or_default();
            Self::insert(&mut table, account, holdings);
        }
        if let Some(orphan) = grouped.keys().next() {
            return Err(CoreError::Deserialization(format!(
                "Holdings reference unknown user {orphan}"
            )));
        }
        Ok(())
    }

    fn insert(table: &mut AccountTable, account: Account, holdings: BTreeMap<StockId, Holding>) {
        let idx = table.rows.len();
        table.by_user.insert(account.user_id, idx);
        table.by_email.insert(account.email.clone(), account.user_id);
        table
            .rows
            .push(Arc::new(Mutex::new(AccountRow { account, holdings })));
    }

    fn row(&self, user_id: UserId) -> Result<Arc<Mutex<AccountRow>>, CoreError> {
        let table = self.table.read();
        table
            .by_user
            .get(&user_id)
            .map(|&idx| Arc::clone(&table.rows[idx]))
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))
    }

    /// Current state of one account.
    pub fn account(&self, user_id: UserId) -> Result<Account, CoreError> {
        Ok(self.row(user_id)?.lock().account.clone())
    }

    /// A user's holdings, ordered by stock id.
    pub fn holdings(&self, user_id: UserId) -> Result<Vec<Holding>, CoreError> {
        Ok(self.row(user_id)?.lock().holdings.values().cloned().collect())
    }

    /// Find a user by email (case-insensitive).
    #[must_use]
    pub fn find_by_email(&self, email: &str) -> Option<UserId> {
        self.table
            .read()
            .by_email
            .get(&email.trim().to_lowercase())
            .copied()
    }

    /// Every account with its holdings, in opening order. Each row is read
    /// under its own lock, so the result is not a single point-in-time view.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Account, Vec<Holding>)> {
        let rows = self.table.read().rows.clone();
        rows.iter()
            .map(|row| {
                let row = row.lock();
                (row.account.clone(), row.holdings.values().cloned().collect())
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All users with their balances, ordered by email.
    #[must_use]
    pub fn list_balances(&self) -> Vec<UserBalance> {
        let mut users: Vec<UserBalance> = self
            .snapshot()
            .into_iter()
            .map(|(a, _)| UserBalance {
                user_id: a.user_id,
                name: if a.name.trim().is_empty() {
                    "No Name".to_string()
                } else {
                    a.name.clone()
                },
                email: a.email,
                balance: a.cash_balance,
            })
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        users
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Run `op` against a staged copy of the user's row and commit it only
    /// on success. The row stays locked for the whole operation.
    fn transact<T, F>(&self, user_id: UserId, op: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut AccountRow) -> Result<T, CoreError>,
    {
        let row = self.row(user_id)?;
        let mut committed = row.lock();
        let mut staged = committed.clone();
        let outcome = op(&mut staged)?;
        *committed = staged;
        Ok(outcome)
    }

    /// Buy `amount` whole shares at the quoted price.
    pub fn buy(&self, user_id: UserId, quote: &Quote, amount: i64) -> Result<TradeReceipt, CoreError> {
        let shares = validate_shares(amount)?;
        let cost = quote.price * shares as f64;

        let receipt = self.transact(user_id, |row| {
            let balance = row.account.cash_balance;
            if balance < cost {
                return Err(CoreError::InsufficientFunds { balance, cost });
            }
            row.account.cash_balance = balance - cost;

            let holding = row.holdings.entry(quote.stock_id).or_insert(Holding {
                user_id,
                stock_id: quote.stock_id,
                shares: 0,
            });
            holding.shares = holding.shares.checked_add(shares).ok_or_else(|| {
                CoreError::Internal(format!("Share count overflow on {}", quote.symbol))
            })?;

            Ok(TradeReceipt {
                side: TradeSide::Buy,
                symbol: quote.symbol.clone(),
                shares_traded: shares,
                price: quote.price,
                total: cost,
                balance: row.account.cash_balance,
                shares_held: holding.shares,
            })
        })?;

        debug!(user = %user_id, symbol = %quote.symbol, shares, cost, "buy committed");
        Ok(receipt)
    }

    /// Sell `amount` whole shares at the quoted price. Selling the last share
    /// removes the holding.
    pub fn sell(&self, user_id: UserId, quote: &Quote, amount: i64) -> Result<TradeReceipt, CoreError> {
        let shares = validate_shares(amount)?;

        let receipt = self.transact(user_id, |row| {
            let owned = match row.holdings.get(&quote.stock_id) {
                Some(h) => h.shares,
                None => {
                    return Err(CoreError::NotOwned {
                        symbol: quote.symbol.clone(),
                    })
                }
            };
            if shares > owned {
                return Err(CoreError::InsufficientShares {
                    shares: owned,
                    requested: shares,
                });
            }

            let proceeds = quote.price * shares as f64;
            row.account.cash_balance += proceeds;

            let remaining = owned - shares;
            if remaining == 0 {
                row.holdings.remove(&quote.stock_id);
            } else if let Some(h) = row.holdings.get_mut(&quote.stock_id) {
                h.shares = remaining;
            }

            Ok(TradeReceipt {
                side: TradeSide::Sell,
                symbol: quote.symbol.clone(),
                shares_traded: shares,
                price: quote.price,
                total: proceeds,
                balance: row.account.cash_balance,
                shares_held: remaining,
            })
        })?;

        debug!(user = %user_id, symbol = %quote.symbol, shares, proceeds = receipt.total, "sell committed");
        Ok(receipt)
    }

    /// Grant the emergency loan to a user who has none and whose portfolio
    /// worth is below the eligibility threshold.
    pub fn take_loan(
        &self,
        user_id: UserId,
        prices: &HashMap<StockId, f64>,
    ) -> Result<LoanGrant, CoreError> {
        let policy = self.loan.clone();
        let grant = self.transact(user_id, |row| {
            if row.account.has_loan {
                return Err(CoreError::LoanAlreadyActive {
                    loan_amount: row.account.loan_amount,
                });
            }
            let worth = row.account.cash_balance + holdings_value(row.holdings.values(), prices);
            if worth >= policy.eligibility_threshold {
                return Err(CoreError::NotEligible {
                    portfolio_worth: worth,
                });
            }

            row.account.has_loan = true;
            row.account.loan_amount = policy.amount_owed();
            row.account.cash_balance += policy.amount;

            Ok(LoanGrant {
                loan_given: policy.amount,
                to_repay: row.account.loan_amount,
                new_balance: row.account.cash_balance,
            })
        })?;

        info!(user = %user_id, to_repay = grant.to_repay, "loan granted");
        Ok(grant)
    }

    /// Report the user's loan position, repaying an outstanding loan first
    /// when the balance has reached the auto-repay threshold.
    pub fn check_loan_status(
        &self,
        user_id: UserId,
        prices: &HashMap<StockId, f64>,
    ) -> Result<LoanStatus, CoreError> {
        let policy = self.loan.clone();
        let status = self.transact(user_id, |row| {
            let mut repaid_amount = None;
            if row.account.has_loan && row.account.cash_balance >= policy.auto_repay_threshold {
                row.account.cash_balance -= row.account.loan_amount;
                repaid_amount = Some(row.account.loan_amount);
                row.account.has_loan = false;
                row.account.loan_amount = 0.0;
            }

            let worth = row.account.cash_balance + holdings_value(row.holdings.values(), prices);
            Ok(LoanStatus {
                has_loan: row.account.has_loan,
                loan_amount: row.account.loan_amount,
                balance: row.account.cash_balance,
                portfolio_worth: worth,
                eligible_for_loan: !row.account.has_loan && worth < policy.eligibility_threshold,
                repaid_amount,
            })
        })?;

        if let Some(amount) = status.repaid_amount {
            info!(user = %user_id, amount, "loan auto-repaid");
        }
        Ok(status)
    }

    /// Unconditionally credit `amount` to a user (admin only).
    pub fn add_money(&self, user_id: UserId, amount: f64) -> Result<Account, CoreError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Amount must be positive, got {amount}"
            )));
        }
        let account = self.transact(user_id, |row| {
            row.account.cash_balance += amount;
            Ok(row.account.clone())
        })?;
        info!(user = %user_id, amount, new_balance = account.cash_balance, "money added");
        Ok(account)
    }
}

/// Validate a requested share count: a whole number, at least 1.
pub fn validate_shares(amount: i64) -> Result<u64, CoreError> {
    if amount < 1 {
        return Err(CoreError::ValidationError(format!(
            "Amount must be at least 1, got {amount}"
        )));
    }
    Ok(amount as u64)
}

/// Market value of holdings at the given prices. Unknown stocks count as 0.
pub fn holdings_value<'a, I>(holdings: I, prices: &HashMap<StockId, f64>) -> f64
where
    I: IntoIterator<Item = &'a Holding>,
{
    holdings
        .into_iter()
        .map(|h| prices.get(&h.stock_id).copied().unwrap_or(0.0) * h.shares as f64)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64) -> Quote {
        Quote {
            stock_id: 1,
            symbol: "CORN".into(),
            price,
        }
    }

    fn ledger_with(balance: f64) -> (Ledger, UserId) {
        let ledger = Ledger::new(LoanPolicy::default());
        let account = ledger.open_account("Ada", "ada@example.com", balance).unwrap();
        (ledger, account.user_id)
    }

    #[test]
    fn validate_shares_rejects_zero_and_negative() {
        assert!(validate_shares(0).is_err());
        assert!(validate_shares(-3).is_err());
        assert_eq!(validate_shares(2).unwrap(), 2);
    }

    #[test]
    fn failed_buy_leaves_row_untouched() {
        let (ledger, user) = ledger_with(10.0);
        ledger.buy(user, &quote(4.0), 2).unwrap();

        let err = ledger.buy(user, &quote(4.0), 1).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { balance, cost } if balance == 2.0 && cost == 4.0));
        assert_eq!(ledger.account(user).unwrap().cash_balance, 2.0);
        assert_eq!(ledger.holdings(user).unwrap()[0].shares, 2);
    }

    #[test]
    fn selling_everything_removes_holding() {
        let (ledger, user) = ledger_with(10.0);
        ledger.buy(user, &quote(5.0), 2).unwrap();
        let receipt = ledger.sell(user, &quote(6.0), 2).unwrap();
        assert_eq!(receipt.shares_held, 0);
        assert_eq!(receipt.balance, 12.0);
        assert!(ledger.holdings(user).unwrap().is_empty());
    }

    #[test]
    fn duplicate_email_rejected() {
        let (ledger, _) = ledger_with(10.0);
        assert!(ledger.open_account("Other", "ADA@example.com", 0.0).is_err());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn restore_rejects_orphan_holdings() {
        let ledger = Ledger::new(LoanPolicy::default());
        let holding = Holding {
            user_id: uuid::Uuid::new_v4(),
            stock_id: 1,
            shares: 3,
        };
        assert!(ledger.restore(vec![], vec![holding]).is_err());
    }

    #[test]
    fn holdings_value_sums_known_prices() {
        let user_id = uuid::Uuid::new_v4();
        let holdings = vec![
            Holding { user_id, stock_id: 1, shares: 2 },
            Holding { user_id, stock_id: 2, shares: 3 },
            Holding { user_id, stock_id: 9, shares: 100 },
        ];
        let prices = HashMap::from([(1, 1.5), (2, 2.0)]);
        assert_eq!(holdings_value(&holdings, &prices), 9.0);
    }
}
