use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stock::StockId;

/// Identifier of a trading user.
pub type UserId = Uuid;

/// A user's cash account. Mutated only inside ledger transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,

    /// Full name shown on the leaderboard
    pub name: String,

    /// Login email, unique across accounts
    pub email: String,

    pub cash_balance: f64,

    pub has_loan: bool,

    /// Amount owed, fee included; 0.0 when no loan is active
    pub loan_amount: f64,
}

impl Account {
    pub fn new(name: impl Into<String>, email: impl Into<String>, cash_balance: f64) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            name: name.into(),
            email: email.into().trim().to_lowercase(),
            cash_balance,
            has_loan: false,
            loan_amount: 0.0,
        }
    }

    /// Name for display, falling back to the email when no name is set.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// A user's position in one stock. Unique per (user, stock); never stored
/// with zero shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: UserId,
    pub stock_id: StockId,
    pub shares: u64,
}
