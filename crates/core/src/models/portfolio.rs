use serde::{Deserialize, Serialize};

use super::account::UserId;

/// One line of a user's portfolio page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub shares: u64,

    /// price × shares, rounded to cents
    pub total: f64,

    pub direction: i8,
}

/// A user's cash, positions and total worth. Monetary values are rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioView {
    pub user_id: UserId,
    pub name: String,
    pub balance: f64,
    pub holdings: Vec<PortfolioHolding>,
    pub stocks_total: f64,
    pub portfolio_worth: f64,
}

/// Admin listing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub balance: f64,
}
