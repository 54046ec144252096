use serde::{Deserialize, Serialize};

use super::account::UserId;

/// One ranked row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    pub user_id: UserId,
    pub name: String,
    pub balance: f64,

    /// Σ shares × current price
    pub holdings_value: f64,

    /// balance + holdings_value
    pub portfolio_worth: f64,
}
