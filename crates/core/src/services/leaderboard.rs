use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::account::{Account, Holding};
use crate::models::leaderboard::LeaderboardEntry;
use crate::models::stock::StockId;
use crate::services::ledger::holdings_value;

/// Ranks accounts by portfolio worth. Stateless; reads only what it is given.
pub struct LeaderboardService;

impl LeaderboardService {
    pub fn new() -> Self {
        Self
    }

    /// Rank `rows` by `cash + Σ shares × price`, highest first, keeping at
    /// most `limit` entries. Equal worths keep their input order.
    pub fn rank(
        &self,
        rows: &[(Account, Vec<Holding>)],
        prices: &HashMap<StockId, f64>,
        limit: usize,
    ) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = rows
            .iter()
            .map(|(account, holdings)| {
                let value = holdings_value(holdings, prices);
                LeaderboardEntry {
                    rank: 0,
                    user_id: account.user_id,
                    name: account.display_name().to_string(),
                    balance: account.cash_balance,
                    holdings_value: value,
                    portfolio_worth: account.cash_balance + value,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.portfolio_worth
                .partial_cmp(&a.portfolio_worth)
                .unwrap_or(Ordering::Equal)
        });
        entries.truncate(limit);
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        entries
    }
}

impl Default for LeaderboardService {
    fn default() -> Self {
        Self::new()
    }
}
