use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stock::StockId;

/// One row of a stock's append-only price log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub stock_id: StockId,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceHistoryEntry {
    pub fn new(stock_id: StockId, price: f64) -> Self {
        Self {
            stock_id,
            price,
            timestamp: Utc::now(),
        }
    }
}

/// Price direction from a newest-first slice of history:
/// `1` up, `-1` down, `0` unchanged or fewer than two entries.
#[must_use]
pub fn direction(newest_first: &[PriceHistoryEntry]) -> i8 {
    match newest_first {
        [latest, previous, ..] if latest.price > previous.price => 1,
        [latest, previous, ..] if latest.price < previous.price => -1,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(price: f64) -> PriceHistoryEntry {
        PriceHistoryEntry::new(1, price)
    }

    #[test]
    fn direction_needs_two_entries() {
        assert_eq!(direction(&[]), 0);
        assert_eq!(direction(&[entry(5.0)]), 0);
    }

    #[test]
    fn direction_compares_newest_with_second_newest() {
        assert_eq!(direction(&[entry(6.0), entry(5.0), entry(9.0)]), 1);
        assert_eq!(direction(&[entry(4.0), entry(5.0)]), -1);
        assert_eq!(direction(&[entry(5.0), entry(5.0)]), 0);
    }
}
