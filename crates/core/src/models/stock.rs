use serde::{Deserialize, Serialize};

/// Identifier of a listed stock, assigned sequentially at listing time.
pub type StockId = u64;

/// Lowest price any stock may ever trade at.
pub const PRICE_FLOOR: f64 = 0.1;

/// Clamp a candidate price to [`PRICE_FLOOR`]. NaN collapses to the floor.
#[must_use]
pub fn floor_price(price: f64) -> f64 {
    price.max(PRICE_FLOOR)
}

/// Round a monetary value to cents for display.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A simulated instrument.
///
/// Created at seed time, mutated only by price writers (ticks, events,
/// admin overrides), never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,

    /// Display name, e.g. "Corn Collective"
    pub name: String,

    /// Ticker symbol, uppercased and unique across the market
    pub symbol: String,

    /// Current price, always >= [`PRICE_FLOOR`]
    pub price: f64,

    /// Lower bound of the per-tick random change (negative)
    pub volatility_min: Option<f64>,

    /// Upper bound of the per-tick random change
    pub volatility_max: Option<f64>,
}

impl Stock {
    pub fn new(id: StockId, name: impl Into<String>, symbol: impl Into<String>, price: f64) -> Self {
        Self {
            id,
            name: name.into(),
            symbol: symbol.into().trim().to_uppercase(),
            price: floor_price(price),
            volatility_min: None,
            volatility_max: None,
        }
    }

    /// Volatility bounds as a pair, if they are set and mirror each other.
    #[must_use]
    pub fn symmetric_volatility(&self) -> Option<(f64, f64)> {
        match (self.volatility_min, self.volatility_max) {
            (Some(min), Some(max)) if min == -max => Some((min, max)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Stock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {:.2}", self.name, self.symbol, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uppercases_symbol_and_floors_price() {
        let stock = Stock::new(1, "Corn Collective", " corn ", 0.0);
        assert_eq!(stock.symbol, "CORN");
        assert_eq!(stock.price, PRICE_FLOOR);
        assert!(stock.symmetric_volatility().is_none());
    }

    #[test]
    fn asymmetric_bounds_are_not_symmetric() {
        let mut stock = Stock::new(1, "Corn", "CORN", 10.0);
        stock.volatility_min = Some(-0.1);
        stock.volatility_max = Some(0.12);
        assert!(stock.symmetric_volatility().is_none());
        stock.volatility_max = Some(0.1);
        assert_eq!(stock.symmetric_volatility(), Some((-0.1, 0.1)));
    }

    #[test]
    fn nan_price_collapses_to_floor() {
        assert_eq!(floor_price(f64::NAN), PRICE_FLOOR);
        assert_eq!(floor_price(-4.0), PRICE_FLOOR);
        assert_eq!(floor_price(12.5), 12.5);
    }

    #[test]
    fn round_cents_rounds_half_away() {
        assert_eq!(round_cents(10.005_1), 10.01);
        assert_eq!(round_cents(3.333), 3.33);
    }
}
