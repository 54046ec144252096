use rand::Rng;

use crate::models::stock::{floor_price, Stock};

/// Price every stock is pulled towards.
pub const TARGET_PRICE: f64 = 10.0;

/// Pull strength applied below the target (fast recovery from crashes).
pub const UPWARD_STRENGTH: f64 = 0.10;

/// Resistance applied above the target (winners are only gently held back).
pub const DOWNWARD_STRENGTH: f64 = 0.03;

/// Range the symmetric volatility magnitude is drawn from.
pub const VOLATILITY_RANGE: (f64, f64) = (0.05, 0.15);

/// Mean-reverting random walk that drives every scheduled tick.
///
/// Pure: it computes the next price from the current one and never touches
/// history. Persisting the result is the caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceModel;

impl PriceModel {
    pub fn new() -> Self {
        Self
    }

    /// (Re)initialize the stock's volatility bounds when they are unset or
    /// asymmetric. Returns the bounds in effect.
    pub fn ensure_volatility<R: Rng + ?Sized>(&self, stock: &mut Stock, rng: &mut R) -> (f64, f64) {
        if let Some(bounds) = stock.symmetric_volatility() {
            return bounds;
        }
        let base = rng.random_range(VOLATILITY_RANGE.0..=VOLATILITY_RANGE.1);
        stock.volatility_min = Some(-base);
        stock.volatility_max = Some(base);
        (-base, base)
    }

    /// Asymmetric pull towards [`TARGET_PRICE`].
    #[must_use]
    pub fn reversion(&self, price: f64) -> f64 {
        if price < TARGET_PRICE {
            UPWARD_STRENGTH * ((TARGET_PRICE - price) / TARGET_PRICE)
        } else {
            -DOWNWARD_STRENGTH * ((price - TARGET_PRICE) / TARGET_PRICE)
        }
    }

    /// Price after applying a given random change, floored.
    #[must_use]
    pub fn apply_change(&self, price: f64, random_change: f64) -> f64 {
        floor_price(price * (1.0 + random_change + self.reversion(price)))
    }

    /// Compute the next price for `stock`. May initialize volatility on the
    /// stock as a side effect; does not write the price.
    pub fn next_price<R: Rng + ?Sized>(&self, stock: &mut Stock, rng: &mut R) -> f64 {
        let (min, max) = self.ensure_volatility(stock, rng);
        let random_change = rng.random_range(min..=max);
        self.apply_change(stock.price, random_change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stock::PRICE_FLOOR;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn reversion_is_asymmetric() {
        let model = PriceModel::new();
        // 5.0 is 50% below target: +0.10 * 0.5
        assert!((model.reversion(5.0) - 0.05).abs() < 1e-12);
        // 15.0 is 50% above target: -0.03 * 0.5
        assert!((model.reversion(15.0) + 0.015).abs() < 1e-12);
        assert_eq!(model.reversion(TARGET_PRICE), 0.0);
    }

    #[test]
    fn apply_change_respects_floor() {
        let model = PriceModel::new();
        assert!(model.apply_change(0.1, -0.15) >= PRICE_FLOOR);
        assert_eq!(model.apply_change(0.05, -1.5), PRICE_FLOOR);
    }

    #[test]
    fn volatility_initialized_symmetric_within_range() {
        let model = PriceModel::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stock = Stock::new(1, "Corn", "CORN", 10.0);
        stock.volatility_min = Some(-0.2);
        stock.volatility_max = Some(0.05);

        let (min, max) = model.ensure_volatility(&mut stock, &mut rng);
        assert_eq!(min, -max);
        assert!((0.05..=0.15).contains(&max));
        assert_eq!(stock.symmetric_volatility(), Some((min, max)));
    }

    #[test]
    fn existing_symmetric_volatility_is_kept() {
        let model = PriceModel::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut stock = Stock::new(1, "Corn", "CORN", 10.0);
        stock.volatility_min = Some(-0.07);
        stock.volatility_max = Some(0.07);
        assert_eq!(model.ensure_volatility(&mut stock, &mut rng), (-0.07, 0.07));
    }

    #[test]
    fn next_price_stays_within_one_step_bounds() {
        let model = PriceModel::new();
        let mut rng = StdRng::seed_from_u64(11);
        let mut stock = Stock::new(1, "Corn", "CORN", 20.0);
        stock.volatility_min = Some(-0.1);
        stock.volatility_max = Some(0.1);
        let reversion = model.reversion(20.0);
        for _ in 0..200 {
            let p = model.next_price(&mut stock, &mut rng);
            assert!(p >= 20.0 * (1.0 - 0.1 + reversion) - 1e-9);
            assert!(p <= 20.0 * (1.0 + 0.1 + reversion) + 1e-9);
        }
    }

    #[test]
    fn same_seed_same_walk() {
        let model = PriceModel::new();
        let walk = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut stock = Stock::new(1, "Corn", "CORN", 10.0);
            (0..50)
                .map(|_| {
                    stock.price = model.next_price(&mut stock, &mut rng);
                    stock.price
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(walk(42), walk(42));
    }
}
