use std::collections::HashSet;

use rand::Rng;

use crate::errors::CoreError;
use crate::models::config::TierWeights;
use crate::models::event::{EventId, ImpactLevel, MarketEvent, MarketWideKind};
use crate::models::stock::floor_price;

/// Events hit harder than ordinary ticks by this factor.
pub const EVENT_AMPLIFICATION: f64 = 1.2;

/// Range of the independent per-stock impact of a boom or crisis.
pub const MARKET_WIDE_IMPACT: (f64, f64) = (0.25, 0.50);

const DEFAULT_EVENTS_JSON: &str = include_str!("../../fixtures/market_events.json");

/// Fixed set of market event templates, grouped by impact tier.
///
/// Selection is two-stage: a weighted roll picks the tier, then an event is
/// drawn uniformly within it. Picking the target stock is the caller's job.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    events: Vec<MarketEvent>,
}

impl EventCatalog {
    /// Build a catalog, rejecting malformed entries.
    pub fn new(events: Vec<MarketEvent>) -> Result<Self, CoreError> {
        let mut seen: HashSet<EventId> = HashSet::new();
        for event in &events {
            if !seen.insert(event.id) {
                return Err(CoreError::Config(format!(
                    "Duplicate market event id {}",
                    event.id
                )));
            }
            if event.text.trim().is_empty() {
                return Err(CoreError::Config(format!(
                    "Market event {} has no text",
                    event.id
                )));
            }
            if !event.impact_low.is_finite()
                || !event.impact_high.is_finite()
                || event.impact_low > event.impact_high
            {
                return Err(CoreError::Config(format!(
                    "Market event {} has an invalid impact range [{}, {}]",
                    event.id, event.impact_low, event.impact_high
                )));
            }
        }
        Ok(Self { events })
    }

    /// Parse a catalog from a JSON array of events.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let events: Vec<MarketEvent> = serde_json::from_str(json)?;
        Self::new(events)
    }

    /// The built-in catalog shipped with the crate.
    pub fn default_catalog() -> Result<Self, CoreError> {
        Self::from_json(DEFAULT_EVENTS_JSON)
    }

    #[must_use]
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    #[must_use]
    pub fn get(&self, id: EventId) -> Option<&MarketEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Events of one tier, in catalog order.
    #[must_use]
    pub fn in_tier(&self, level: ImpactLevel) -> Vec<&MarketEvent> {
        self.events
            .iter()
            .filter(|e| e.impact_level == level)
            .collect()
    }

    /// Weighted roll for a tier.
    pub fn roll_tier<R: Rng + ?Sized>(&self, weights: &TierWeights, rng: &mut R) -> ImpactLevel {
        let total = weights.total();
        if total <= 0.0 {
            return ImpactLevel::Minor;
        }
        weights.pick(rng.random_range(0.0..total))
    }

    /// Uniformly pick one event of `level`. An empty tier is a configuration
    /// error, never silently replaced by another tier.
    pub fn pick_in_tier<R: Rng + ?Sized>(
        &self,
        level: ImpactLevel,
        rng: &mut R,
    ) -> Result<&MarketEvent, CoreError> {
        let tier = self.in_tier(level);
        if tier.is_empty() {
            return Err(CoreError::EmptyTier(level));
        }
        Ok(tier[rng.random_range(0..tier.len())])
    }

    /// Roll a tier, then pick an event within it.
    pub fn select<R: Rng + ?Sized>(
        &self,
        weights: &TierWeights,
        rng: &mut R,
    ) -> Result<&MarketEvent, CoreError> {
        let level = self.roll_tier(weights, rng);
        self.pick_in_tier(level, rng)
    }

    /// Price after `event` hits a stock trading at `price`.
    pub fn impact_price<R: Rng + ?Sized>(&self, event: &MarketEvent, price: f64, rng: &mut R) -> f64 {
        let impact = rng.random_range(event.impact_low..=event.impact_high);
        floor_price(price * (1.0 + EVENT_AMPLIFICATION * impact))
    }

    /// Price after a boom or crisis hits a stock trading at `price`.
    pub fn market_wide_price<R: Rng + ?Sized>(&self, kind: MarketWideKind, price: f64, rng: &mut R) -> f64 {
        let impact = rng.random_range(MARKET_WIDE_IMPACT.0..=MARKET_WIDE_IMPACT.1);
        match kind {
            MarketWideKind::Boom => floor_price(price * (1.0 + impact)),
            MarketWideKind::Crisis => floor_price(price * (1.0 - impact)),
        }
    }
}
