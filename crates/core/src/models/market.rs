use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{EventId, ImpactLevel, MarketEvent, MarketWideKind};
use super::stock::StockId;

/// One entry of the scrolling ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerItem {
    pub symbol: String,

    /// Price rounded to cents
    pub price: f64,

    /// `1` up, `-1` down, `0` unchanged or unknown
    pub direction: i8,
}

/// A stock as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockListing {
    pub id: StockId,
    pub name: String,
    pub symbol: String,
    pub price: f64,
}

/// A single stock with the time of its latest recorded price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDetail {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// A point on a stock's price chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Result of one price mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub old_price: f64,
    pub new_price: f64,
}

/// A catalog event that was applied to a stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub application_id: Uuid,
    pub event_id: EventId,
    pub text: String,
    pub rendered_text: String,
    pub impact_level: ImpactLevel,
    pub symbol: String,
    pub old_price: f64,
    pub new_price: f64,
}

/// Result of a boom or crisis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketWideOutcome {
    pub kind: MarketWideKind,
    pub event_name: String,
    pub stocks_affected: usize,
    pub updates: Vec<PriceUpdate>,
}

/// The most recent event application, ready for the news feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestEvent {
    pub application_id: Uuid,
    pub event: MarketEvent,

    /// Event text with `{company}` replaced by the escaped stock name
    pub rendered_text: String,

    pub created_at: DateTime<Utc>,
    pub stock: StockListing,
}
