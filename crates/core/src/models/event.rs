use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

use super::stock::StockId;

/// Identifier of a catalog event.
pub type EventId = u64;

/// Placeholder in event text replaced with the affected company's name.
pub const COMPANY_PLACEHOLDER: &str = "{company}";

/// Severity bucket used to weight event selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Minor,
    Moderate,
    Major,
    Severe,
}

impl ImpactLevel {
    /// All tiers, from most to least severe (the order rolls are resolved in).
    pub const ALL: [ImpactLevel; 4] = [
        ImpactLevel::Severe,
        ImpactLevel::Major,
        ImpactLevel::Moderate,
        ImpactLevel::Minor,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Minor => "minor",
            ImpactLevel::Moderate => "moderate",
            ImpactLevel::Major => "major",
            ImpactLevel::Severe => "severe",
        }
    }

    /// Human-readable label used by admin tooling.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ImpactLevel::Minor => "Slightly",
            ImpactLevel::Moderate => "Moderately",
            ImpactLevel::Major => "Significantly",
            ImpactLevel::Severe => "Severely",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImpactLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minor" => Ok(ImpactLevel::Minor),
            "moderate" => Ok(ImpactLevel::Moderate),
            "major" => Ok(ImpactLevel::Major),
            "severe" => Ok(ImpactLevel::Severe),
            other => Err(CoreError::ValidationError(format!(
                "Invalid impact level '{other}': expected minor, moderate, major or severe"
            ))),
        }
    }
}

/// A market event template. Static catalog data, never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: EventId,

    /// Headline, may embed the `{company}` placeholder
    pub text: String,

    pub impact_level: ImpactLevel,

    /// Lower bound of the relative impact (e.g. -0.5 = -50%)
    pub impact_low: f64,

    /// Upper bound of the relative impact
    pub impact_high: f64,
}

impl MarketEvent {
    /// Headline with `{company}` replaced by the HTML-escaped company name.
    #[must_use]
    pub fn render(&self, company: &str) -> String {
        self.text.replace(COMPANY_PLACEHOLDER, &escape_html(company))
    }
}

impl std::fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Impact: {} - {})",
            self.text, self.impact_low, self.impact_high
        )
    }
}

/// Audit record: this event hit this stock at this time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEventApplication {
    pub id: Uuid,
    pub event_id: EventId,
    pub stock_id: StockId,
    pub created_at: DateTime<Utc>,
}

impl MarketEventApplication {
    pub fn new(event_id: EventId, stock_id: StockId) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            stock_id,
            created_at: Utc::now(),
        }
    }
}

/// Market-wide shock applied to every stock at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketWideKind {
    Boom,
    Crisis,
}

impl MarketWideKind {
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            MarketWideKind::Boom => "Golden Peel Boom",
            MarketWideKind::Crisis => "Bruised Peel Crisis",
        }
    }
}

impl std::fmt::Display for MarketWideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketWideKind::Boom => write!(f, "boom"),
            MarketWideKind::Crisis => write!(f, "crisis"),
        }
    }
}

impl std::str::FromStr for MarketWideKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "boom" => Ok(MarketWideKind::Boom),
            "crisis" => Ok(MarketWideKind::Crisis),
            other => Err(CoreError::ValidationError(format!(
                "Invalid event type '{other}': use \"boom\" or \"crisis\""
            ))),
        }
    }
}

/// Escape text for embedding in HTML (`& < > " '`).
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
