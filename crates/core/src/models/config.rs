use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

use super::event::ImpactLevel;

/// Relative weights of each impact tier when rolling for a random event.
/// Values are percentages by convention but only their ratios matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierWeights {
    pub severe: f64,
    pub major: f64,
    pub moderate: f64,
    pub minor: f64,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            severe: 4.0,
            major: 11.0,
            moderate: 25.0,
            minor: 60.0,
        }
    }
}

impl TierWeights {
    #[must_use]
    pub fn weight(&self, level: ImpactLevel) -> f64 {
        match level {
            ImpactLevel::Severe => self.severe,
            ImpactLevel::Major => self.major,
            ImpactLevel::Moderate => self.moderate,
            ImpactLevel::Minor => self.minor,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        ImpactLevel::ALL.iter().map(|l| self.weight(*l)).sum()
    }

    /// Resolve a roll in `[0, total)` to a tier, most severe first.
    #[must_use]
    pub fn pick(&self, roll: f64) -> ImpactLevel {
        let mut cumulative = 0.0;
        for level in ImpactLevel::ALL {
            cumulative += self.weight(level);
            if roll < cumulative {
                return level;
            }
        }
        ImpactLevel::Minor
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for level in ImpactLevel::ALL {
            let w = self.weight(level);
            if !w.is_finite() || w < 0.0 {
                return Err(CoreError::Config(format!(
                    "Tier weight for {level} must be a non-negative number, got {w}"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(CoreError::Config(
                "At least one tier weight must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Emergency loan terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPolicy {
    /// Cash credited when a loan is granted
    pub amount: f64,

    /// Multiplier applied to `amount` to get what is owed
    pub fee_multiplier: f64,

    /// Portfolio worth must be strictly below this to qualify
    pub eligibility_threshold: f64,

    /// Balance at which an outstanding loan is repaid on the next status check
    pub auto_repay_threshold: f64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            amount: 20.0,
            fee_multiplier: 1.25,
            eligibility_threshold: 3.0,
            auto_repay_threshold: 50.0,
        }
    }
}

impl LoanPolicy {
    /// What a freshly granted loan must pay back.
    #[must_use]
    pub fn amount_owed(&self) -> f64 {
        self.amount * self.fee_multiplier
    }
}

/// Market-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Weighted roll for random event tiers
    #[serde(default)]
    pub tier_weights: TierWeights,

    /// History rows kept per stock; older rows are evicted on every price write
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,

    /// Number of users shown on the leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    #[serde(default)]
    pub loan: LoanPolicy,

    /// Cash credited to newly opened accounts
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,

    /// Seed for the price/event RNG. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_history_retention() -> usize {
    1000
}

fn default_leaderboard_size() -> usize {
    25
}

fn default_starting_balance() -> f64 {
    100.0
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            tier_weights: TierWeights::default(),
            history_retention: default_history_retention(),
            leaderboard_size: default_leaderboard_size(),
            loan: LoanPolicy::default(),
            starting_balance: default_starting_balance(),
            seed: None,
        }
    }
}

impl MarketConfig {
    /// Default configuration with a fixed RNG seed (reproducible runs).
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: MarketConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.tier_weights.validate()?;
        if self.history_retention == 0 {
            return Err(CoreError::Config(
                "history_retention must be at least 1".into(),
            ));
        }
        if self.leaderboard_size == 0 {
            return Err(CoreError::Config(
                "leaderboard_size must be at least 1".into(),
            ));
        }
        let loan = &self.loan;
        if !loan.amount.is_finite()
            || loan.amount <= 0.0
            || !loan.fee_multiplier.is_finite()
            || loan.fee_multiplier < 1.0
        {
            return Err(CoreError::Config(format!(
                "Loan amount must be positive and fee multiplier at least 1 (got {} x {})",
                loan.amount, loan.fee_multiplier
            )));
        }
        if !loan.eligibility_threshold.is_finite() || !loan.auto_repay_threshold.is_finite() {
            return Err(CoreError::Config("Loan thresholds must be finite".into()));
        }
        if !self.starting_balance.is_finite() || self.starting_balance < 0.0 {
            return Err(CoreError::Config(format!(
                "starting_balance must be a non-negative number, got {}",
                self.starting_balance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_walks_tiers_most_severe_first() {
        let w = TierWeights::default();
        assert_eq!(w.pick(0.0), ImpactLevel::Severe);
        assert_eq!(w.pick(3.99), ImpactLevel::Severe);
        assert_eq!(w.pick(4.0), ImpactLevel::Major);
        assert_eq!(w.pick(14.99), ImpactLevel::Major);
        assert_eq!(w.pick(15.0), ImpactLevel::Moderate);
        assert_eq!(w.pick(39.99), ImpactLevel::Moderate);
        assert_eq!(w.pick(40.0), ImpactLevel::Minor);
        assert_eq!(w.pick(99.99), ImpactLevel::Minor);
    }

    #[test]
    fn zero_weight_tier_is_never_picked() {
        let w = TierWeights {
            severe: 0.0,
            major: 0.0,
            moderate: 0.0,
            minor: 1.0,
        };
        assert_eq!(w.pick(0.0), ImpactLevel::Minor);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = MarketConfig::from_json(r#"{"history_retention": 500, "seed": 7}"#).unwrap();
        assert_eq!(config.history_retention, 500);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.tier_weights, TierWeights::default());
        assert_eq!(config.loan.amount, 20.0);
    }

    #[test]
    fn rejects_zero_retention_and_empty_weights() {
        assert!(MarketConfig::from_json(r#"{"history_retention": 0}"#).is_err());
        let json = r#"{"tier_weights": {"severe": 0, "major": 0, "moderate": 0, "minor": 0}}"#;
        assert!(matches!(
            MarketConfig::from_json(json),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn loan_owed_includes_fee() {
        assert_eq!(LoanPolicy::default().amount_owed(), 25.0);
    }
}
