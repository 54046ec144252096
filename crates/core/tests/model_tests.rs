// ═══════════════════════════════════════════════════════════════════
// Model Tests: Stock, Account, MarketEvent, MarketConfig
// ═══════════════════════════════════════════════════════════════════

use stock_market_core::errors::CoreError;
use stock_market_core::models::account::Account;
use stock_market_core::models::config::{MarketConfig, TierWeights};
use stock_market_core::models::event::{ImpactLevel, MarketEvent, MarketWideKind};
use stock_market_core::models::stock::{floor_price, round_cents, Stock, PRICE_FLOOR};

// ═══════════════════════════════════════════════════════════════════
// Stock
// ═══════════════════════════════════════════════════════════════════

mod stock {
    use super::*;

    #[test]
    fn new_stock_has_no_volatility_yet() {
        let s = Stock::new(1, "Corn Collective", " corn ", 10.0);
        assert_eq!(s.symbol, "CORN");
        assert!(s.volatility_min.is_none());
        assert!(s.symmetric_volatility().is_none());
    }

    #[test]
    fn floor_and_rounding_helpers() {
        assert_eq!(floor_price(-5.0), PRICE_FLOOR);
        assert_eq!(floor_price(0.35), 0.35);
        assert_eq!(round_cents(12.345_6), 12.35);
    }

    #[test]
    fn serde_json_round_trip() {
        let mut s = Stock::new(3, "Rye", "RYE", 4.2);
        s.volatility_min = Some(-0.1);
        s.volatility_max = Some(0.1);
        let json = serde_json::to_string(&s).unwrap();
        let back: Stock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Account
// ═══════════════════════════════════════════════════════════════════

mod account {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let a = Account::new("Ada", "  Ada@Example.COM ", 100.0);
        assert_eq!(a.email, "ada@example.com");
        assert!(!a.has_loan);
        assert_eq!(a.loan_amount, 0.0);
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let a = Account::new("  ", "ghost@example.com", 0.0);
        assert_eq!(a.display_name(), "ghost@example.com");
    }

    #[test]
    fn ids_are_unique() {
        let a = Account::new("A", "a@example.com", 0.0);
        let b = Account::new("A", "a@example.com", 0.0);
        assert_ne!(a.user_id, b.user_id);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Market Events
// ═══════════════════════════════════════════════════════════════════

mod market_event {
    use super::*;

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "id": 7,
            "text": "{company} wins the county fair",
            "impact_level": "moderate",
            "impact_low": 0.25,
            "impact_high": 0.35
        }"#;
        let event: MarketEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.impact_level, ImpactLevel::Moderate);
        assert_eq!(event.render("Corn"), "Corn wins the county fair");
    }

    #[test]
    fn unknown_level_is_rejected() {
        let json = r#"{"id":1,"text":"x","impact_level":"apocalyptic","impact_low":0,"impact_high":1}"#;
        assert!(serde_json::from_str::<MarketEvent>(json).is_err());
    }

    #[test]
    fn labels() {
        assert_eq!(ImpactLevel::Major.label(), "Significantly");
        assert_eq!(ImpactLevel::Minor.to_string(), "minor");
        assert_eq!(MarketWideKind::Crisis.display_name(), "Bruised Peel Crisis");
    }
}

// ═══════════════════════════════════════════════════════════════════
// MarketConfig
// ═══════════════════════════════════════════════════════════════════

mod market_config {
    use super::*;

    #[test]
    fn defaults() {
        let c = MarketConfig::default();
        assert_eq!(c.history_retention, 1000);
        assert_eq!(c.leaderboard_size, 25);
        assert_eq!(c.starting_balance, 100.0);
        assert_eq!(c.loan.amount, 20.0);
        assert_eq!(c.loan.amount_owed(), 25.0);
        assert_eq!(c.tier_weights.total(), 100.0);
        assert!(c.seed.is_none());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let c = MarketConfig::from_json(r#"{"history_retention": 50, "seed": 9}"#).unwrap();
        assert_eq!(c.history_retention, 50);
        assert_eq!(c.seed, Some(9));
        assert_eq!(c.leaderboard_size, 25);
    }

    #[test]
    fn zero_retention_rejected() {
        match MarketConfig::from_json(r#"{"history_retention": 0}"#).unwrap_err() {
            CoreError::Config(msg) => assert!(msg.contains("history_retention")),
            other => panic!("Expected Config, got {:?}", other),
        }
    }

    #[test]
    fn all_zero_weights_rejected() {
        let c = MarketConfig {
            tier_weights: TierWeights {
                severe: 0.0,
                major: 0.0,
                moderate: 0.0,
                minor: 0.0,
            },
            ..MarketConfig::default()
        };
        assert!(matches!(c.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            MarketConfig::from_json("{"),
            Err(CoreError::Deserialization(_))
        ));
    }
}
