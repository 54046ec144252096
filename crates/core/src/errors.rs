use thiserror::Error;

use crate::models::event::ImpactLevel;

/// Unified error type for the entire stock-market-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input ───────────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Stock not found: {0}")]
    StockNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("No stocks available")]
    NoStocks,

    // ── Business Rules ──────────────────────────────────────────────
    #[error("Insufficient funds: balance {balance:.2}, cost {cost:.2}")]
    InsufficientFunds { balance: f64, cost: f64 },

    #[error("Cannot sell {requested} shares, only {shares} owned")]
    InsufficientShares { shares: u64, requested: u64 },

    #[error("You do not own any shares of {symbol}")]
    NotOwned { symbol: String },

    #[error("Loan already active ({loan_amount:.2} outstanding)")]
    LoanAlreadyActive { loan_amount: f64 },

    #[error("Not eligible for a loan: portfolio worth {portfolio_worth:.2}")]
    NotEligible { portfolio_worth: f64 },

    // ── Configuration ───────────────────────────────────────────────
    #[error("No market events configured for impact level: {0}")]
    EmptyTier(ImpactLevel),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Storage / File ──────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── Faults ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for rejections caused by the account's state rather than bad
    /// input or a fault. The transaction was rolled back and nothing changed.
    #[must_use]
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientFunds { .. }
                | CoreError::InsufficientShares { .. }
                | CoreError::NotOwned { .. }
                | CoreError::LoanAlreadyActive { .. }
                | CoreError::NotEligible { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}
