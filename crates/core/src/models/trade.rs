use serde::{Deserialize, Serialize};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "Buy"),
            TradeSide::Sell => write!(f, "Sell"),
        }
    }
}

/// Committed state after a successful buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub symbol: String,

    /// Shares bought or sold by this trade
    pub shares_traded: u64,

    /// Price per share used for the whole transaction
    pub price: f64,

    /// Cost (buy) or proceeds (sell)
    pub total: f64,

    /// Cash balance after commit
    pub balance: f64,

    /// Shares held after commit; 0 means the holding was removed
    pub shares_held: u64,
}

/// A granted emergency loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanGrant {
    pub loan_given: f64,
    pub to_repay: f64,
    pub new_balance: f64,
}

/// Loan position as seen on a status check.
///
/// Auto-repayment happens lazily here: an outstanding loan is settled the
/// first time status is checked with a balance at or above the repay
/// threshold. A user who never checks status is never debited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanStatus {
    pub has_loan: bool,

    /// Amount still owed (0.0 without a loan)
    pub loan_amount: f64,

    pub balance: f64,
    pub portfolio_worth: f64,
    pub eligible_for_loan: bool,

    /// Set when this check repaid the loan
    pub repaid_amount: Option<f64>,
}
