use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::models::account::{Account, Holding};
use crate::models::config::MarketConfig;
use crate::models::event::{MarketEvent, MarketEventApplication};
use crate::models::history::PriceHistoryEntry;
use crate::models::stock::Stock;

use super::format;

/// Everything needed to rebuild a market: configuration, stocks, price
/// history, the event catalog, applied events, and all accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub config: MarketConfig,
    pub stocks: Vec<Stock>,
    pub history: Vec<PriceHistoryEntry>,
    pub events: Vec<MarketEvent>,
    pub applications: Vec<MarketEventApplication>,
    pub accounts: Vec<Account>,
    pub holdings: Vec<Holding>,
    /// Seed the reloaded RNG starts from. `None` for unseeded markets, which
    /// draw fresh OS entropy on load.
    pub rng_resume_seed: Option<u64>,
}

/// High-level storage operations: snapshot to/from bytes or files.
pub struct SnapshotManager;

impl SnapshotManager {
    /// Serialize a snapshot to framed bytes.
    ///
    /// Flow: MarketSnapshot → bincode → SMKT format bytes
    pub fn save_to_bytes(snapshot: &MarketSnapshot) -> Result<Vec<u8>, CoreError> {
        let payload = bincode::serialize(snapshot)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize market: {e}")))?;
        Ok(format::write_file(format::CURRENT_VERSION, &payload))
    }

    /// Parse framed bytes back into a snapshot.
    ///
    /// Flow: SMKT bytes → validate header → bincode → MarketSnapshot
    pub fn load_from_bytes(data: &[u8]) -> Result<MarketSnapshot, CoreError> {
        let (_header, payload) = format::read_file(data)?;
        bincode::deserialize(payload)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize market: {e}")))
    }

    pub fn save_to_file(snapshot: &MarketSnapshot, path: &str) -> Result<(), CoreError> {
        let bytes = Self::save_to_bytes(snapshot)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<MarketSnapshot, CoreError> {
        let bytes = std::fs::read(path)?;
        Self::load_from_bytes(&bytes)
    }
}
