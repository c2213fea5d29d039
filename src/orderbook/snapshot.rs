//! A serializable view of the book's committed state.

use super::error::OrderBookError;
use super::types::OrderId;
use serde::Serialize;

/// One aggregated price level in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthLevel {
    /// Level price.
    pub price: f64,
    /// Total resting size at the level.
    pub size: u64,
}

/// Scalar state plus per-side depth, captured under one read lock so the
/// numbers are mutually consistent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookSnapshot {
    /// Inside bid price, if any buy limit rests.
    pub bid_price: Option<f64>,
    /// Inside ask price, if any sell limit rests.
    pub ask_price: Option<f64>,
    /// Price of the most recent trade (the construction center before any
    /// trade).
    pub last_price: f64,
    /// Size of the most recent trade.
    pub last_size: u64,
    /// Total resting buy size.
    pub total_bid_size: u64,
    /// Total resting sell size.
    pub total_ask_size: u64,
    /// Cumulative traded volume.
    pub volume: u64,
    /// Most recently assigned order id.
    pub last_id: OrderId,
    /// Bid levels, inside outward.
    pub bids: Vec<DepthLevel>,
    /// Ask levels, inside outward.
    pub asks: Vec<DepthLevel>,
}

impl OrderBookSnapshot {
    /// Serialize the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, OrderBookError> {
        serde_json::to_string(self).map_err(|error| OrderBookError::Serialization {
            message: error.to_string(),
        })
    }
}
