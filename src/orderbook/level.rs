//! A single price level: the FIFO chain of resting limit orders plus the
//! bag of stop orders waiting to trigger at this tick.
//!
//! Both chains are keyed by order id. Ids are assigned monotonically, so
//! iteration order over the limit chain is insertion order, which is exactly
//! the time priority the matcher needs, while cancels by id stay O(log n).

use super::types::{ExecTarget, OrderId, Side};
use std::collections::BTreeMap;

/// A resting limit order: remaining size plus the execution callback that
/// travels with it until the order is consumed.
#[derive(Clone)]
pub(crate) struct LimitEntry {
    pub side: Side,
    pub size: u64,
    pub exec: ExecTarget,
}

/// A resting stop or stop-limit order. `limit` is the limit tick the order
/// converts to on trigger; `None` converts to a market order. Buy and sell
/// stops coexist at the same tick.
#[derive(Clone)]
pub(crate) struct StopEntry {
    pub side: Side,
    pub limit: Option<u32>,
    pub size: u64,
    pub exec: ExecTarget,
}

/// The pair of chains stored at one tick index.
#[derive(Default)]
pub(crate) struct PriceLevel {
    pub limits: BTreeMap<OrderId, LimitEntry>,
    pub stops: BTreeMap<OrderId, StopEntry>,
}

impl PriceLevel {
    /// Total resting limit size at this level.
    pub fn limit_size(&self) -> u64 {
        self.limits.values().map(|entry| entry.size).sum()
    }

    /// Whether any stop of `side` rests here.
    pub fn has_stops(&self, side: Side) -> bool {
        self.stops.values().any(|entry| entry.side == side)
    }
}
