//! Core value types shared across the order book: sides, order kinds,
//! callback messages and the callback aliases used by the execution pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique order identifier. Assigned by the engine, monotonically increasing,
/// never reused and never zero.
pub type OrderId = u64;

/// Stable key of an attached market-maker participant.
pub type MakerId = usize;

/// Execution callback attached to an order. Invoked on the engine thread,
/// after the triggering operation completes, with the message kind, the order
/// id, the price and the size the message refers to.
///
/// Callbacks must not block; a callback that needs to submit further orders
/// should do so through a [`crate::MakerContext`] rather than the blocking
/// public API.
pub type OrderExecCb = Arc<dyn Fn(CallbackMsg, OrderId, f64, u64) + Send + Sync>;

/// Administrative callback invoked once the order id is assigned, before any
/// execution callback for the order is queued. Runs while the engine holds
/// the book, so it must not call back into the book.
pub type OrderAdminCb = Arc<dyn Fn(OrderId) + Send + Sync>;

/// Which side of the market an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bids).
    Buy,
    /// Sell side (asks / offers).
    Sell,
}

impl Side {
    /// Returns the opposite side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// The four supported order kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Execute immediately against resting liquidity; all-or-nothing.
    Market,
    /// Execute at the limit price or better, rest the remainder.
    Limit,
    /// Rest until the last trade reaches the stop price, then become a
    /// market order with the same id.
    Stop,
    /// Rest until the last trade reaches the stop price, then become a
    /// limit order with the same id.
    StopLimit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "market"),
            OrderKind::Limit => write!(f, "limit"),
            OrderKind::Stop => write!(f, "stop"),
            OrderKind::StopLimit => write!(f, "stop-limit"),
        }
    }
}

/// Message kind delivered to execution callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackMsg {
    /// The order was removed from the book without (further) execution.
    Cancel,
    /// A trade executed against the order; one message per matched pair.
    Fill,
    /// A stop-limit triggered; guaranteed to arrive before any fill for the
    /// resulting limit order, which keeps the same id.
    StopToLimit,
    /// Periodic wake-up for market-maker participants, carrying the current
    /// last trade price.
    Wake,
}

impl fmt::Display for CallbackMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackMsg::Cancel => write!(f, "cancel"),
            CallbackMsg::Fill => write!(f, "fill"),
            CallbackMsg::StopToLimit => write!(f, "stop-to-limit"),
            CallbackMsg::Wake => write!(f, "wake"),
        }
    }
}

/// Description of an outstanding order, as returned by
/// [`crate::OrderBook::get_order_info`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderInfo {
    /// The kind the order currently rests as.
    pub kind: OrderKind,
    /// Buy or sell.
    pub side: Side,
    /// Limit price, when the order carries one.
    pub limit: Option<f64>,
    /// Stop price, when the order carries one.
    pub stop: Option<f64>,
    /// Remaining (unfilled) size.
    pub size: u64,
}

/// One entry of the time-and-sales tape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAndSalesEntry {
    /// Trade timestamp formatted as seconds-dot-microseconds since the epoch.
    pub timestamp: String,
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: u64,
}

/// A fill observed by a market-maker participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillInfo {
    /// Side of the participant's order that filled.
    pub side: Side,
    /// Fill price.
    pub price: f64,
    /// Fill size.
    pub size: u64,
}

/// Where an execution callback is routed. External callbacks are owned
/// closures; maker callbacks resolve through the participant arena so a
/// detached participant simply stops receiving messages.
#[derive(Clone)]
pub(crate) enum ExecTarget {
    None,
    External(OrderExecCb),
    Maker(MakerId),
}

/// Routing for the admin callback, mirroring [`ExecTarget`].
pub(crate) enum AdminTarget {
    None,
    External(OrderAdminCb),
    Maker(MakerId),
}
