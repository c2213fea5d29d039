//! Prelude module that re-exports the types needed for everyday use.
//!
//! ```rust
//! use tickbook::prelude::*;
//! ```

pub use crate::orderbook::{
    BookConfig, CallbackMsg, DepthLevel, FillInfo, MakerContext, MakerOrder, MarketMaker,
    OrderAdminCb, OrderBook, OrderBookError, OrderBookSnapshot, OrderExecCb, OrderId, OrderInfo,
    OrderKind, Side, TickGrid, TickRatio, TimeAndSalesEntry,
};
pub use crate::utils::timestamp_to_str;
