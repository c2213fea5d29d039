//! The order book: tick grid, price levels, matching engine, dispatcher,
//! callback pipeline and market-maker host.

mod book;
mod core;
mod dispatch;
mod error;
mod level;
mod maker;
mod matching;
mod snapshot;
mod ticks;
mod types;

pub use book::{BookConfig, OrderBook};
pub use error::OrderBookError;
pub use maker::{MakerContext, MakerOrder, MarketMaker};
pub use snapshot::{DepthLevel, OrderBookSnapshot};
pub use ticks::{TickGrid, TickRatio};
pub use types::{
    CallbackMsg, FillInfo, MakerId, OrderAdminCb, OrderExecCb, OrderId, OrderInfo, OrderKind,
    Side, TimeAndSalesEntry,
};
