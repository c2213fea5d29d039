//! # Tickbook
//!
//! An in-process limit order book and matching engine for a single tradable
//! instrument. Participants submit market, limit, stop and stop-limit orders
//! on either side; the engine matches incoming orders against resting
//! liquidity under price–time priority, triggers stop orders when the last
//! trade crosses their stop price, records trades in a time-and-sales tape
//! and invokes per-order callbacks for fills, cancels and stop-to-limit
//! transitions. The book can also host autonomous *market-maker*
//! participants that receive those callbacks and respond with new orders,
//! creating recursive but bounded order flow.
//!
//! ## Architecture
//!
//! - **Tick grid**: prices are quantized to integer multiples of a rational
//!   tick size over a closed `[min, max]` range; all internal arithmetic is
//!   integer over tick indices ([`TickRatio`], [`TickGrid`]).
//! - **Contiguous book**: one price level per tick in a flat array, each
//!   holding a FIFO chain of resting limits and a bag of resting stops,
//!   with cached pointers to the inside market and the extremal resting
//!   limits and stops so sweeps and trigger scans never walk dead ranges.
//! - **Single-writer engine**: all mutation happens on one engine thread
//!   fed by a bounded FIFO of submissions. Producers block on a per-request
//!   promise; queries read the most recently committed state from any
//!   thread.
//! - **Deferred callbacks**: fills, cancels and stop-to-limit transitions
//!   are queued during matching and delivered only after the triggering
//!   operation completes. A market-maker callback that submits new orders
//!   goes back through the same queue, so re-entry is serialized rather
//!   than recursive, and bounded by per-participant recursion limits.
//! - **Waker**: a separate thread periodically injects coalesced `Wake`
//!   callbacks carrying the current last price to every attached
//!   participant.
//!
//! ## Example
//!
//! ```
//! use tickbook::{OrderBook, Side, TickRatio};
//!
//! let book = OrderBook::new(TickRatio::QUARTER, 0.25, 100.0)?;
//!
//! // Rest an offer, then cross part of it.
//! book.insert_limit_order(Side::Sell, 50.25, 10, None, None)?;
//! book.insert_limit_order(Side::Buy, 50.25, 4, None, None)?;
//!
//! assert_eq!(book.last_price(), 50.25);
//! assert_eq!(book.volume(), 4);
//! assert_eq!(book.ask_size(), 6);
//! # Ok::<(), tickbook::OrderBookError>(())
//! ```
//!
//! Execution callbacks are `Arc` closures invoked on the engine thread once
//! the operation that produced them has committed:
//!
//! ```
//! use std::sync::Arc;
//! use tickbook::{CallbackMsg, OrderBook, OrderExecCb, Side, TickRatio};
//!
//! let book = OrderBook::new(TickRatio::HUNDREDTH, 1.0, 200.0)?;
//! let on_exec: OrderExecCb = Arc::new(|msg, id, price, size| {
//!     if msg == CallbackMsg::Fill {
//!         println!("order {id} filled {size} @ {price}");
//!     }
//! });
//! book.insert_limit_order(Side::Buy, 99.50, 5, Some(on_exec), None)?;
//! # Ok::<(), tickbook::OrderBookError>(())
//! ```
//!
//! Market orders are all-or-nothing: when resting liquidity cannot cover
//! the full size they fail with
//! [`OrderBookError::InsufficientLiquidity`] and the book is left
//! untouched. Stop orders never execute at insertion time, even if the last
//! trade already sits beyond their stop price; triggering requires a trade.

pub mod orderbook;
pub mod prelude;
mod utils;

pub use orderbook::{
    BookConfig, CallbackMsg, DepthLevel, FillInfo, MakerContext, MakerId, MakerOrder,
    MarketMaker, OrderAdminCb, OrderBook, OrderBookError, OrderBookSnapshot, OrderExecCb,
    OrderId, OrderInfo, OrderKind, Side, TickGrid, TickRatio, TimeAndSalesEntry,
};
pub use utils::timestamp_to_str;
