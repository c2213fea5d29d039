//! Market-maker participants: the trait they implement, the per-participant
//! state the host keeps on their behalf, and the context handle they use to
//! submit orders.
//!
//! Participants are autonomous objects that provide liquidity, receive
//! execution callbacks and respond with new orders. They are moved into the
//! book in bulk and from then on owned by the host arena; callbacks resolve
//! through the arena key, so a participant has stable identity for its whole
//! life on the book and a detached key simply stops receiving messages.
//!
//! Re-entry is bounded rather than forbidden: a submission made from inside
//! a callback is enqueued on the same dispatcher queue as external orders,
//! and each hop of such a submit chain deepens a per-participant counter.
//! Past the soft limit, `insert_limit` fails with
//! [`OrderBookError::CallbackOverflow`] (after resetting the counter, so the
//! participant can catch it and recover); past the hard limit the host stops
//! dispatching callbacks for the chain entirely.

use super::dispatch::{OrderRequest, Request};
use super::error::OrderBookError;
use super::ticks::TickGrid;
use super::types::{
    AdminTarget, CallbackMsg, ExecTarget, FillInfo, MakerId, OrderId, OrderKind, Side,
};
use crossbeam::channel::{Sender, TrySendError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// An autonomous liquidity provider hosted by the book.
///
/// All three methods run on the engine thread and must not block. Errors
/// returned from `start` and `on_message` are caught at the callback
/// boundary and logged; they do not corrupt the engine.
pub trait MarketMaker: Send {
    /// Called once when the participant is attached. `ctx.implied_price()`
    /// carries the book's current last price and `ctx.tick()` the tick
    /// size; initial quotes go through `ctx.insert_limit`.
    fn start(&mut self, ctx: &mut MakerContext<'_>) -> Result<(), OrderBookError>;

    /// Called when the participant is detached. Pending orders have already
    /// been pulled and their cancel callbacks delivered.
    fn stop(&mut self, _ctx: &mut MakerContext<'_>) {}

    /// Execution callback: fill, cancel, stop-to-limit or wake.
    fn on_message(
        &mut self,
        ctx: &mut MakerContext<'_>,
        msg: CallbackMsg,
        id: OrderId,
        price: f64,
        size: u64,
    ) -> Result<(), OrderBookError>;
}

/// One order a participant is tracking, as recorded by the host ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MakerOrder {
    /// Buy or sell.
    pub side: Side,
    /// Submitted limit price.
    pub price: f64,
    /// Remaining size.
    pub size: u64,
}

/// Arena slot: the participant object plus the state the host keeps for it.
pub(crate) struct MakerSlot {
    pub maker: Box<dyn MarketMaker>,
    pub state: MakerState,
}

/// Host-side bookkeeping for one participant: the order ledger, outstanding
/// size per side, net position, the two most recent fills and the
/// submit-chain depth. Applied before the participant's own `on_message`.
pub(crate) struct MakerState {
    pub key: MakerId,
    orders: BTreeMap<OrderId, MakerOrder>,
    bid_out: u64,
    offer_out: u64,
    pos: i64,
    this_fill: Option<FillInfo>,
    last_fill: Option<FillInfo>,
    tick: f64,
    /// Depth of the submit chain currently being dispatched; 0 outside a
    /// callback.
    pub recurse: u32,
    running: bool,
}

impl MakerState {
    pub fn new(key: MakerId, tick: f64) -> Self {
        MakerState {
            key,
            orders: BTreeMap::new(),
            bid_out: 0,
            offer_out: 0,
            pos: 0,
            this_fill: None,
            last_fill: None,
            tick,
            recurse: 0,
            running: true,
        }
    }

    pub fn order_ids(&self) -> Vec<OrderId> {
        self.orders.keys().copied().collect()
    }

    /// Admin step for a participant order: the id is valid and no execution
    /// callback has been queued yet, so the ledger entry is guaranteed to
    /// exist before the first fill arrives.
    pub fn on_accepted(&mut self, id: OrderId, side: Side, price: f64, size: u64) {
        self.orders.insert(id, MakerOrder { side, price, size });
        match side {
            Side::Buy => self.bid_out += size,
            Side::Sell => self.offer_out += size,
        }
    }

    /// Base bookkeeping for a fill. Returns `false` (after logging) when the
    /// id is unknown, in which case the strategy callback is skipped.
    pub fn apply_fill(&mut self, id: OrderId, price: f64, size: u64) -> bool {
        let Some(order) = self.orders.get(&id).copied() else {
            warn!(maker = self.key, id, "fill for unknown maker order");
            return false;
        };
        self.last_fill = self.this_fill;
        self.this_fill = Some(FillInfo {
            side: order.side,
            price,
            size,
        });
        match order.side {
            Side::Buy => {
                self.pos += size as i64;
                self.bid_out = self.bid_out.saturating_sub(size);
            }
            Side::Sell => {
                self.pos -= size as i64;
                self.offer_out = self.offer_out.saturating_sub(size);
            }
        }
        let remaining = order.size.saturating_sub(size);
        if remaining == 0 {
            self.orders.remove(&id);
        } else if let Some(order) = self.orders.get_mut(&id) {
            order.size = remaining;
        }
        true
    }

    /// Base bookkeeping for a cancel.
    pub fn apply_cancel(&mut self, id: OrderId) -> bool {
        let Some(order) = self.orders.remove(&id) else {
            warn!(maker = self.key, id, "cancel for unknown maker order");
            return false;
        };
        match order.side {
            Side::Buy => self.bid_out = self.bid_out.saturating_sub(order.size),
            Side::Sell => self.offer_out = self.offer_out.saturating_sub(order.size),
        }
        true
    }
}

/// Handle through which a participant observes its own state and submits
/// orders. Submissions are enqueued on the book's dispatcher queue (never
/// executed inline), so they serialize with external order flow.
pub struct MakerContext<'a> {
    state: &'a mut MakerState,
    tx: &'a Sender<Request>,
    grid: &'a Arc<TickGrid>,
    soft_limit: u32,
    implied: f64,
}

impl<'a> MakerContext<'a> {
    pub(crate) fn new(
        state: &'a mut MakerState,
        tx: &'a Sender<Request>,
        grid: &'a Arc<TickGrid>,
        soft_limit: u32,
        implied: f64,
    ) -> Self {
        MakerContext {
            state,
            tx,
            grid,
            soft_limit,
            implied,
        }
    }

    /// The book's last trade price as of this callback.
    #[must_use]
    pub fn implied_price(&self) -> f64 {
        self.implied
    }

    /// The book's tick size.
    #[must_use]
    pub fn tick(&self) -> f64 {
        self.state.tick
    }

    /// Net position: filled buys minus filled sells.
    #[must_use]
    pub fn pos(&self) -> i64 {
        self.state.pos
    }

    /// Outstanding resting buy size.
    #[must_use]
    pub fn bid_out(&self) -> u64 {
        self.state.bid_out
    }

    /// Outstanding resting sell size.
    #[must_use]
    pub fn offer_out(&self) -> u64 {
        self.state.offer_out
    }

    /// The fill being processed, if any.
    #[must_use]
    pub fn this_fill(&self) -> Option<FillInfo> {
        self.state.this_fill
    }

    /// The fill before that.
    #[must_use]
    pub fn last_fill(&self) -> Option<FillInfo> {
        self.state.last_fill
    }

    /// The participant's outstanding orders, keyed by id.
    #[must_use]
    pub fn orders(&self) -> &BTreeMap<OrderId, MakerOrder> {
        &self.state.orders
    }

    /// Submit a limit order. The assigned id appears in [`Self::orders`]
    /// before any callback for it is delivered.
    ///
    /// # Errors
    /// [`OrderBookError::CallbackOverflow`] when the submit chain exceeds
    /// the soft recursion limit (the counter is reset first, so catching the
    /// error and backing off is enough to recover);
    /// [`OrderBookError::InvalidOrder`] for a bad price or size;
    /// [`OrderBookError::InvalidState`] when the participant or book is
    /// shut down.
    pub fn insert_limit(&mut self, side: Side, price: f64, size: u64) -> Result<(), OrderBookError> {
        if !self.state.running {
            return Err(OrderBookError::InvalidState {
                message: "market maker is not in a running state".to_string(),
            });
        }
        if self.state.recurse > self.soft_limit {
            self.state.recurse = 0;
            return Err(OrderBookError::CallbackOverflow {
                maker: self.state.key,
            });
        }
        if size == 0 {
            return Err(OrderBookError::InvalidOrder {
                message: "order size must be positive".to_string(),
            });
        }
        let limit = self.grid.price_to_tick(price)?;
        let request = Request::Order(OrderRequest {
            kind: OrderKind::Limit,
            side,
            limit: Some(limit),
            stop: None,
            size,
            exec: ExecTarget::Maker(self.state.key),
            admin: AdminTarget::Maker(self.state.key),
            replace: None,
            depth: self.state.recurse,
            reply: None,
        });
        // a blocking send here would deadlock the engine against its own
        // queue, so participant submissions never wait
        self.enqueue(request)
    }

    /// Pull one of this participant's orders. The cancel callback arrives
    /// through `on_message` once the engine processes the request.
    pub fn pull(&mut self, id: OrderId) -> Result<(), OrderBookError> {
        if !self.state.running {
            return Err(OrderBookError::InvalidState {
                message: "market maker is not in a running state".to_string(),
            });
        }
        self.enqueue(Request::Pull {
            id,
            limits_first: true,
            depth: self.state.recurse,
            reply: None,
        })
    }

    fn enqueue(&self, request: Request) -> Result<(), OrderBookError> {
        self.tx.try_send(request).map_err(|error| match error {
            TrySendError::Full(_) => OrderBookError::InvalidState {
                message: "submission queue is full".to_string(),
            },
            TrySendError::Disconnected(_) => OrderBookError::InvalidState {
                message: "order book is shut down".to_string(),
            },
        })
    }
}
