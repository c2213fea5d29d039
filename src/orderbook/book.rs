//! The public order book handle: construction, the mutation surface, the
//! query surface and participant management.
//!
//! An `OrderBook` owns two background threads. The engine thread consumes
//! the submission queue and is the only writer into the book; the waker
//! thread injects periodic wake callbacks for attached market makers. The
//! handle itself is `Sync`: any thread may submit orders (blocking on its
//! own promise) or query the most recently committed state.

use super::core::BookCore;
use super::dispatch::{Engine, OrderRequest, Request, run_waker};
use super::error::OrderBookError;
use super::level::PriceLevel;
use super::maker::MarketMaker;
use super::snapshot::{DepthLevel, OrderBookSnapshot};
use super::ticks::{TickGrid, TickRatio};
use super::types::{
    AdminTarget, ExecTarget, OrderAdminCb, OrderExecCb, OrderId, OrderInfo, OrderKind, Side,
    TimeAndSalesEntry,
};
use crossbeam::channel::{Sender, bounded};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// Default ceiling on the memory the level array may occupy.
const DEFAULT_MEMORY_CEILING: u64 = 128 * 1024 * 1024;
/// Default capacity of the time-and-sales ring.
const DEFAULT_TAPE_CAPACITY: usize = 1000;
/// Default capacity of the submission queue.
const DEFAULT_QUEUE_CAPACITY: usize = 4096;
/// Default interval between participant wake-ups.
const DEFAULT_WAKER_INTERVAL: Duration = Duration::from_millis(500);
/// Past this submit-chain depth a participant insert fails with
/// `CallbackOverflow`.
const DEFAULT_SOFT_RECURSION_LIMIT: u32 = 5;
/// Past this submit-chain depth the host stops dispatching callbacks.
const DEFAULT_HARD_RECURSION_LIMIT: u32 = 50;

/// Construction parameters. `BookConfig::new` fills in the defaults; the
/// fields are public so individual knobs can be overridden.
#[derive(Debug, Clone)]
pub struct BookConfig {
    /// Tick size as a rational.
    pub ratio: TickRatio,
    /// Lowest valid price; must be positive.
    pub min_price: f64,
    /// Highest valid price; must exceed `min_price`.
    pub max_price: f64,
    /// Interval between participant wake-ups.
    pub waker_interval: Duration,
    /// Ceiling on the memory the level array may occupy.
    pub memory_ceiling: u64,
    /// Capacity of the time-and-sales ring.
    pub tape_capacity: usize,
    /// Capacity of the submission queue.
    pub queue_capacity: usize,
    /// Soft participant recursion limit (recoverable).
    pub soft_recursion_limit: u32,
    /// Hard participant recursion limit (suppresses dispatch).
    pub hard_recursion_limit: u32,
}

impl BookConfig {
    /// Configuration with default plumbing parameters.
    #[must_use]
    pub fn new(ratio: TickRatio, min_price: f64, max_price: f64) -> Self {
        BookConfig {
            ratio,
            min_price,
            max_price,
            waker_interval: DEFAULT_WAKER_INTERVAL,
            memory_ceiling: DEFAULT_MEMORY_CEILING,
            tape_capacity: DEFAULT_TAPE_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            soft_recursion_limit: DEFAULT_SOFT_RECURSION_LIMIT,
            hard_recursion_limit: DEFAULT_HARD_RECURSION_LIMIT,
        }
    }
}

/// A limit order book and matching engine for one instrument.
pub struct OrderBook {
    grid: Arc<TickGrid>,
    core: Arc<RwLock<BookCore>>,
    tx: Sender<Request>,
    waker_stop: Sender<()>,
    dispatcher: Option<JoinHandle<()>>,
    waker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook").finish_non_exhaustive()
    }
}

impl OrderBook {
    /// Create a book over `[min_price, max_price]` at the given tick size,
    /// with default plumbing parameters.
    pub fn new(ratio: TickRatio, min_price: f64, max_price: f64) -> Result<Self, OrderBookError> {
        Self::with_config(BookConfig::new(ratio, min_price, max_price))
    }

    /// Create a book from an explicit configuration.
    ///
    /// # Errors
    /// [`OrderBookError::InvalidParameters`] for a bad range or ratio;
    /// [`OrderBookError::Allocation`] when the tick count would exceed the
    /// memory ceiling.
    pub fn with_config(config: BookConfig) -> Result<Self, OrderBookError> {
        let grid = Arc::new(TickGrid::new(
            config.ratio,
            config.min_price,
            config.max_price,
        )?);
        let required_bytes =
            u64::from(grid.total_ticks()) * std::mem::size_of::<PriceLevel>() as u64;
        if required_bytes > config.memory_ceiling {
            return Err(OrderBookError::Allocation {
                required_bytes,
                ceiling_bytes: config.memory_ceiling,
            });
        }

        let core = Arc::new(RwLock::new(BookCore::new(
            Arc::clone(&grid),
            config.tape_capacity,
        )));
        let (tx, rx) = bounded(config.queue_capacity);
        let wake_pending = Arc::new(AtomicBool::new(false));

        let engine = Engine::new(
            Arc::clone(&core),
            Arc::clone(&grid),
            tx.clone(),
            Arc::clone(&wake_pending),
            config.soft_recursion_limit,
            config.hard_recursion_limit,
        );
        let dispatcher = thread::Builder::new()
            .name("tickbook-engine".to_string())
            .spawn(move || engine.run(rx))
            .map_err(|error| OrderBookError::InvalidState {
                message: format!("failed to spawn engine thread: {error}"),
            })?;

        let (waker_stop, waker_stop_rx) = bounded(1);
        let waker = {
            let tx = tx.clone();
            let interval = config.waker_interval;
            thread::Builder::new()
                .name("tickbook-waker".to_string())
                .spawn(move || run_waker(interval, tx, wake_pending, waker_stop_rx))
                .map_err(|error| OrderBookError::InvalidState {
                    message: format!("failed to spawn waker thread: {error}"),
                })?
        };

        debug!(
            min = grid.min_price(),
            max = grid.max_price(),
            ticks = grid.total_ticks(),
            "order book created"
        );
        Ok(OrderBook {
            grid,
            core,
            tx,
            waker_stop,
            dispatcher: Some(dispatcher),
            waker: Some(waker),
        })
    }

    fn stopped() -> OrderBookError {
        OrderBookError::InvalidState {
            message: "order book engine is not running".to_string(),
        }
    }

    fn check_size(size: u64) -> Result<(), OrderBookError> {
        if size == 0 {
            return Err(OrderBookError::InvalidOrder {
                message: "order size must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Enqueue one order request and block on its promise.
    #[allow(clippy::too_many_arguments)]
    fn submit(
        &self,
        kind: OrderKind,
        side: Side,
        limit: Option<u32>,
        stop: Option<u32>,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
        replace: Option<OrderId>,
    ) -> Result<OrderId, OrderBookError> {
        let (reply_tx, reply_rx) = bounded(1);
        let request = Request::Order(OrderRequest {
            kind,
            side,
            limit,
            stop,
            size,
            exec: exec.map_or(ExecTarget::None, ExecTarget::External),
            admin: admin.map_or(AdminTarget::None, AdminTarget::External),
            replace,
            depth: 0,
            reply: Some(reply_tx),
        });
        self.tx.send(request).map_err(|_| Self::stopped())?;
        reply_rx.recv().map_err(|_| Self::stopped())?
    }

    /// Insert a limit order. Returns the assigned id once the engine has
    /// run the operation and drained its callbacks.
    pub fn insert_limit_order(
        &self,
        side: Side,
        limit: f64,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(%side, limit, size, "insert limit order");
        Self::check_size(size)?;
        let limit = self.grid.price_to_tick(limit)?;
        self.submit(OrderKind::Limit, side, Some(limit), None, size, exec, admin, None)
    }

    /// Insert a market order. All-or-nothing: fails with
    /// [`OrderBookError::InsufficientLiquidity`] when the opposite side
    /// cannot cover the full size, leaving the book untouched.
    pub fn insert_market_order(
        &self,
        side: Side,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(%side, size, "insert market order");
        Self::check_size(size)?;
        self.submit(OrderKind::Market, side, None, None, size, exec, admin, None)
    }

    /// Insert a stop order. It rests until a trade prints at or through the
    /// stop price, then re-enters as a market order with the same id.
    pub fn insert_stop_order(
        &self,
        side: Side,
        stop: f64,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(%side, stop, size, "insert stop order");
        Self::check_size(size)?;
        let stop = self.grid.price_to_tick(stop)?;
        self.submit(OrderKind::Stop, side, None, Some(stop), size, exec, admin, None)
    }

    /// Insert a stop-limit order. On trigger it announces `StopToLimit` and
    /// re-enters as a limit order with the same id.
    pub fn insert_stop_limit_order(
        &self,
        side: Side,
        stop: f64,
        limit: f64,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(%side, stop, limit, size, "insert stop-limit order");
        Self::check_size(size)?;
        let stop = self.grid.price_to_tick(stop)?;
        let limit = self.grid.price_to_tick(limit)?;
        self.submit(
            OrderKind::StopLimit,
            side,
            Some(limit),
            Some(stop),
            size,
            exec,
            admin,
            None,
        )
    }

    /// Pull `id` and insert a limit order in its place under a fresh id.
    /// Resolves to 0 when `id` is unknown or already filled; no callback is
    /// delivered for the new order in that case.
    pub fn replace_with_limit_order(
        &self,
        id: OrderId,
        side: Side,
        limit: f64,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(id, %side, limit, size, "replace with limit order");
        Self::check_size(size)?;
        let limit = self.grid.price_to_tick(limit)?;
        self.submit(OrderKind::Limit, side, Some(limit), None, size, exec, admin, Some(id))
    }

    /// Pull `id` and insert a market order in its place under a fresh id.
    pub fn replace_with_market_order(
        &self,
        id: OrderId,
        side: Side,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(id, %side, size, "replace with market order");
        Self::check_size(size)?;
        self.submit(OrderKind::Market, side, None, None, size, exec, admin, Some(id))
    }

    /// Pull `id` and insert a stop order in its place under a fresh id.
    pub fn replace_with_stop_order(
        &self,
        id: OrderId,
        side: Side,
        stop: f64,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(id, %side, stop, size, "replace with stop order");
        Self::check_size(size)?;
        let stop = self.grid.price_to_tick(stop)?;
        self.submit(OrderKind::Stop, side, None, Some(stop), size, exec, admin, Some(id))
    }

    /// Pull `id` and insert a stop-limit order in its place under a fresh
    /// id.
    #[allow(clippy::too_many_arguments)]
    pub fn replace_with_stop_limit_order(
        &self,
        id: OrderId,
        side: Side,
        stop: f64,
        limit: f64,
        size: u64,
        exec: Option<OrderExecCb>,
        admin: Option<OrderAdminCb>,
    ) -> Result<OrderId, OrderBookError> {
        trace!(id, %side, stop, limit, size, "replace with stop-limit order");
        Self::check_size(size)?;
        let stop = self.grid.price_to_tick(stop)?;
        let limit = self.grid.price_to_tick(limit)?;
        self.submit(
            OrderKind::StopLimit,
            side,
            Some(limit),
            Some(stop),
            size,
            exec,
            admin,
            Some(id),
        )
    }

    /// Cancel an order. Returns `false` for an unknown or already-filled
    /// id. On success the order's cancel callback is delivered before this
    /// call returns.
    pub fn pull_order(
        &self,
        id: OrderId,
        search_limits_first: bool,
    ) -> Result<bool, OrderBookError> {
        trace!(id, "pull order");
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Request::Pull {
                id,
                limits_first: search_limits_first,
                depth: 0,
                reply: Some(reply_tx),
            })
            .map_err(|_| Self::stopped())?;
        reply_rx.recv().map_err(|_| Self::stopped())?
    }

    /// Attach market-maker participants in bulk. Each participant's `start`
    /// runs on the engine thread with the current last price before this
    /// call returns; quotes submitted from `start` are processed right
    /// after.
    pub fn add_market_makers(
        &self,
        makers: Vec<Box<dyn MarketMaker>>,
    ) -> Result<(), OrderBookError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Request::Attach {
                makers,
                reply: reply_tx,
            })
            .map_err(|_| Self::stopped())?;
        reply_rx.recv().map_err(|_| Self::stopped())?
    }

    /// Detach every participant: their pending orders are pulled (cancel
    /// callbacks delivered to them first), `stop` runs, and the
    /// participants are dropped.
    pub fn remove_market_makers(&self) -> Result<(), OrderBookError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(Request::Detach { reply: reply_tx })
            .map_err(|_| Self::stopped())?;
        reply_rx.recv().map_err(|_| Self::stopped())?
    }

    fn read(&self) -> RwLockReadGuard<'_, BookCore> {
        match self.core.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The book's tick size.
    #[must_use]
    pub fn tick_size(&self) -> f64 {
        self.grid.tick_size()
    }

    /// Lowest valid price.
    #[must_use]
    pub fn min_price(&self) -> f64 {
        self.grid.min_price()
    }

    /// Highest valid price.
    #[must_use]
    pub fn max_price(&self) -> f64 {
        self.grid.max_price()
    }

    /// Inside bid price, or `None` when no buy limit rests.
    #[must_use]
    pub fn bid_price(&self) -> Option<f64> {
        let book = self.read();
        book.bid.map(|tick| book.price(tick))
    }

    /// Inside ask price, or `None` when no sell limit rests.
    #[must_use]
    pub fn ask_price(&self) -> Option<f64> {
        let book = self.read();
        book.ask.map(|tick| book.price(tick))
    }

    /// Price of the most recent trade; the range center before any trade.
    #[must_use]
    pub fn last_price(&self) -> f64 {
        self.read().last_price()
    }

    /// Midpoint of the inside market, when both sides are quoted.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        self.read().mid_price()
    }

    /// Inside spread, when both sides are quoted.
    #[must_use]
    pub fn spread(&self) -> Option<f64> {
        self.read().spread()
    }

    /// Resting size at the inside bid.
    #[must_use]
    pub fn bid_size(&self) -> u64 {
        self.read().bid_size()
    }

    /// Resting size at the inside ask.
    #[must_use]
    pub fn ask_size(&self) -> u64 {
        self.read().ask_size()
    }

    /// Size of the most recent trade.
    #[must_use]
    pub fn last_size(&self) -> u64 {
        self.read().last_size
    }

    /// Total resting buy size across the book.
    #[must_use]
    pub fn total_bid_size(&self) -> u64 {
        self.read().total_bid_size
    }

    /// Total resting sell size across the book.
    #[must_use]
    pub fn total_ask_size(&self) -> u64 {
        self.read().total_ask_size
    }

    /// Total resting size across both sides.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        let book = self.read();
        book.total_bid_size + book.total_ask_size
    }

    /// Cumulative traded volume.
    #[must_use]
    pub fn volume(&self) -> u64 {
        self.read().volume
    }

    /// Most recently assigned order id; 0 before any order.
    #[must_use]
    pub fn last_id(&self) -> OrderId {
        self.read().last_id()
    }

    /// Up to `depth` bid levels, inside outward.
    #[must_use]
    pub fn bid_depth(&self, depth: usize) -> Vec<(f64, u64)> {
        self.read().bid_depth(depth)
    }

    /// Up to `depth` ask levels, inside outward.
    #[must_use]
    pub fn ask_depth(&self, depth: usize) -> Vec<(f64, u64)> {
        self.read().ask_depth(depth)
    }

    /// Both sides, up to `depth` levels each, ascending by price.
    #[must_use]
    pub fn market_depth(&self, depth: usize) -> Vec<(f64, u64)> {
        self.read().market_depth(depth)
    }

    /// The most recent `count` trades, oldest first; all of them if
    /// `count <= 0`.
    #[must_use]
    pub fn time_and_sales(&self, count: i64) -> Vec<TimeAndSalesEntry> {
        self.read().time_and_sales(count)
    }

    /// Describe an outstanding order; `None` for an unknown or consumed id.
    #[must_use]
    pub fn get_order_info(&self, id: OrderId) -> Option<OrderInfo> {
        self.read().order_info(id)
    }

    /// Capture a consistent snapshot with up to `depth` levels per side.
    #[must_use]
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        let book = self.read();
        OrderBookSnapshot {
            bid_price: book.bid.map(|tick| book.price(tick)),
            ask_price: book.ask.map(|tick| book.price(tick)),
            last_price: book.last_price(),
            last_size: book.last_size,
            total_bid_size: book.total_bid_size,
            total_ask_size: book.total_ask_size,
            volume: book.volume,
            last_id: book.last_id(),
            bids: book
                .bid_depth(depth)
                .into_iter()
                .map(|(price, size)| DepthLevel { price, size })
                .collect(),
            asks: book
                .ask_depth(depth)
                .into_iter()
                .map(|(price, size)| DepthLevel { price, size })
                .collect(),
        }
    }

    /// Whether the engine thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.dispatcher
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for OrderBook {
    fn drop(&mut self) {
        let _ = self.waker_stop.send(());
        let _ = self.tx.send(Request::Shutdown);
        if let Some(handle) = self.waker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
        debug!("order book destroyed");
    }
}
