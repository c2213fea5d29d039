//! The order dispatcher: a bounded FIFO of submitted requests consumed by a
//! single engine thread, which is the only writer into the book.
//!
//! Producers validate inputs, enqueue a request carrying a single-shot
//! promise and block until the engine fulfils it. The engine runs one
//! top-level operation per request (replace-pull, id assignment, admin
//! callback, the kind-specific inserter, the stop-trigger drain), then
//! releases the book and drains the deferred callback pipeline before
//! resolving the promise. Market-maker submissions travel the same queue
//! without a promise, so a callback can never block the engine on itself.

use super::core::{BookCore, CbRecord};
use super::error::OrderBookError;
use super::maker::{MakerContext, MakerSlot, MakerState, MarketMaker};
use super::ticks::TickGrid;
use super::types::{AdminTarget, CallbackMsg, ExecTarget, MakerId, OrderId, OrderKind, Side};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use slab::Slab;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// One submitted order, as it travels the queue. Prices are already
/// converted to tick indices on the producer side.
pub(crate) struct OrderRequest {
    pub kind: OrderKind,
    pub side: Side,
    pub limit: Option<u32>,
    pub stop: Option<u32>,
    pub size: u64,
    pub exec: ExecTarget,
    pub admin: AdminTarget,
    /// Id to pull first; failure resolves the promise with 0.
    pub replace: Option<OrderId>,
    /// Submit-chain depth; 0 for external submissions.
    pub depth: u32,
    /// The promise. `None` for participant submissions.
    pub reply: Option<Sender<Result<OrderId, OrderBookError>>>,
}

/// Everything the engine thread consumes.
pub(crate) enum Request {
    Order(OrderRequest),
    Pull {
        id: OrderId,
        limits_first: bool,
        depth: u32,
        reply: Option<Sender<Result<bool, OrderBookError>>>,
    },
    Attach {
        makers: Vec<Box<dyn MarketMaker>>,
        reply: Sender<Result<(), OrderBookError>>,
    },
    Detach {
        reply: Sender<Result<(), OrderBookError>>,
    },
    Wake,
    Shutdown,
}

fn lock_write(core: &RwLock<BookCore>) -> RwLockWriteGuard<'_, BookCore> {
    match core.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock_read(core: &RwLock<BookCore>) -> RwLockReadGuard<'_, BookCore> {
    match core.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The consumer side of the queue: the book core plus the market-maker
/// host. Owned by the engine thread.
pub(crate) struct Engine {
    core: Arc<RwLock<BookCore>>,
    grid: Arc<TickGrid>,
    makers: Slab<MakerSlot>,
    /// Clone of the producer side, handed to maker contexts.
    tx: Sender<Request>,
    wake_pending: Arc<AtomicBool>,
    soft_recursion_limit: u32,
    hard_recursion_limit: u32,
}

impl Engine {
    pub fn new(
        core: Arc<RwLock<BookCore>>,
        grid: Arc<TickGrid>,
        tx: Sender<Request>,
        wake_pending: Arc<AtomicBool>,
        soft_recursion_limit: u32,
        hard_recursion_limit: u32,
    ) -> Self {
        Engine {
            core,
            grid,
            makers: Slab::new(),
            tx,
            wake_pending,
            soft_recursion_limit,
            hard_recursion_limit,
        }
    }

    /// The dispatcher loop. Exits on `Shutdown` or when every producer is
    /// gone.
    pub fn run(mut self, rx: Receiver<Request>) {
        while let Ok(request) = rx.recv() {
            match request {
                Request::Shutdown => break,
                Request::Order(order) => self.handle_order(order),
                Request::Pull {
                    id,
                    limits_first,
                    depth,
                    reply,
                } => self.handle_pull(id, limits_first, depth, reply),
                Request::Attach { makers, reply } => self.handle_attach(makers, reply),
                Request::Detach { reply } => self.handle_detach(reply),
                Request::Wake => self.handle_wake(),
            }
        }
        self.makers.clear();
        debug!("order dispatcher stopped");
    }

    fn handle_order(&mut self, request: OrderRequest) {
        let OrderRequest {
            kind,
            side,
            limit,
            stop,
            size,
            exec,
            admin,
            replace,
            depth,
            reply,
        } = request;

        let core = Arc::clone(&self.core);
        let mut book = lock_write(&core);

        if let Some(old_id) = replace {
            if !book.pull(old_id, true, depth) {
                // referenced order already gone: resolve 0, no callback for
                // the new order
                drop(book);
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(0));
                }
                return;
            }
        }

        let id = book.next_id();
        trace!(id, %kind, %side, size, "order dequeued");

        // admin runs with the id assigned and nothing queued for the order
        match &admin {
            AdminTarget::None => {}
            AdminTarget::External(callback) => callback(id),
            AdminTarget::Maker(key) => {
                let price = limit.or(stop).map_or(0.0, |tick| book.price(tick));
                if let Some(slot) = self.makers.get_mut(*key) {
                    slot.state.on_accepted(id, side, price, size);
                }
            }
        }

        let result: Result<OrderId, OrderBookError> = match (kind, limit, stop) {
            (OrderKind::Limit, Some(limit), _) => {
                book.insert_limit(side, limit, size, exec, id, depth);
                Ok(id)
            }
            (OrderKind::Market, _, _) => book.insert_market(side, size, exec, id, depth).map(|()| id),
            (OrderKind::Stop, _, Some(stop)) => {
                book.insert_stop(side, stop, None, size, exec, id);
                Ok(id)
            }
            (OrderKind::StopLimit, Some(limit), Some(stop)) => {
                book.insert_stop(side, stop, Some(limit), size, exec, id);
                Ok(id)
            }
            _ => Err(OrderBookError::InvalidOrder {
                message: format!("{kind} order is missing a price"),
            }),
        };

        if result.is_ok() {
            book.run_triggered_stops(depth);
        }
        let callbacks = book.take_callbacks();
        drop(book);

        self.drain(callbacks);
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    fn handle_pull(
        &mut self,
        id: OrderId,
        limits_first: bool,
        depth: u32,
        reply: Option<Sender<Result<bool, OrderBookError>>>,
    ) {
        let core = Arc::clone(&self.core);
        let mut book = lock_write(&core);
        let pulled = book.pull(id, limits_first, depth);
        let callbacks = book.take_callbacks();
        drop(book);

        self.drain(callbacks);
        if let Some(reply) = reply {
            let _ = reply.send(Ok(pulled));
        }
    }

    fn handle_attach(
        &mut self,
        makers: Vec<Box<dyn MarketMaker>>,
        reply: Sender<Result<(), OrderBookError>>,
    ) {
        let (implied, tick) = {
            let book = lock_read(&self.core);
            (book.last_price(), book.grid().tick_size())
        };
        for maker in makers {
            let entry = self.makers.vacant_entry();
            let key = entry.key();
            entry.insert(MakerSlot {
                maker,
                state: MakerState::new(key, tick),
            });
            if let Some(slot) = self.makers.get_mut(key) {
                let MakerSlot { maker, state } = slot;
                let mut ctx = MakerContext::new(
                    state,
                    &self.tx,
                    &self.grid,
                    self.soft_recursion_limit,
                    implied,
                );
                if let Err(error) = maker.start(&mut ctx) {
                    warn!(key, %error, "market maker start failed");
                }
            }
            debug!(key, "market maker attached");
        }
        let _ = reply.send(Ok(()));
    }

    fn handle_detach(&mut self, reply: Sender<Result<(), OrderBookError>>) {
        let implied = lock_read(&self.core).last_price();
        let keys: Vec<MakerId> = self.makers.iter().map(|(key, _)| key).collect();
        for key in keys {
            let order_ids = self
                .makers
                .get(key)
                .map(|slot| slot.state.order_ids())
                .unwrap_or_default();
            let callbacks = {
                let core = Arc::clone(&self.core);
                let mut book = lock_write(&core);
                for id in order_ids {
                    book.pull(id, true, 0);
                }
                book.take_callbacks()
            };
            self.drain(callbacks);
            if let Some(mut slot) = self.makers.try_remove(key) {
                let MakerSlot { maker, state } = &mut slot;
                let mut ctx = MakerContext::new(
                    state,
                    &self.tx,
                    &self.grid,
                    self.soft_recursion_limit,
                    implied,
                );
                maker.stop(&mut ctx);
            }
            debug!(key, "market maker detached");
        }
        let _ = reply.send(Ok(()));
    }

    /// Turn one wake tick into one deferred `Wake` callback per attached
    /// participant, carrying the current last price.
    fn handle_wake(&mut self) {
        self.wake_pending.store(false, Ordering::SeqCst);
        if self.makers.is_empty() {
            return;
        }
        let last = lock_read(&self.core).last_price();
        let mut records = VecDeque::new();
        for (key, _) in self.makers.iter() {
            records.push_back(CbRecord {
                msg: CallbackMsg::Wake,
                target: ExecTarget::Maker(key),
                id: 0,
                price: last,
                size: 0,
                depth: 0,
            });
        }
        self.drain(records);
    }

    /// Drain the deferred callback pipeline in FIFO order. Runs with the
    /// book released; participant submissions made from here enqueue behind
    /// the current request and are picked up by the next loop iteration, so
    /// a drain can never nest.
    fn drain(&mut self, mut records: VecDeque<CbRecord>) {
        while let Some(record) = records.pop_front() {
            match record.target {
                ExecTarget::None => {}
                ExecTarget::External(ref callback) => {
                    callback(record.msg, record.id, record.price, record.size);
                }
                ExecTarget::Maker(key) => self.dispatch_to_maker(key, &record),
            }
        }
    }

    fn dispatch_to_maker(&mut self, key: MakerId, record: &CbRecord) {
        let entry_depth = record.depth + 1;
        if entry_depth > self.hard_recursion_limit {
            trace!(key, depth = entry_depth, "maker callback suppressed past hard limit");
            return;
        }
        let Some(slot) = self.makers.get_mut(key) else {
            trace!(key, "callback for detached maker dropped");
            return;
        };
        let MakerSlot { maker, state } = slot;
        state.recurse = entry_depth;
        let base_ok = match record.msg {
            CallbackMsg::Fill => state.apply_fill(record.id, record.price, record.size),
            CallbackMsg::Cancel => state.apply_cancel(record.id),
            CallbackMsg::Wake => true,
            CallbackMsg::StopToLimit => {
                warn!(key, id = record.id, "market maker received stop-to-limit");
                true
            }
        };
        if base_ok {
            let mut ctx = MakerContext::new(
                state,
                &self.tx,
                &self.grid,
                self.soft_recursion_limit,
                record.price,
            );
            if let Err(error) =
                maker.on_message(&mut ctx, record.msg, record.id, record.price, record.size)
            {
                warn!(key, %error, "market maker callback error");
            }
        }
        state.recurse = 0;
    }
}

/// The waker loop: every `interval`, enqueue a wake request unless one is
/// already pending. Exits on the stop signal or when the book is gone.
pub(crate) fn run_waker(
    interval: Duration,
    tx: Sender<Request>,
    wake_pending: Arc<AtomicBool>,
    stop_rx: Receiver<()>,
) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if !wake_pending.swap(true, Ordering::SeqCst) && tx.send(Request::Wake).is_err() {
                    break;
                }
            }
            _ => break,
        }
    }
    debug!("waker stopped");
}
