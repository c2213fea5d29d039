//! The book itself: a contiguous array of price levels indexed by tick,
//! the cached inside/extremal pointers, the trade tape and the deferred
//! callback queue.
//!
//! `BookCore` is owned by the engine thread behind an `RwLock`; every
//! mutation happens inside one top-level operation while the write lock is
//! held, and all cache pointers are maintained as side effects of those
//! mutations. Queries take short read locks and see the most recently
//! committed state.

use super::level::{LimitEntry, PriceLevel, StopEntry};
use super::ticks::TickGrid;
use super::types::{CallbackMsg, ExecTarget, OrderId, OrderInfo, OrderKind, Side, TimeAndSalesEntry};
use crate::utils::{TradeClock, timestamp_to_str};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

/// Which chain an id currently rests in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainKind {
    Limit,
    Stop,
}

/// Location of a resting order: its tick plus the chain holding it.
#[derive(Clone, Copy)]
pub(crate) struct OrderLoc {
    pub tick: u32,
    pub chain: ChainKind,
}

/// One deferred callback, queued during matching and drained after the
/// top-level operation releases the book. `depth` is the submit-chain depth
/// of the operation that produced the record; the market-maker host uses it
/// to bound recursion.
pub(crate) struct CbRecord {
    pub msg: CallbackMsg,
    pub target: ExecTarget,
    pub id: OrderId,
    pub price: f64,
    pub size: u64,
    pub depth: u32,
}

/// One trade on the tape.
pub(crate) struct TradeRecord {
    pub at: SystemTime,
    pub price: f64,
    pub size: u64,
}

pub(crate) struct BookCore {
    grid: Arc<TickGrid>,

    /// One price level per tick; the whole book.
    pub(super) levels: Vec<PriceLevel>,

    /// id -> (tick, chain) for O(1) cancels and order info lookups.
    pub(super) id_index: HashMap<OrderId, OrderLoc>,

    /// Highest tick with a non-empty buy limit chain.
    pub(super) bid: Option<u32>,
    /// Lowest tick with a non-empty sell limit chain.
    pub(super) ask: Option<u32>,
    /// Tick of the most recent trade; starts at the range center.
    pub(super) last: u32,
    pub(super) last_size: u64,

    /// Deepest resting limits; bound the matching sweeps.
    pub(super) low_buy_limit: Option<u32>,
    pub(super) high_sell_limit: Option<u32>,

    /// Extremal resting stops; bound the trigger scans.
    pub(super) low_buy_stop: Option<u32>,
    pub(super) high_buy_stop: Option<u32>,
    pub(super) low_sell_stop: Option<u32>,
    pub(super) high_sell_stop: Option<u32>,

    pub(super) total_bid_size: u64,
    pub(super) total_ask_size: u64,
    pub(super) volume: u64,
    last_id: OrderId,

    /// A trade happened and triggered stops have not been checked yet.
    pub(super) dirty: bool,

    tape: VecDeque<TradeRecord>,
    tape_capacity: usize,
    clock: TradeClock,

    pub(super) deferred: VecDeque<CbRecord>,
}

impl BookCore {
    pub fn new(grid: Arc<TickGrid>, tape_capacity: usize) -> Self {
        let total = grid.total_ticks() as usize;
        let mut levels = Vec::with_capacity(total);
        levels.resize_with(total, PriceLevel::default);
        let last = grid.center_tick();
        BookCore {
            grid,
            levels,
            id_index: HashMap::new(),
            bid: None,
            ask: None,
            last,
            last_size: 0,
            low_buy_limit: None,
            high_sell_limit: None,
            low_buy_stop: None,
            high_buy_stop: None,
            low_sell_stop: None,
            high_sell_stop: None,
            total_bid_size: 0,
            total_ask_size: 0,
            volume: 0,
            last_id: 0,
            dirty: false,
            tape: VecDeque::with_capacity(tape_capacity),
            tape_capacity,
            clock: TradeClock::new(),
            deferred: VecDeque::new(),
        }
    }

    pub fn grid(&self) -> &TickGrid {
        &self.grid
    }

    pub fn price(&self, tick: u32) -> f64 {
        self.grid.tick_to_price(tick)
    }

    pub fn last_price(&self) -> f64 {
        self.price(self.last)
    }

    pub fn next_id(&mut self) -> OrderId {
        self.last_id += 1;
        self.last_id
    }

    pub fn last_id(&self) -> OrderId {
        self.last_id
    }

    pub fn take_callbacks(&mut self) -> VecDeque<CbRecord> {
        std::mem::take(&mut self.deferred)
    }

    /// Rest a limit order at `tick`, updating the inside and extremal caches
    /// and the side totals.
    pub(crate) fn rest_limit(&mut self, tick: u32, id: OrderId, entry: LimitEntry) {
        trace!(id, tick, size = entry.size, side = %entry.side, "limit rests");
        match entry.side {
            Side::Buy => {
                self.total_bid_size += entry.size;
                if self.bid.is_none_or(|bid| tick > bid) {
                    self.bid = Some(tick);
                }
                if self.low_buy_limit.is_none_or(|low| tick < low) {
                    self.low_buy_limit = Some(tick);
                }
            }
            Side::Sell => {
                self.total_ask_size += entry.size;
                if self.ask.is_none_or(|ask| tick < ask) {
                    self.ask = Some(tick);
                }
                if self.high_sell_limit.is_none_or(|high| tick > high) {
                    self.high_sell_limit = Some(tick);
                }
            }
        }
        self.id_index.insert(
            id,
            OrderLoc {
                tick,
                chain: ChainKind::Limit,
            },
        );
        self.levels[tick as usize].limits.insert(id, entry);
    }

    /// Rest a stop or stop-limit at `tick`, updating the extremal stop
    /// caches. No fill attempt is made here even if `last` already sits
    /// beyond the stop price; triggering requires a trade.
    pub(crate) fn rest_stop(&mut self, tick: u32, id: OrderId, entry: StopEntry) {
        trace!(id, tick, size = entry.size, side = %entry.side, "stop rests");
        match entry.side {
            Side::Buy => {
                if self.low_buy_stop.is_none_or(|low| tick < low) {
                    self.low_buy_stop = Some(tick);
                }
                if self.high_buy_stop.is_none_or(|high| tick > high) {
                    self.high_buy_stop = Some(tick);
                }
            }
            Side::Sell => {
                if self.low_sell_stop.is_none_or(|low| tick < low) {
                    self.low_sell_stop = Some(tick);
                }
                if self.high_sell_stop.is_none_or(|high| tick > high) {
                    self.high_sell_stop = Some(tick);
                }
            }
        }
        self.id_index.insert(
            id,
            OrderLoc {
                tick,
                chain: ChainKind::Stop,
            },
        );
        self.levels[tick as usize].stops.insert(id, entry);
    }

    /// Remove an order by id from whichever chain holds it, queueing its
    /// cancel callback. Returns `false` for an unknown id.
    ///
    /// `_limits_first` is kept for interface fidelity; an id lives in exactly
    /// one chain, so the id index makes the search order immaterial.
    pub(crate) fn pull(&mut self, id: OrderId, _limits_first: bool, depth: u32) -> bool {
        let Some(loc) = self.id_index.remove(&id) else {
            return false;
        };
        let price = self.price(loc.tick);
        match loc.chain {
            ChainKind::Limit => {
                let Some(entry) = self.levels[loc.tick as usize].limits.remove(&id) else {
                    return false;
                };
                match entry.side {
                    Side::Buy => self.total_bid_size -= entry.size,
                    Side::Sell => self.total_ask_size -= entry.size,
                }
                self.adjust_limit_caches(loc.tick, entry.side);
                trace!(id, price, size = entry.size, "limit pulled");
                self.deferred.push_back(CbRecord {
                    msg: CallbackMsg::Cancel,
                    target: entry.exec,
                    id,
                    price,
                    size: entry.size,
                    depth,
                });
            }
            ChainKind::Stop => {
                let Some(entry) = self.levels[loc.tick as usize].stops.remove(&id) else {
                    return false;
                };
                self.adjust_stop_caches(loc.tick, entry.side);
                trace!(id, price, size = entry.size, "stop pulled");
                self.deferred.push_back(CbRecord {
                    msg: CallbackMsg::Cancel,
                    target: entry.exec,
                    id,
                    price,
                    size: entry.size,
                    depth,
                });
            }
        }
        true
    }

    /// Describe an outstanding order.
    pub fn order_info(&self, id: OrderId) -> Option<OrderInfo> {
        let loc = self.id_index.get(&id)?;
        match loc.chain {
            ChainKind::Limit => {
                let entry = self.levels[loc.tick as usize].limits.get(&id)?;
                Some(OrderInfo {
                    kind: OrderKind::Limit,
                    side: entry.side,
                    limit: Some(self.price(loc.tick)),
                    stop: None,
                    size: entry.size,
                })
            }
            ChainKind::Stop => {
                let entry = self.levels[loc.tick as usize].stops.get(&id)?;
                Some(OrderInfo {
                    kind: if entry.limit.is_some() {
                        OrderKind::StopLimit
                    } else {
                        OrderKind::Stop
                    },
                    side: entry.side,
                    limit: entry.limit.map(|tick| self.price(tick)),
                    stop: Some(self.price(loc.tick)),
                    size: entry.size,
                })
            }
        }
    }

    fn next_nonempty_limit_down(&self, from: u32, floor: u32) -> Option<u32> {
        let mut tick = i64::from(from);
        while tick >= i64::from(floor) {
            if !self.levels[tick as usize].limits.is_empty() {
                return Some(tick as u32);
            }
            tick -= 1;
        }
        None
    }

    fn next_nonempty_limit_up(&self, from: u32, ceiling: u32) -> Option<u32> {
        let mut tick = from;
        while tick <= ceiling {
            if !self.levels[tick as usize].limits.is_empty() {
                return Some(tick);
            }
            tick += 1;
        }
        None
    }

    fn next_stop_down(&self, from: u32, floor: u32, side: Side) -> Option<u32> {
        let mut tick = i64::from(from);
        while tick >= i64::from(floor) {
            if self.levels[tick as usize].has_stops(side) {
                return Some(tick as u32);
            }
            tick -= 1;
        }
        None
    }

    fn next_stop_up(&self, from: u32, ceiling: u32, side: Side) -> Option<u32> {
        let mut tick = from;
        while tick <= ceiling {
            if self.levels[tick as usize].has_stops(side) {
                return Some(tick);
            }
            tick += 1;
        }
        None
    }

    /// Repair the inside and extremal limit caches after a removal left the
    /// chain at `tick` empty.
    pub(crate) fn adjust_limit_caches(&mut self, tick: u32, side: Side) {
        if !self.levels[tick as usize].limits.is_empty() {
            return;
        }
        match side {
            Side::Buy => {
                let (Some(bid), Some(low)) = (self.bid, self.low_buy_limit) else {
                    return;
                };
                if tick == bid && tick == low {
                    self.bid = None;
                    self.low_buy_limit = None;
                } else if tick == bid {
                    self.bid = self.next_nonempty_limit_down(bid - 1, low);
                    if self.bid.is_none() {
                        self.low_buy_limit = None;
                    }
                } else if tick == low {
                    self.low_buy_limit = self.next_nonempty_limit_up(low + 1, bid);
                    if self.low_buy_limit.is_none() {
                        self.bid = None;
                    }
                }
            }
            Side::Sell => {
                let (Some(ask), Some(high)) = (self.ask, self.high_sell_limit) else {
                    return;
                };
                if tick == ask && tick == high {
                    self.ask = None;
                    self.high_sell_limit = None;
                } else if tick == ask {
                    self.ask = self.next_nonempty_limit_up(ask + 1, high);
                    if self.ask.is_none() {
                        self.high_sell_limit = None;
                    }
                } else if tick == high {
                    self.high_sell_limit = self.next_nonempty_limit_down(high - 1, ask);
                    if self.high_sell_limit.is_none() {
                        self.ask = None;
                    }
                }
            }
        }
    }

    /// Repair the extremal stop caches after a removal left `tick` without
    /// stops of `side`.
    pub(crate) fn adjust_stop_caches(&mut self, tick: u32, side: Side) {
        if self.levels[tick as usize].has_stops(side) {
            return;
        }
        match side {
            Side::Buy => {
                let (Some(low), Some(high)) = (self.low_buy_stop, self.high_buy_stop) else {
                    return;
                };
                if tick == low && tick == high {
                    self.low_buy_stop = None;
                    self.high_buy_stop = None;
                } else if tick == low {
                    self.low_buy_stop = self.next_stop_up(low + 1, high, side);
                    if self.low_buy_stop.is_none() {
                        self.high_buy_stop = None;
                    }
                } else if tick == high {
                    self.high_buy_stop = self.next_stop_down(high - 1, low, side);
                    if self.high_buy_stop.is_none() {
                        self.low_buy_stop = None;
                    }
                }
            }
            Side::Sell => {
                let (Some(low), Some(high)) = (self.low_sell_stop, self.high_sell_stop) else {
                    return;
                };
                if tick == low && tick == high {
                    self.low_sell_stop = None;
                    self.high_sell_stop = None;
                } else if tick == low {
                    self.low_sell_stop = self.next_stop_up(low + 1, high, side);
                    if self.low_sell_stop.is_none() {
                        self.high_sell_stop = None;
                    }
                } else if tick == high {
                    self.high_sell_stop = self.next_stop_down(high - 1, low, side);
                    if self.high_sell_stop.is_none() {
                        self.low_sell_stop = None;
                    }
                }
            }
        }
    }

    /// Append a trade to the tape, evicting the oldest when full.
    pub(crate) fn record_trade(&mut self, price: f64, size: u64) {
        while self.tape.len() >= self.tape_capacity.max(1) {
            self.tape.pop_front();
        }
        self.tape.push_back(TradeRecord {
            at: self.clock.now(),
            price,
            size,
        });
    }

    /// The most recent `count` trades, oldest first; all of them if
    /// `count <= 0`.
    pub fn time_and_sales(&self, count: i64) -> Vec<TimeAndSalesEntry> {
        let take = if count <= 0 {
            self.tape.len()
        } else {
            (count as usize).min(self.tape.len())
        };
        self.tape
            .iter()
            .skip(self.tape.len() - take)
            .map(|trade| TimeAndSalesEntry {
                timestamp: timestamp_to_str(trade.at),
                price: trade.price,
                size: trade.size,
            })
            .collect()
    }

    /// Midpoint of the inside market, when both sides are quoted.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((self.price(bid) + self.price(ask)) / 2.0),
            _ => None,
        }
    }

    /// Inside spread, when both sides are quoted.
    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(self.price(ask) - self.price(bid)),
            _ => None,
        }
    }

    /// Resting limit size at the inside bid.
    pub fn bid_size(&self) -> u64 {
        self.bid
            .map_or(0, |tick| self.levels[tick as usize].limit_size())
    }

    /// Resting limit size at the inside ask.
    pub fn ask_size(&self) -> u64 {
        self.ask
            .map_or(0, |tick| self.levels[tick as usize].limit_size())
    }

    /// Up to `depth` non-empty bid levels from the inside outward
    /// (descending price).
    pub fn bid_depth(&self, depth: usize) -> Vec<(f64, u64)> {
        let mut out = Vec::new();
        let (Some(bid), Some(low)) = (self.bid, self.low_buy_limit) else {
            return out;
        };
        let mut tick = i64::from(bid);
        while tick >= i64::from(low) && out.len() < depth {
            let size = self.levels[tick as usize].limit_size();
            if size > 0 {
                out.push((self.price(tick as u32), size));
            }
            tick -= 1;
        }
        out
    }

    /// Up to `depth` non-empty ask levels from the inside outward
    /// (ascending price).
    pub fn ask_depth(&self, depth: usize) -> Vec<(f64, u64)> {
        let mut out = Vec::new();
        let (Some(ask), Some(high)) = (self.ask, self.high_sell_limit) else {
            return out;
        };
        let mut tick = ask;
        while tick <= high && out.len() < depth {
            let size = self.levels[tick as usize].limit_size();
            if size > 0 {
                out.push((self.price(tick), size));
            }
            tick += 1;
        }
        out
    }

    /// Both sides, up to `depth` levels each, ascending by price.
    pub fn market_depth(&self, depth: usize) -> Vec<(f64, u64)> {
        let mut out = self.bid_depth(depth);
        out.reverse();
        out.extend(self.ask_depth(depth));
        out
    }
}
