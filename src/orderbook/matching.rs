//! The matching state machine: aggressor sweeps against resting liquidity,
//! trade recording, and stop triggering.
//!
//! Everything here runs on the engine thread with the book write lock held.
//! No callback is invoked from inside these routines; every fill, cancel and
//! stop-to-limit notification is queued on the deferred pipeline and drained
//! by the dispatcher after the top-level operation releases the book.

use super::core::{BookCore, CbRecord};
use super::error::OrderBookError;
use super::level::{LimitEntry, StopEntry};
use super::types::{CallbackMsg, ExecTarget, OrderId, Side};
use tracing::{debug, trace, warn};

impl BookCore {
    /// Total resting limit size the aggressor could reach on the opposite
    /// side, bounded by the optional limit tick and the extremal limit
    /// cache. Used for the all-or-nothing market order pre-check.
    pub(crate) fn available_size(&self, aggressor: Side, limit: Option<u32>) -> u64 {
        let mut total = 0u64;
        match aggressor {
            Side::Buy => {
                let (Some(ask), Some(high)) = (self.ask, self.high_sell_limit) else {
                    return 0;
                };
                let stop_at = limit.map_or(high, |l| l.min(high));
                let mut tick = ask;
                while tick <= stop_at {
                    total += self.levels[tick as usize].limit_size();
                    tick += 1;
                }
            }
            Side::Sell => {
                let (Some(bid), Some(low)) = (self.bid, self.low_buy_limit) else {
                    return 0;
                };
                let stop_at = limit.map_or(low, |l| l.max(low));
                let mut tick = i64::from(bid);
                while tick >= i64::from(stop_at) {
                    total += self.levels[tick as usize].limit_size();
                    tick -= 1;
                }
            }
        }
        total
    }

    /// Sweep the ask side with a buy aggressor. Walks inside prices upward,
    /// FIFO within each chain, trading at the resting price. Returns the
    /// unfilled remainder.
    pub(crate) fn lift_offers(
        &mut self,
        limit: Option<u32>,
        id: OrderId,
        mut size: u64,
        exec: &ExecTarget,
        depth: u32,
    ) -> u64 {
        while size > 0 {
            let Some(tick) = self.ask else { break };
            if limit.is_some_and(|l| tick > l) {
                break;
            }
            let front = self.levels[tick as usize]
                .limits
                .iter()
                .next()
                .map(|(&resting_id, entry)| (resting_id, entry.size, entry.exec.clone()));
            let Some((resting_id, available, resting_exec)) = front else {
                self.advance_ask(tick);
                continue;
            };
            let traded = size.min(available);
            if traded == available {
                self.levels[tick as usize].limits.remove(&resting_id);
                self.id_index.remove(&resting_id);
            } else if let Some(entry) = self.levels[tick as usize].limits.get_mut(&resting_id) {
                entry.size -= traded;
            }
            self.total_ask_size -= traded;
            size -= traded;
            self.trade_occurred(tick, traded, id, resting_id, exec, &resting_exec, depth);
        }
        // a sweep that exactly consumed a chain leaves `ask` on an empty
        // level; move it before anything can observe the book
        if let Some(tick) = self.ask {
            if self.levels[tick as usize].limits.is_empty() {
                self.advance_ask(tick);
            }
        }
        size
    }

    /// Sweep the bid side with a sell aggressor; mirror of `lift_offers`.
    pub(crate) fn hit_bids(
        &mut self,
        limit: Option<u32>,
        id: OrderId,
        mut size: u64,
        exec: &ExecTarget,
        depth: u32,
    ) -> u64 {
        while size > 0 {
            let Some(tick) = self.bid else { break };
            if limit.is_some_and(|l| tick < l) {
                break;
            }
            let front = self.levels[tick as usize]
                .limits
                .iter()
                .next()
                .map(|(&resting_id, entry)| (resting_id, entry.size, entry.exec.clone()));
            let Some((resting_id, available, resting_exec)) = front else {
                self.advance_bid(tick);
                continue;
            };
            let traded = size.min(available);
            if traded == available {
                self.levels[tick as usize].limits.remove(&resting_id);
                self.id_index.remove(&resting_id);
            } else if let Some(entry) = self.levels[tick as usize].limits.get_mut(&resting_id) {
                entry.size -= traded;
            }
            self.total_bid_size -= traded;
            size -= traded;
            self.trade_occurred(tick, traded, resting_id, id, &resting_exec, exec, depth);
        }
        if let Some(tick) = self.bid {
            if self.levels[tick as usize].limits.is_empty() {
                self.advance_bid(tick);
            }
        }
        size
    }

    /// Move `ask` to the next non-empty sell chain strictly above `from`,
    /// bounded by `high_sell_limit`; clears both caches when the side is
    /// swept clean.
    fn advance_ask(&mut self, from: u32) {
        let Some(high) = self.high_sell_limit else {
            self.ask = None;
            return;
        };
        let mut tick = from;
        while tick < high {
            tick += 1;
            if !self.levels[tick as usize].limits.is_empty() {
                self.ask = Some(tick);
                return;
            }
        }
        self.ask = None;
        self.high_sell_limit = None;
    }

    /// Mirror of `advance_ask` for the bid side.
    fn advance_bid(&mut self, from: u32) {
        let Some(low) = self.low_buy_limit else {
            self.bid = None;
            return;
        };
        let mut tick = from;
        while tick > low {
            tick -= 1;
            if !self.levels[tick as usize].limits.is_empty() {
                self.bid = Some(tick);
                return;
            }
        }
        self.bid = None;
        self.low_buy_limit = None;
    }

    /// Record one matched pair: queue a fill callback for each side, append
    /// to the tape, move `last` and bump the volume. No inserts may happen
    /// from here; triggered stops are handled once the inserter returns.
    #[allow(clippy::too_many_arguments)]
    fn trade_occurred(
        &mut self,
        tick: u32,
        size: u64,
        buy_id: OrderId,
        sell_id: OrderId,
        buy_exec: &ExecTarget,
        sell_exec: &ExecTarget,
        depth: u32,
    ) {
        let price = self.price(tick);
        trace!(price, size, buy_id, sell_id, "trade");
        self.deferred.push_back(CbRecord {
            msg: CallbackMsg::Fill,
            target: buy_exec.clone(),
            id: buy_id,
            price,
            size,
            depth,
        });
        self.deferred.push_back(CbRecord {
            msg: CallbackMsg::Fill,
            target: sell_exec.clone(),
            id: sell_id,
            price,
            size,
            depth,
        });
        self.record_trade(price, size);
        self.last = tick;
        self.last_size = size;
        self.volume += size;
        self.dirty = true;
    }

    /// Insert a limit order: sweep the opposite side up to the limit price,
    /// then rest the remainder.
    pub(crate) fn insert_limit(
        &mut self,
        side: Side,
        limit: u32,
        size: u64,
        exec: ExecTarget,
        id: OrderId,
        depth: u32,
    ) {
        let remainder = match side {
            Side::Buy => self.lift_offers(Some(limit), id, size, &exec, depth),
            Side::Sell => self.hit_bids(Some(limit), id, size, &exec, depth),
        };
        if remainder > 0 {
            self.rest_limit(
                limit,
                id,
                LimitEntry {
                    side,
                    size: remainder,
                    exec,
                },
            );
        }
    }

    /// Insert a market order. All-or-nothing: when resting liquidity cannot
    /// cover the full size the order fails and the book is untouched.
    pub(crate) fn insert_market(
        &mut self,
        side: Side,
        size: u64,
        exec: ExecTarget,
        id: OrderId,
        depth: u32,
    ) -> Result<(), OrderBookError> {
        let available = self.available_size(side, None);
        if available < size {
            return Err(OrderBookError::InsufficientLiquidity {
                side,
                requested: size,
                available,
            });
        }
        let remainder = match side {
            Side::Buy => self.lift_offers(None, id, size, &exec, depth),
            Side::Sell => self.hit_bids(None, id, size, &exec, depth),
        };
        debug_assert_eq!(remainder, 0);
        Ok(())
    }

    /// Insert a stop (`limit` = None) or stop-limit order into the stop
    /// chain at `stop`. A stop-limit with an unmarketable limit is accepted;
    /// the book state at trigger time is what matters.
    pub(crate) fn insert_stop(
        &mut self,
        side: Side,
        stop: u32,
        limit: Option<u32>,
        size: u64,
        exec: ExecTarget,
        id: OrderId,
    ) {
        self.rest_stop(
            stop,
            id,
            StopEntry {
                side,
                limit,
                size,
                exec,
            },
        );
    }

    /// Trigger resting stops against the current `last` until a full pass
    /// fires nothing. Buy stops trigger before sell stops; within one side
    /// the scan runs in monotone price order (low-to-high for buys,
    /// high-to-low for sells) and re-reads `last` at every step, so a
    /// cascade that moves the market keeps triggering. Runs only when a
    /// trade has occurred since the previous check.
    pub(crate) fn run_triggered_stops(&mut self, depth: u32) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        loop {
            let mut fired = false;
            while let Some(tick) = self.low_buy_stop {
                if tick > self.last {
                    break;
                }
                fired |= self.trigger_stops_at(tick, Side::Buy, depth);
            }
            while let Some(tick) = self.high_sell_stop {
                if tick < self.last {
                    break;
                }
                fired |= self.trigger_stops_at(tick, Side::Sell, depth);
            }
            if !fired {
                break;
            }
        }
        self.dirty = false;
    }

    /// Fire the stop chain of `side` at `tick`. The chain is moved out of
    /// the book and the extremal cache advanced before any resulting insert
    /// runs, so re-triggering the same orders is impossible.
    fn trigger_stops_at(&mut self, tick: u32, side: Side, depth: u32) -> bool {
        let extracted: Vec<(OrderId, StopEntry)> = {
            let level = &mut self.levels[tick as usize];
            let ids: Vec<OrderId> = level
                .stops
                .iter()
                .filter(|(_, entry)| entry.side == side)
                .map(|(&id, _)| id)
                .collect();
            ids.into_iter()
                .filter_map(|id| level.stops.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, _) in &extracted {
            self.id_index.remove(id);
        }
        self.adjust_stop_caches(tick, side);
        if extracted.is_empty() {
            return false;
        }
        debug!(tick, side = %side, count = extracted.len(), "stop chain triggered");
        for (id, entry) in extracted {
            match entry.limit {
                Some(limit) => {
                    // announce the transition before the limit touches the
                    // book, with the same id
                    self.deferred.push_back(CbRecord {
                        msg: CallbackMsg::StopToLimit,
                        target: entry.exec.clone(),
                        id,
                        price: self.price(limit),
                        size: entry.size,
                        depth,
                    });
                    self.insert_limit(entry.side, limit, entry.size, entry.exec, id, depth);
                }
                None => {
                    if let Err(error) =
                        self.insert_market(entry.side, entry.size, entry.exec, id, depth)
                    {
                        warn!(id, %error, "triggered stop order dropped");
                    }
                }
            }
        }
        true
    }
}
