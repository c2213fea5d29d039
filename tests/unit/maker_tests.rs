//! The market-maker host: attach/detach lifecycle, base bookkeeping,
//! recursion bounds and wake delivery.

use crate::common::{init_tracing, quarter_book, quiesce};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tickbook::{
    BookConfig, CallbackMsg, MakerContext, MarketMaker, OrderBook, OrderBookError, OrderId, Side,
    TickRatio,
};

#[derive(Default)]
struct QuoterLog {
    started: Option<(f64, f64)>,
    fills: Vec<(OrderId, f64, u64)>,
    cancels: Vec<OrderId>,
    wakes: Vec<f64>,
    pos: i64,
    bid_out: u64,
    offer_out: u64,
    stopped: bool,
}

/// Posts one bid and one offer a tick around the implied price on start and
/// records everything it observes.
struct Quoter {
    log: Arc<Mutex<QuoterLog>>,
    size: u64,
}

impl MarketMaker for Quoter {
    fn start(&mut self, ctx: &mut MakerContext<'_>) -> Result<(), OrderBookError> {
        let implied = ctx.implied_price();
        let tick = ctx.tick();
        self.log.lock().unwrap().started = Some((implied, tick));
        ctx.insert_limit(Side::Buy, implied - tick, self.size)?;
        ctx.insert_limit(Side::Sell, implied + tick, self.size)?;
        Ok(())
    }

    fn stop(&mut self, _ctx: &mut MakerContext<'_>) {
        self.log.lock().unwrap().stopped = true;
    }

    fn on_message(
        &mut self,
        ctx: &mut MakerContext<'_>,
        msg: CallbackMsg,
        id: OrderId,
        price: f64,
        size: u64,
    ) -> Result<(), OrderBookError> {
        let mut log = self.log.lock().unwrap();
        log.pos = ctx.pos();
        log.bid_out = ctx.bid_out();
        log.offer_out = ctx.offer_out();
        match msg {
            CallbackMsg::Fill => log.fills.push((id, price, size)),
            CallbackMsg::Cancel => log.cancels.push(id),
            CallbackMsg::Wake => log.wakes.push(price),
            CallbackMsg::StopToLimit => {}
        }
        Ok(())
    }
}

#[test]
fn attached_maker_quotes_around_the_implied_price() {
    let book = quarter_book();
    let log = Arc::new(Mutex::new(QuoterLog::default()));
    book.add_market_makers(vec![Box::new(Quoter {
        log: Arc::clone(&log),
        size: 10,
    })])
    .unwrap();
    quiesce(&book);

    assert_eq!(log.lock().unwrap().started, Some((50.0, 0.25)));
    assert_eq!(book.bid_price(), Some(49.75));
    assert_eq!(book.ask_price(), Some(50.25));
    assert_eq!(book.bid_size(), 10);
    assert_eq!(book.ask_size(), 10);
}

#[test]
fn maker_sees_fills_and_the_host_keeps_its_ledger() {
    let book = quarter_book();
    let log = Arc::new(Mutex::new(QuoterLog::default()));
    book.add_market_makers(vec![Box::new(Quoter {
        log: Arc::clone(&log),
        size: 10,
    })])
    .unwrap();
    quiesce(&book);

    book.insert_market_order(Side::Buy, 4, None, None).unwrap();
    quiesce(&book);

    let log = log.lock().unwrap();
    assert_eq!(log.fills.len(), 1);
    let (_, price, size) = log.fills[0];
    assert_eq!((price, size), (50.25, 4));
    // base bookkeeping ran before the strategy callback
    assert_eq!(log.pos, -4);
    assert_eq!(log.bid_out, 10);
    assert_eq!(log.offer_out, 6);
    assert_eq!(book.ask_size(), 6);
}

#[test]
fn detach_pulls_quotes_and_delivers_cancels_first() {
    let book = quarter_book();
    let log = Arc::new(Mutex::new(QuoterLog::default()));
    book.add_market_makers(vec![Box::new(Quoter {
        log: Arc::clone(&log),
        size: 10,
    })])
    .unwrap();
    quiesce(&book);
    assert_eq!(book.total_size(), 20);

    book.remove_market_makers().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.cancels.len(), 2);
    assert!(log.stopped);
    assert_eq!(book.total_size(), 0);
    assert_eq!(book.bid_price(), None);
    assert_eq!(book.ask_price(), None);
}

#[test]
fn multiple_makers_attach_and_detach_in_bulk() {
    let book = quarter_book();
    let log_a = Arc::new(Mutex::new(QuoterLog::default()));
    let log_b = Arc::new(Mutex::new(QuoterLog::default()));
    book.add_market_makers(vec![
        Box::new(Quoter {
            log: Arc::clone(&log_a),
            size: 4,
        }),
        Box::new(Quoter {
            log: Arc::clone(&log_b),
            size: 6,
        }),
    ])
    .unwrap();
    quiesce(&book);

    // both quote the same levels; their sizes aggregate
    assert_eq!(book.bid_size(), 10);
    assert_eq!(book.ask_size(), 10);

    book.remove_market_makers().unwrap();
    assert_eq!(book.total_size(), 0);
    assert!(log_a.lock().unwrap().stopped);
    assert!(log_b.lock().unwrap().stopped);
    assert_eq!(log_a.lock().unwrap().cancels.len(), 2);
    assert_eq!(log_b.lock().unwrap().cancels.len(), 2);
}

#[derive(Default)]
struct ChaserLog {
    fills: u32,
    overflow: bool,
}

/// Re-buys at the same price on every fill, chaining submissions until the
/// soft recursion limit cuts it off.
struct Chaser {
    log: Arc<Mutex<ChaserLog>>,
}

impl MarketMaker for Chaser {
    fn start(&mut self, ctx: &mut MakerContext<'_>) -> Result<(), OrderBookError> {
        ctx.insert_limit(Side::Buy, 50.0, 1)
    }

    fn on_message(
        &mut self,
        ctx: &mut MakerContext<'_>,
        msg: CallbackMsg,
        _id: OrderId,
        _price: f64,
        _size: u64,
    ) -> Result<(), OrderBookError> {
        if msg != CallbackMsg::Fill {
            return Ok(());
        }
        self.log.lock().unwrap().fills += 1;
        match ctx.insert_limit(Side::Buy, 50.0, 1) {
            Err(OrderBookError::CallbackOverflow { .. }) => {
                // expected once the submit chain gets too deep; counter is
                // reset so the maker could keep going later
                self.log.lock().unwrap().overflow = true;
                Ok(())
            }
            other => other,
        }
    }
}

#[test]
fn soft_recursion_limit_bounds_a_submit_chain() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 50.0, 100, None, None)
        .unwrap();
    let log = Arc::new(Mutex::new(ChaserLog::default()));
    book.add_market_makers(vec![Box::new(Chaser {
        log: Arc::clone(&log),
    })])
    .unwrap();
    quiesce(&book);

    let log = log.lock().unwrap();
    assert!(log.overflow);
    // start at depth 0 plus one insert per allowed depth 1..=5
    assert_eq!(log.fills, 6);
    assert_eq!(book.volume(), 6);
}

/// Pulls its own first resting order when the first wake arrives.
struct WakePuller {
    log: Arc<Mutex<QuoterLog>>,
    pulled: bool,
}

impl MarketMaker for WakePuller {
    fn start(&mut self, ctx: &mut MakerContext<'_>) -> Result<(), OrderBookError> {
        ctx.insert_limit(Side::Buy, 49.0, 3)
    }

    fn on_message(
        &mut self,
        ctx: &mut MakerContext<'_>,
        msg: CallbackMsg,
        id: OrderId,
        _price: f64,
        _size: u64,
    ) -> Result<(), OrderBookError> {
        match msg {
            CallbackMsg::Wake if !self.pulled => {
                let first = ctx.orders().keys().next().copied();
                if let Some(order_id) = first {
                    ctx.pull(order_id)?;
                    self.pulled = true;
                }
                Ok(())
            }
            CallbackMsg::Cancel => {
                self.log.lock().unwrap().cancels.push(id);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[test]
fn maker_can_pull_its_own_orders_from_a_callback() {
    init_tracing();
    let mut config = BookConfig::new(TickRatio::QUARTER, 0.25, 100.0);
    config.waker_interval = Duration::from_millis(100);
    let book = OrderBook::with_config(config).unwrap();

    let log = Arc::new(Mutex::new(QuoterLog::default()));
    book.add_market_makers(vec![Box::new(WakePuller {
        log: Arc::clone(&log),
        pulled: false,
    })])
    .unwrap();
    quiesce(&book);
    assert_eq!(book.total_bid_size(), 3);

    thread::sleep(Duration::from_millis(400));
    quiesce(&book);

    assert_eq!(book.total_bid_size(), 0);
    assert_eq!(log.lock().unwrap().cancels.len(), 1);
}

#[test]
fn waker_delivers_coalesced_wakes_with_last_price() {
    init_tracing();
    let mut config = BookConfig::new(TickRatio::QUARTER, 0.25, 100.0);
    config.waker_interval = Duration::from_millis(25);
    let book = OrderBook::with_config(config).unwrap();

    let log = Arc::new(Mutex::new(QuoterLog::default()));
    book.add_market_makers(vec![Box::new(Quoter {
        log: Arc::clone(&log),
        size: 5,
    })])
    .unwrap();
    quiesce(&book);

    thread::sleep(Duration::from_millis(200));
    quiesce(&book);

    let log = log.lock().unwrap();
    assert!(log.wakes.len() >= 2, "expected repeated wakes");
    assert!(log.wakes.iter().all(|&price| price == 50.0));
}
