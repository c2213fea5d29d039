//! A small tour of the book: resting and marketable orders, a stop-limit,
//! a pull, and a hosted market maker re-quoting on fills.
//!
//! Run with `cargo run --example simple_market`.

use std::sync::Arc;
use tickbook::{
    CallbackMsg, MakerContext, MarketMaker, OrderBook, OrderBookError, OrderExecCb, OrderId, Side,
    TickRatio,
};

/// Quotes one level either side of the implied price and re-quotes a tick
/// away from every fill.
struct SpreadQuoter {
    size: u64,
}

impl MarketMaker for SpreadQuoter {
    fn start(&mut self, ctx: &mut MakerContext<'_>) -> Result<(), OrderBookError> {
        let implied = ctx.implied_price();
        let tick = ctx.tick();
        ctx.insert_limit(Side::Buy, implied - tick, self.size)?;
        ctx.insert_limit(Side::Sell, implied + tick, self.size)
    }

    fn on_message(
        &mut self,
        ctx: &mut MakerContext<'_>,
        msg: CallbackMsg,
        _id: OrderId,
        price: f64,
        size: u64,
    ) -> Result<(), OrderBookError> {
        if msg != CallbackMsg::Fill {
            return Ok(());
        }
        let tick = ctx.tick();
        match ctx.this_fill().map(|fill| fill.side) {
            Some(Side::Sell) => ctx.insert_limit(Side::Sell, price + tick, size),
            Some(Side::Buy) => ctx.insert_limit(Side::Buy, price - tick, size),
            None => Ok(()),
        }
    }
}

fn print_inside(book: &OrderBook) {
    let fmt = |price: Option<f64>| price.map_or("-".to_string(), |p| format!("{p:.2}"));
    println!(
        "BID {} @ {}   ASK {} @ {}   LAST {} @ {:.2}",
        book.bid_size(),
        fmt(book.bid_price()),
        book.ask_size(),
        fmt(book.ask_price()),
        book.last_size(),
        book.last_price(),
    );
}

fn main() -> Result<(), OrderBookError> {
    tracing_subscriber::fmt::init();

    // a quarter-tick book between 0.25 and 100.00
    let book = OrderBook::new(TickRatio::QUARTER, 0.25, 100.0)?;

    let on_exec: OrderExecCb = Arc::new(|msg, id, price, size| {
        println!("  callback: {msg} order {id}, {size} @ {price:.2}");
    });

    // rest a bid and an offer, then lift part of the offer
    let bid_id = book.insert_limit_order(Side::Buy, 49.75, 50, Some(Arc::clone(&on_exec)), None)?;
    book.insert_limit_order(Side::Sell, 50.25, 30, Some(Arc::clone(&on_exec)), None)?;
    book.insert_market_order(Side::Buy, 10, Some(Arc::clone(&on_exec)), None)?;
    print_inside(&book);

    // a buy stop-limit above the market; it waits for a trade at 50.50
    book.insert_stop_limit_order(Side::Buy, 50.5, 50.75, 5, Some(Arc::clone(&on_exec)), None)?;

    // pull the original bid
    book.pull_order(bid_id, true)?;
    print_inside(&book);

    // hand liquidity provision to a hosted market maker and trade into it
    book.add_market_makers(vec![Box::new(SpreadQuoter { size: 20 })])?;
    book.insert_market_order(Side::Sell, 10, Some(on_exec), None)?;
    print_inside(&book);

    println!("time & sales:");
    for entry in book.time_and_sales(0) {
        println!("  {}  {} @ {:.2}", entry.timestamp, entry.size, entry.price);
    }
    println!(
        "volume {} / total resting {} / last id {}",
        book.volume(),
        book.total_size(),
        book.last_id()
    );
    Ok(())
}
