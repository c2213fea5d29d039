//! Market orders are all-or-nothing: a liquidity failure leaves the book
//! untouched and emits no partial callbacks.

use crate::common::{quarter_book, recorder};
use tickbook::{OrderBookError, Side};

#[test]
fn market_order_fails_liquidity_without_trading() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 50.0, 5, None, None)
        .unwrap();

    let (events, callback) = recorder();
    let err = book
        .insert_market_order(Side::Buy, 6, Some(callback), None)
        .unwrap_err();

    assert!(matches!(
        err,
        OrderBookError::InsufficientLiquidity {
            side: Side::Buy,
            requested: 6,
            available: 5,
        }
    ));
    // book unchanged, nothing recorded, nothing delivered
    assert_eq!(book.volume(), 0);
    assert_eq!(book.ask_price(), Some(50.0));
    assert_eq!(book.ask_size(), 5);
    assert!(book.time_and_sales(0).is_empty());
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn market_order_on_empty_book_reports_zero_available() {
    let book = quarter_book();
    let err = book
        .insert_market_order(Side::Sell, 1, None, None)
        .unwrap_err();
    assert!(matches!(
        err,
        OrderBookError::InsufficientLiquidity {
            side: Side::Sell,
            requested: 1,
            available: 0,
        }
    ));
}

#[test]
fn sell_market_sweeps_bids_downward() {
    let book = quarter_book();
    book.insert_limit_order(Side::Buy, 49.75, 4, None, None)
        .unwrap();
    book.insert_limit_order(Side::Buy, 49.5, 6, None, None)
        .unwrap();

    book.insert_market_order(Side::Sell, 10, None, None).unwrap();

    assert_eq!(book.volume(), 10);
    assert_eq!(book.bid_price(), None);
    assert_eq!(book.total_bid_size(), 0);
    let trades: Vec<(f64, u64)> = book
        .time_and_sales(0)
        .iter()
        .map(|t| (t.price, t.size))
        .collect();
    assert_eq!(trades, vec![(49.75, 4), (49.5, 6)]);
    assert_eq!(book.last_price(), 49.5);
}
