//! Matching sweeps across price levels: price priority, time priority,
//! trading at the resting price, and per-trade fill callbacks.

use crate::common::{quarter_book, recorder};
use tickbook::{CallbackMsg, Side};

#[test]
fn market_order_sweeps_levels_in_price_order() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 49.75, 3, None, None)
        .unwrap();
    book.insert_limit_order(Side::Sell, 50.0, 2, None, None)
        .unwrap();

    let (events, callback) = recorder();
    let id = book
        .insert_market_order(Side::Buy, 4, Some(callback), None)
        .unwrap();

    assert_eq!(book.volume(), 4);
    assert_eq!(book.ask_price(), Some(50.0));
    assert_eq!(book.ask_size(), 1);
    assert_eq!(book.last_price(), 50.0);

    let tape = book.time_and_sales(0);
    let trades: Vec<(f64, u64)> = tape.iter().map(|t| (t.price, t.size)).collect();
    assert_eq!(trades, vec![(49.75, 3), (50.0, 1)]);

    assert_eq!(
        events.lock().unwrap().as_slice(),
        &[
            (CallbackMsg::Fill, id, 49.75, 3),
            (CallbackMsg::Fill, id, 50.0, 1),
        ]
    );
}

#[test]
fn time_priority_within_a_level() {
    let book = quarter_book();
    let (first_events, first_cb) = recorder();
    let (second_events, second_cb) = recorder();
    let first = book
        .insert_limit_order(Side::Sell, 50.0, 5, Some(first_cb), None)
        .unwrap();
    book.insert_limit_order(Side::Sell, 50.0, 5, Some(second_cb), None)
        .unwrap();

    book.insert_market_order(Side::Buy, 5, None, None).unwrap();

    assert_eq!(
        first_events.lock().unwrap().as_slice(),
        &[(CallbackMsg::Fill, first, 50.0, 5)]
    );
    assert!(second_events.lock().unwrap().is_empty());
    assert_eq!(book.ask_size(), 5);
}

#[test]
fn aggressor_pays_the_resting_price() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 50.0, 5, None, None)
        .unwrap();

    // marketable buy limit above the offer trades at the offer, remainder
    // rests at its own limit
    book.insert_limit_order(Side::Buy, 51.0, 10, None, None)
        .unwrap();

    assert_eq!(book.last_price(), 50.0);
    assert_eq!(book.volume(), 5);
    assert_eq!(book.bid_price(), Some(51.0));
    assert_eq!(book.bid_size(), 5);
    assert_eq!(book.ask_price(), None);
}

#[test]
fn partial_fills_sum_to_submitted_size() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 49.75, 3, None, None)
        .unwrap();
    book.insert_limit_order(Side::Sell, 50.0, 2, None, None)
        .unwrap();
    book.insert_limit_order(Side::Sell, 50.25, 4, None, None)
        .unwrap();

    let (events, callback) = recorder();
    let id = book
        .insert_limit_order(Side::Buy, 50.25, 9, Some(callback), None)
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.0 == CallbackMsg::Fill && e.1 == id));
    assert_eq!(events.iter().map(|e| e.3).sum::<u64>(), 9);
    let prices: Vec<f64> = events.iter().map(|e| e.2).collect();
    assert_eq!(prices, vec![49.75, 50.0, 50.25]);
}

#[test]
fn non_marketable_limit_rests_without_trading() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 50.25, 5, None, None)
        .unwrap();
    book.insert_limit_order(Side::Buy, 50.0, 8, None, None)
        .unwrap();

    assert_eq!(book.volume(), 0);
    assert_eq!(book.bid_price(), Some(50.0));
    assert_eq!(book.ask_price(), Some(50.25));
    assert_eq!(book.total_size(), 13);
}
