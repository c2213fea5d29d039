//! Order insertion: validation, resting, immediate matching at one level,
//! id assignment and admin callback ordering.

use crate::common::{quarter_book, recorder};
use std::sync::{Arc, Mutex};
use tickbook::{CallbackMsg, OrderBookError, OrderKind, Side};

#[test]
fn crossing_limits_trade_at_one_level() {
    let book = quarter_book();
    let (buy_events, buy_cb) = recorder();
    let (sell_events, sell_cb) = recorder();

    let buy_id = book
        .insert_limit_order(Side::Buy, 50.0, 10, Some(buy_cb), None)
        .unwrap();
    let sell_id = book
        .insert_limit_order(Side::Sell, 50.0, 4, Some(sell_cb), None)
        .unwrap();

    assert_eq!(book.volume(), 4);
    assert_eq!(book.last_price(), 50.0);
    assert_eq!(book.last_size(), 4);
    assert_eq!(book.bid_price(), Some(50.0));
    assert_eq!(book.bid_size(), 6);
    assert_eq!(book.ask_price(), None);

    let tape = book.time_and_sales(0);
    assert_eq!(tape.len(), 1);
    assert_eq!((tape[0].price, tape[0].size), (50.0, 4));

    assert_eq!(
        buy_events.lock().unwrap().as_slice(),
        &[(CallbackMsg::Fill, buy_id, 50.0, 4)]
    );
    assert_eq!(
        sell_events.lock().unwrap().as_slice(),
        &[(CallbackMsg::Fill, sell_id, 50.0, 4)]
    );
}

#[test]
fn resting_limit_is_queryable() {
    let book = quarter_book();
    let id = book
        .insert_limit_order(Side::Sell, 60.0, 7, None, None)
        .unwrap();

    let info = book.get_order_info(id).unwrap();
    assert_eq!(info.kind, OrderKind::Limit);
    assert_eq!(info.side, Side::Sell);
    assert_eq!(info.limit, Some(60.0));
    assert_eq!(info.stop, None);
    assert_eq!(info.size, 7);
    assert_eq!(book.ask_price(), Some(60.0));
    assert_eq!(book.total_ask_size(), 7);
}

#[test]
fn rejects_zero_size() {
    let book = quarter_book();
    let err = book
        .insert_limit_order(Side::Buy, 50.0, 0, None, None)
        .unwrap_err();
    assert!(matches!(err, OrderBookError::InvalidOrder { .. }));
}

#[test]
fn rejects_bad_prices() {
    let book = quarter_book();
    for price in [50.10, 0.0, 200.0, -1.0] {
        let err = book
            .insert_limit_order(Side::Buy, price, 1, None, None)
            .unwrap_err();
        assert!(
            matches!(err, OrderBookError::InvalidOrder { .. }),
            "price {price}"
        );
    }
    let err = book
        .insert_stop_limit_order(Side::Buy, 50.10, 50.0, 1, None, None)
        .unwrap_err();
    assert!(matches!(err, OrderBookError::InvalidOrder { .. }));
}

#[test]
fn ids_are_unique_and_increasing() {
    let book = quarter_book();
    let mut ids = Vec::new();
    for i in 0..10u64 {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let price = if i % 2 == 0 { 49.0 } else { 51.0 };
        ids.push(
            book.insert_limit_order(side, price, 1, None, None)
                .unwrap(),
        );
    }
    assert!(ids.iter().all(|&id| id > 0));
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(book.last_id(), *ids.last().unwrap());
}

#[test]
fn admin_callback_runs_before_any_fill() {
    let book = quarter_book();
    book.insert_limit_order(Side::Sell, 50.0, 5, None, None)
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let admin_log = Arc::clone(&log);
    let exec_log = Arc::clone(&log);
    let id = book
        .insert_limit_order(
            Side::Buy,
            50.0,
            5,
            Some(Arc::new(move |msg, _, _, _| {
                exec_log.lock().unwrap().push(format!("exec:{msg}"));
            })),
            Some(Arc::new(move |id| {
                admin_log.lock().unwrap().push(format!("admin:{id}"));
            })),
        )
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.as_slice(), &[format!("admin:{id}"), "exec:fill".to_string()]);
}

#[test]
fn stop_insertion_never_executes_immediately() {
    let book = quarter_book();
    let (events, callback) = recorder();
    // last is 50.00, already at or through this stop price
    let id = book
        .insert_stop_order(Side::Buy, 49.0, 5, Some(callback), None)
        .unwrap();

    let info = book.get_order_info(id).unwrap();
    assert_eq!(info.kind, OrderKind::Stop);
    assert_eq!(info.stop, Some(49.0));
    assert_eq!(book.volume(), 0);
    assert!(events.lock().unwrap().is_empty());
}
