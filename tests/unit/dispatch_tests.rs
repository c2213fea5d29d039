//! The dispatcher under concurrent producers: serialization, id assignment
//! and volume conservation regardless of interleaving.

use crate::common::{init_tracing, quarter_book};
use std::sync::Arc;
use std::thread;
use tickbook::Side;

#[test]
fn concurrent_producers_serialize_through_the_queue() {
    init_tracing();
    let book = Arc::new(quarter_book());

    let mut handles = Vec::new();
    for _ in 0..2 {
        let book = Arc::clone(&book);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::with_capacity(1000);
            for _ in 0..1000 {
                ids.push(
                    book.insert_limit_order(Side::Buy, 50.0, 1, None, None)
                        .unwrap(),
                );
            }
            ids
        }));
    }

    let mut all_ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(book.bid_size(), 2000);
    assert_eq!(book.total_bid_size(), 2000);

    // ids form a contiguous strictly increasing multiset
    all_ids.sort_unstable();
    assert_eq!(all_ids.len(), 2000);
    assert!(all_ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(all_ids[0], 1);
    assert_eq!(*all_ids.last().unwrap(), 2000);
    assert_eq!(book.last_id(), 2000);
}

#[test]
fn volume_is_conserved_under_concurrent_crossing() {
    init_tracing();
    let book = Arc::new(quarter_book());

    let seller = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for _ in 0..500 {
                book.insert_limit_order(Side::Sell, 50.0, 1, None, None)
                    .unwrap();
            }
        })
    };
    let buyer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for _ in 0..500 {
                book.insert_limit_order(Side::Buy, 50.0, 1, None, None)
                    .unwrap();
            }
        })
    };
    seller.join().unwrap();
    buyer.join().unwrap();

    // equal flow at one price must fully cross, whatever the interleaving
    assert_eq!(book.volume(), 500);
    assert_eq!(book.total_size(), 0);
    assert_eq!(book.last_price(), 50.0);
}

#[test]
fn submissions_from_one_thread_apply_in_order() {
    let book = quarter_book();
    // a pull submitted after an insert must observe it
    for _ in 0..100 {
        let id = book
            .insert_limit_order(Side::Sell, 60.0, 1, None, None)
            .unwrap();
        assert!(book.pull_order(id, true).unwrap());
    }
    assert_eq!(book.total_size(), 0);
}
