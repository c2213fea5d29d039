//! Integration tests for the order book and matching engine.

mod dispatch_tests;
mod maker_tests;
mod market_order_tests;
mod matching_tests;
mod order_placement_tests;
