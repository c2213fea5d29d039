//! Order book error types.

use super::types::{MakerId, Side};
use thiserror::Error;

/// Errors that can occur while constructing or operating the order book.
///
/// Unknown-id conditions are deliberately not errors: `pull_order` returns
/// `false`, `get_order_info` returns `None` and the `replace_with_*` calls
/// resolve to id 0.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrderBookError {
    /// Malformed order input: non-positive size, a price outside the book's
    /// range, or a price misaligned with the tick grid beyond the rounding
    /// tolerance.
    #[error("invalid order: {message}")]
    InvalidOrder {
        /// Description of the rejected input
        message: String,
    },

    /// Invalid construction parameters (non-positive minimum price, empty
    /// price range, degenerate tick ratio).
    #[error("invalid parameters: {message}")]
    InvalidParameters {
        /// Description of the rejected parameter
        message: String,
    },

    /// Operation attempted on an engine that is not running.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state conflict
        message: String,
    },

    /// A market order could not be fully filled. Market orders are
    /// all-or-nothing: the book is left untouched.
    #[error(
        "insufficient liquidity for {side} order: requested {requested}, available {available}"
    )]
    InsufficientLiquidity {
        /// Side of the market order
        side: Side,
        /// Quantity requested
        requested: u64,
        /// Quantity resting on the opposite side
        available: u64,
    },

    /// A market-maker participant exceeded the soft recursion limit on a
    /// single submit chain. The counter is reset before this is raised so
    /// the participant can catch it and keep going.
    #[error("callback overflow: maker {maker} exceeded the recursion limit for a submit chain")]
    CallbackOverflow {
        /// Key of the participant that overflowed
        maker: MakerId,
    },

    /// The configured price range at the configured tick size would exceed
    /// the memory ceiling.
    #[error("allocation: tick range requires {required_bytes} bytes, ceiling is {ceiling_bytes}")]
    Allocation {
        /// Bytes the level array would need
        required_bytes: u64,
        /// Configured ceiling
        ceiling_bytes: u64,
    },

    /// Snapshot export failed to serialize.
    #[error("serialization error: {message}")]
    Serialization {
        /// Underlying serializer message
        message: String,
    },
}
