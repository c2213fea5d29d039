//! The tick grid: exact mapping between prices and integer tick indices
//! over a closed range at a fixed tick size.
//!
//! All book-internal arithmetic is integer over tick indices; prices only
//! become `f64` at the API boundary, where they are rounded half-to-even at
//! a fixed digit count so repeated round-trips are stable.

use super::error::OrderBookError;
use serde::Serialize;

/// External prices are rounded half-to-even at this many decimal digits.
const ROUNDING_DIGITS: u32 = 5;
const ROUND_ADJ: f64 = 10u32.pow(ROUNDING_DIGITS) as f64;

/// The minimum price increment, expressed as the rational `num/den` with
/// `0 < num/den <= 1`.
///
/// The associated constants cover the common contract tick sizes; other
/// ratios are accepted through [`TickRatio::new`] subject to the book's
/// memory ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickRatio {
    num: u32,
    den: u32,
}

impl TickRatio {
    /// 1/4 point per tick.
    pub const QUARTER: TickRatio = TickRatio { num: 1, den: 4 };
    /// 1/10 point per tick.
    pub const TENTH: TickRatio = TickRatio { num: 1, den: 10 };
    /// 1/32 point per tick.
    pub const THIRTY_SECOND: TickRatio = TickRatio { num: 1, den: 32 };
    /// 1/100 point per tick.
    pub const HUNDREDTH: TickRatio = TickRatio { num: 1, den: 100 };
    /// 1/1000 point per tick.
    pub const THOUSANDTH: TickRatio = TickRatio { num: 1, den: 1000 };
    /// 1/10000 point per tick.
    pub const TEN_THOUSANDTH: TickRatio = TickRatio { num: 1, den: 10000 };

    /// Build a custom ratio. Fails unless `0 < num/den <= 1`.
    pub fn new(num: u32, den: u32) -> Result<Self, OrderBookError> {
        if num == 0 || den == 0 || num > den {
            return Err(OrderBookError::InvalidParameters {
                message: format!("tick ratio {num}/{den} is not in (0, 1]"),
            });
        }
        Ok(TickRatio { num, den })
    }

    /// The tick size as a floating point value.
    #[must_use]
    pub fn size(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// How many ticks make one whole point.
    #[must_use]
    pub fn ticks_per_unit(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }
}

/// Fixed mapping between prices and tick indices over `[min, max]`.
///
/// `min` and `max` are rounded onto the grid at construction and are valid
/// prices themselves. A valid price is any multiple of the tick size inside
/// the range; `price_to_tick` tolerates misalignment up to a tenth of a
/// tick and rejects anything beyond that.
#[derive(Debug, Clone)]
pub struct TickGrid {
    ratio: TickRatio,
    /// `min` expressed in whole ticks, so `min = min_units * tick`.
    min_units: i64,
    total_ticks: u32,
}

impl TickGrid {
    /// Build a grid over `[min, max]`. Requires `0 < min < max` after both
    /// bounds are rounded onto the grid.
    pub fn new(ratio: TickRatio, min: f64, max: f64) -> Result<Self, OrderBookError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(OrderBookError::InvalidParameters {
                message: "price range bounds must be finite".to_string(),
            });
        }
        let min_units = (min * ratio.ticks_per_unit()).round() as i64;
        let max_units = (max * ratio.ticks_per_unit()).round() as i64;
        if min_units < 1 {
            return Err(OrderBookError::InvalidParameters {
                message: format!("minimum price {min} must be positive on the grid"),
            });
        }
        if max_units <= min_units {
            return Err(OrderBookError::InvalidParameters {
                message: format!("price range [{min}, {max}] is empty on the grid"),
            });
        }
        let total_ticks = u32::try_from(max_units - min_units + 1).map_err(|_| {
            OrderBookError::InvalidParameters {
                message: format!("price range [{min}, {max}] has too many ticks"),
            }
        })?;
        Ok(TickGrid {
            ratio,
            min_units,
            total_ticks,
        })
    }

    /// The grid's tick ratio.
    #[must_use]
    pub fn ratio(&self) -> TickRatio {
        self.ratio
    }

    /// The tick size as a floating point value.
    #[must_use]
    pub fn tick_size(&self) -> f64 {
        self.ratio.size()
    }

    /// Number of ticks in `[min, max]`, inclusive.
    #[must_use]
    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    /// Lowest valid price.
    #[must_use]
    pub fn min_price(&self) -> f64 {
        self.tick_to_price(0)
    }

    /// Highest valid price.
    #[must_use]
    pub fn max_price(&self) -> f64 {
        self.tick_to_price(self.total_ticks - 1)
    }

    /// The tick at the center of the range; the book's initial `last`.
    #[must_use]
    pub(crate) fn center_tick(&self) -> u32 {
        (self.total_ticks - 1) / 2
    }

    /// Map a price to its tick index. Fails when the price is outside
    /// `[min, max]` or misaligned by more than a tenth of a tick.
    pub fn price_to_tick(&self, price: f64) -> Result<u32, OrderBookError> {
        if !price.is_finite() {
            return Err(OrderBookError::InvalidOrder {
                message: format!("price {price} is not finite"),
            });
        }
        let units = (price * self.ratio.ticks_per_unit()).round();
        let residual = (price - units * self.ratio.size()).abs();
        if residual > self.tick_size() / 10.0 {
            return Err(OrderBookError::InvalidOrder {
                message: format!(
                    "price {price} is not aligned to tick size {}",
                    self.tick_size()
                ),
            });
        }
        let units = units as i64;
        if units < self.min_units || units >= self.min_units + i64::from(self.total_ticks) {
            return Err(OrderBookError::InvalidOrder {
                message: format!(
                    "price {price} is outside [{}, {}]",
                    self.min_price(),
                    self.max_price()
                ),
            });
        }
        Ok((units - self.min_units) as u32)
    }

    /// Map a tick index back to its price, rounded half-to-even at
    /// 5 digits. Exact inverse of `price_to_tick` for in-range ticks.
    #[must_use]
    pub fn tick_to_price(&self, tick: u32) -> f64 {
        let raw = (self.min_units + i64::from(tick)) as f64 * self.ratio.size();
        (raw * ROUND_ADJ).round_ties_even() / ROUND_ADJ
    }

    /// Number of ticks between two valid prices, inclusive of both ends.
    pub fn ticks_in_range(&self, low: f64, high: f64) -> Result<u32, OrderBookError> {
        let low = self.price_to_tick(low)?;
        let high = self.price_to_tick(high)?;
        if high < low {
            return Err(OrderBookError::InvalidOrder {
                message: format!("inverted range: {low} > {high}"),
            });
        }
        Ok(high - low + 1)
    }

    /// Whether `price` lies on the grid inside `[min, max]`.
    #[must_use]
    pub fn is_valid_price(&self, price: f64) -> bool {
        self.price_to_tick(price).is_ok()
    }
}
