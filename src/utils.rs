//! Time helpers for the trade tape.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Clock for trade timestamps: monotonic instants anchored to wall time at
/// book construction, so timestamps are strictly non-decreasing and still
/// formattable as wall-clock times.
pub(crate) struct TradeClock {
    anchor_wall: SystemTime,
    anchor_mono: Instant,
}

impl TradeClock {
    pub fn new() -> Self {
        TradeClock {
            anchor_wall: SystemTime::now(),
            anchor_mono: Instant::now(),
        }
    }

    pub fn now(&self) -> SystemTime {
        self.anchor_wall + self.anchor_mono.elapsed()
    }
}

/// Format a timestamp as seconds-dot-microseconds since the Unix epoch.
#[must_use]
pub fn timestamp_to_str(at: SystemTime) -> String {
    let since_epoch = at.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    format!("{}.{:06}", since_epoch.as_secs(), since_epoch.subsec_micros())
}
