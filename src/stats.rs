//! Traffic counter parsing
//!
//! The kernel counter table (`/proc/net/dev`) has one row per device:
//!
//! ```text
//! Inter-|   Receive                                                |  Transmit
//!  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
//!   eth0: 1024      10    0    0    0     0          0         0     2048      20    0    0    0     0       0          0
//! ```
//!
//! [`device_row`] isolates the sixteen numbers for one device and [`parse`]
//! turns them into a counter array. Both are pure.

use thiserror::Error;

/// Number of counters in one device row
pub const COUNTER_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsParseError {
    #[error("expected 16 counters, found {0}")]
    TokenCount(usize),

    #[error("counter {index} is not a non-negative integer: '{token}'")]
    InvalidToken { index: usize, token: String },
}

/// Parse whitespace-separated counters into a fixed array.
///
/// Exactly sixteen tokens are required; a short or long row is rejected
/// rather than truncated or padded.
pub fn parse(raw: &str) -> Result<[u64; COUNTER_COUNT], StatsParseError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != COUNTER_COUNT {
        return Err(StatsParseError::TokenCount(tokens.len()));
    }

    let mut counters = [0u64; COUNTER_COUNT];
    for (index, token) in tokens.iter().enumerate() {
        counters[index] = token.parse().map_err(|_| StatsParseError::InvalidToken {
            index,
            token: token.to_string(),
        })?;
    }
    Ok(counters)
}

/// Find the counter text for `device` in a full counter table.
///
/// Returns everything after the `device:` label, or `None` when the device
/// has no row. Header lines never match because they carry no such label.
pub fn device_row<'a>(table: &'a str, device: &str) -> Option<&'a str> {
    table.lines().find_map(|line| {
        let (label, rest) = line.split_once(':')?;
        (label.trim() == device).then_some(rest)
    })
}
