//!
//! Wall-clock helpers for log timestamps.
//!

use std::time::SystemTime;

fn since_epoch_millis() -> u128 {
    match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_millis(),
        Err(_) => 0,
    }
}

/// Returns the current UNIX epoch time in seconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_secs() -> u64 {
    (since_epoch_millis() / 1_000) as u64
}

/// Returns the current UNIX epoch time in milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn now_millis() -> u64 {
    since_epoch_millis() as u64
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2023() {
        let current_year_secs = 1_700_000_000; // ≈ Nov 2023
        assert!(now_secs() > current_year_secs);
        assert!(now_millis() / 1_000 >= now_secs() - 1);
    }
}
