use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall-clock epoch milliseconds, as stored in the registry.
pub fn now_millis() -> i64 {
    // a clock before 1970 reads as 0
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    since_epoch.as_millis() as i64
}

/// Milliseconds elapsed since `earlier_millis`; never negative.
pub fn millis_since(earlier_millis: i64) -> u64 {
    (now_millis() - earlier_millis).max(0) as u64
}
