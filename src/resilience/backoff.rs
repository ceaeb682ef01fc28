//! Exponential backoff schedule.

use std::time::Duration;

/// Calculate the delay before the retry that follows `attempt`.
///
/// The schedule is `min(max, base * 2^(attempt - 1))` with no jitter, so
/// attempt 1 waits `base`, attempt 2 waits `2 * base`, and so on until the cap.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);

    Duration::from_millis(delay_ms.min(max_ms))
}
