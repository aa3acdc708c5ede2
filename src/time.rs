// Clock helpers for report timestamps

pub trait Clock {
    fn unix_millis(&self) -> u128;
}

/// Wall clock used outside of tests
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_millis(&self) -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
    }
}

pub fn now_unix_millis() -> u128 {
    SystemClock.unix_millis()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Explicit event time, falling back to the wall clock
pub fn at_or_now(at: Option<u64>) -> u128 {
    at.map(u128::from).unwrap_or_else(now_unix_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_or_now_prefers_explicit() {
        assert_eq!(at_or_now(Some(42)), 42);
        assert!(at_or_now(None) > 1_600_000_000_000);
    }
}
