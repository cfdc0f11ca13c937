//! Second-resolution timestamps.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Returns the current system time.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Self(secs)
    }

    /// Creates a timestamp from seconds since the UNIX epoch.
    #[must_use]
    pub const fn from_unix(secs: u64) -> Self {
        Self(secs)
    }

    /// Seconds since the UNIX epoch.
    #[must_use]
    pub const fn to_unix(self) -> u64 {
        self.0
    }

    /// Returns this timestamp moved forward by `duration`, saturating at the
    /// largest representable time.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_returns_reasonable_timestamp() {
        // Should be after year 2020
        assert!(Timestamp::now().to_unix() > 1_577_836_800);
    }

    #[test]
    fn it_returns_increasing_values() {
        let t1 = Timestamp::now();
        let t2 = Timestamp::now();
        assert!(t2 >= t1);
    }

    #[test]
    fn it_saturates_on_overflow() {
        let max = Timestamp::from_unix(u64::MAX);
        assert_eq!(max.saturating_add(Duration::from_secs(10)), max);
        assert_eq!(
            Timestamp::from_unix(10).saturating_add(Duration::from_secs(5)),
            Timestamp::from_unix(15)
        );
    }
}
