use std::time::Duration;
use std::time::Instant;

/// Wall-clock time keeper with an optional time limit.
#[derive(Clone, Debug)]
pub struct Timer {
    start: Instant,
    time_limit: Option<Duration>,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            time_limit: None,
        }
    }
}

impl Timer {
    /// Returns a started time keeper with the given time limit.
    pub fn with_time_limit(time_limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            time_limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the remaining time, if there's a time limit.
    pub fn remaining(&self) -> Option<Duration> {
        self.time_limit
            .map(|limit| limit.saturating_sub(self.elapsed()))
    }

    /// Returns whether the time limit is reached.
    pub fn check_time_limit(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }
}
