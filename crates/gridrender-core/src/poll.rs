//! Bounded polling policy.

use std::time::Duration;

/// Upper bound on how long a job is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLimit {
    /// Give up after this many status checks.
    Attempts(u32),
    /// Give up once this much time has passed since the first check.
    Deadline(Duration),
}

/// How often and for how long to poll a job's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status checks.
    pub interval: Duration,
    /// When to stop.
    pub limit: PollLimit,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            limit: PollLimit::Attempts(720),
        }
    }
}

impl PollPolicy {
    /// Create a policy.
    pub fn new(interval: Duration, limit: PollLimit) -> Self {
        Self { interval, limit }
    }

    /// Whether another check may start after `attempts` checks and `elapsed` time.
    pub fn allows(&self, attempts: u32, elapsed: Duration) -> bool {
        match self.limit {
            PollLimit::Attempts(max) => attempts < max,
            PollLimit::Deadline(deadline) => attempts == 0 || elapsed < deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_limit() {
        let policy = PollPolicy::new(Duration::from_secs(5), PollLimit::Attempts(3));
        assert!(policy.allows(0, Duration::ZERO));
        assert!(policy.allows(2, Duration::from_secs(3600)));
        assert!(!policy.allows(3, Duration::ZERO));
    }

    #[test]
    fn test_deadline_limit() {
        let policy = PollPolicy::new(
            Duration::from_secs(5),
            PollLimit::Deadline(Duration::from_secs(60)),
        );
        assert!(policy.allows(0, Duration::from_secs(120)));
        assert!(policy.allows(11, Duration::from_secs(55)));
        assert!(!policy.allows(12, Duration::from_secs(60)));
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.limit, PollLimit::Attempts(720));
    }
}
