use std::fmt;
use std::time::Duration;

use crate::models::LikesData;

// Limits applied to every client IP
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub min_interval: Duration, // cooldown between two likes
    pub max_per_ip: u64,        // lifetime cap
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    TooFrequent,
    LimitReached,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::TooFrequent => f.write_str("likes are too frequent, please try again later"),
            Denial::LimitReached => f.write_str("you have reached the maximum number of likes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

/// Per-IP throttle. The same cooldown and cap apply whichever app the IP
/// likes, so the app id plays no part in the decision.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self { policy }
    }

    // An IP with no entry is checked against a zeroed state, which is not stored
    pub fn check(&self, data: &LikesData, ip: &str, now: i64) -> Decision {
        let state = data.throttle_state(ip);
        let min_interval = i64::try_from(self.policy.min_interval.as_secs()).unwrap_or(i64::MAX);

        if now.saturating_sub(state.last_like_at) < min_interval {
            return Decision::Denied(Denial::TooFrequent);
        }

        if state.like_count >= self.policy.max_per_ip {
            return Decision::Denied(Denial::LimitReached);
        }

        Decision::Allowed
    }
}
