//! Sliding-window rate limiting keyed by route and client address.
//!
//! # Design Decisions
//! - Each `(route, client)` key keeps the instants of its recent requests;
//!   instants older than the window are pruned lazily on every check
//! - The DashMap entry guard makes prune-count-record atomic per key
//! - Counters live in process memory: every instance behind a load balancer
//!   keeps its own windows, so the effective limit grows with instance count
//! - `sweep` drops idle keys so distinct clients do not accumulate forever

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::security::rules::RateLimitPolicy;

/// Result of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// When a rejected client may try again.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct Window {
    hits: VecDeque<Instant>,
    span: Duration,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.hits.front() {
            if now.saturating_duration_since(*oldest) >= self.span {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-process sliding-window limiter.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<(String, String), Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request from `client` on `route` against `policy`.
    pub fn check(&self, route: &str, client: &str, policy: &RateLimitPolicy) -> RateDecision {
        self.check_at(route, client, policy, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, route: &str, client: &str, policy: &RateLimitPolicy, now: Instant) -> RateDecision {
        let span = policy.window();
        let mut entry = self
            .windows
            .entry((route.to_string(), client.to_string()))
            .or_insert_with(|| Window {
                hits: VecDeque::new(),
                span,
            });
        let window = entry.value_mut();
        window.span = span;
        window.prune(now);

        let max = policy.max_requests as usize;
        if window.hits.len() >= max {
            let retry_after = window
                .hits
                .front()
                .map(|oldest| (*oldest + span).saturating_duration_since(now));
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after,
            };
        }

        window.hits.push_back(now);
        RateDecision {
            allowed: true,
            remaining: (max - window.hits.len()) as u32,
            retry_after: None,
        }
    }

    /// Drop keys with no requests inside their window. Returns how many
    /// keys were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window.prune(now);
            !window.hits.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
