//! Global sliding-window admission control.
//!
//! One window is shared by every caller: the gateway protects the retrieval
//! tier (and the model quota behind it), not individual clients.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Rate limit exceeded. Maximum {max_requests} requests per {} seconds.",
    .window.as_secs()
)]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
    pub max_requests: usize,
    pub window: Duration,
}

/// Admits at most `max_requests` requests in any `window`.
#[derive(Debug)]
pub struct AdmissionController {
    max_requests: usize,
    window: Duration,
    /// Admission instants, oldest first.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl AdmissionController {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request at `now` if capacity is left.
    ///
    /// Returns the capacity remaining after this request.  A rejected
    /// attempt is not recorded.
    pub fn admit(&self, now: Instant) -> Result<usize, RateLimitExceeded> {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(PoisonError::into_inner);
        self.trim(&mut timestamps, now);

        if timestamps.len() >= self.max_requests {
            return Err(RateLimitExceeded {
                retry_after: self.window,
                max_requests: self.max_requests,
                window: self.window,
            });
        }
        timestamps.push_back(now);
        Ok(self.max_requests - timestamps.len())
    }

    /// Capacity left at `now`, without recording anything.
    pub fn remaining(&self, now: Instant) -> usize {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(PoisonError::into_inner);
        self.trim(&mut timestamps, now);
        self.max_requests.saturating_sub(timestamps.len())
    }

    /// Drop every timestamp that is `window` or more older than `now`.
    fn trim(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
