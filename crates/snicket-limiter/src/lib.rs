//! Per-key fixed-window rate limiting for the Snicket URL shortener.
//!
//! Each key gets a bucket of tokens that refills in full when its window
//! rolls over. The limiter is purely in-memory and synchronous; expired
//! buckets are swept out by [`RateLimiter::purge`], typically from the
//! same background task that purges the store.

use jiff::{SignedDuration, Timestamp};
use parking_lot::Mutex;
use snicket_core::{Clock, SystemClock};
use std::collections::HashMap;
use tracing::{debug, trace};

struct Bucket {
    tokens: u32,
    window_expires_at: Timestamp,
}

impl Bucket {
    fn is_active(&self, now: Timestamp) -> bool {
        now <= self.window_expires_at
    }
}

/// A fixed-window token bucket keyed by caller identity.
pub struct RateLimiter<C: Clock = SystemClock> {
    buckets: Mutex<HashMap<String, Bucket>>,
    max_tokens: u32,
    window: SignedDuration,
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Creates a limiter handing out `max_tokens` requests per `window`.
    pub fn new(max_tokens: u32, window: SignedDuration) -> Self {
        Self::with_clock(max_tokens, window, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Creates a limiter that reads time from the given clock.
    pub fn with_clock(max_tokens: u32, window: SignedDuration, clock: C) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_tokens,
            window,
            clock,
        }
    }

    /// Spends one token for `key`, returning whether the request may pass.
    ///
    /// The first request in a window opens a fresh bucket and is always
    /// admitted; an exhausted bucket rejects until its window rolls over.
    pub fn allowed(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();

        if let Some(bucket) = buckets.get_mut(key) {
            if bucket.is_active(now) {
                if bucket.tokens == 0 {
                    trace!(key, "rate limit exhausted");
                    return false;
                }
                bucket.tokens -= 1;
                return true;
            }
        }

        buckets.insert(
            key.to_owned(),
            Bucket {
                tokens: self.max_tokens.saturating_sub(1),
                window_expires_at: now + self.window,
            },
        );
        true
    }

    /// Drops buckets whose window has expired.
    ///
    /// Purging never rejects anyone: a key whose bucket was dropped gets a
    /// fresh bucket on its next request, exactly as the rollover in
    /// [`RateLimiter::allowed`] would have given it.
    pub fn purge(&self) {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.is_active(now));
        let swept = before - buckets.len();
        if swept > 0 {
            debug!(swept, "dropped expired rate limit buckets");
        }
    }
}
