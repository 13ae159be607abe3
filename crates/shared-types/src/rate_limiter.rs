//! # Token Bucket
//!
//! Lock-light token bucket used by the ingress layer to cap request
//! admission per source. Tokens refill at a fixed rate; a bulk submission
//! may consume several tokens at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Token bucket with atomic consumption and time-based refill.
pub struct TokenBucket {
    /// Maximum burst size.
    capacity: u64,
    /// Tokens added per second.
    refill_per_sec: u64,
    /// Tokens currently available.
    tokens: AtomicU64,
    /// Last refill instant.
    last_refill: Mutex<Instant>,
}

impl TokenBucket {
    /// Creates a bucket that starts full.
    pub fn new(capacity: u64, refill_per_sec: u64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            tokens: AtomicU64::new(capacity),
            last_refill: Mutex::new(Instant::now()),
        }
    }

    /// Consumes one token. Returns `false` when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_many(1)
    }

    /// Consumes `n` tokens atomically, all or nothing. A bulk request that
    /// cannot be fully admitted is rejected whole rather than partially.
    pub fn try_acquire_many(&self, n: u64) -> bool {
        if n == 0 {
            return true;
        }
        self.refill();

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current < n {
                return false;
            }
            if self
                .tokens
                .compare_exchange(current, current - n, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Tokens currently available, after refill.
    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::Relaxed)
    }

    fn refill(&self) {
        let mut last = self.last_refill.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let elapsed = now.duration_since(*last);

        let to_add = (elapsed.as_secs_f64() * self.refill_per_sec as f64) as u64;
        if to_add == 0 {
            return;
        }
        *last = now;

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            let refilled = (current + to_add).min(self.capacity);
            if self
                .tokens
                .compare_exchange(current, refilled, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn allows_up_to_capacity() {
        let bucket = TokenBucket::new(5, 1);
        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn bulk_acquire_is_all_or_nothing() {
        let bucket = TokenBucket::new(10, 1);
        assert!(bucket.try_acquire_many(7));
        assert!(!bucket.try_acquire_many(4));
        assert!(bucket.try_acquire_many(3));
    }

    #[test]
    fn refills_over_time() {
        let bucket = TokenBucket::new(2, 100);
        assert!(bucket.try_acquire_many(2));
        assert!(!bucket.try_acquire());
        thread::sleep(Duration::from_millis(50));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let bucket = TokenBucket::new(3, 1000);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(bucket.available(), 3);
    }

    #[test]
    fn zero_token_request_always_admits() {
        let bucket = TokenBucket::new(1, 1);
        assert!(bucket.try_acquire_many(0));
    }
}
