//! Global token bucket in front of every inbound update.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Admits at most `capacity` updates in a burst, then one per `refill_every`.
///
/// A single bucket is shared by all users.
pub struct AdmissionGate {
    bucket: Mutex<Bucket>,
    capacity: u32,
    refill_every: Duration,
}

impl AdmissionGate {
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self::starting_at(capacity, refill_every, Instant::now())
    }

    fn starting_at(capacity: u32, refill_every: Duration, now: Instant) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: now,
            }),
            capacity,
            refill_every: refill_every.max(Duration::from_millis(1)),
        }
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Integer refill; the remainder of a partial period carries over.
    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let period_ms = self.refill_every.as_millis();
        let earned = elapsed.as_millis() / period_ms;
        if earned == 0 {
            return;
        }

        let tokens = (bucket.tokens as u128 + earned).min(self.capacity as u128) as u32;
        if tokens == self.capacity {
            bucket.last_refill = now;
        } else {
            let consumed_ms = (earned * period_ms) as u64;
            bucket.last_refill += Duration::from_millis(consumed_ms);
        }
        bucket.tokens = tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let start = Instant::now();
        let gate = AdmissionGate::starting_at(10, Duration::from_millis(100), start);

        for _ in 0..10 {
            assert!(gate.allow_at(start));
        }
        assert!(!gate.allow_at(start));
        assert!(!gate.allow_at(start + Duration::from_millis(99)));
    }

    #[test]
    fn test_refills_one_per_period() {
        let start = Instant::now();
        let gate = AdmissionGate::starting_at(10, Duration::from_millis(100), start);
        for _ in 0..10 {
            gate.allow_at(start);
        }

        let later = start + Duration::from_millis(250);
        assert!(gate.allow_at(later));
        assert!(gate.allow_at(later));
        assert!(!gate.allow_at(later));

        // The 50ms left over from the first refill still counts
        assert!(gate.allow_at(start + Duration::from_millis(300)));
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let start = Instant::now();
        let gate = AdmissionGate::starting_at(3, Duration::from_millis(100), start);
        for _ in 0..3 {
            gate.allow_at(start);
        }

        let much_later = start + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(gate.allow_at(much_later));
        }
        assert!(!gate.allow_at(much_later));
    }
}
