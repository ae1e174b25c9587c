use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Clone, Debug, Default)]
pub struct Limits {
    /// Minimum spacing between the start of any two requests
    pub min_interval: Duration,
    /// Maximum requests in flight at once
    pub concurrency: Option<u32>,
}

/// Limiter shared by every plan that talks to the same upstream.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // Earliest instant the next request may start
    next_slot: Mutex<Instant>,
    sem: Option<Arc<Semaphore>>,
}

/// Held for the duration of one request; releases the concurrency slot on drop
#[derive(Debug)]
pub struct RatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let sem = limits
            .concurrency
            .map(|c| Arc::new(Semaphore::new(c.max(1) as usize)));
        Self {
            inner: Arc::new(Inner {
                limits,
                next_slot: Mutex::new(Instant::now()),
                sem,
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Limits::default())
    }

    /// Wait for a concurrency slot and for the next free time slot.
    pub async fn acquire(&self) -> RatePermit {
        // Concurrency first
        let permit = match &self.inner.sem {
            Some(sem) => sem.clone().acquire_owned().await.ok(),
            None => None,
        };

        let interval = self.inner.limits.min_interval;
        if !interval.is_zero() {
            // Reserve a slot while holding the lock, sleep after releasing it
            let start = {
                let mut next_slot = self.inner.next_slot.lock().await;
                let now = Instant::now();
                let start = if *next_slot > now { *next_slot } else { now };
                *next_slot = start + interval;
                start
            };
            tokio::time::sleep_until(start).await;
        }

        RatePermit { _permit: permit }
    }
}
