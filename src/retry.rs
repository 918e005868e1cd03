//! Bounded retries for load-phase inserts, and the interrupt that cuts them short.

use log::{error, warn};
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A one-way stop signal shared by all workers.
///
/// Raising it wakes every thread that is sleeping in [`Interrupt::sleep`].
#[derive(Debug, Default)]
pub struct Interrupt {
    raised: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let _guard = self.lock.lock();
        self.raised.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Sleep for `d`, returning `false` if the interrupt was raised before or during the sleep.
    pub fn sleep(&self, d: Duration) -> bool {
        let deadline = Instant::now() + d;
        let mut guard = self.lock.lock();
        while !self.is_raised() {
            if self.cond.wait_until(&mut guard, deadline).timed_out() {
                return !self.is_raised();
            }
        }
        false
    }
}

/// Re-issues a failing insert up to `limit` more times, sleeping `interval * [0.8, 1.2)` between
/// attempts.
#[derive(Clone, Debug)]
pub struct InsertionRetrier {
    limit: u32,
    interval: Duration,
}

impl InsertionRetrier {
    pub fn new(limit: u32, interval: Duration) -> Self {
        Self { limit, interval }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Run `attempt` until it succeeds, the retries are used up, or `interrupt` is raised while
    /// waiting. Returns whether the last attempt succeeded.
    pub fn run<R, F>(&self, rng: &mut R, interrupt: &Interrupt, key: &str, mut attempt: F) -> bool
    where
        R: Rng + ?Sized,
        F: FnMut() -> bool,
    {
        let mut retries = 0u32;
        loop {
            if attempt() {
                return true;
            }
            retries += 1;
            if retries > self.limit {
                error!(
                    "Error inserting {}, not retrying any more, attempts {} retry limit {}",
                    key, retries, self.limit
                );
                return false;
            }
            warn!("Retrying insertion of {}, retry count {}", key, retries);
            let pause = self.interval.mul_f64(rng.random_range(0.8..1.2));
            if !interrupt.sleep(pause) {
                warn!("Insertion retry of {} interrupted", key);
                return false;
            }
        }
    }
}
