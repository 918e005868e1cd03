//! Tracking of out-of-order insert completion.
//!
//! Inserts issued during a run get strictly increasing offsets from
//! [`AcknowledgedCounter::next_sequence`], but they complete in any order. Reads must only target
//! rows that are known to exist, so the counter keeps a sliding window of completion bits
//! anchored at the lowest unacknowledged offset and publishes the contiguous prefix as a
//! watermark.
//!
//! Offsets below the starting point (the preloaded records) count as acknowledged from the
//! beginning.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of in-flight offsets the window can hold.
pub const WINDOW_SIZE: u64 = 1 << 20;

struct Window {
    slots: Box<[bool]>,
    /// The lowest offset that has not been acknowledged yet.
    low: u64,
}

pub struct AcknowledgedCounter {
    counter: AtomicU64,
    /// Mirror of `window.low`, readable without taking the lock.
    limit: AtomicU64,
    window: Mutex<Window>,
    mask: u64,
}

impl AcknowledgedCounter {
    /// A counter whose first issued offset is `start`; every offset below it is treated as
    /// already acknowledged.
    pub fn new(start: u64) -> Self {
        Self::with_capacity(start, WINDOW_SIZE)
    }

    pub fn with_capacity(start: u64, capacity: u64) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "window capacity should be a power of two"
        );
        let slots = (0..capacity).map(|_| false).collect();
        Self {
            counter: AtomicU64::new(start),
            limit: AtomicU64::new(start),
            window: Mutex::new(Window { slots, low: start }),
            mask: capacity - 1,
        }
    }

    /// Issue the next insert offset.
    pub fn next_sequence(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Mark `offset` as durably inserted.
    ///
    /// Offsets that are already below the watermark, or already acknowledged, are ignored.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is a full window or more ahead of the watermark: the producers have
    /// outrun the window and it must be made larger.
    pub fn acknowledge(&self, offset: u64) {
        let mut window = self.window.lock();
        if offset < window.low {
            return;
        }
        let capacity = self.mask + 1;
        assert!(
            offset - window.low < capacity,
            "too many unacknowledged insertion keys: offset {} is {} ahead of watermark {} \
             (window size {})",
            offset,
            offset - window.low,
            window.low,
            capacity
        );
        let slot = (offset & self.mask) as usize;
        if window.slots[slot] {
            return;
        }
        window.slots[slot] = true;

        // the watermark only ever moves here, one slot at a time
        let mut low = window.low;
        loop {
            let slot = (low & self.mask) as usize;
            if !window.slots[slot] {
                break;
            }
            window.slots[slot] = false;
            low += 1;
        }
        window.low = low;
        self.limit.store(low, Ordering::Release);
    }

    /// The number of offsets, counted from zero, that are known to be durable. Every offset
    /// strictly below this value may be read.
    pub fn limit(&self) -> u64 {
        self.limit.load(Ordering::Acquire)
    }

    /// The greatest offset `v` such that every offset `<= v` is acknowledged, if any.
    pub fn high_water_mark(&self) -> Option<u64> {
        self.limit().checked_sub(1)
    }

    /// How many offsets have been issued so far, including the preloaded range.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use std::sync::Arc;

    #[test]
    fn in_order_acknowledgements() {
        let c = AcknowledgedCounter::new(0);
        assert_eq!(c.high_water_mark(), None);
        for i in 0..100 {
            assert_eq!(c.next_sequence(), i);
            c.acknowledge(i);
            assert_eq!(c.high_water_mark(), Some(i));
            assert_eq!(c.limit(), i + 1);
        }
    }

    #[test]
    fn preloaded_records_are_durable() {
        let c = AcknowledgedCounter::new(1000);
        assert_eq!(c.high_water_mark(), Some(999));
        assert_eq!(c.next_sequence(), 1000);
        assert_eq!(c.limit(), 1000);
        c.acknowledge(1000);
        assert_eq!(c.limit(), 1001);
    }

    #[test]
    fn gap_holds_the_watermark() {
        let c = AcknowledgedCounter::new(0);
        for _ in 0..4 {
            c.next_sequence();
        }
        c.acknowledge(1);
        c.acknowledge(3);
        assert_eq!(c.limit(), 0);
        c.acknowledge(0);
        assert_eq!(c.limit(), 2);
        c.acknowledge(2);
        assert_eq!(c.limit(), 4);
    }

    #[test]
    fn duplicate_and_stale_acknowledgements_are_ignored() {
        let c = AcknowledgedCounter::with_capacity(0, 8);
        c.acknowledge(1);
        c.acknowledge(1);
        assert_eq!(c.limit(), 0);
        c.acknowledge(0);
        assert_eq!(c.limit(), 2);
        c.acknowledge(0);
        c.acknowledge(1);
        assert_eq!(c.limit(), 2);
        // offset 9 reuses the slot freed by offset 1
        c.acknowledge(9);
        assert_eq!(c.limit(), 2);
    }

    #[test]
    fn watermark_is_longest_acknowledged_prefix() {
        let mut rng = rand::rng();
        let mut offsets: Vec<u64> = (0..2000).collect();
        offsets.shuffle(&mut rng);
        let c = AcknowledgedCounter::with_capacity(0, 4096);
        let mut acked = vec![false; 2000];
        for (n, o) in offsets.iter().enumerate() {
            c.acknowledge(*o);
            acked[*o as usize] = true;
            let prefix = acked.iter().take_while(|a| **a).count() as u64;
            assert_eq!(c.limit(), prefix);
            assert!(c.limit() <= n as u64 + 1);
        }
        assert_eq!(c.limit(), 2000);
    }

    #[test]
    fn window_wraps_around() {
        let c = AcknowledgedCounter::with_capacity(0, 4);
        for i in 0..64 {
            c.acknowledge(i);
        }
        assert_eq!(c.limit(), 64);
    }

    #[test]
    #[should_panic(expected = "too many unacknowledged insertion keys")]
    fn producer_outruns_window() {
        let c = AcknowledgedCounter::with_capacity(0, 8);
        c.acknowledge(8);
    }

    #[test]
    fn concurrent_acknowledgements() {
        let c = Arc::new(AcknowledgedCounter::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for _ in 0..10000 {
                        let o = c.next_sequence();
                        c.acknowledge(o);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(c.issued(), 80000);
        assert_eq!(c.limit(), 80000);
    }
}
