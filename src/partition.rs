//! Local and global key selection.
//!
//! Most transactions should stay within one partition of the keyspace, while a configured
//! percentage of them ("global" transactions) may touch any partition. The selector keeps a
//! shared pool of sequential cursors, one per worker thread. A worker's own cursor serves its
//! local transactions: it starts at a random record and then walks forward, so consecutive draws
//! stay close together. A global transaction instead picks any cursor of the pool (through the
//! configured request distribution) and advances that one.
//!
//! When a worker issues a global transaction, its next transaction is global as well. A global
//! transaction that aborts is therefore retried as a global one, and the configured mix is not
//! skewed towards local transactions by aborts.
//!
//! The pool lives as long as the workload. Every worker of every phase registers its own cursor,
//! and cursors of workers from earlier phases stay in the pool, where global transactions keep
//! picking and advancing them.

use crate::generator::{NumberGenerator, SequentialGenerator};
use crate::tracker::AcknowledgedCounter;
use crate::{Error, Result};
use log::debug;
use parking_lot::RwLock;
use rand::Rng;
use std::sync::Arc;

/// Where the keys of one transaction come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Local,
    Global,
}

/// Mutable state owned by one worker thread for its lifetime.
#[derive(Debug)]
pub struct ThreadState {
    partition: u64,
    /// Index of this worker's cursor in the shared pool, once registered.
    local: Option<usize>,
    replay_global: bool,
}

impl ThreadState {
    pub fn new(partition: u64) -> Self {
        Self {
            partition,
            local: None,
            replay_global: false,
        }
    }

    /// The partition assigned to this worker.
    pub fn partition(&self) -> u64 {
        self.partition
    }

    /// Whether the next transaction is forced to be global.
    pub fn replay_pending(&self) -> bool {
        self.replay_global
    }

    /// Decide the route of the next transaction from a percentage roll in `[0, 100)`.
    ///
    /// A pending replay is consumed first and always yields [`Route::Global`]. Otherwise a roll
    /// below `global_chance` yields a global transaction and arms the replay.
    pub fn route(&mut self, roll: u32, global_chance: i64) -> Route {
        if self.replay_global {
            self.replay_global = false;
            return Route::Global;
        }
        if i64::from(roll) < global_chance {
            self.replay_global = true;
            return Route::Global;
        }
        Route::Local
    }
}

pub struct PartitionedKeySelector {
    /// Draws record numbers for seeding cursors and picking a cursor for global transactions.
    base: NumberGenerator,
    inserts: Arc<AcknowledgedCounter>,
    pool: RwLock<Vec<Arc<SequentialGenerator>>>,
    records: u64,
    partitions: u64,
    global_chance: i64,
}

impl PartitionedKeySelector {
    /// `records` is the size of the keyspace the cursors walk; `global_chance` is a percentage
    /// (anything at or below zero disables global transactions).
    pub fn new(
        base: NumberGenerator,
        inserts: Arc<AcknowledgedCounter>,
        records: u64,
        partitions: u64,
        global_chance: i64,
    ) -> Result<Self> {
        if records == 0 {
            return Err(Error::invalid("recordcount", "should be positive"));
        }
        if partitions == 0 {
            return Err(Error::invalid("partitions", "should be positive"));
        }
        Ok(Self {
            base,
            inserts,
            pool: RwLock::new(Vec::new()),
            records,
            partitions,
            global_chance,
        })
    }

    /// Create the state of a new worker, with a randomly assigned partition.
    pub fn init_thread<R: Rng + ?Sized>(&self, rng: &mut R) -> ThreadState {
        ThreadState::new(rng.random_range(0..self.partitions))
    }

    /// Draw a record number from the request distribution that is known to be durable.
    ///
    /// Draws beyond the acknowledged range are discarded and redrawn. An exponential
    /// distribution counts back from the newest acknowledged record instead.
    pub fn next_keynum<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        loop {
            let limit = self.inserts.limit();
            let v = self.base.next(rng);
            if self.base.is_exponential() {
                if v < limit {
                    return limit - 1 - v;
                }
            } else if v < limit {
                return v;
            }
        }
    }

    fn register<R: Rng + ?Sized>(&self, state: &mut ThreadState, rng: &mut R) -> usize {
        let seed = self.next_keynum(rng) % self.records;
        let cursor = SequentialGenerator::starting_at(0, self.records - 1, seed)
            .map(Arc::new)
            .unwrap_or_else(|_| unreachable!("records is positive"));
        let mut pool = self.pool.write();
        let index = pool.len();
        pool.push(cursor);
        state.local = Some(index);
        debug!(
            "Registered local cursor {} at {} for partition {}",
            index,
            seed,
            state.partition()
        );
        index
    }

    /// Pick the key source for the next transaction of the worker owning `state`.
    pub fn select<R: Rng + ?Sized>(&self, state: &mut ThreadState, rng: &mut R) -> KeyChooser<'_> {
        let index = match state.local {
            Some(i) => i,
            None => self.register(state, rng),
        };
        let local = self.pool.read()[index].clone();
        let route = if self.partitions == 1 {
            Route::Local
        } else {
            state.route(rng.random_range(0..100), self.global_chance)
        };
        KeyChooser {
            selector: self,
            route,
            local,
        }
    }

    fn next_global<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let pick = self.next_keynum(rng);
        let cursor = {
            let pool = self.pool.read();
            pool[(pick % pool.len() as u64) as usize].clone()
        };
        cursor.next()
    }

    /// Number of registered local cursors.
    pub fn pool_size(&self) -> usize {
        self.pool.read().len()
    }
}

/// The key source of one transaction.
pub struct KeyChooser<'a> {
    selector: &'a PartitionedKeySelector,
    route: Route,
    local: Arc<SequentialGenerator>,
}

impl KeyChooser<'_> {
    pub fn route(&self) -> Route {
        self.route
    }

    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match self.route {
            Route::Local => self.local.next(),
            Route::Global => self.selector.next_global(rng),
        }
    }
}
