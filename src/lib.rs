#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A workload generator for benchmarking transactional key-value stores.
//!
//! `txbench` drives read/update/insert/scan traffic, plus multi-key and mixed transactions,
//! against a pluggable store. Which keys get touched is decided by configurable statistical
//! access patterns, and most transactions are kept local to a partition while a configured
//! share of them spans partitions ("global" transactions). That way a store's local and
//! distributed commit paths can be stressed separately.
//!
//! To benchmark your own store, implement [`TxStore`] and [`TxStoreHandle`], register a
//! constructor with [`inventory`] (see [`mod@stores`]), and call [`cmdline()`] from your `main`.
//!
//! A few key design choices include:
//!
//! - The engine only decides *which* operation to issue on *which* keys and *when* a key is safe
//! to read. Transactions are opened and committed through the store's own handle, and the engine
//! adds no atomicity of its own.
//! - All shared mutable state (the insert watermark, sequential cursors) is an explicit value that
//! is injected into the engine. Per-worker state is a [`partition::ThreadState`] that the caller
//! owns and passes to every call.
//! - A failing operation is a [`Status`], never a panic or an aborted run.
//!
//! More detailed usage could be found in the module-level rustdocs:
//!
//! - [`mod@bench`] for the config format of a benchmark.
//! - [`mod@workload`] for the workload options.
//! - [`mod@stores`] for the built-in stores.
//! - [`cmdline()`] for the usage of the default command line interface.

use hashbrown::HashMap;
use std::collections::BTreeMap;

/// The fields of a single row, keyed by field name.
pub type Record = BTreeMap<String, Box<[u8]>>;

/// Rows returned by multi-key reads, keyed by row key.
pub type Rows = HashMap<String, Record>;

/// An opaque transaction identifier handed out by [`TxStoreHandle::begin`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxId(pub u64);

/// The outcome of a single store operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Ok,
    /// The requested row does not exist.
    NotFound,
    /// The store failed the operation, or the transaction did not commit.
    Error,
    /// Data came back, but it is not what was written.
    UnexpectedState,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::Error => "ERROR",
            Status::UnexpectedState => "UNEXPECTED_STATE",
        }
    }
}

/// A synchronous, thread-safe transactional store.
///
/// The store itself is shared by all workers; each worker creates its own handle and uses it
/// exclusively.
pub trait TxStore: Send + Sync + 'static {
    /// Create a handle for one worker thread.
    fn handle(&self) -> Box<dyn TxStoreHandle>;
}

/// A per-thread handle that references a [`TxStore`].
///
/// Every operation runs inside a transaction opened with [`begin`](TxStoreHandle::begin). When
/// `fields` is `None`, all fields of a row are requested.
pub trait TxStoreHandle {
    /// Open a transaction.
    fn begin(&mut self) -> TxId;

    /// Try to commit a transaction, returning whether it committed.
    fn commit(&mut self, tx: TxId) -> bool;

    /// Discard a transaction after a failed operation.
    fn abort(&mut self, _tx: TxId) {}

    /// Read one row.
    fn read(&mut self, tx: TxId, key: &str, fields: Option<&[String]>, result: &mut Record)
        -> Status;

    /// Read up to `n` rows in key order starting from the first key greater than or equal to
    /// `start`.
    fn scan(
        &mut self,
        tx: TxId,
        start: &str,
        n: usize,
        fields: Option<&[String]>,
        result: &mut Vec<(String, Record)>,
    ) -> Status;

    /// Overwrite the given fields of a row.
    fn update(&mut self, tx: TxId, key: &str, values: &Record) -> Status;

    /// Insert a new row.
    fn insert(&mut self, tx: TxId, key: &str, values: &Record) -> Status;

    /// Remove a row.
    fn delete(&mut self, tx: TxId, key: &str) -> Status;

    /// Read several rows in one transaction.
    fn read_multi(
        &mut self,
        tx: TxId,
        keys: &[String],
        fields: Option<&[String]>,
        result: &mut Rows,
    ) -> Status;

    /// Write the same values into several rows in one transaction.
    fn update_multi(&mut self, tx: TxId, keys: &[String], values: &Record) -> Status;

    /// Scan up to `n` rows starting at `start` and overwrite each with `values`.
    fn scan_write(
        &mut self,
        tx: TxId,
        start: &str,
        n: usize,
        fields: Option<&[String]>,
        values: &Record,
    ) -> Status;

    /// Read `read_keys` and write `values` into `write_keys`, all in one transaction.
    fn complex(
        &mut self,
        tx: TxId,
        read_keys: &[String],
        fields: Option<&[String]>,
        result: &mut Rows,
        write_keys: &[String],
        values: &Record,
    ) -> Status;
}

pub mod bench;
pub mod chooser;
mod cmdline;
mod driver;
pub mod error;
pub mod generator;
pub mod measure;
pub mod partition;
pub mod retry;
pub mod stores;
pub mod tracker;
pub mod value;
pub mod workload;

pub use cmdline::cmdline;
pub use error::{Error, Result};

pub extern crate inventory;
pub extern crate toml;
