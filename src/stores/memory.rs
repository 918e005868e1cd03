//! An in-memory store backed by a [`BTreeMap`] behind a [`RwLock`].
//!
//! Writes of a transaction are buffered in its handle and applied atomically on commit. Reads see
//! committed rows only, not the writes buffered by their own transaction.
//!
//! ## Configuration Format
//!
//! ``` toml
//! [store]
//! name = "memory"
//! abort_chance = 0 # optional, percentage of commits that fail
//! ```

use crate::stores::Registry;
use crate::*;
use log::debug;
use parking_lot::RwLock;
use rand::rngs::ThreadRng;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct MemoryStoreOpt {
    #[serde(default)]
    pub abort_chance: u32,
}

#[derive(Clone)]
pub struct MemoryStore {
    rows: Arc<RwLock<BTreeMap<String, Record>>>,
    abort_chance: u32,
}

impl MemoryStore {
    /// `abort_chance` is the percentage of commits that fail and discard their writes.
    pub fn new(abort_chance: u32) -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            abort_chance: abort_chance.min(100),
        }
    }

    pub fn new_txstore(opt: &toml::Table) -> Result<Box<dyn TxStore>> {
        let opt: MemoryStoreOpt = opt.clone().try_into()?;
        debug!("Creating memory store with abort chance {}%", opt.abort_chance);
        Ok(Box::new(Self::new(opt.abort_chance)))
    }

    /// Number of committed rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TxStore for MemoryStore {
    fn handle(&self) -> Box<dyn TxStoreHandle> {
        Box::new(MemoryHandle {
            rows: self.rows.clone(),
            abort_chance: self.abort_chance,
            next_tx: 0,
            writes: Vec::new(),
            rng: rand::rng(),
        })
    }
}

enum Write {
    /// Replace the whole row.
    Put(Record),
    /// Overwrite some fields, creating the row if needed.
    Merge(Record),
    Delete,
}

pub struct MemoryHandle {
    rows: Arc<RwLock<BTreeMap<String, Record>>>,
    abort_chance: u32,
    next_tx: u64,
    writes: Vec<(String, Write)>,
    rng: ThreadRng,
}

fn project(row: &Record, fields: Option<&[String]>) -> Record {
    match fields {
        None => row.clone(),
        Some(fields) => fields
            .iter()
            .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
            .collect(),
    }
}

impl MemoryHandle {
    fn read_rows(
        &self,
        keys: &[String],
        fields: Option<&[String]>,
        result: &mut Rows,
    ) -> Status {
        let rows = self.rows.read();
        let mut status = Status::Ok;
        for key in keys {
            match rows.get(key) {
                Some(row) => {
                    result.insert(key.clone(), project(row, fields));
                }
                None => status = Status::NotFound,
            }
        }
        status
    }

    fn scan_keys(&self, start: &str, n: usize) -> Vec<String> {
        self.rows
            .read()
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .take(n)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl TxStoreHandle for MemoryHandle {
    fn begin(&mut self) -> TxId {
        self.writes.clear();
        self.next_tx += 1;
        TxId(self.next_tx)
    }

    fn commit(&mut self, _tx: TxId) -> bool {
        if self.abort_chance > 0 && self.rng.random_range(0..100) < self.abort_chance {
            self.writes.clear();
            return false;
        }
        let mut rows = self.rows.write();
        for (key, write) in self.writes.drain(..) {
            match write {
                Write::Put(values) => {
                    rows.insert(key, values);
                }
                Write::Merge(values) => {
                    rows.entry(key).or_default().extend(values);
                }
                Write::Delete => {
                    rows.remove(&key);
                }
            }
        }
        true
    }

    fn abort(&mut self, _tx: TxId) {
        self.writes.clear();
    }

    fn read(
        &mut self,
        _tx: TxId,
        key: &str,
        fields: Option<&[String]>,
        result: &mut Record,
    ) -> Status {
        match self.rows.read().get(key) {
            Some(row) => {
                *result = project(row, fields);
                Status::Ok
            }
            None => Status::NotFound,
        }
    }

    fn scan(
        &mut self,
        _tx: TxId,
        start: &str,
        n: usize,
        fields: Option<&[String]>,
        result: &mut Vec<(String, Record)>,
    ) -> Status {
        let rows = self.rows.read();
        result.extend(
            rows.range::<str, _>((Bound::Included(start), Bound::Unbounded))
                .take(n)
                .map(|(k, row)| (k.clone(), project(row, fields))),
        );
        Status::Ok
    }

    fn update(&mut self, _tx: TxId, key: &str, values: &Record) -> Status {
        self.writes
            .push((key.to_string(), Write::Merge(values.clone())));
        Status::Ok
    }

    fn insert(&mut self, _tx: TxId, key: &str, values: &Record) -> Status {
        self.writes.push((key.to_string(), Write::Put(values.clone())));
        Status::Ok
    }

    fn delete(&mut self, _tx: TxId, key: &str) -> Status {
        self.writes.push((key.to_string(), Write::Delete));
        Status::Ok
    }

    fn read_multi(
        &mut self,
        _tx: TxId,
        keys: &[String],
        fields: Option<&[String]>,
        result: &mut Rows,
    ) -> Status {
        self.read_rows(keys, fields, result)
    }

    fn update_multi(&mut self, _tx: TxId, keys: &[String], values: &Record) -> Status {
        for key in keys {
            self.writes.push((key.clone(), Write::Merge(values.clone())));
        }
        Status::Ok
    }

    fn scan_write(
        &mut self,
        _tx: TxId,
        start: &str,
        n: usize,
        _fields: Option<&[String]>,
        values: &Record,
    ) -> Status {
        for key in self.scan_keys(start, n) {
            self.writes.push((key, Write::Merge(values.clone())));
        }
        Status::Ok
    }

    fn complex(
        &mut self,
        _tx: TxId,
        read_keys: &[String],
        fields: Option<&[String]>,
        result: &mut Rows,
        write_keys: &[String],
        values: &Record,
    ) -> Status {
        let status = self.read_rows(read_keys, fields, result);
        for key in write_keys {
            self.writes.push((key.clone(), Write::Merge(values.clone())));
        }
        status
    }
}

inventory::submit! {
    Registry::new("memory", MemoryStore::new_txstore)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: &str) -> Record {
        let mut r = Record::new();
        r.insert("field0".to_string(), v.as_bytes().into());
        r
    }

    #[test]
    fn always_aborts() {
        let store = MemoryStore::new(100);
        let mut handle = store.handle();
        for _ in 0..10 {
            let tx = handle.begin();
            handle.insert(tx, "user1", &row("a"));
            assert!(!handle.commit(tx));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn some_commits_fail() {
        let store = MemoryStore::new(50);
        let mut handle = store.handle();
        let mut committed = 0;
        for i in 0..1000 {
            let tx = handle.begin();
            handle.insert(tx, &format!("user{:04}", i), &row("a"));
            if handle.commit(tx) {
                committed += 1;
            }
        }
        assert_eq!(store.len(), committed);
        assert!(committed > 400 && committed < 600);
    }

    #[test]
    fn writes_apply_in_order() {
        let store = MemoryStore::new(0);
        let mut handle = store.handle();
        let tx = handle.begin();
        handle.insert(tx, "user1", &row("a"));
        handle.delete(tx, "user1");
        handle.update(tx, "user2", &row("b"));
        assert!(handle.commit(tx));
        let tx = handle.begin();
        let mut r = Record::new();
        assert_eq!(handle.read(tx, "user1", None, &mut r), Status::NotFound);
        assert_eq!(handle.read(tx, "user2", None, &mut r), Status::Ok);
        assert_eq!(r, row("b"));
    }

    #[test]
    fn handles_share_rows() {
        let store = MemoryStore::new(0);
        let mut a = store.handle();
        let mut b = store.handle();
        let tx = a.begin();
        a.insert(tx, "user1", &row("a"));
        let other = b.begin();
        let mut r = Record::new();
        // not committed yet
        assert_eq!(b.read(other, "user1", None, &mut r), Status::NotFound);
        assert!(a.commit(tx));
        assert_eq!(b.read(other, "user1", None, &mut r), Status::Ok);
        assert!(b.commit(other));
    }

    #[test]
    fn scans_start_at_key() {
        let store = MemoryStore::new(0);
        let mut handle = store.handle();
        let tx = handle.begin();
        for i in 0..10 {
            handle.insert(tx, &format!("user{}", i), &row("a"));
        }
        assert!(handle.commit(tx));

        let tx = handle.begin();
        let mut rows = Vec::new();
        assert_eq!(handle.scan(tx, "user35", 3, None, &mut rows), Status::Ok);
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["user4", "user5", "user6"]);
        assert_eq!(
            handle.scan_write(tx, "user8", 5, None, &row("b")),
            Status::Ok
        );
        assert!(handle.commit(tx));

        let tx = handle.begin();
        let mut r = Record::new();
        handle.read(tx, "user7", None, &mut r);
        assert_eq!(r, row("a"));
        for key in ["user8", "user9"] {
            handle.read(tx, key, None, &mut r);
            assert_eq!(r, row("b"));
        }
        assert!(handle.commit(tx));
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn options() {
        let opt: toml::Table = toml::from_str("abort_chance = 250").unwrap();
        assert!(MemoryStore::new_txstore(&opt).is_ok());
        let opt = toml::Table::new();
        assert!(MemoryStore::new_txstore(&opt).is_ok());
    }
}
