//! A store that does nothing. It can be used to measure the overhead of the workload itself.
//!
//! ## Configuration Format
//!
//! ``` toml
//! [store]
//! name = "null"
//! ```

use crate::stores::Registry;
use crate::*;

/// Every operation succeeds and every read comes back empty.
#[derive(Clone, Default)]
pub struct NullStore {
    next_tx: u64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_txstore(_opt: &toml::Table) -> Result<Box<dyn TxStore>> {
        Ok(Box::new(Self::new()))
    }
}

impl TxStore for NullStore {
    fn handle(&self) -> Box<dyn TxStoreHandle> {
        Box::new(self.clone())
    }
}

impl TxStoreHandle for NullStore {
    fn begin(&mut self) -> TxId {
        self.next_tx += 1;
        TxId(self.next_tx)
    }

    fn commit(&mut self, _tx: TxId) -> bool {
        true
    }

    fn read(&mut self, _: TxId, _: &str, _: Option<&[String]>, _: &mut Record) -> Status {
        Status::Ok
    }

    fn scan(
        &mut self,
        _: TxId,
        _: &str,
        _: usize,
        _: Option<&[String]>,
        _: &mut Vec<(String, Record)>,
    ) -> Status {
        Status::Ok
    }

    fn update(&mut self, _: TxId, _: &str, _: &Record) -> Status {
        Status::Ok
    }

    fn insert(&mut self, _: TxId, _: &str, _: &Record) -> Status {
        Status::Ok
    }

    fn delete(&mut self, _: TxId, _: &str) -> Status {
        Status::Ok
    }

    fn read_multi(&mut self, _: TxId, _: &[String], _: Option<&[String]>, _: &mut Rows) -> Status {
        Status::Ok
    }

    fn update_multi(&mut self, _: TxId, _: &[String], _: &Record) -> Status {
        Status::Ok
    }

    fn scan_write(
        &mut self,
        _: TxId,
        _: &str,
        _: usize,
        _: Option<&[String]>,
        _: &Record,
    ) -> Status {
        Status::Ok
    }

    fn complex(
        &mut self,
        _: TxId,
        _: &[String],
        _: Option<&[String]>,
        _: &mut Rows,
        _: &[String],
        _: &Record,
    ) -> Status {
        Status::Ok
    }
}

inventory::submit! {
    Registry::new("null", NullStore::new_txstore)
}
