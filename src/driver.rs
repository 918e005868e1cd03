//! Turning chosen operations into store calls.
//!
//! Every operation runs in its own store transaction and is measured under its operation name.
//! When data integrity checking is on, every row read back is checked and the outcome is measured
//! under `VERIFY`.

use crate::chooser::OperationKind;
use crate::measure::Measure;
use crate::partition::{KeyChooser, ThreadState};
use crate::value::{deterministic_value, random_value, verify};
use crate::workload::Workload;
use crate::{Record, Rows, Status, TxId, TxStoreHandle};
use quanta::Instant;
use rand::Rng;

const VERIFY: &str = "VERIFY";

/// Run `op` inside a new transaction. A failed operation aborts the transaction, and a commit
/// that fails turns a successful operation into [`Status::Error`].
fn transact<F>(handle: &mut dyn TxStoreHandle, op: F) -> Status
where
    F: FnOnce(&mut dyn TxStoreHandle, TxId) -> Status,
{
    let tx = handle.begin();
    let status = op(&mut *handle, tx);
    if !status.is_ok() {
        handle.abort(tx);
        return status;
    }
    match handle.commit(tx) {
        true => Status::Ok,
        false => Status::Error,
    }
}

/// Measure `f` under `name`, both from its actual start and from its scheduled start.
fn timed<F>(
    measure: &mut dyn Measure,
    name: &'static str,
    intended: Option<Instant>,
    f: F,
) -> Status
where
    F: FnOnce() -> Status,
{
    let start = Instant::now();
    let status = f();
    let end = Instant::now();
    measure.measure(name, end.saturating_duration_since(start));
    if let Some(intended) = intended {
        measure.measure_intended(name, end.saturating_duration_since(intended));
    }
    measure.report_status(name, status);
    status
}

impl Workload {
    /// Insert the next record of the load phase, retrying failures as configured.
    ///
    /// Returns `None` once every record of the load range has been claimed, otherwise whether
    /// the record was inserted. A record that could not be inserted is skipped.
    pub fn do_insert<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        intended: Option<Instant>,
    ) -> Option<bool> {
        let keynum = self.next_load_keynum()?;
        let key = self.keys.key(keynum);
        let values = self.build_values(&key, rng);
        let inserted = self.retrier.run(rng, &self.interrupt, &key, || {
            timed(measure, OperationKind::Insert.name(), intended, || {
                transact(handle, |h, tx| h.insert(tx, &key, &values))
            })
            .is_ok()
        });
        Some(inserted)
    }

    /// Choose and issue one operation of the run phase.
    ///
    /// Returns the kind of the issued operation, or `None` if no operation has a positive
    /// proportion.
    pub fn do_transaction<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        state: &mut ThreadState,
        rng: &mut R,
        measure: &mut dyn Measure,
        intended: Option<Instant>,
    ) -> Option<OperationKind> {
        let kind = self.chooser.choose(rng)?;
        if kind == OperationKind::Insert {
            self.transaction_insert(handle, rng, measure, intended);
            return Some(kind);
        }
        let keys = self.selector.select(state, rng);
        let op = Op {
            keys: &keys,
            intended,
        };
        match kind {
            OperationKind::Read => self.transaction_read(handle, rng, measure, &op),
            OperationKind::Update => self.transaction_update(handle, rng, measure, &op),
            OperationKind::Scan => self.transaction_scan(handle, rng, measure, &op),
            OperationKind::ReadModifyWrite => {
                self.transaction_read_modify_write(handle, rng, measure, &op)
            }
            OperationKind::MultiRead => self.transaction_multi_read(handle, rng, measure, &op),
            OperationKind::MultiUpdate => {
                self.transaction_multi_update(handle, rng, measure, &op)
            }
            OperationKind::ScanWrite => self.transaction_scan_write(handle, rng, measure, &op),
            OperationKind::Complex => self.transaction_complex(handle, rng, measure, &op),
            OperationKind::Insert => unreachable!("inserts do not select existing keys"),
        }
        Some(kind)
    }

    fn transaction_insert<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        intended: Option<Instant>,
    ) {
        let offset = self.inserts.next_sequence();
        let key = self.keys.key(offset);
        let values = self.build_values(&key, rng);
        timed(measure, OperationKind::Insert.name(), intended, || {
            transact(handle, |h, tx| h.insert(tx, &key, &values))
        });
        // a failed insert must not hold back the watermark
        self.inserts.acknowledge(offset);
    }

    fn transaction_read<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let key = self.next_key(op.keys, rng);
        let fields = self.read_fields(rng);
        let mut cells = Record::new();
        timed(measure, OperationKind::Read.name(), op.intended, || {
            transact(handle, |h, tx| {
                h.read(tx, &key, fields.as_deref(), &mut cells)
            })
        });
        if self.data_integrity {
            self.verify_row(rng, measure, &key, &cells);
        }
    }

    fn transaction_update<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let key = self.next_key(op.keys, rng);
        let values = self.build_update(&key, rng);
        timed(measure, OperationKind::Update.name(), op.intended, || {
            transact(handle, |h, tx| h.update(tx, &key, &values))
        });
    }

    fn transaction_scan<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let start = self.next_key(op.keys, rng);
        let len = self.scan_length.next(rng) as usize;
        let fields = self.scan_fields(rng);
        let mut rows = Vec::new();
        timed(measure, OperationKind::Scan.name(), op.intended, || {
            transact(handle, |h, tx| {
                h.scan(tx, &start, len, fields.as_deref(), &mut rows)
            })
        });
    }

    fn transaction_read_modify_write<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let key = self.next_key(op.keys, rng);
        let fields = self.read_fields(rng);
        let values = self.build_update(&key, rng);
        let mut cells = Record::new();
        timed(measure, OperationKind::ReadModifyWrite.name(), op.intended, || {
            transact(handle, |h, tx| {
                let status = h.read(tx, &key, fields.as_deref(), &mut cells);
                if !status.is_ok() {
                    return status;
                }
                h.update(tx, &key, &values)
            })
        });
        if self.data_integrity {
            self.verify_row(rng, measure, &key, &cells);
        }
    }

    fn transaction_multi_read<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let keys = self.next_keys(op.keys, rng);
        let fields = self.read_fields(rng);
        let mut rows = Rows::new();
        timed(measure, OperationKind::MultiRead.name(), op.intended, || {
            transact(handle, |h, tx| {
                h.read_multi(tx, &keys, fields.as_deref(), &mut rows)
            })
        });
        if self.data_integrity {
            let empty = Record::new();
            for key in keys.iter() {
                let cells = rows.get(key).unwrap_or(&empty);
                self.verify_row(rng, measure, key, cells);
            }
        }
    }

    fn transaction_multi_update<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let keys = self.next_keys(op.keys, rng);
        let values = self.build_shared_values(rng);
        timed(measure, OperationKind::MultiUpdate.name(), op.intended, || {
            transact(handle, |h, tx| h.update_multi(tx, &keys, &values))
        });
    }

    fn transaction_scan_write<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let start = self.next_key(op.keys, rng);
        let len = self.scan_length.next(rng) as usize;
        // the scanned field is the one that gets overwritten
        let (fields, values) = match self.read_all_fields {
            true => (None, self.build_shared_values_all(rng)),
            false => {
                let field = self.random_field(rng).clone();
                let mut values = Record::new();
                values.insert(field.clone(), self.random_payload(rng));
                (Some(vec![field]), values)
            }
        };
        timed(measure, OperationKind::ScanWrite.name(), op.intended, || {
            transact(handle, |h, tx| {
                h.scan_write(tx, &start, len, fields.as_deref(), &values)
            })
        });
    }

    fn transaction_complex<R: Rng + ?Sized>(
        &self,
        handle: &mut dyn TxStoreHandle,
        rng: &mut R,
        measure: &mut dyn Measure,
        op: &Op,
    ) {
        let len = self.transaction_length.next(rng);
        let mut read_keys = Vec::new();
        let mut write_keys = Vec::new();
        for _ in 0..len {
            let key = self.next_key(op.keys, rng);
            match rng.random_bool(0.5) {
                true => read_keys.push(key),
                false => write_keys.push(key),
            }
        }
        let fields = self.scan_fields(rng);
        let values = self.build_shared_values(rng);
        let mut rows = Rows::new();
        timed(measure, OperationKind::Complex.name(), op.intended, || {
            transact(handle, |h, tx| {
                h.complex(
                    tx,
                    &read_keys,
                    fields.as_deref(),
                    &mut rows,
                    &write_keys,
                    &values,
                )
            })
        });
    }

    fn verify_row<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        measure: &mut dyn Measure,
        key: &str,
        cells: &Record,
    ) {
        let start = Instant::now();
        let size = self.field_length.next(rng) as usize;
        let status = verify(key, cells, size).status();
        measure.measure(VERIFY, start.elapsed());
        measure.report_status(VERIFY, status);
    }

    fn next_key<R: Rng + ?Sized>(&self, keys: &KeyChooser, rng: &mut R) -> String {
        let keynum = self.durable_keynum(|| keys.next(rng));
        self.keys.key(keynum)
    }

    fn next_keys<R: Rng + ?Sized>(&self, keys: &KeyChooser, rng: &mut R) -> Vec<String> {
        let len = self.transaction_length.next(rng);
        (0..len).map(|_| self.next_key(keys, rng)).collect()
    }

    /// Fields requested by reads that may be verified.
    fn read_fields<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<String>> {
        if !self.read_all_fields {
            Some(vec![self.random_field(rng).clone()])
        } else if self.data_integrity {
            Some(self.fields.clone())
        } else {
            None
        }
    }

    fn scan_fields<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<String>> {
        match self.read_all_fields {
            true => None,
            false => Some(vec![self.random_field(rng).clone()]),
        }
    }

    fn random_payload<R: Rng + ?Sized>(&self, rng: &mut R) -> Box<[u8]> {
        let size = self.field_length.next(rng) as usize;
        random_value(rng, size)
    }

    fn build_value<R: Rng + ?Sized>(&self, key: &str, field: &str, rng: &mut R) -> Box<[u8]> {
        let size = self.field_length.next(rng) as usize;
        match self.data_integrity {
            true => deterministic_value(key, field, size),
            false => random_value(rng, size),
        }
    }

    /// Values for every field of row `key`.
    fn build_values<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Record {
        self.fields
            .iter()
            .map(|f| (f.clone(), self.build_value(key, f, rng)))
            .collect()
    }

    /// Values for one random field of row `key`, or every field with `writeallfields`.
    fn build_update<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Record {
        if self.write_all_fields {
            return self.build_values(key, rng);
        }
        let field = self.random_field(rng).clone();
        let value = self.build_value(key, &field, rng);
        let mut values = Record::new();
        values.insert(field, value);
        values
    }

    /// Random values written into several rows at once.
    fn build_shared_values<R: Rng + ?Sized>(&self, rng: &mut R) -> Record {
        if self.write_all_fields {
            return self.build_shared_values_all(rng);
        }
        let field = self.random_field(rng).clone();
        let mut values = Record::new();
        values.insert(field, self.random_payload(rng));
        values
    }

    fn build_shared_values_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Record {
        self.fields
            .iter()
            .map(|f| (f.clone(), self.random_payload(rng)))
            .collect()
    }
}

/// The parts of one run-phase operation decided before its payload.
struct Op<'a, 'b> {
    keys: &'a KeyChooser<'b>,
    intended: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Measurements;
    use crate::stores::memory::MemoryStore;
    use crate::workload::WorkloadOpt;
    use crate::TxStore;

    /// Records what was asked of it and fails on demand.
    #[derive(Default)]
    struct Recorder {
        fail_inserts: bool,
        fail_commits: bool,
        begun: usize,
        committed: usize,
        aborted: usize,
        inserts: Vec<String>,
        complex: Vec<(usize, usize)>,
    }

    impl TxStoreHandle for Recorder {
        fn begin(&mut self) -> TxId {
            self.begun += 1;
            TxId(self.begun as u64)
        }

        fn commit(&mut self, _tx: TxId) -> bool {
            self.committed += 1;
            !self.fail_commits
        }

        fn abort(&mut self, _tx: TxId) {
            self.aborted += 1;
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

        fn insert(&mut self, _: TxId, key: &str, _: &Record) -> Status {
            self.inserts.push(key.to_string());
            match self.fail_inserts {
                true => Status::Error,
                false => Status::Ok,
            }
        }

        fn delete(&mut self, _: TxId, _: &str) -> Status {
            Status::Ok
        }

        fn read_multi(
            &mut self,
            _: TxId,
            _: &[String],
            _: Option<&[String]>,
            _: &mut Rows,
        ) -> Status {
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
            read_keys: &[String],
            _: Option<&[String]>,
            _: &mut Rows,
            write_keys: &[String],
            _: &Record,
        ) -> Status {
            self.complex.push((read_keys.len(), write_keys.len()));
            Status::Ok
        }
    }

    fn load(w: &Workload, handle: &mut dyn TxStoreHandle, m: &mut Measurements) {
        let mut rng = rand::rng();
        while w.do_insert(handle, &mut rng, m, None).is_some() {}
    }

    fn run(w: &Workload, handle: &mut dyn TxStoreHandle, m: &mut Measurements, n: usize) {
        let mut rng = rand::rng();
        let mut state = w.init_thread(&mut rng);
        for _ in 0..n {
            assert!(w
                .do_transaction(handle, &mut state, &mut rng, m, None)
                .is_some());
        }
    }

    #[test]
    fn failed_commit_is_an_error() {
        let mut r = Recorder {
            fail_commits: true,
            ..Default::default()
        };
        assert_eq!(transact(&mut r, |h, tx| h.update(tx, "k", &Record::new())), Status::Error);
        assert_eq!((r.begun, r.committed, r.aborted), (1, 1, 0));
    }

    #[test]
    fn failed_operation_aborts() {
        let mut r = Recorder {
            fail_inserts: true,
            ..Default::default()
        };
        assert_eq!(transact(&mut r, |h, tx| h.insert(tx, "k", &Record::new())), Status::Error);
        assert_eq!((r.begun, r.committed, r.aborted), (1, 0, 1));
    }

    #[test]
    fn load_inserts_every_record_once() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 200,
            insertorder: "ordered".to_string(),
            ..Default::default()
        })
        .unwrap();
        let store = MemoryStore::new(0);
        let mut handle = store.handle();
        let mut m = Measurements::new();
        load(&w, &mut *handle, &mut m);
        assert_eq!(store.len(), 200);
        assert_eq!(m.count("INSERT"), 200);
        assert_eq!(m.status_count("INSERT", Status::Ok), 200);
        let mut rng = rand::rng();
        assert_eq!(w.do_insert(&mut *handle, &mut rng, &mut m, None), None);
    }

    #[test]
    fn load_retries_then_moves_on() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 2,
            insertorder: "ordered".to_string(),
            core_workload_insertion_retry_limit: 2,
            core_workload_insertion_retry_interval: 0.001,
            ..Default::default()
        })
        .unwrap();
        let mut r = Recorder {
            fail_inserts: true,
            ..Default::default()
        };
        let mut m = Measurements::new();
        let mut rng = rand::rng();
        assert_eq!(w.do_insert(&mut r, &mut rng, &mut m, None), Some(false));
        assert_eq!(r.inserts, vec!["user0"; 3]);
        assert_eq!(w.do_insert(&mut r, &mut rng, &mut m, None), Some(false));
        assert_eq!(r.inserts.len(), 6);
        assert_eq!(r.inserts[5], "user1");
        assert_eq!(m.status_count("INSERT", Status::Error), 6);
        assert_eq!(w.do_insert(&mut r, &mut rng, &mut m, None), None);
    }

    #[test]
    fn integrity_holds_after_load() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 100,
            dataintegrity: true,
            readproportion: 0.4,
            updateproportion: 0.3,
            readmodifywriteproportion: 0.2,
            multireadproportion: 0.1,
            maxtransactionlength: 5,
            ..Default::default()
        })
        .unwrap();
        let store = MemoryStore::new(0);
        let mut handle = store.handle();
        let mut m = Measurements::new();
        load(&w, &mut *handle, &mut m);
        run(&w, &mut *handle, &mut m, 2000);
        assert!(m.status_count(VERIFY, Status::Ok) > 0);
        assert_eq!(m.status_count(VERIFY, Status::UnexpectedState), 0);
        assert_eq!(m.status_count(VERIFY, Status::Error), 0);
    }

    #[test]
    fn integrity_detects_corruption() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 1,
            dataintegrity: true,
            readproportion: 1.0,
            updateproportion: 0.0,
            fieldcount: 2,
            fieldlength: 20,
            ..Default::default()
        })
        .unwrap();
        let store = MemoryStore::new(0);
        let mut handle = store.handle();
        let mut m = Measurements::new();
        load(&w, &mut *handle, &mut m);

        let key = w.keys.key(0);
        let mut value = deterministic_value(&key, "field1", 20);
        value[3] ^= 0x20;
        let mut corrupted = Record::new();
        corrupted.insert("field1".to_string(), value);
        let tx = handle.begin();
        handle.update(tx, &key, &corrupted);
        assert!(handle.commit(tx));

        run(&w, &mut *handle, &mut m, 10);
        assert_eq!(m.status_count(VERIFY, Status::UnexpectedState), 10);
        assert_eq!(m.status_count(VERIFY, Status::Ok), 0);
    }

    #[test]
    fn integrity_reports_missing_rows() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 10,
            dataintegrity: true,
            readproportion: 1.0,
            updateproportion: 0.0,
            ..Default::default()
        })
        .unwrap();
        let store = MemoryStore::new(0);
        let mut handle = store.handle();
        let mut m = Measurements::new();
        // nothing loaded
        run(&w, &mut *handle, &mut m, 10);
        assert_eq!(m.status_count("READ", Status::NotFound), 10);
        assert_eq!(m.status_count(VERIFY, Status::Error), 10);
    }

    #[test]
    fn failed_inserts_are_acknowledged() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 50,
            readproportion: 0.0,
            updateproportion: 0.0,
            insertproportion: 1.0,
            ..Default::default()
        })
        .unwrap();
        let store = MemoryStore::new(100);
        let mut handle = store.handle();
        let mut m = Measurements::new();
        run(&w, &mut *handle, &mut m, 10);
        assert_eq!(m.status_count("INSERT", Status::Error), 10);
        assert_eq!(w.inserts().limit(), 60);
        assert!(store.is_empty());
    }

    #[test]
    fn inserted_keys_follow_the_sequence() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 50,
            insertorder: "ordered".to_string(),
            readproportion: 0.0,
            updateproportion: 0.0,
            insertproportion: 1.0,
            ..Default::default()
        })
        .unwrap();
        let mut r = Recorder::default();
        let mut m = Measurements::new();
        run(&w, &mut r, &mut m, 3);
        assert_eq!(r.inserts, vec!["user50", "user51", "user52"]);
        assert_eq!(w.inserts().limit(), 53);
    }

    #[test]
    fn complex_splits_reads_and_writes() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 100,
            readproportion: 0.0,
            updateproportion: 0.0,
            complexproportion: 1.0,
            maxtransactionlength: 20,
            ..Default::default()
        })
        .unwrap();
        let mut r = Recorder::default();
        let mut m = Measurements::new();
        run(&w, &mut r, &mut m, 500);
        assert_eq!(r.complex.len(), 500);
        let (reads, writes) = r
            .complex
            .iter()
            .fold((0, 0), |(a, b), (r, w)| (a + r, b + w));
        assert!(r.complex.iter().all(|(r, w)| (1..=20).contains(&(r + w))));
        let ratio = reads as f64 / (reads + writes) as f64;
        assert!(ratio > 0.45 && ratio < 0.55, "read ratio {}", ratio);
        assert_eq!(m.count("COMPLEX"), 500);
    }

    #[test]
    fn every_operation_kind() {
        let w = Workload::new(&WorkloadOpt {
            recordcount: 500,
            readproportion: 1.0,
            updateproportion: 1.0,
            insertproportion: 1.0,
            scanproportion: 1.0,
            readmodifywriteproportion: 1.0,
            multireadproportion: 1.0,
            multiupdateproportion: 1.0,
            scanwriteproportion: 1.0,
            complexproportion: 1.0,
            maxscanlength: 10,
            maxtransactionlength: 5,
            readallfields: false,
            writeallfields: true,
            partitions: 4,
            globalchance: 20,
            ..Default::default()
        })
        .unwrap();
        let store = MemoryStore::new(10);
        let mut handle = store.handle();
        let mut m = Measurements::new();
        load(&w, &mut *handle, &mut m);
        run(&w, &mut *handle, &mut m, 9000);
        for kind in [
            OperationKind::Read,
            OperationKind::Update,
            OperationKind::Scan,
            OperationKind::ReadModifyWrite,
            OperationKind::MultiRead,
            OperationKind::MultiUpdate,
            OperationKind::ScanWrite,
            OperationKind::Complex,
        ] {
            let n = m.count(kind.name());
            assert!(n > 800 && n < 1200, "{}: {}", kind.name(), n);
            // one in ten commits fails
            assert!(m.status_count(kind.name(), Status::Error) > 0, "{}", kind.name());
        }
        assert!(m.count("INSERT") > 500 + 800);
        assert_eq!(m.count(VERIFY), 0);
    }

    #[test]
    fn nothing_to_do() {
        let w = Workload::new(&WorkloadOpt {
            readproportion: 0.0,
            updateproportion: 0.0,
            ..Default::default()
        })
        .unwrap();
        let mut r = Recorder::default();
        let mut m = Measurements::new();
        let mut rng = rand::rng();
        let mut state = w.init_thread(&mut rng);
        assert_eq!(w.do_transaction(&mut r, &mut state, &mut rng, &mut m, None), None);
        assert_eq!(r.begun, 0);
    }
}
