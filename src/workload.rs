//! Workload definition.
//!
//! A workload is built once from the `[workload]` section of a benchmark file and then shared by
//! every worker of every phase, so that inserts acknowledged in one phase are visible to the key
//! choosers of the next. Per-worker state lives in a [`ThreadState`] created with
//! [`Workload::init_thread`].
//!
//! ## Configuration Format
//!
//! ```toml
//! [workload]
//! recordcount = 10000
//! operationcount = 100000
//! readproportion = 0.5
//! updateproportion = 0.3
//! multiupdateproportion = 0.2
//! requestdistribution = "zipfian"
//! globalchance = 10
//! partitions = 4
//! ```
//!
//! Every option has a default, see [`WorkloadOpt`]. An invalid combination of options is reported
//! as an [`Error`] when the workload is created, before any operation is issued.

use crate::chooser::{OperationChooser, OperationKind, Proportions};
use crate::generator::NumberGenerator;
use crate::partition::{PartitionedKeySelector, ThreadState};
use crate::retry::{InsertionRetrier, Interrupt};
use crate::tracker::AcknowledgedCounter;
use crate::value::{field_names, KeyFormatter};
use crate::{Error, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use log::{debug, info};
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Workload options, deserialized from TOML. Names follow the YCSB core workload properties.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WorkloadOpt {
    /// Number of records that exist before the run phase starts.
    ///
    /// Default: 1000.
    pub recordcount: u64,

    /// Number of transactions of the run phase, split across its workers when the phase sets
    /// neither `ops` nor `timeout`. Also used to predict how many keys a zipfian run will insert.
    ///
    /// Default: 1000.
    pub operationcount: u64,

    /// First record number inserted by the load phase.
    ///
    /// Default: 0.
    pub insertstart: u64,

    /// Number of records inserted by the load phase.
    ///
    /// Default: `recordcount - insertstart`.
    pub insertcount: Option<u64>,

    /// Default: 10.
    pub fieldcount: u64,

    /// Default: 100.
    pub fieldlength: u64,

    /// One of "constant", "uniform", "zipfian" or "histogram".
    ///
    /// Default: "constant".
    pub fieldlengthdistribution: String,

    /// Path of the histogram file used by the "histogram" field length distribution.
    ///
    /// Default: "hist.txt".
    pub fieldlengthhistogram: String,

    /// Default: true.
    pub readallfields: bool,

    /// Default: false.
    pub writeallfields: bool,

    /// Write deterministic values and check every read against them. Requires a constant field
    /// length, and cannot be combined with operations that write one value into many rows.
    ///
    /// Default: false.
    pub dataintegrity: bool,

    /// Default: 0.95.
    pub readproportion: f64,
    /// Default: 0.05.
    pub updateproportion: f64,
    pub insertproportion: f64,
    pub scanproportion: f64,
    pub readmodifywriteproportion: f64,
    pub multireadproportion: f64,
    pub multiupdateproportion: f64,
    pub scanwriteproportion: f64,
    pub complexproportion: f64,

    /// One of "uniform", "zipfian", "latest", "hotspot", "sequential" or "exponential".
    ///
    /// Default: "uniform".
    pub requestdistribution: String,

    /// Default: 1000.
    pub maxscanlength: u64,

    /// "uniform" or "zipfian".
    ///
    /// Default: "uniform".
    pub scanlengthdistribution: String,

    /// Number of keys touched by MULTIREAD, MULTIUPDATE and COMPLEX.
    ///
    /// Default: 100.
    pub maxtransactionlength: u64,

    /// "uniform" or "zipfian".
    ///
    /// Default: "uniform".
    pub transactionlengthdistribution: String,

    /// "hashed" or "ordered".
    ///
    /// Default: "hashed".
    pub insertorder: String,

    /// Minimum number of digits of a key. Derived from the digit count of `recordcount` if not
    /// given.
    pub zeropadding: Option<usize>,

    /// Default: 0.2.
    pub hotspotdatafraction: f64,

    /// Default: 0.8.
    pub hotspotopnfraction: f64,

    /// Default: 95.
    pub exponential_percentile: f64,

    /// Default: 0.8571428571.
    pub exponential_frac: f64,

    /// The zipfian key space is widened by `operationcount * insertproportion * fudge` keys so
    /// that key popularity stays stable while the run inserts.
    ///
    /// Default: 2.0.
    pub zipfian_insert_fudge: f64,

    /// How many times a failed load insert is retried.
    ///
    /// Default: 0.
    pub core_workload_insertion_retry_limit: u32,

    /// Base pause between insert retries, in seconds.
    ///
    /// Default: 3.
    pub core_workload_insertion_retry_interval: f64,

    /// Percentage of transactions that may span partitions. Zero or less disables them.
    ///
    /// Default: -1.
    pub globalchance: i64,

    /// Default: 1.
    pub partitions: u64,
}

impl Default for WorkloadOpt {
    fn default() -> Self {
        Self {
            recordcount: 1000,
            operationcount: 1000,
            insertstart: 0,
            insertcount: None,
            fieldcount: 10,
            fieldlength: 100,
            fieldlengthdistribution: "constant".to_string(),
            fieldlengthhistogram: "hist.txt".to_string(),
            readallfields: true,
            writeallfields: false,
            dataintegrity: false,
            readproportion: 0.95,
            updateproportion: 0.05,
            insertproportion: 0.0,
            scanproportion: 0.0,
            readmodifywriteproportion: 0.0,
            multireadproportion: 0.0,
            multiupdateproportion: 0.0,
            scanwriteproportion: 0.0,
            complexproportion: 0.0,
            requestdistribution: "uniform".to_string(),
            maxscanlength: 1000,
            scanlengthdistribution: "uniform".to_string(),
            maxtransactionlength: 100,
            transactionlengthdistribution: "uniform".to_string(),
            insertorder: "hashed".to_string(),
            zeropadding: None,
            hotspotdatafraction: 0.2,
            hotspotopnfraction: 0.8,
            exponential_percentile: 95.0,
            exponential_frac: 0.8571428571,
            zipfian_insert_fudge: 2.0,
            core_workload_insertion_retry_limit: 0,
            core_workload_insertion_retry_interval: 3.0,
            globalchance: -1,
            partitions: 1,
        }
    }
}

impl WorkloadOpt {
    fn proportions(&self) -> Proportions {
        Proportions {
            read: self.readproportion,
            update: self.updateproportion,
            insert: self.insertproportion,
            scan: self.scanproportion,
            read_modify_write: self.readmodifywriteproportion,
            multi_read: self.multireadproportion,
            multi_update: self.multiupdateproportion,
            scan_write: self.scanwriteproportion,
            complex: self.complexproportion,
        }
    }
}

/// Upper bound of the zipfian key space, widened by the keys the run is expected to insert so
/// the popularity ranking does not shift as the keyspace grows.
fn zipfian_hi(opt: &WorkloadOpt, hi: u64) -> Result<u64> {
    let expected_new_keys = (opt.operationcount as f64
        * opt.insertproportion
        * opt.zipfian_insert_fudge)
        .round()
        .max(0.0) as u64;
    match hi.checked_add(expected_new_keys) {
        Some(widened) if widened < u64::MAX => {
            debug!("Zipfian key space widened by {} keys", expected_new_keys);
            Ok(widened)
        }
        _ => Err(Error::invalid(
            "zipfian_insert_fudge",
            format!("widens the key space by {} keys past u64", expected_new_keys),
        )),
    }
}

fn length_generator(option: &'static str, dist: &str, max: u64) -> Result<NumberGenerator> {
    match dist {
        "uniform" => NumberGenerator::uniform(1, max),
        "zipfian" => NumberGenerator::zipfian(1, max),
        _ => Err(Error::UnknownDistribution {
            option,
            value: dist.to_string(),
        }),
    }
}

/// The shared part of a workload: choosers, generators and the insert watermark.
pub struct Workload {
    pub(crate) chooser: OperationChooser,
    pub(crate) selector: PartitionedKeySelector,
    /// Offsets of inserts issued during the run, starting at `recordcount`.
    pub(crate) inserts: Arc<AcknowledgedCounter>,
    pub(crate) keys: KeyFormatter,
    pub(crate) fields: Vec<String>,
    pub(crate) field_length: NumberGenerator,
    pub(crate) scan_length: NumberGenerator,
    pub(crate) transaction_length: NumberGenerator,
    pub(crate) read_all_fields: bool,
    pub(crate) write_all_fields: bool,
    pub(crate) data_integrity: bool,
    pub(crate) retrier: InsertionRetrier,
    pub(crate) interrupt: Arc<Interrupt>,
    /// Next record number of the load phase, within `[load_start, load_end)`.
    load_cursor: AtomicU64,
    load_start: u64,
    load_end: u64,
    operation_count: u64,
}

impl Workload {
    pub fn new(opt: &WorkloadOpt) -> Result<Self> {
        debug!("Creating workload with options: {:?}", opt);
        let recordcount = opt.recordcount;
        let insertstart = opt.insertstart;
        let invalid_range = || Error::InvalidKeyRange {
            insertstart,
            insertcount: opt.insertcount.unwrap_or(0),
            recordcount,
        };
        let insertcount = match opt.insertcount {
            Some(c) => c,
            None => recordcount.checked_sub(insertstart).ok_or_else(invalid_range)?,
        };
        if insertstart.checked_add(insertcount).map_or(true, |end| end > recordcount) {
            return Err(Error::InvalidKeyRange {
                insertstart,
                insertcount,
                recordcount,
            });
        }
        if insertcount == 0 {
            return Err(Error::invalid("insertcount", "should be positive"));
        }
        if opt.fieldcount == 0 {
            return Err(Error::invalid("fieldcount", "should be positive"));
        }
        if opt.partitions == 0 {
            return Err(Error::invalid("partitions", "should be positive"));
        }
        if !(opt.core_workload_insertion_retry_interval >= 0.0)
            || opt.core_workload_insertion_retry_interval.is_infinite()
        {
            return Err(Error::invalid(
                "core_workload_insertion_retry_interval",
                "should be a non-negative number of seconds",
            ));
        }

        let field_length = match opt.fieldlengthdistribution.as_str() {
            "constant" => NumberGenerator::constant(opt.fieldlength),
            "uniform" => NumberGenerator::uniform(1, opt.fieldlength)?,
            "zipfian" => NumberGenerator::zipfian(1, opt.fieldlength)?,
            "histogram" => NumberGenerator::histogram(&opt.fieldlengthhistogram)?,
            d => {
                return Err(Error::UnknownDistribution {
                    option: "fieldlengthdistribution",
                    value: d.to_string(),
                })
            }
        };

        let chooser = OperationChooser::new(&opt.proportions())?;

        if opt.dataintegrity {
            if !field_length.is_constant() {
                return Err(Error::NonConstantFieldLength);
            }
            // these write one set of values into many rows, which cannot be verified per row
            for kind in [
                OperationKind::MultiUpdate,
                OperationKind::ScanWrite,
                OperationKind::Complex,
            ] {
                if chooser.contains(kind) {
                    return Err(Error::IntegrityWithSharedWrites(kind.name()));
                }
            }
        }

        let hashed = match opt.insertorder.as_str() {
            "hashed" => true,
            "ordered" => false,
            o => {
                return Err(Error::invalid(
                    "insertorder",
                    format!("\"{}\" is neither \"hashed\" nor \"ordered\"", o),
                ))
            }
        };
        let keys = match opt.zeropadding {
            Some(width) => KeyFormatter::new(width, hashed),
            None => KeyFormatter::for_records(recordcount, hashed),
        };

        let inserts = Arc::new(AcknowledgedCounter::new(recordcount));
        let lo = insertstart;
        let hi = insertstart + insertcount - 1;
        let base = match opt.requestdistribution.as_str() {
            "uniform" => NumberGenerator::uniform(lo, hi)?,
            "sequential" => NumberGenerator::sequential(lo, hi)?,
            "zipfian" => NumberGenerator::scrambled_zipfian(lo, zipfian_hi(opt, hi)?)?,
            "latest" => NumberGenerator::skewed_latest(inserts.clone()),
            "hotspot" => NumberGenerator::hotspot(
                lo,
                hi,
                opt.hotspotdatafraction,
                opt.hotspotopnfraction,
            )?,
            "exponential" => NumberGenerator::exponential(
                opt.exponential_percentile,
                recordcount as f64 * opt.exponential_frac,
            )?,
            d => {
                return Err(Error::UnknownDistribution {
                    option: "requestdistribution",
                    value: d.to_string(),
                })
            }
        };

        let scan_length = length_generator(
            "scanlengthdistribution",
            &opt.scanlengthdistribution,
            opt.maxscanlength,
        )?;
        let transaction_length = length_generator(
            "transactionlengthdistribution",
            &opt.transactionlengthdistribution,
            opt.maxtransactionlength,
        )?;

        info!("Global transaction chance: {}%", opt.globalchance);
        info!("Number of partitions: {}", opt.partitions);
        let selector = PartitionedKeySelector::new(
            base,
            inserts.clone(),
            recordcount,
            opt.partitions,
            opt.globalchance,
        )?;

        let retrier = InsertionRetrier::new(
            opt.core_workload_insertion_retry_limit,
            Duration::from_secs_f64(opt.core_workload_insertion_retry_interval),
        );

        Ok(Self {
            chooser,
            selector,
            inserts,
            keys,
            fields: field_names(opt.fieldcount as usize),
            field_length,
            scan_length,
            transaction_length,
            read_all_fields: opt.readallfields,
            write_all_fields: opt.writeallfields,
            data_integrity: opt.dataintegrity,
            retrier,
            interrupt: Arc::new(Interrupt::new()),
            load_cursor: AtomicU64::new(insertstart),
            load_start: insertstart,
            load_end: insertstart + insertcount,
            operation_count: opt.operationcount,
        })
    }

    pub fn new_from_toml_str(text: &str) -> Result<Self> {
        let opt: WorkloadOpt = Figment::new()
            .merge(Toml::string(text))
            .merge(Env::raw())
            .extract()?;
        Self::new(&opt)
    }

    /// Per-worker state. Create one per worker thread and pass it to every
    /// [`Workload::do_transaction`] of that worker.
    pub fn init_thread<R: Rng + ?Sized>(&self, rng: &mut R) -> ThreadState {
        let state = self.selector.init_thread(rng);
        debug!("Worker assigned to partition {}", state.partition());
        state
    }

    /// Raised on Ctrl-C; also stops retry sleeps.
    pub fn interrupt(&self) -> &Arc<Interrupt> {
        &self.interrupt
    }

    /// The insert watermark of the run phase.
    pub fn inserts(&self) -> &Arc<AcknowledgedCounter> {
        &self.inserts
    }

    pub fn operation_count(&self) -> u64 {
        self.operation_count
    }

    /// Number of records the load phase inserts in total.
    pub fn load_count(&self) -> u64 {
        self.load_end - self.load_start
    }

    /// Claim the next record number of the load phase, if any is left.
    pub(crate) fn next_load_keynum(&self) -> Option<u64> {
        let end = self.load_end;
        self.load_cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < end).then_some(c + 1)
            })
            .ok()
    }

    /// Whether every record of the load phase has been claimed.
    pub fn is_load_exhausted(&self) -> bool {
        self.load_cursor.load(Ordering::Relaxed) >= self.load_end
    }

    /// Draw a record number from `next` until it is below the insert watermark.
    pub(crate) fn durable_keynum(&self, mut next: impl FnMut() -> u64) -> u64 {
        loop {
            let keynum = next();
            if keynum < self.inserts.limit() {
                return keynum;
            }
        }
    }

    pub(crate) fn random_field<R: Rng + ?Sized>(&self, rng: &mut R) -> &String {
        &self.fields[rng.random_range(0..self.fields.len())]
    }
}
