//! The core benchmark functionality.
//!
//! A benchmark in this crate actually refers to a group of benchmark runs, named **phases**. Users
//! can provide one or multiple phases that will be run sequentially, each with different
//! configurations. A phase either loads the initial records (`phase = "load"`) or issues the
//! transaction mix of the workload (`phase = "run"`). All phases share one store and one workload,
//! so a run phase reads what the load phase inserted.
//!
//! ## Configuration Format
//!
//! A benchmark configuration file is formatted in TOML. It consists of a `[store]` section (see
//! [`mod@crate::stores`]), a `[workload]` section (see [`mod@crate::workload`]), and the
//! definition of multiple phases, each defined in a dictionary named `benchmark`. Phases are
//! organized in an array, so the configuration of each phase starts with `[[benchmark]]`. It also
//! supports a `[global]` section in the configuration file that will override the missing field
//! in each phase.
//!
//! A configuration file generally looks like the following:
//!
//! ```toml
//! [global]
//! threads = 4
//!
//! [workload]
//! recordcount = 10000
//! readproportion = 0.5
//! updateproportion = 0.5
//!
//! [[benchmark]]
//! phase = "load"
//!
//! [[benchmark]]
//! phase = "run"
//! timeout = 10.0
//! ```
//!
//! Available options and their usage can be found in [`BenchmarkOpt`] and [`GlobalOpt`], for phase
//! and global options, respectively.
//!
//! Options in `[global]` section can be overwritten via environment variables without changing the
//! content in the TOML file.
//! For example, if the user needs to override `x` in `[global]`, setting the environment variable
//! `global.x` will get the job done.
//!
//! ## Output Format
//!
//! All outputs are in plain text format, which is easy to process using shell scripts.
//!
//! ### Throughput
//!
//! After each repeat and after the whole phase, a throughput line is printed:
//!
//! ```txt
//! phase 0 repeat 0 duration 1.00 elapsed 1.00 total 100000 mops 0.10
//! phase 0 finish . duration 1.00 elapsed 1.00 total 100000 mops 0.10
//! ```
//!
//! The general format is:
//!
//! ```txt
//! phase <p> repeat <r> duration <d> elapsed <e> total <o> mops <t>
//! ```
//!
//! Where:
//!
//! - `<p>`: phase id.
//! - `<r>`: repeat id in a phase, or string `finish .`, if the line is the aggregated report
//! of a whole phase.
//! - `<d>`: the duration of the repeat/phase, in seconds.
//! - `<e>`: the total elapsed seconds since the starting of the program.
//! - `<o>`: the total operations executed by all worker threads in the repeat/phase.
//! - `<t>`: followed by the throughput in million operations per second of the repeat/phase.
//!
//! ### Per-operation Metrics
//!
//! After the `finish` line, one line with the outcome counts of every operation name follows:
//!
//! ```txt
//! phase 1 op READ status OK 94871 NOT_FOUND 12
//! phase 1 op VERIFY status OK 94871 ERROR 12
//! ```
//!
//! When `latency` is `true`, these are preceded by one line of latency metrics per operation
//! name, all in microseconds:
//!
//! ```txt
//! phase 1 op READ count 94883 min_us 0.21 max_us 80.12 avg_us 0.45 p50_us 0.40 p95_us 0.70 p99_us 1.20 p999_us 4.10
//! ```
//!
//! If the phase is throttled with `target`, the latency line ends with `intended_avg_us` and
//! `intended_p99_us`, measured from when each operation was scheduled to start.

use crate::measure::Measurements;
use crate::stores::{new_store, StoreOpt};
use crate::workload::{Workload, WorkloadOpt};
use crate::{Error, Result, TxStore};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use log::{debug, info, warn};
use parking_lot::Mutex;
use quanta::Instant;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

// {{{ benchmark

/// What the workers of a phase do.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    /// Insert the records of the load range.
    Load,
    /// Issue transactions chosen by the workload.
    Run,
}

/// Length determines when a benchmark should stop or how often the metrics should be collected.
#[derive(Clone, Debug, PartialEq)]
enum Length {
    /// Each worker thread syncs after a timeout (e.g., 0.1s).
    Timeout(Duration),
    /// Each worker thread syncs after a number of operations (e.g., 1M operations ea.).
    Count(u64),
    /// Special: a load phase inserts every record of the load range, a run phase issues
    /// `operationcount` transactions in total.
    Exhaust,
}

/// How the results are printed out.
/// "hidden": no results
/// "repeat": only each repeat's own metrics
/// "finish": only the finish metrics
/// "all": equals to repeat + finish
#[derive(Debug, PartialEq)]
enum ReportMode {
    Hidden,
    Repeat,
    Finish,
    All,
}

/// The configuration of a single benchmark deserialized from a TOML string.
///
/// The fields are optional to ease parsing from TOML, as there can be global parameters that are
/// set for them.
#[derive(Deserialize, Clone, Debug)]
pub struct BenchmarkOpt {
    /// "load" or "run".
    pub phase: String,

    /// Number of threads that runs this benchmark.
    ///
    /// Default: 1.
    pub threads: Option<usize>,

    /// How many times this benchmark will be repeated. This option is useful when user would like
    /// to plot the performance trend over time in the same benchmark. For example, setting this
    /// option to 100 with one second timeout for each repeat can provide 100 data points over a
    /// 100 second period.
    ///
    /// Default: 1.
    pub repeat: Option<usize>,

    /// How long this benchmark will run, unit is seconds. If this option is specified, the `ops`
    /// option must not be given.
    ///
    /// Note: see `ops`.
    pub timeout: Option<f32>,

    /// How many operations each worker will execute. Only used if `timeout` is not given.
    ///
    /// Note: if both `timeout` and `ops` are not given, a load phase stops once every record is
    /// inserted, and a run phase stops after `operationcount` transactions in total.
    pub ops: Option<u64>,

    /// Operations per second issued by each worker. Unthrottled if not given.
    pub target: Option<f64>,

    /// Report mode:
    ///
    /// - "hidden": not reported.
    /// - "repeat": after each repeat, the metrics for that repeat is printed.
    /// - "finish": after all repeats are finished, the metrics of the whole phase is printed.
    /// - "all": equals to "repeat" + "finish".
    pub report: Option<String>,

    /// Whether or not to print the latency metrics of every operation at the end of the phase.
    /// Outcome counts are always printed with the finish report.
    ///
    /// Default: false.
    pub latency: Option<bool>,

    /// Whether or not to pin each worker thread to a CPU core.
    ///
    /// Default: false.
    pub pin: Option<bool>,
}

impl BenchmarkOpt {
    /// Internal function called after all global options are applied and when all the options are
    /// set. This will test if the opt can be a valid benchmark. It does not check the workload's
    /// configuration, as it will be checked when a workload instance is created.
    fn sanity(&self) -> Result<()> {
        if self.threads.unwrap_or(0) == 0 {
            return Err(Error::invalid("threads", "should be positive if given"));
        }
        if self.repeat.unwrap_or(0) == 0 {
            return Err(Error::invalid("repeat", "should be positive if given"));
        }
        match self.report.as_deref() {
            Some("hidden" | "repeat" | "finish" | "all") => {}
            _ => {
                return Err(Error::invalid(
                    "report",
                    "report mode should be one of: hidden, repeat, finish, all",
                ))
            }
        }
        if self.timeout.is_some() && self.ops.is_some() {
            return Err(Error::invalid(
                "timeout",
                "timeout and ops cannot be provided at the same time",
            ));
        }
        if let Some(t) = self.timeout {
            if !(t > 0.0) || t.is_infinite() {
                return Err(Error::invalid("timeout", "should be a positive number of seconds"));
            }
        }
        if let Some(t) = self.target {
            if !(t > 0.0) || t.is_infinite() {
                return Err(Error::invalid("target", "should be a positive rate"));
            }
        }
        Ok(())
    }
}

/// The configuration of a benchmark, parsed from user's input.
#[derive(Debug, PartialEq)]
pub struct Benchmark {
    phase: Phase,
    threads: usize,
    repeat: usize,
    len: Length,
    target: Option<f64>,
    report: ReportMode,
    latency: bool,
    pin: bool,
}

const TIME_CHECK_INTERVAL: u64 = 32;

impl Benchmark {
    /// The constructor of Benchmark expects all fields have their values, the struct should
    /// contain either its own parameters, or carry the default parameters.
    fn new(opt: &BenchmarkOpt) -> Result<Self> {
        opt.sanity()?;
        let phase = match opt.phase.as_str() {
            "load" => Phase::Load,
            "run" => Phase::Run,
            p => {
                return Err(Error::invalid(
                    "phase",
                    format!("\"{}\" is neither \"load\" nor \"run\"", p),
                ))
            }
        };
        // handle length in the following, now 3 modes
        let len = if let Some(t) = opt.timeout {
            Length::Timeout(Duration::from_secs_f32(t))
        } else if let Some(c) = opt.ops {
            Length::Count(c)
        } else {
            Length::Exhaust
        };
        let report = match opt.report.as_deref() {
            Some("hidden") => ReportMode::Hidden,
            Some("repeat") => ReportMode::Repeat,
            Some("finish") => ReportMode::Finish,
            _ => ReportMode::All,
        };
        Ok(Self {
            phase,
            threads: opt.threads.unwrap_or(1),
            repeat: opt.repeat.unwrap_or(1),
            len,
            target: opt.target,
            report,
            latency: opt.latency.unwrap_or(false),
            pin: opt.pin.unwrap_or(false),
        })
    }
}

// }}} benchmark

// {{{ benchmarkgroup

/// The global options that go to the `[global]` section.
///
/// They will override missing fields in each `[[benchmark]]` section, if the corresponding option
/// is missing. For the usage of each option, please refer to [`BenchmarkOpt`].
#[derive(Deserialize, Clone, Debug, Default)]
pub struct GlobalOpt {
    pub threads: Option<usize>,
    pub repeat: Option<usize>,
    pub report: Option<String>,
    pub latency: Option<bool>,
    pub pin: Option<bool>,
}

impl GlobalOpt {
    fn apply(&self, opt: &mut BenchmarkOpt) {
        // these fall back to defaults
        opt.threads = opt.threads.or_else(|| Some(self.threads.unwrap_or(1)));
        opt.repeat = opt.repeat.or_else(|| Some(self.repeat.unwrap_or(1)));
        opt.report = opt
            .report
            .clone()
            .or_else(|| Some(self.report.clone().unwrap_or("all".to_string())));
        opt.latency = opt.latency.or_else(|| Some(self.latency.unwrap_or(false)));
        opt.pin = opt.pin.or_else(|| Some(self.pin.unwrap_or(false)));
    }
}

/// The configuration of a group of benchmark(s). It has a global option that could possibly
/// override benchmark-local options.
#[derive(Deserialize, Clone, Debug)]
struct BenchmarkGroupOpt {
    /// Global parameters (optional)
    global: Option<GlobalOpt>,

    /// Store configuration
    store: StoreOpt,

    /// Workload shared by all phases (optional, every option has a default)
    #[serde(default)]
    workload: WorkloadOpt,

    /// Array of the parameters of consisting Benchmark(s)
    benchmark: Vec<BenchmarkOpt>,
}

// }}} benchmarkgroup

// {{{ bencher

/// Parse a whole configuration file into a store, a workload and the phases to run on them.
pub fn init(text: &str) -> Result<(Box<dyn TxStore>, Arc<Workload>, Vec<Benchmark>)> {
    let opt: BenchmarkGroupOpt = Figment::new()
        .merge(Toml::string(text))
        .merge(Env::raw())
        .extract()?;
    debug!(
        "Creating benchmark group with the following configurations: {:?}",
        opt
    );
    let global = opt.global.clone().unwrap_or_default();
    // now we have a bunch of BenchmarkOpt(s), we need to update their params if they did
    // not specify, using the default values given
    let mut bopts: Vec<BenchmarkOpt> = opt.benchmark.to_vec();
    for bopt in bopts.iter_mut() {
        global.apply(bopt);
    }
    debug!("Global options applied to benchmarks: {:?}", bopts);
    let phases = bopts
        .iter()
        .map(Benchmark::new)
        .collect::<Result<Vec<_>>>()?;
    let workload = Arc::new(Workload::new(&opt.workload)?);
    let store = new_store(&opt.store)?;
    Ok((store, workload, phases))
}

/// What one phase did, aggregated over all of its workers.
pub struct PhaseResult {
    /// Operations issued, including no-op iterations of a run phase without any operation kind.
    pub total: u64,
    pub duration: Duration,
    pub measurements: Measurements,
}

/// A per-worker view of each repeat, written once by the worker at the end of a repeat and read
/// by worker 0 after the repeat's barrier.
struct Progress {
    counters: Vec<AtomicU64>,
    durations: Vec<Mutex<Duration>>,
    /// Only filled once the worker is done with every repeat.
    measurements: Mutex<Measurements>,
}

impl Progress {
    fn new(repeat: usize) -> Self {
        Self {
            counters: (0..repeat).map(|_| AtomicU64::new(0)).collect(),
            durations: (0..repeat).map(|_| Mutex::new(Duration::ZERO)).collect(),
            measurements: Mutex::new(Measurements::new()),
        }
    }
}

struct PhaseContext {
    /// The very beginning of all benchmarks in a group, for calculating elapsed timestamp
    since: Instant,

    /// The current phase of this benchmark in the group
    phase: usize,

    /// One per worker thread
    progress: Vec<Progress>,

    /// Barrier that syncs all workers
    barrier: Barrier,

    /// Transactions left for an exhaustive run phase
    budget: AtomicU64,
}

impl PhaseContext {
    /// Take one transaction out of the budget of an exhaustive run phase.
    fn claim(&self) -> bool {
        self.budget
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |b| b.checked_sub(1))
            .is_ok()
    }
}

fn bench_phase_should_break(
    benchmark: &Benchmark,
    count: u64,
    start: &Instant,
    context: &PhaseContext,
    workload: &Workload,
) -> bool {
    if workload.interrupt().is_raised() {
        return true;
    }
    match &benchmark.len {
        Length::Count(c) => count >= *c,
        Length::Timeout(duration) => {
            // only checks after a certain interval
            count % TIME_CHECK_INTERVAL == 0 && start.elapsed() >= *duration
        }
        Length::Exhaust => match benchmark.phase {
            Phase::Load => workload.is_load_exhausted(),
            Phase::Run => !context.claim(),
        },
    }
}

fn pin(id: usize) {
    match core_affinity::get_core_ids() {
        Some(cores) if !cores.is_empty() => {
            if !core_affinity::set_for_current(cores[id % cores.len()]) {
                warn!("Failed to pin worker {}", id);
            }
        }
        _ => warn!("No core ids available, worker {} is not pinned", id),
    }
}

/// Sleep until `at`.
fn wait_until(at: Instant) {
    let now = Instant::now();
    if at > now {
        std::thread::sleep(at - now);
    }
}

fn bench_stat_repeat(benchmark: &Benchmark, context: &PhaseContext, repeat: usize, end: Instant) {
    let mut throughput = 0.0f64;
    let mut total = 0u64;
    let mut duration = Duration::ZERO;
    for p in context.progress.iter() {
        let d = *p.durations[repeat].lock();
        let ops = p.counters[repeat].load(Ordering::Relaxed);
        if d > Duration::ZERO {
            throughput += ops as f64 / d.as_secs_f64() / 1_000_000.0;
        }
        total += ops;
        duration = duration.max(d);
    }
    let elapsed = end.saturating_duration_since(context.since).as_secs_f64();

    if benchmark.report == ReportMode::Repeat || benchmark.report == ReportMode::All {
        println!(
            "phase {} repeat {} duration {:.2} elapsed {:.2} total {} mops {:.2}",
            context.phase,
            repeat,
            duration.as_secs_f64(),
            elapsed,
            total,
            throughput,
        );
    }
}

fn bench_stat_final(benchmark: &Benchmark, context: &PhaseContext, result: &PhaseResult, end: Instant) {
    let duration = result.duration.as_secs_f64();
    let elapsed = end.saturating_duration_since(context.since).as_secs_f64();
    let throughput = match duration > 0.0 {
        true => result.total as f64 / duration / 1_000_000.0,
        false => 0.0,
    };

    if benchmark.report == ReportMode::Finish || benchmark.report == ReportMode::All {
        println!(
            "phase {} finish . duration {:.2} elapsed {:.2} total {} mops {:.2}",
            context.phase, duration, elapsed, result.total, throughput,
        );
        let prefix = format!("phase {}", context.phase);
        for line in result.measurements.report(&prefix, benchmark.latency) {
            println!("{}", line);
        }
    }
}

fn bench_worker(
    store: &dyn TxStore,
    workload: &Workload,
    benchmark: &Benchmark,
    context: &PhaseContext,
    id: usize,
) {
    if benchmark.pin {
        pin(id);
    }

    let mut handle = store.handle();
    let mut rng = rand::rng();
    let mut state = workload.init_thread(&mut rng);
    let mut measurements = Measurements::new();
    let interval = benchmark.target.map(|t| Duration::from_secs_f64(1.0 / t));

    for i in 0..benchmark.repeat {
        let mut count = 0u64;
        // start the benchmark phase at roughly the same time
        context.barrier.wait();
        let start = Instant::now();
        while !bench_phase_should_break(benchmark, count, &start, context, workload) {
            let intended = interval.map(|d| {
                let at = start + d.mul_f64(count as f64);
                wait_until(at);
                at
            });
            match benchmark.phase {
                Phase::Load => {
                    if workload
                        .do_insert(&mut *handle, &mut rng, &mut measurements, intended)
                        .is_none()
                    {
                        break;
                    }
                }
                Phase::Run => {
                    let _ = workload.do_transaction(
                        &mut *handle,
                        &mut state,
                        &mut rng,
                        &mut measurements,
                        intended,
                    );
                }
            }
            count += 1;
        }

        let end = Instant::now();
        let progress = &context.progress[id];
        progress.counters[i].store(count, Ordering::Relaxed);
        *progress.durations[i].lock() = end.saturating_duration_since(start);

        // make sure that all threads have finished this repeat
        context.barrier.wait();

        // master is 0, it will aggregate data and print info inside this call
        if id == 0 {
            bench_stat_repeat(benchmark, context, i, end);
        }
    }

    *context.progress[id].measurements.lock() = measurements;
}

fn bench_phase(
    store: &dyn TxStore,
    workload: &Workload,
    benchmark: &Benchmark,
    phase: usize,
    since: Instant,
) -> PhaseResult {
    info!(
        "Phase {} ({:?}) started with {} threads",
        phase, benchmark.phase, benchmark.threads
    );
    let context = PhaseContext {
        since,
        phase,
        progress: (0..benchmark.threads)
            .map(|_| Progress::new(benchmark.repeat))
            .collect(),
        barrier: Barrier::new(benchmark.threads),
        budget: AtomicU64::new(workload.operation_count()),
    };

    let start = Instant::now();
    std::thread::scope(|s| {
        for t in 0..benchmark.threads {
            let context = &context;
            s.spawn(move || bench_worker(store, workload, benchmark, context, t));
        }
    });
    let end = Instant::now();

    let mut result = PhaseResult {
        total: 0,
        duration: end.saturating_duration_since(start),
        measurements: Measurements::new(),
    };
    for p in context.progress.iter() {
        result.total += p
            .counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum::<u64>();
        result.measurements.merge(&p.measurements.lock());
    }
    bench_stat_final(benchmark, &context, &result, end);
    if workload.interrupt().is_raised() {
        warn!("Phase {} interrupted", phase);
    }
    info!("Phase {} finished with {} operations", phase, result.total);
    result
}

/// Run every phase in order and return what each of them did.
pub fn bench(store: &dyn TxStore, workload: &Workload, phases: &[Benchmark]) -> Vec<PhaseResult> {
    debug!("Running bencher with {} phases", phases.len());
    let since = Instant::now();
    phases
        .iter()
        .enumerate()
        .map(|(i, p)| bench_phase(store, workload, p, i, since))
        .collect()
}

// }}} bencher

// {{{ tests


// }}} tests
