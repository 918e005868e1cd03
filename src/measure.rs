//! Per-operation latency and status accounting.
//!
//! Every worker owns a [`Measurements`] and records into it without synchronization; the bench
//! merges them once a phase is over. Latencies are kept in nanoseconds and printed in
//! microseconds.

use crate::Status;
use hdrhistogram::Histogram;
use log::warn;
use std::collections::BTreeMap;
use std::time::Duration;

/// Where the workload sends its latencies and outcomes.
pub trait Measure {
    /// Latency of an operation measured from when it actually started.
    fn measure(&mut self, op: &'static str, latency: Duration);

    /// Latency of an operation measured from when it was scheduled to start. Only differs from
    /// [`Measure::measure`] when the worker is throttled and falls behind its schedule.
    fn measure_intended(&mut self, op: &'static str, latency: Duration);

    fn report_status(&mut self, op: &'static str, status: Status);
}

fn histogram() -> Histogram<u64> {
    Histogram::new(3).unwrap_or_else(|e| unreachable!("3 significant digits is valid: {}", e))
}

fn add_histogram(op: &str, into: &mut Histogram<u64>, from: &Histogram<u64>) -> bool {
    match into.add(from) {
        Ok(()) => true,
        Err(e) => {
            warn!("Dropped {} latencies of {} when merging: {:?}", from.len(), op, e);
            false
        }
    }
}

struct OpStats {
    hdr: Histogram<u64>,
    intended: Histogram<u64>,
    statuses: BTreeMap<Status, u64>,
}

impl OpStats {
    fn new() -> Self {
        Self {
            hdr: histogram(),
            intended: histogram(),
            statuses: BTreeMap::new(),
        }
    }

    fn merge(&mut self, op: &str, other: &OpStats) {
        add_histogram(op, &mut self.hdr, &other.hdr);
        add_histogram(op, &mut self.intended, &other.intended);
        for (s, c) in other.statuses.iter() {
            *self.statuses.entry(*s).or_insert(0) += c;
        }
    }
}

#[derive(Default)]
pub struct Measurements {
    ops: BTreeMap<&'static str, OpStats>,
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    fn stats(&mut self, op: &'static str) -> &mut OpStats {
        self.ops.entry(op).or_insert_with(OpStats::new)
    }

    pub fn merge(&mut self, other: &Measurements) {
        for (op, stats) in other.ops.iter() {
            self.stats(op).merge(op, stats);
        }
    }

    /// Number of latencies recorded for `op`.
    pub fn count(&self, op: &str) -> u64 {
        self.ops.get(op).map_or(0, |s| s.hdr.len())
    }

    /// How often `op` ended with `status`.
    pub fn status_count(&self, op: &str, status: Status) -> u64 {
        self.ops
            .get(op)
            .and_then(|s| s.statuses.get(&status))
            .copied()
            .unwrap_or(0)
    }

    /// Names of every operation seen so far, in order.
    pub fn operations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ops.keys().copied()
    }

    /// One line of latency metrics per operation if `latency` is set, then one line of status
    /// counts per operation.
    pub fn report(&self, prefix: &str, latency: bool) -> Vec<String> {
        let mut lines = Vec::new();
        for (op, stats) in self.ops.iter() {
            let hdr = &stats.hdr;
            if !latency || hdr.is_empty() {
                continue;
            }
            let mut line = format!(
                "{} op {} count {} min_us {:.2} max_us {:.2} avg_us {:.2} \
                 p50_us {:.2} p95_us {:.2} p99_us {:.2} p999_us {:.2}",
                prefix,
                op,
                hdr.len(),
                hdr.min() as f64 / 1000.0,
                hdr.max() as f64 / 1000.0,
                hdr.mean() / 1000.0,
                hdr.value_at_quantile(0.50) as f64 / 1000.0,
                hdr.value_at_quantile(0.95) as f64 / 1000.0,
                hdr.value_at_quantile(0.99) as f64 / 1000.0,
                hdr.value_at_quantile(0.999) as f64 / 1000.0,
            );
            if !stats.intended.is_empty() {
                line += &format!(
                    " intended_avg_us {:.2} intended_p99_us {:.2}",
                    stats.intended.mean() / 1000.0,
                    stats.intended.value_at_quantile(0.99) as f64 / 1000.0,
                );
            }
            lines.push(line);
        }
        for (op, stats) in self.ops.iter() {
            if stats.statuses.is_empty() {
                continue;
            }
            let mut line = format!("{} op {} status", prefix, op);
            for (s, c) in stats.statuses.iter() {
                line += &format!(" {} {}", s.name(), c);
            }
            lines.push(line);
        }
        lines
    }
}

impl Measure for Measurements {
    fn measure(&mut self, op: &'static str, latency: Duration) {
        let ns = latency.as_nanos().min(u128::from(u64::MAX)) as u64;
        self.stats(op).hdr.saturating_record(ns);
    }

    fn measure_intended(&mut self, op: &'static str, latency: Duration) {
        let ns = latency.as_nanos().min(u128::from(u64::MAX)) as u64;
        self.stats(op).intended.saturating_record(ns);
    }

    fn report_status(&mut self, op: &'static str, status: Status) {
        *self.stats(op).statuses.entry(status).or_insert(0) += 1;
    }
}
