//! Integer generators for record numbers, field lengths, scan lengths and transaction lengths.
//!
//! Every generator samples from a closed range `[lo, hi]`. Generators are shared by all worker
//! threads, so sampling takes `&self` and an external random source; the only internal state
//! (the cursor of [`SequentialGenerator`]) is an atomic.

use crate::tracker::AcknowledgedCounter;
use crate::{Error, Result};
use rand::distr::weighted::WeightedIndex;
use rand::distr::{Distribution, Uniform};
use rand::Rng;
use rand_distr::{Exp, Zipf};
use std::fs::read_to_string;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Skew of every zipfian generator in this module.
pub const ZIPFIAN_CONSTANT: f64 = 0.99;

/// The scrambled zipfian generator draws ranks from a fixed, very large item space and maps them
/// into the requested range, so popularity does not depend on the size of the range.
const SCRAMBLED_ITEM_COUNT: f64 = 10_000_000_000.0;

const FNV_OFFSET_BASIS_64: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME_64: u64 = 1_099_511_628_211;

/// 64-bit FNV-1a over the little-endian bytes of `val`.
pub fn fnv_hash64(val: u64) -> u64 {
    let mut hash = FNV_OFFSET_BASIS_64;
    for byte in val.to_le_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME_64);
    }
    hash
}

fn check_range(lo: u64, hi: u64) -> Result<u64> {
    if lo > hi {
        return Err(Error::invalid(
            "generator range",
            format!("[{}, {}] is empty", lo, hi),
        ));
    }
    Ok(hi - lo + 1)
}

/// A cursor that walks `[lo, hi]` one value at a time and wraps from `hi` back to `lo`.
#[derive(Debug)]
pub struct SequentialGenerator {
    lo: u64,
    hi: u64,
    cursor: AtomicU64,
}

impl SequentialGenerator {
    pub fn new(lo: u64, hi: u64) -> Result<Self> {
        Self::starting_at(lo, hi, lo)
    }

    /// Like [`SequentialGenerator::new`], but the first value issued is `start` (folded into the
    /// range if it falls outside).
    pub fn starting_at(lo: u64, hi: u64, start: u64) -> Result<Self> {
        let span = check_range(lo, hi)?;
        let start = lo + start.saturating_sub(lo) % span;
        Ok(Self {
            lo,
            hi,
            cursor: AtomicU64::new(start),
        })
    }

    pub fn next(&self) -> u64 {
        self.cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(if c >= self.hi { self.lo } else { c + 1 })
            })
            .unwrap_or_else(|c| c)
    }
}

#[derive(Debug)]
pub struct Zipfian {
    lo: u64,
    items: u64,
    scrambled: bool,
    dist: Zipf<f64>,
}

impl Zipfian {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        // zipf ranks start at 1
        let rank = (self.dist.sample(rng) as u64).saturating_sub(1);
        if self.scrambled {
            self.lo + fnv_hash64(rank) % self.items
        } else {
            self.lo + rank.min(self.items - 1)
        }
    }
}

/// Splits `[lo, hi]` into a hot prefix and a cold remainder.
#[derive(Debug)]
pub struct Hotspot {
    lo: u64,
    hot: u64,
    cold: u64,
    hot_opn_fraction: f64,
}

impl Hotspot {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let hot = self.cold == 0 || (self.hot > 0 && rng.random::<f64>() < self.hot_opn_fraction);
        if hot {
            self.lo + rng.random_range(0..self.hot)
        } else {
            self.lo + self.hot + rng.random_range(0..self.cold)
        }
    }
}

/// Favors the most recently acknowledged inserts. The range is re-read from the tracker on every
/// draw because it grows during a run.
pub struct SkewedLatest {
    tracker: Arc<AcknowledgedCounter>,
}

impl SkewedLatest {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let max = self.tracker.limit();
        if max <= 1 {
            return 0;
        }
        match Zipf::new(max as f64, ZIPFIAN_CONSTANT) {
            Ok(dist) => max - (dist.sample(rng) as u64).clamp(1, max),
            Err(_) => max - 1,
        }
    }
}

/// Field lengths drawn from a histogram file.
///
/// The first line is `BlockSize<TAB><n>`; every following line is `<bucket><TAB><count>`. A draw
/// picks a bucket with probability proportional to its count and returns `bucket * n`.
#[derive(Debug)]
pub struct LengthHistogram {
    block_size: u64,
    buckets: Vec<u64>,
    weights: WeightedIndex<u64>,
}

impl LengthHistogram {
    pub fn from_file(path: &str) -> Result<Self> {
        let text = read_to_string(path).map_err(|source| Error::Histogram {
            path: path.to_string(),
            source,
        })?;
        Self::parse(path, &text)
    }

    fn parse(path: &str, text: &str) -> Result<Self> {
        let malformed = |line: usize| Error::HistogramFormat {
            path: path.to_string(),
            line,
        };
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let block_size = match lines.next() {
            Some((i, l)) => {
                let mut parts = l.split('\t');
                match (parts.next(), parts.next().map(|v| v.trim().parse::<u64>())) {
                    (Some("BlockSize"), Some(Ok(n))) => n,
                    _ => return Err(malformed(i + 1)),
                }
            }
            None => return Err(malformed(1)),
        };
        let mut buckets = Vec::new();
        let mut counts = Vec::new();
        for (i, l) in lines {
            let mut parts = l.split('\t').map(|v| v.trim().parse::<u64>());
            match (parts.next(), parts.next()) {
                (Some(Ok(bucket)), Some(Ok(count))) => {
                    buckets.push(bucket);
                    counts.push(count);
                }
                _ => return Err(malformed(i + 1)),
            }
        }
        let weights = WeightedIndex::new(&counts).map_err(|e| {
            Error::invalid("fieldlengthhistogram", format!("{}: {}", path, e))
        })?;
        Ok(Self {
            block_size,
            buckets,
            weights,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.buckets[self.weights.sample(rng)] * self.block_size
    }
}

/// The family of integer generators.
pub enum NumberGenerator {
    Constant(u64),
    Uniform(Uniform<u64>),
    Sequential(SequentialGenerator),
    /// Draws an offset counted back from the newest record.
    Exponential(Exp<f64>),
    Zipfian(Zipfian),
    Hotspot(Hotspot),
    SkewedLatest(SkewedLatest),
    Histogram(LengthHistogram),
}

impl NumberGenerator {
    pub fn constant(value: u64) -> Self {
        NumberGenerator::Constant(value)
    }

    pub fn uniform(lo: u64, hi: u64) -> Result<Self> {
        check_range(lo, hi)?;
        let dist = Uniform::new_inclusive(lo, hi).map_err(|e| Error::invalid("uniform range", e))?;
        Ok(NumberGenerator::Uniform(dist))
    }

    pub fn sequential(lo: u64, hi: u64) -> Result<Self> {
        Ok(NumberGenerator::Sequential(SequentialGenerator::new(lo, hi)?))
    }

    /// `percentile` percent of the draws fall within the newest `range` records.
    pub fn exponential(percentile: f64, range: f64) -> Result<Self> {
        if !(percentile > 0.0 && percentile < 100.0) {
            return Err(Error::invalid(
                "exponential_percentile",
                format!("{} is not within (0, 100)", percentile),
            ));
        }
        if !(range > 0.0) {
            return Err(Error::invalid(
                "exponential_frac",
                format!("covers an empty range ({})", range),
            ));
        }
        let gamma = -(1.0 - percentile / 100.0).ln() / range;
        let dist = Exp::new(gamma).map_err(|e| Error::invalid("exponential_percentile", e))?;
        Ok(NumberGenerator::Exponential(dist))
    }

    pub fn zipfian(lo: u64, hi: u64) -> Result<Self> {
        let items = check_range(lo, hi)?;
        let dist = Zipf::new(items as f64, ZIPFIAN_CONSTANT)
            .map_err(|e| Error::invalid("zipfian range", e))?;
        Ok(NumberGenerator::Zipfian(Zipfian {
            lo,
            items,
            scrambled: false,
            dist,
        }))
    }

    pub fn scrambled_zipfian(lo: u64, hi: u64) -> Result<Self> {
        let items = check_range(lo, hi)?;
        let dist = Zipf::new(SCRAMBLED_ITEM_COUNT, ZIPFIAN_CONSTANT)
            .map_err(|e| Error::invalid("zipfian range", e))?;
        Ok(NumberGenerator::Zipfian(Zipfian {
            lo,
            items,
            scrambled: true,
            dist,
        }))
    }

    pub fn hotspot(lo: u64, hi: u64, hot_set_fraction: f64, hot_opn_fraction: f64) -> Result<Self> {
        let span = check_range(lo, hi)?;
        let hot_set_fraction = hot_set_fraction.clamp(0.0, 1.0);
        let hot_opn_fraction = hot_opn_fraction.clamp(0.0, 1.0);
        let hot = (span as f64 * hot_set_fraction) as u64;
        Ok(NumberGenerator::Hotspot(Hotspot {
            lo,
            hot,
            cold: span - hot,
            hot_opn_fraction,
        }))
    }

    pub fn skewed_latest(tracker: Arc<AcknowledgedCounter>) -> Self {
        NumberGenerator::SkewedLatest(SkewedLatest { tracker })
    }

    pub fn histogram(path: &str) -> Result<Self> {
        Ok(NumberGenerator::Histogram(LengthHistogram::from_file(path)?))
    }

    pub fn next<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match self {
            NumberGenerator::Constant(v) => *v,
            NumberGenerator::Uniform(dist) => dist.sample(rng),
            NumberGenerator::Sequential(seq) => seq.next(),
            NumberGenerator::Exponential(dist) => {
                let v: f64 = dist.sample(rng);
                v as u64
            }
            NumberGenerator::Zipfian(z) => z.sample(rng),
            NumberGenerator::Hotspot(h) => h.sample(rng),
            NumberGenerator::SkewedLatest(l) => l.sample(rng),
            NumberGenerator::Histogram(h) => h.sample(rng),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, NumberGenerator::Constant(_))
    }

    pub fn is_exponential(&self) -> bool {
        matches!(self, NumberGenerator::Exponential(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;
    use std::io::Write;

    fn histogram(g: &NumberGenerator, n: usize) -> HashMap<u64, u64> {
        let mut rng = rand::rng();
        let mut dist = HashMap::new();
        for _ in 0..n {
            *dist.entry(g.next(&mut rng)).or_insert(0u64) += 1;
        }
        dist
    }

    #[test]
    fn fnv_is_deterministic() {
        assert_eq!(fnv_hash64(42), fnv_hash64(42));
        assert_ne!(fnv_hash64(1), fnv_hash64(2));
    }

    #[test]
    fn uniform_range() {
        let g = NumberGenerator::uniform(0, 99).unwrap();
        // 100 keys, 1m gens so ~10k occurance ea. Bound to 9k to 11k
        let dist = histogram(&g, 1_000_000);
        assert_eq!(dist.len(), 100);
        for (k, c) in dist.iter() {
            assert!(*k < 100);
            assert!(*c < 11000 && *c > 9000);
        }
        assert!(NumberGenerator::uniform(5, 4).is_err());
    }

    #[test]
    fn sequential_wraps() {
        let g = NumberGenerator::sequential(3, 5).unwrap();
        let mut rng = rand::rng();
        let seq: Vec<u64> = (0..7).map(|_| g.next(&mut rng)).collect();
        assert_eq!(seq, vec![3, 4, 5, 3, 4, 5, 3]);
    }

    #[test]
    fn sequential_starting_point() {
        let s = SequentialGenerator::starting_at(0, 9, 8).unwrap();
        assert_eq!(s.next(), 8);
        assert_eq!(s.next(), 9);
        assert_eq!(s.next(), 0);
        let s = SequentialGenerator::starting_at(0, 9, 25).unwrap();
        assert_eq!(s.next(), 5);
    }

    #[test]
    fn sequential_concurrent() {
        let s = Arc::new(SequentialGenerator::new(0, 999).unwrap());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let s = s.clone();
                std::thread::spawn(move || (0..250).map(|_| s.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        all.sort();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn zipfian_rank_frequency() {
        let g = NumberGenerator::zipfian(1, 100).unwrap();
        let dist = histogram(&g, 100_000);
        let counts: Vec<u64> = (1..=100).map(|k| *dist.get(&k).unwrap_or(&0)).collect();
        assert!(dist.keys().all(|k| (1..=100).contains(k)));
        let max = *counts.iter().max().unwrap();
        assert_eq!(counts[0], max);
        for r in 0..4 {
            assert!(counts[r] > counts[r + 1], "rank {} vs {}", r + 1, r + 2);
        }
        let deciles: Vec<u64> = counts.chunks(10).map(|c| c.iter().sum()).collect();
        for d in 0..9 {
            assert!(
                deciles[d] as f64 >= deciles[d + 1] as f64 * 0.9,
                "decile {}: {:?}",
                d,
                deciles
            );
        }
        assert!(deciles[0] > deciles[9] * 10);
    }

    #[test]
    fn scrambled_zipfian_spreads_popular_keys() {
        let g = NumberGenerator::scrambled_zipfian(1000, 1999).unwrap();
        let dist = histogram(&g, 100_000);
        assert!(dist.keys().all(|k| (1000..2000).contains(k)));
        let mut freq: Vec<(u64, u64)> = dist.into_iter().collect();
        freq.sort_by_key(|(_, c)| std::cmp::Reverse(*c));
        // skewed, but the hottest keys are not all packed at the low end
        assert!(freq[0].1 > freq[freq.len() / 2].1 * 5);
        assert!(freq.iter().take(10).any(|(k, _)| *k > 1100));
    }

    #[test]
    fn hotspot_fractions() {
        let g = NumberGenerator::hotspot(0, 99, 0.2, 0.8).unwrap();
        let dist = histogram(&g, 100_000);
        let hot: u64 = dist.iter().filter(|(k, _)| **k < 20).map(|(_, c)| *c).sum();
        assert!(dist.keys().all(|k| *k < 100));
        assert!(hot >= 75_000 && hot <= 85_000, "hot draws: {}", hot);
    }

    #[test]
    fn hotspot_degenerate_fractions() {
        let mut rng = rand::rng();
        let g = NumberGenerator::hotspot(10, 19, 0.0, 0.8).unwrap();
        for _ in 0..1000 {
            assert!((10..20).contains(&g.next(&mut rng)));
        }
        let g = NumberGenerator::hotspot(10, 19, 1.0, 0.0).unwrap();
        for _ in 0..1000 {
            assert!((10..20).contains(&g.next(&mut rng)));
        }
    }

    #[test]
    fn exponential_is_recency_skewed() {
        let g = NumberGenerator::exponential(95.0, 100.0).unwrap();
        let dist = histogram(&g, 100_000);
        let near: u64 = dist.iter().filter(|(k, _)| **k < 100).map(|(_, c)| *c).sum();
        assert!(near >= 93_000 && near <= 97_000, "near draws: {}", near);
        assert!(NumberGenerator::exponential(100.0, 10.0).is_err());
        assert!(NumberGenerator::exponential(95.0, 0.0).is_err());
    }

    #[test]
    fn skewed_latest_follows_the_watermark() {
        let tracker = Arc::new(AcknowledgedCounter::new(100));
        let g = NumberGenerator::skewed_latest(tracker.clone());
        let dist = histogram(&g, 10_000);
        assert!(dist.keys().all(|k| *k < 100));
        assert!(dist.get(&99).unwrap_or(&0) > dist.get(&0).unwrap_or(&0));
        for _ in 0..50 {
            let o = tracker.next_sequence();
            tracker.acknowledge(o);
        }
        let dist = histogram(&g, 10_000);
        assert!(dist.keys().all(|k| *k < 150));
        assert!(*dist.get(&149).unwrap_or(&0) > 1000);
    }

    #[test]
    fn histogram_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "BlockSize\t10").unwrap();
        writeln!(file, "1\t1").unwrap();
        writeln!(file, "2\t0").unwrap();
        writeln!(file, "3\t3").unwrap();
        let g = NumberGenerator::histogram(file.path().to_str().unwrap()).unwrap();
        let dist = histogram(&g, 10_000);
        assert!(dist.get(&20).is_none());
        let ten = *dist.get(&10).unwrap();
        let thirty = *dist.get(&30).unwrap();
        assert_eq!(ten + thirty, 10_000);
        assert!(thirty > ten * 2);
    }

    #[test]
    fn histogram_malformed() {
        let err = LengthHistogram::parse("h", "BlockSize\t10\n1\tx\n").unwrap_err();
        assert!(matches!(err, Error::HistogramFormat { line: 2, .. }));
        let err = LengthHistogram::parse("h", "1\t2\n").unwrap_err();
        assert!(matches!(err, Error::HistogramFormat { line: 1, .. }));
        assert!(matches!(
            NumberGenerator::histogram("/nonexistent/hist.txt"),
            Err(Error::Histogram { .. })
        ));
    }
}
