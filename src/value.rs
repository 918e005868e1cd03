//! Row keys and field payloads.
//!
//! With data integrity checking enabled, every field value is a pure function of the row key and
//! the field name, so a read can be checked without remembering what was written.

use crate::generator::fnv_hash64;
use crate::{Record, Status};
use rand::Rng;

/// Turns record numbers into row keys of the form `user<digits>`.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFormatter {
    width: usize,
    hashed: bool,
}

impl KeyFormatter {
    /// `width` is the minimum number of digits; shorter numbers are left-padded with zeros.
    pub fn new(width: usize, hashed: bool) -> Self {
        Self { width, hashed }
    }

    /// Pad to the number of digits of `records`, so keys of one run sort like their numbers.
    pub fn for_records(records: u64, hashed: bool) -> Self {
        Self::new(records.to_string().len(), hashed)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn key(&self, keynum: u64) -> String {
        let n = match self.hashed {
            true => fnv_hash64(keynum),
            false => keynum,
        };
        format!("user{:0width$}", n, width = self.width)
    }
}

/// `field0` .. `field{count-1}`.
pub fn field_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("field{}", i)).collect()
}

// the classic 31-multiplier string hash over the bytes, as a signed 32-bit value
fn string_hash(s: &[u8]) -> i32 {
    s.iter()
        .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(i32::from(*b)))
}

/// The value of `field` in row `key`, exactly `size` bytes long.
///
/// Starts from `key:field` and keeps appending `:` and the hash of everything so far until the
/// value is long enough, then truncates.
pub fn deterministic_value(key: &str, field: &str, size: usize) -> Box<[u8]> {
    let mut buf = Vec::with_capacity(size + 16);
    buf.extend_from_slice(key.as_bytes());
    buf.push(b':');
    buf.extend_from_slice(field.as_bytes());
    while buf.len() < size {
        let h = string_hash(&buf);
        buf.push(b':');
        buf.extend_from_slice(h.to_string().as_bytes());
    }
    buf.truncate(size);
    buf.into_boxed_slice()
}

/// `size` random printable bytes.
pub fn random_value<R: Rng + ?Sized>(rng: &mut R, size: usize) -> Box<[u8]> {
    (0..size).map(|_| rng.random_range(b' '..=b'~')).collect()
}

/// The outcome of checking one row read back from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Every field holds its deterministic value.
    Match,
    /// At least one field holds something else.
    Mismatch,
    /// Nothing came back although the row should exist.
    Missing,
}

impl Verification {
    /// How the outcome is reported to the measurement sink.
    pub fn status(&self) -> Status {
        match self {
            Verification::Match => Status::Ok,
            Verification::Mismatch => Status::UnexpectedState,
            Verification::Missing => Status::Error,
        }
    }
}

/// Check every returned field of row `key` against [`deterministic_value`].
pub fn verify(key: &str, cells: &Record, size: usize) -> Verification {
    if cells.is_empty() {
        return Verification::Missing;
    }
    for (field, value) in cells.iter() {
        if **value != *deterministic_value(key, field, size) {
            return Verification::Mismatch;
        }
    }
    Verification::Match
}
