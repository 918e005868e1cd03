//! Errors raised while turning configuration into a runnable benchmark.
//!
//! Everything here is fatal at initialization: no operation is issued once one of these is
//! returned. Failures of individual operations are reported as [`crate::Status`] instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown {option} \"{value}\"")]
    UnknownDistribution { option: &'static str, value: String },

    #[error(
        "invalid combination of insertstart ({insertstart}), insertcount ({insertcount}) and \
         recordcount ({recordcount}): recordcount must be at least insertstart + insertcount"
    )]
    InvalidKeyRange {
        insertstart: u64,
        insertcount: u64,
        recordcount: u64,
    },

    #[error("must have constant field size to check data integrity")]
    NonConstantFieldLength,

    #[error("data integrity checks cannot be combined with {0} operations")]
    IntegrityWithSharedWrites(&'static str),

    #[error("invalid {option}: {reason}")]
    InvalidOption { option: &'static str, reason: String },

    #[error("couldn't read field length histogram file {path}")]
    Histogram {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed field length histogram file {path} at line {line}")]
    HistogramFormat { path: String, line: usize },

    #[error("store \"{0}\" not found in registry")]
    UnknownStore(String),

    #[error("invalid store options")]
    StoreOption(#[from] toml::de::Error),

    #[error("invalid benchmark configuration")]
    Config(#[from] figment::Error),
}

impl Error {
    pub(crate) fn invalid(option: &'static str, reason: impl ToString) -> Self {
        Error::InvalidOption {
            option,
            reason: reason.to_string(),
        }
    }
}
