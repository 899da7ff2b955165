use crate::format::SampleFormat;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// The kind of round a session runs, used to report which operation is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Formatting,
    Unzipping,
    Zipping,
    Mixing,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Formatting => write!(f, "formatting"),
            Operation::Unzipping => write!(f, "unzipping"),
            Operation::Zipping => write!(f, "zipping"),
            Operation::Mixing => write!(f, "mixing"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),
    #[error("unsupported conversion from {from} to {to}")]
    UnsupportedConversion { from: SampleFormat, to: SampleFormat },
    #[error("channel {channel} out of range for {channels} channels")]
    ChannelOutOfRange { channel: usize, channels: usize },
    #[error("invalid buffer for channel {channel}: {reason}")]
    InvalidBuffer { channel: usize, reason: String },
    #[error("worker failed: {0}")]
    Worker(String),
}

/// Invalid construction arguments. Fatal to the construction, never raised afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown sample format value {0}")]
    UnknownFormat(i32),
    #[error("big-endian sample format {0} is not supported")]
    BigEndian(i32),
    #[error("unknown sample format name `{0}`")]
    UnknownFormatName(String),
    #[error("invalid channel count {0}, expected 1..={max}", max = crate::MAX_CHANNELS)]
    ChannelCount(usize),
    #[error("invalid sample alignment {0}")]
    Alignment(usize),
    #[error("sample alignment {alignment} does not match {format} ({expected} bytes)")]
    AlignmentMismatch {
        format: SampleFormat,
        alignment: usize,
        expected: usize,
    },
}

/// A conflicting operation on a session. The session state is left untouched, callers may retry
/// once the in-flight round completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    #[error("still {0}")]
    Busy(Operation),
    #[error("channel {0} already ready")]
    AlreadyReady(usize),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
