pub mod config;
mod dsp;
pub mod error;
pub mod format;
pub mod formatter;
pub mod mixer;
mod slots;
pub mod unzipper;
pub mod worker;
pub mod zipper;

pub use error::{ConcurrencyError, ConfigError, Error, Operation, Result};
pub use format::{IntToFloat, SampleFormat};
pub use formatter::{FormattedChunk, Formatter};
pub use mixer::Mixer;
pub use unzipper::{UnzippedRound, Unzipper};
pub use worker::WorkerPool;
pub use zipper::Zipper;

use bytes::Bytes;
use std::sync::Arc;

/// Session-level callback of a [`Zipper`] or [`Mixer`], called once per completed round.
pub type OnRoundCb = Arc<dyn Fn(Result<Bytes>) + Send + Sync>;

/// Number of samples (or frames) carried by one round of any session.
pub const SAMPLES_PER_BUFFER: usize = 1024;

/// Upper bound for the channel count of a session, limited by the width of the readiness bitfield.
pub const MAX_CHANNELS: usize = u64::BITS as usize;

pub(crate) fn validate_channels(channels: usize) -> Result<()> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(ConfigError::ChannelCount(channels).into());
    }
    Ok(())
}

pub(crate) fn validate_alignment(sample_alignment: usize) -> Result<()> {
    if sample_alignment == 0 {
        return Err(ConfigError::Alignment(sample_alignment).into());
    }
    Ok(())
}
