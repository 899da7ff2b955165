use crate::error::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Little-endian PCM sample representations understood by the engine.
///
/// The raw values follow the host numbering: even values are little-endian formats, the odd value
/// right after each of them is reserved for its big-endian counterpart, which is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "f32le")]
    Float32LE,
    #[serde(rename = "s16le")]
    Int16LE,
    #[serde(rename = "u16le")]
    UInt16LE,
}

/// Byte width of one sample, indexed by format.
const ALIGNMENTS: [usize; 3] = [4, 2, 2];

impl SampleFormat {
    pub const ALL: [SampleFormat; 3] = [
        SampleFormat::Float32LE,
        SampleFormat::Int16LE,
        SampleFormat::UInt16LE,
    ];

    const fn index(self) -> usize {
        match self {
            SampleFormat::Float32LE => 0,
            SampleFormat::Int16LE => 1,
            SampleFormat::UInt16LE => 2,
        }
    }

    /// Bytes per sample.
    pub const fn alignment(self) -> usize {
        ALIGNMENTS[self.index()]
    }

    pub const fn as_raw(self) -> i32 {
        match self {
            SampleFormat::Float32LE => 0,
            SampleFormat::Int16LE => 2,
            SampleFormat::UInt16LE => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float32LE => "f32le",
            SampleFormat::Int16LE => "s16le",
            SampleFormat::UInt16LE => "u16le",
        }
    }
}

impl Display for SampleFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for SampleFormat {
    type Error = ConfigError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SampleFormat::Float32LE),
            2 => Ok(SampleFormat::Int16LE),
            4 => Ok(SampleFormat::UInt16LE),
            1 | 3 | 5 => Err(ConfigError::BigEndian(value)),
            _ => Err(ConfigError::UnknownFormat(value)),
        }
    }
}

impl FromStr for SampleFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownFormatName(s.to_string()))
    }
}

/// How integer samples are widened to float.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntToFloat {
    /// `value / 32768` in floating point.
    #[default]
    Exact,
    /// Integer division by 32768 before widening, so every magnitude below 32768 becomes zero.
    /// Only useful for bit-exact compatibility with legacy output.
    Truncate,
}

/// One of the six supported format pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conversion {
    F32ToS16,
    F32ToU16,
    S16ToF32,
    S16ToU16,
    U16ToF32,
    U16ToS16,
}

impl Conversion {
    pub(crate) fn resolve(from: SampleFormat, to: SampleFormat) -> Result<Self, Error> {
        use SampleFormat::*;
        match (from, to) {
            (Float32LE, Int16LE) => Ok(Conversion::F32ToS16),
            (Float32LE, UInt16LE) => Ok(Conversion::F32ToU16),
            (Int16LE, Float32LE) => Ok(Conversion::S16ToF32),
            (Int16LE, UInt16LE) => Ok(Conversion::S16ToU16),
            (UInt16LE, Float32LE) => Ok(Conversion::U16ToF32),
            (UInt16LE, Int16LE) => Ok(Conversion::U16ToS16),
            _ => Err(Error::UnsupportedConversion { from, to }),
        }
    }
}
