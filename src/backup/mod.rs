//! Line oriented backup file.
//!
//! One record per line, `key<DELIMITER>value` or just `key`, no escaping.
//! Entries that cannot be written or read back safely are skipped and
//! reported with a [`SkipReason`] instead of failing the whole file.

mod codec;
pub use codec::{Codec, Decoded, EncodeSummary};

use std::fmt;

use serde::Deserialize;

pub const DEFAULT_DELIMITER: &str = "###";

// Lines containing this are never restored.
pub(crate) const OTP_MARKER: &[u8] = b"otp";

/// Layout of one backup record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RecordShape {
    /// `key<DELIMITER>value`
    #[default]
    Full,
    /// `key`
    KeyOnly,
}

impl fmt::Display for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordShape::Full => f.write_str("full"),
            RecordShape::KeyOnly => f.write_str("key_only"),
        }
    }
}

/// Why an entry was left out of the backup file or ignored when reading it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Value has bytes outside printable ascii and the filter is on.
    NotPrintable,
    /// Key or value contains the delimiter, or joining them creates one
    /// across the field boundary.
    ContainsDelimiter,
    /// Key or value contains `\n` or `\r`.
    ContainsLineBreak,
    /// Full record without a value.
    MissingValue,
    /// Line does not split into the number of segments the shape needs.
    Malformed { segments: usize },
    /// Key or value is empty.
    EmptySegment,
    /// Line contains `otp`.
    ContainsOtp,
    /// Key is not valid utf-8 or exceeds the key limit.
    InvalidKey,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::NotPrintable => f.write_str("value is not printable ascii"),
            SkipReason::ContainsDelimiter => f.write_str("contains delimiter"),
            SkipReason::ContainsLineBreak => f.write_str("contains line break"),
            SkipReason::MissingValue => f.write_str("missing value"),
            SkipReason::Malformed { segments } => write!(f, "malformed, {} segments", segments),
            SkipReason::EmptySegment => f.write_str("empty segment"),
            SkipReason::ContainsOtp => f.write_str("contains otp"),
            SkipReason::InvalidKey => f.write_str("invalid key"),
        }
    }
}

/// Outcome of checking one entry against the backup format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Included,
    Skipped(SkipReason),
}

impl Disposition {
    pub fn is_included(&self) -> bool {
        matches!(self, Disposition::Included)
    }
}
