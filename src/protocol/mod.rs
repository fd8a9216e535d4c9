pub(crate) mod connection;

pub(crate) mod frame;

use std::borrow::Borrow;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;

use crate::common::SweepError;

// Maximum number of bytes in Key.
// if it's not in ascii, Len  is misleading, so using Bytes explicitly.
pub const MAX_KEY_BYTES: usize = 512 * 1024 * 1024;

// Maximum number of bytes in Value.
pub const MAX_VALUE_BYTES: usize = 512 * 1024 * 1024;

// Key represents a string the store accepts as a key.
// other components can handle Key without checking the length.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Deref for Key {
    type Target = String;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for Key {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Key {
    type Error = SweepError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Key::new(s)
    }
}

impl TryFrom<&str> for Key {
    type Error = SweepError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Key::new(s)
    }
}

impl Key {
    // Construct Key from given string.
    pub fn new(s: impl Into<String>) -> Result<Self, SweepError> {
        let s = s.into();
        if s.len() > MAX_KEY_BYTES {
            Err(SweepError::MaxKeyBytes {
                key: s,
                max_bytes: MAX_KEY_BYTES,
            })
        } else {
            Ok(Self(s))
        }
    }

    pub(crate) fn new_unchecked(s: impl Into<String>) -> Self {
        Key(s.into())
    }

    // Keys reported by SCAN are trusted to satisfy the store limits.
    // Raw bytes that are not utf-8 are handed back untouched.
    pub(crate) fn from_store(raw: Vec<u8>) -> std::result::Result<Self, Vec<u8>> {
        String::from_utf8(raw)
            .map(Key)
            .map_err(|err| err.into_bytes())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

// Value represents binary data stored under a key.
// It does not have to be Vec<u8> because we do not mutate.
#[derive(Clone, PartialEq, Eq)]
pub struct Value(Box<[u8]>);

impl Deref for Value {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl Value {
    pub fn new(v: impl Into<Box<[u8]>>) -> Result<Self, SweepError> {
        let v = v.into();
        if v.len() > MAX_VALUE_BYTES {
            Err(SweepError::MaxValueBytes {
                max_bytes: MAX_VALUE_BYTES,
            })
        } else {
            Ok(Value(v))
        }
    }

    pub(crate) fn new_unchecked(v: impl Into<Box<[u8]>>) -> Self {
        Value(v.into())
    }

    /// Every byte is printable ascii (0x20 to 0x7e). Empty values qualify.
    pub fn is_ascii_printable(&self) -> bool {
        self.iter().all(|b| (0x20..=0x7e).contains(b))
    }

    pub fn into_boxed_bytes(self) -> Box<[u8]> {
        self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.len() > 1024 {
            write!(f, "{}", String::from_utf8_lossy(&self.deref()[..1024]))
        } else {
            write!(f, "{}", String::from_utf8_lossy(self.deref()))
        }
    }
}
